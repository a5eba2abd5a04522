use crate::core::clock::TickClock;
use crate::core::delivery::{delivery_channel, Delivery};
use crate::core::errors::{ConfigError, SimError};
use crate::core::execution::config::RunConfig;
use crate::core::execution::tick_driver::{TickDriver, TickObserver};
use crate::core::sections::SectionRegistry;
use crate::core::stats::{RunReport, RunStats, StatsAggregator};
use crate::core::types::{default_catalog, Tick};
use crate::core::workers::Stocker;
use log::{error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type StockerHandle = JoinHandle<Result<RunStats, SimError>>;

/// One day in the store, from opening to the end-of-day report.
pub struct Simulation {
    config: RunConfig,
    catalog: Vec<(String, u32)>,
    scheduled: Vec<(Tick, Delivery)>,
    observers: Vec<Box<dyn TickObserver>>,
}

impl Simulation {
    /// Validate the configuration and prepare a run over the default catalog
    ///
    /// # Arguments
    /// * `config` - Run configuration, checked before anything is built
    ///
    /// # Returns
    /// A simulation ready to run, or `SimError::Config` if `config` is invalid
    pub fn new(config: RunConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            catalog: default_catalog(),
            scheduled: Vec::new(),
            observers: Vec::new(),
        })
    }

    /// Replace the store's sections and their opening stock
    ///
    /// # Arguments
    /// * `catalog` - `(section name, opening stock)` pairs, non-empty and unique
    ///
    /// # Returns
    /// A new simulation over the specified sections
    pub fn with_catalog(mut self, catalog: Vec<(String, u32)>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Drop off a fixed delivery on `tick`, on top of the random ones
    ///
    /// # Arguments
    /// * `tick` - Tick the delivery arrives on, within `1..=total_ticks`
    /// * `lines` - `(section name, units)` pairs, in shelving order
    ///
    /// # Returns
    /// A new simulation with the delivery scheduled
    ///
    /// # Note
    /// The tick and section names are checked when the run starts.
    pub fn with_delivery_at(mut self, tick: Tick, lines: Vec<(String, u32)>) -> Self {
        self.scheduled.push((tick, Delivery::new(tick, lines)));
        self
    }

    /// Register an observer for tick changes and stock snapshots
    ///
    /// # Arguments
    /// * `observer` - Called from the tick driver's thread
    ///
    /// # Returns
    /// A new simulation with the observer attached
    pub fn with_observer(mut self, observer: Box<dyn TickObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Run the whole day. Blocks until every worker has stopped.
    ///
    /// # Returns
    /// The end-of-day report, or the first error raised by any worker
    pub fn run(self) -> Result<RunReport, SimError> {
        let Simulation {
            config,
            catalog,
            scheduled,
            observers,
        } = self;

        let registry = Arc::new(SectionRegistry::new(catalog)?);
        for (tick, delivery) in &scheduled {
            if *tick == 0 || *tick > config.total_ticks {
                return Err(ConfigError::OutOfRange {
                    field: "scheduled delivery",
                    reason: format!("tick {} is outside 1..={}", tick, config.total_ticks),
                }
                .into());
            }
            for (section, _) in delivery.lines() {
                if registry.section(section).is_err() {
                    return Err(ConfigError::OutOfRange {
                        field: "scheduled delivery",
                        reason: format!("tick {} names unknown section '{}'", tick, section),
                    }
                    .into());
                }
            }
        }

        let clock = Arc::new(TickClock::new(config.total_ticks, config.tick_duration()));
        let aggregator = Arc::new(StatsAggregator::new());
        let (sender, receiver) = delivery_channel();

        let mut driver = TickDriver::new(
            &config,
            Arc::clone(&clock),
            Arc::clone(&registry),
            Arc::clone(&aggregator),
            sender,
        )?;
        for (tick, delivery) in scheduled {
            driver.schedule_delivery(tick, delivery);
        }
        for observer in observers {
            driver.add_observer(observer);
        }

        info!(
            "Opening store: {} assistants, {} ticks of {} ms",
            config.assistant_count, config.total_ticks, config.tick_duration_ms
        );

        let mut stockers = Vec::new();
        let mut outcome = Ok(());
        for id in 1..=config.assistant_count {
            let stocker = Stocker::new(
                id,
                Arc::clone(&registry),
                Arc::clone(&clock),
                receiver.clone(),
                &config,
            );
            let aggregator = Arc::clone(&aggregator);
            match thread::Builder::new()
                .name(format!("stocker-{}", id))
                .spawn(move || stocker.run(&aggregator))
            {
                Ok(handle) => stockers.push(handle),
                Err(err) => {
                    outcome = Err(SimError::Spawn(format!("stocker {}: {}", id, err)));
                    break;
                }
            }
        }
        drop(receiver);

        if outcome.is_ok() {
            outcome = driver.run().map(|_| ());
        }
        let closed = driver.shutdown();
        let joined = join_stockers(stockers);
        outcome.and(closed).and(joined).map_err(|err| {
            error!("Run aborted: {}", err);
            err
        })?;

        let report = RunReport {
            final_tick: clock.now(),
            stats: aggregator.totals()?,
            final_stock: registry.snapshot(),
            section_tallies: registry.tallies()?,
            snapshots: driver.into_snapshots(),
            config,
        };
        report.log();
        Ok(report)
    }
}

/// Run a simulation with the default catalog and return its report
pub fn start(config: RunConfig) -> Result<RunReport, SimError> {
    Simulation::new(config)?.run()
}

fn join_stockers(handles: Vec<StockerHandle>) -> Result<(), SimError> {
    let mut first_error = None;
    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| SimError::internal("stocker thread panicked"))
            .and_then(|stats| stats);
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
