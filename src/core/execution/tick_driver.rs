use crate::core::clock::TickClock;
use crate::core::delivery::{Delivery, DeliveryGenerator, DeliverySender};
use crate::core::errors::SimError;
use crate::core::execution::config::RunConfig;
use crate::core::sections::SectionRegistry;
use crate::core::stats::{RunStats, StatsAggregator};
use crate::core::types::{StockSnapshot, Tick};
use crate::core::workers::{Customer, CustomerOutcome};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Bernoulli, Distribution};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Observer trait for tick driver events
pub trait TickObserver: Send {
    /// Called after the clock moves forward
    fn on_tick_advance(&mut self, old_tick: Tick, new_tick: Tick);

    /// Called whenever a stock snapshot is taken
    fn on_snapshot(&mut self, _snapshot: &StockSnapshot) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    Ended,
}

type CustomerHandle = JoinHandle<Result<CustomerOutcome, SimError>>;

/// The master loop. Sole writer of the tick clock.
pub struct TickDriver {
    clock: Arc<TickClock>,
    registry: Arc<SectionRegistry>,
    aggregator: Arc<StatsAggregator>,
    deliveries: DeliverySender,
    generator: DeliveryGenerator,
    customer_arrivals: Bernoulli,
    delivery_arrivals: Bernoulli,
    snapshot_interval: Tick,
    rng: StdRng,
    scheduled: BTreeMap<Tick, Vec<Delivery>>,
    customers: Vec<CustomerHandle>,
    next_customer_id: u64,
    snapshots: Vec<StockSnapshot>,
    observers: Vec<Box<dyn TickObserver>>,
    stats: RunStats,
    state: DriverState,
}

impl TickDriver {
    pub fn new(
        config: &RunConfig,
        clock: Arc<TickClock>,
        registry: Arc<SectionRegistry>,
        aggregator: Arc<StatsAggregator>,
        deliveries: DeliverySender,
    ) -> Result<Self, SimError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            clock,
            registry,
            aggregator,
            deliveries,
            generator: DeliveryGenerator::new(config.batch_size, config.section_capacity),
            customer_arrivals: config.customer_distribution()?,
            delivery_arrivals: config.delivery_distribution()?,
            snapshot_interval: config.snapshot_interval,
            rng,
            scheduled: BTreeMap::new(),
            customers: Vec::new(),
            next_customer_id: 0,
            snapshots: Vec::new(),
            observers: Vec::new(),
            stats: RunStats::default(),
            state: DriverState::Running,
        })
    }

    /// Queue a delivery to be dropped off on a given tick
    pub fn schedule_delivery(&mut self, tick: Tick, delivery: Delivery) {
        self.scheduled.entry(tick).or_default().push(delivery);
    }

    pub fn add_observer(&mut self, observer: Box<dyn TickObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn snapshots(&self) -> &[StockSnapshot] {
        &self.snapshots
    }

    /// Drive the clock to the end of the run
    pub fn run(&mut self) -> Result<Tick, SimError> {
        while self.state == DriverState::Running && self.clock.now() < self.clock.total_ticks() {
            self.step()?;
        }
        Ok(self.clock.now())
    }

    /// Process one tick
    pub fn step(&mut self) -> Result<(), SimError> {
        let old_tick = self.clock.now();
        if old_tick % self.snapshot_interval == 0 {
            self.take_snapshot(old_tick);
            self.reap_customers()?;
        }

        let tick = self.clock.advance();
        for observer in &mut self.observers {
            observer.on_tick_advance(old_tick, tick);
        }

        if self.customer_arrivals.sample(&mut self.rng) {
            self.spawn_customer()?;
        }
        if self.delivery_arrivals.sample(&mut self.rng) {
            let delivery = self.generator.generate(&self.registry.observe(), tick, &mut self.rng);
            self.dispatch(tick, delivery)?;
        }
        if let Some(due) = self.scheduled.remove(&tick) {
            for delivery in due {
                self.dispatch(tick, delivery)?;
            }
        }

        self.clock.sleep_ticks(1);
        Ok(())
    }

    /// Close the store: stop the clock, wake every waiting worker and wait
    /// for all customers to leave.
    ///
    /// Safe to call more than once. Stockers are joined by the caller.
    pub fn shutdown(&mut self) -> Result<(), SimError> {
        if self.state == DriverState::Running {
            info!("Tick = {}, End of day", self.clock.now());
        }
        self.state = DriverState::Ended;
        self.clock.end();
        self.deliveries.close();
        if self.deliveries.backlog() > 0 {
            warn!("{} deliveries left unopened at close", self.deliveries.backlog());
        }

        let mut first_error = self.registry.wake_all().err();
        for handle in self.customers.drain(..) {
            if let Err(err) = join_customer(handle) {
                first_error.get_or_insert(err);
            }
        }

        let partial = std::mem::take(&mut self.stats);
        if let Err(err) = self.aggregator.merge(&partial) {
            first_error.get_or_insert(err);
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Hand over the snapshots once the run is over
    pub fn into_snapshots(self) -> Vec<StockSnapshot> {
        self.snapshots
    }

    fn take_snapshot(&mut self, tick: Tick) {
        let snapshot = StockSnapshot {
            tick,
            stock: self.registry.snapshot(),
        };
        info!("{}", snapshot);
        for observer in &mut self.observers {
            observer.on_snapshot(&snapshot);
        }
        self.snapshots.push(snapshot);
    }

    fn spawn_customer(&mut self) -> Result<(), SimError> {
        self.next_customer_id += 1;
        let id = self.next_customer_id;
        let customer = Customer::arrive(
            id,
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
            &mut self.rng,
        )?;
        let aggregator = Arc::clone(&self.aggregator);
        let handle = thread::Builder::new()
            .name(format!("customer-{}", id))
            .spawn(move || customer.run(&aggregator))
            .map_err(|err| SimError::Spawn(format!("customer {}: {}", id, err)))?;
        self.customers.push(handle);
        Ok(())
    }

    fn dispatch(&mut self, tick: Tick, delivery: Delivery) -> Result<(), SimError> {
        info!("<{}> Deposit of items: {}", tick, delivery);
        self.stats.deliveries_generated += 1;
        self.deliveries
            .send(delivery)
            .map_err(|lost| SimError::internal(format!("no assistant left to receive {}", lost.id())))
    }

    /// Join customers that have already left so handles do not pile up
    fn reap_customers(&mut self) -> Result<(), SimError> {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.customers.drain(..).partition(|handle| handle.is_finished());
        self.customers = running;
        if !finished.is_empty() {
            debug!("Reaped {} customer threads, {} still shopping", finished.len(), self.customers.len());
        }
        for handle in finished {
            join_customer(handle)?;
        }
        Ok(())
    }
}

fn join_customer(handle: CustomerHandle) -> Result<CustomerOutcome, SimError> {
    handle
        .join()
        .map_err(|_| SimError::internal("customer thread panicked"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::delivery::{delivery_channel, Received};
    use crate::core::types::default_catalog;
    use std::sync::Mutex;
    use std::time::Duration;

    struct TickCounter(Arc<Mutex<Vec<Tick>>>);

    impl TickObserver for TickCounter {
        fn on_tick_advance(&mut self, _old_tick: Tick, new_tick: Tick) {
            self.0.lock().unwrap().push(new_tick);
        }
    }

    fn driver(config: &RunConfig) -> (TickDriver, crate::core::delivery::DeliveryReceiver, Arc<StatsAggregator>) {
        let clock = Arc::new(TickClock::new(config.total_ticks, Duration::ZERO));
        let registry = Arc::new(SectionRegistry::new(default_catalog()).unwrap());
        let aggregator = Arc::new(StatsAggregator::new());
        let (tx, rx) = delivery_channel();
        let driver = TickDriver::new(config, clock, registry, Arc::clone(&aggregator), tx).unwrap();
        (driver, rx, aggregator)
    }

    #[test]
    fn test_runs_to_total_ticks() {
        let config = RunConfig::new(1, 250, 0)
            .with_customer_probability(0.0)
            .with_delivery_probability(0.0);
        let (mut driver, _rx, _aggregator) = driver(&config);
        let ticks = Arc::new(Mutex::new(Vec::new()));
        driver.add_observer(Box::new(TickCounter(Arc::clone(&ticks))));

        assert_eq!(driver.run().unwrap(), 250);
        driver.shutdown().unwrap();
        assert_eq!(driver.state(), DriverState::Ended);

        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.len(), 250);
        assert_eq!(ticks.first(), Some(&1));
        assert_eq!(ticks.last(), Some(&250));

        let snapshot_ticks: Vec<Tick> = driver.snapshots().iter().map(|s| s.tick).collect();
        assert_eq!(snapshot_ticks, vec![0, 100, 200]);
    }

    #[test]
    fn test_scheduled_delivery_dispatched_on_its_tick() {
        let config = RunConfig::new(1, 5, 0)
            .with_customer_probability(0.0)
            .with_delivery_probability(0.0);
        let (mut driver, rx, aggregator) = driver(&config);
        driver.schedule_delivery(3, Delivery::new(3, vec![("toys".to_string(), 4)]));
        driver.schedule_delivery(99, Delivery::new(99, vec![("books".to_string(), 4)]));

        driver.run().unwrap();
        match rx.recv() {
            Received::Delivery(delivery) => assert_eq!(delivery.quantity("toys"), 4),
            Received::Cancelled => panic!("expected the scheduled delivery"),
        }
        driver.shutdown().unwrap();
        assert_eq!(aggregator.totals().unwrap().deliveries_generated, 1);
    }

    #[test]
    fn test_every_tick_delivers_when_certain() {
        let config = RunConfig::new(1, 20, 0)
            .with_customer_probability(0.0)
            .with_delivery_probability(1.0)
            .with_seed(5);
        let (mut driver, rx, _aggregator) = driver(&config);
        driver.run().unwrap();

        let mut received = 0;
        while let Received::Delivery(delivery) = rx.recv() {
            assert!(delivery.total() <= 10);
            received += 1;
            if received == 20 {
                break;
            }
        }
        assert_eq!(received, 20);
        driver.shutdown().unwrap();
    }

    #[test]
    fn test_customers_accounted_at_shutdown() {
        let config = RunConfig::new(1, 300, 0)
            .with_customer_probability(1.0)
            .with_delivery_probability(0.0)
            .with_seed(17);
        let (mut driver, _rx, aggregator) = driver(&config);
        driver.run().unwrap();
        driver.shutdown().unwrap();

        let stats = aggregator.totals().unwrap();
        assert_eq!(stats.customers_arrived, 300);
        assert_eq!(stats.customers_served + stats.customers_abandoned, 300);
        // Thirty units on the shelves and no deliveries.
        assert!(stats.customers_served <= 30);
    }
}
