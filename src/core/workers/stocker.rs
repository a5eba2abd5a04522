use crate::core::clock::TickClock;
use crate::core::delivery::{Delivery, DeliveryReceiver, Received};
use crate::core::errors::SimError;
use crate::core::execution::config::RunConfig;
use crate::core::sections::SectionRegistry;
use crate::core::stats::{RunStats, StatsAggregator};
use crate::core::types::Tick;
use log::{debug, error, info};
use std::sync::Arc;

/// Smallest delivery line (exclusive) an assistant bothers to shelve
pub const RESTOCK_MIN_EXCLUSIVE: u32 = 1;
/// Largest delivery line an assistant will shelve in one trip
pub const RESTOCK_MAX: u32 = 10;

/// Whether a delivery line is large enough, and small enough, to shelve
pub fn should_restock(quantity: u32) -> bool {
    quantity > RESTOCK_MIN_EXCLUSIVE && quantity <= RESTOCK_MAX
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockerState {
    AwaitingDelivery,
    Stocking,
    OnBreak,
    Finished,
}

/// A store assistant that drains the delivery box for the whole run.
pub struct Stocker {
    id: usize,
    registry: Arc<SectionRegistry>,
    clock: Arc<TickClock>,
    deliveries: DeliveryReceiver,
    walk_ticks: u64,
    break_after_ticks: u64,
    break_ticks: u64,
    state: StockerState,
    last_break: Tick,
    last_action: Tick,
    stats: RunStats,
}

impl Stocker {
    pub fn new(
        id: usize,
        registry: Arc<SectionRegistry>,
        clock: Arc<TickClock>,
        deliveries: DeliveryReceiver,
        config: &RunConfig,
    ) -> Self {
        Self {
            id,
            registry,
            clock,
            deliveries,
            walk_ticks: config.walk_ticks,
            break_after_ticks: config.break_after_ticks,
            break_ticks: config.break_ticks,
            state: StockerState::AwaitingDelivery,
            last_break: 0,
            last_action: 0,
            stats: RunStats::default(),
        }
    }

    pub fn state(&self) -> StockerState {
        self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Work until the run is cancelled, then hand the statistics over.
    ///
    /// Statistics gathered before a failed restock are still merged.
    pub fn run(mut self, aggregator: &StatsAggregator) -> Result<RunStats, SimError> {
        debug!("[Stocker {}] Clocked in", self.id);
        let mut outcome = Ok(());
        while !self.clock.has_ended() {
            self.state = StockerState::AwaitingDelivery;
            let delivery = match self.deliveries.recv() {
                Received::Delivery(delivery) => delivery,
                Received::Cancelled => break,
            };
            if let Err(err) = self.restock(&delivery) {
                error!("[Stocker {}] Gave up on {}: {}", self.id, delivery, err);
                outcome = Err(err);
                break;
            }
            if self.clock.has_ended() {
                break;
            }
            self.take_break_if_due();
        }

        self.state = StockerState::Finished;
        debug!("[Stocker {}] Clocked out", self.id);
        aggregator.merge(&self.stats)?;
        outcome.map(|_| self.stats)
    }

    /// Shelve every eligible line of a delivery, one section at a time.
    ///
    /// Each section stays locked for the walk and the stocking. Stops early
    /// if the run ends between sections.
    pub fn restock(&mut self, delivery: &Delivery) -> Result<(), SimError> {
        let now = self.clock.now();
        info!(
            "<{}> [Stocker {}] Collected {} waited_ticks={}",
            now,
            self.id,
            delivery,
            now.saturating_sub(self.last_action)
        );

        for (section, quantity) in delivery.lines() {
            let quantity = *quantity;
            if !should_restock(quantity) {
                self.stats.units_skipped += u64::from(quantity);
                continue;
            }
            if self.clock.has_ended() {
                debug!("[Stocker {}] Store closed before reaching {}", self.id, section);
                return Ok(());
            }

            self.state = StockerState::Stocking;
            let mut guard = self.registry.lock(section)?;

            self.clock.sleep_ticks(self.walk_ticks);
            info!("<{}> [Stocker {}] Moved to section {}", self.clock.now(), self.id, section);

            info!(
                "<{}> [Stocker {}] Began stocking {} with {} (shelf has {})",
                self.clock.now(),
                self.id,
                section,
                quantity,
                guard.stock()
            );
            self.clock.sleep_ticks(u64::from(quantity));
            guard.add_stock(quantity)?;
            let shelved = guard.stock();
            drop(guard);

            info!(
                "<{}> [Stocker {}] Finished stocking {}={}",
                self.clock.now(),
                self.id,
                section,
                shelved
            );
            self.stats.total_worker_active_ticks += self.walk_ticks + u64::from(quantity);
            self.stats.units_stocked += u64::from(quantity);
            self.last_action = self.clock.now();
        }

        self.stats.deliveries_handled += 1;
        self.state = StockerState::AwaitingDelivery;
        Ok(())
    }

    /// Rest if enough time has passed since the last break.
    ///
    /// Returns whether a break was taken.
    pub fn take_break_if_due(&mut self) -> bool {
        let now = self.clock.now();
        if now.saturating_sub(self.last_break) <= self.break_after_ticks {
            return false;
        }

        self.state = StockerState::OnBreak;
        info!("<{}> [Stocker {}] Took a break", now, self.id);
        self.clock.sleep_ticks(self.break_ticks);
        self.stats.total_worker_break_ticks += self.break_ticks;
        self.stats.breaks_taken += 1;
        self.last_break = self.clock.now();
        info!("<{}> [Stocker {}] Back from break", self.last_break, self.id);
        self.state = StockerState::AwaitingDelivery;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::delivery::delivery_channel;
    use crate::core::types::default_catalog;
    use std::time::Duration;

    fn stocker(total_ticks: Tick) -> (Stocker, Arc<SectionRegistry>, Arc<TickClock>) {
        let registry = Arc::new(SectionRegistry::new(default_catalog()).unwrap());
        let clock = Arc::new(TickClock::new(total_ticks, Duration::ZERO));
        let (_tx, rx) = delivery_channel();
        let config = RunConfig::new(1, total_ticks, 0);
        let stocker = Stocker::new(1, Arc::clone(&registry), Arc::clone(&clock), rx, &config);
        (stocker, registry, clock)
    }

    fn stock(registry: &SectionRegistry, name: &str) -> u32 {
        registry.section(name).unwrap().visible_stock()
    }

    #[test]
    fn test_restock_threshold() {
        assert!(!should_restock(0));
        assert!(!should_restock(1));
        assert!(should_restock(2));
        assert!(should_restock(10));
        assert!(!should_restock(11));
    }

    #[test]
    fn test_restock_adds_stock_and_active_time() {
        let (mut stocker, registry, _clock) = stocker(1000);
        let delivery = Delivery::new(1, vec![("electronics".to_string(), 4)]);
        stocker.restock(&delivery).unwrap();

        assert_eq!(stock(&registry, "electronics"), 9);
        assert_eq!(stocker.stats().total_worker_active_ticks, 10 + 4);
        assert_eq!(stocker.stats().units_stocked, 4);
        assert_eq!(stocker.stats().deliveries_handled, 1);
        assert_eq!(stocker.state(), StockerState::AwaitingDelivery);
    }

    #[test]
    fn test_single_unit_lines_are_skipped() {
        let (mut stocker, registry, _clock) = stocker(1000);
        let delivery = Delivery::new(
            1,
            vec![
                ("books".to_string(), 1),
                ("toys".to_string(), 0),
                ("clothing".to_string(), 11),
            ],
        );
        stocker.restock(&delivery).unwrap();

        assert_eq!(stock(&registry, "books"), 5);
        assert_eq!(stock(&registry, "clothing"), 5);
        assert_eq!(stocker.stats().units_skipped, 12);
        assert_eq!(stocker.stats().total_worker_active_ticks, 0);
    }

    #[test]
    fn test_no_stocking_after_close() {
        let (mut stocker, registry, clock) = stocker(1000);
        clock.end();
        let delivery = Delivery::new(1, vec![("furniture".to_string(), 5)]);
        stocker.restock(&delivery).unwrap();
        assert_eq!(stock(&registry, "furniture"), 5);
    }

    #[test]
    fn test_break_after_threshold() {
        let (mut stocker, _registry, clock) = stocker(1000);
        for _ in 0..200 {
            clock.advance();
        }
        assert!(!stocker.take_break_if_due());

        clock.advance();
        assert!(stocker.take_break_if_due());
        assert_eq!(stocker.stats().total_worker_break_ticks, 150);
        assert_eq!(stocker.stats().breaks_taken, 1);

        // Break clock restarts from the tick the assistant came back.
        clock.advance();
        assert!(!stocker.take_break_if_due());
    }

    #[test]
    fn test_run_exits_on_cancel_and_merges() {
        let registry = Arc::new(SectionRegistry::new(default_catalog()).unwrap());
        let clock = Arc::new(TickClock::new(1000, Duration::ZERO));
        let (tx, rx) = delivery_channel();
        let config = RunConfig::new(1, 1000, 0);
        let stocker = Stocker::new(7, Arc::clone(&registry), Arc::clone(&clock), rx, &config);
        let aggregator = Arc::new(StatsAggregator::new());

        let handle = {
            let aggregator = Arc::clone(&aggregator);
            std::thread::spawn(move || stocker.run(&aggregator))
        };
        tx.send(Delivery::new(0, vec![("toys".to_string(), 3)])).unwrap();
        while stock(&registry, "toys") != 8 {
            std::thread::yield_now();
        }
        tx.close();

        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.units_stocked, 3);
        assert_eq!(aggregator.totals().unwrap().units_stocked, 3);
    }

    #[test]
    fn test_failed_restock_still_merges_stats() {
        let registry = Arc::new(SectionRegistry::new(default_catalog()).unwrap());
        let clock = Arc::new(TickClock::new(1000, Duration::ZERO));
        let (tx, rx) = delivery_channel();
        let config = RunConfig::new(1, 1000, 0).with_walk_ticks(2);
        let stocker = Stocker::new(3, Arc::clone(&registry), Arc::clone(&clock), rx, &config);
        let aggregator = StatsAggregator::new();

        tx.send(Delivery::new(
            0,
            vec![("toys".to_string(), 3), ("garden".to_string(), 4)],
        ))
        .unwrap();
        let result = stocker.run(&aggregator);

        assert!(matches!(result, Err(SimError::Internal(_))));
        let totals = aggregator.totals().unwrap();
        assert_eq!(totals.units_stocked, 3);
        assert_eq!(totals.total_worker_active_ticks, 2 + 3);
        assert_eq!(totals.deliveries_handled, 0);
        assert_eq!(stock(&registry, "toys"), 8);
    }
}
