use crate::core::clock::TickClock;
use crate::core::errors::SimError;
use crate::core::sections::SectionRegistry;
use crate::core::stats::{RunStats, StatsAggregator};
use crate::core::types::Tick;
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Terminal state of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerOutcome {
    Served { waited: Tick },
    Abandoned,
}

/// A shopper who wants exactly one item from one section.
///
/// The section is picked on arrival and never changes.
#[derive(Debug)]
pub struct Customer {
    id: u64,
    section: String,
    arrived_at: Tick,
    registry: Arc<SectionRegistry>,
    clock: Arc<TickClock>,
}

impl Customer {
    /// Walk in, pick a section at random and join its queue
    pub fn arrive<R: Rng + ?Sized>(
        id: u64,
        registry: Arc<SectionRegistry>,
        clock: Arc<TickClock>,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        let section = registry
            .sections()
            .choose(rng)
            .map(|s| s.name().to_string())
            .ok_or_else(|| SimError::internal("store has no sections"))?;
        Self::arrive_at(id, section, registry, clock)
    }

    /// Walk in and queue for a known section
    pub fn arrive_at(
        id: u64,
        section: String,
        registry: Arc<SectionRegistry>,
        clock: Arc<TickClock>,
    ) -> Result<Self, SimError> {
        registry.increment_waiting(&section)?;
        let arrived_at = clock.now();
        debug!("<{}> [Customer {}] Arrived for {}", arrived_at, id, section);
        Ok(Self {
            id,
            section,
            arrived_at,
            registry,
            clock,
        })
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Shop until served or the store closes, then report to the aggregator
    pub fn run(self, aggregator: &StatsAggregator) -> Result<CustomerOutcome, SimError> {
        let outcome = self.shop()?;
        let mut partial = RunStats {
            customers_arrived: 1,
            ..Default::default()
        };
        match outcome {
            CustomerOutcome::Served { waited } => {
                partial.customers_served = 1;
                partial.total_customer_wait_ticks = waited;
            }
            CustomerOutcome::Abandoned => partial.customers_abandoned = 1,
        }
        aggregator.merge(&partial)?;
        Ok(outcome)
    }

    /// Contend for the section until one unit is taken or the run ends.
    ///
    /// Leaves the section's waiting count whichever way it finishes.
    pub fn shop(self) -> Result<CustomerOutcome, SimError> {
        let outcome = self.contend();
        self.registry.decrement_waiting(&self.section)?;
        outcome
    }

    fn contend(&self) -> Result<CustomerOutcome, SimError> {
        let mut guard = self.registry.lock(&self.section)?;
        loop {
            // The clock is checked under the lock; the driver notifies under
            // the same lock at close, so this wait cannot miss it.
            if self.clock.has_ended() {
                debug!("[Customer {}] Left {} empty-handed", self.id, self.section);
                return Ok(CustomerOutcome::Abandoned);
            }
            if guard.try_take()? {
                let now = self.clock.now();
                let waited = now.saturating_sub(self.arrived_at);
                info!(
                    "<{}> [Customer {}] Bought from {} waited_ticks={}",
                    now, self.id, self.section, waited
                );
                return Ok(CustomerOutcome::Served { waited });
            }
            guard = guard.wait()?;
        }
    }
}
