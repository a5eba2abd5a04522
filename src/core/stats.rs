use crate::core::errors::SimError;
use crate::core::execution::config::RunConfig;
use crate::core::types::{SectionTally, StockSnapshot, Tick};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counters accumulated over a run.
///
/// Every worker keeps its own copy and folds it into the shared
/// [`StatsAggregator`] when it reaches a terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub customers_arrived: u64,
    pub customers_served: u64,
    pub customers_abandoned: u64,
    pub total_customer_wait_ticks: u64,
    pub total_worker_active_ticks: u64,
    pub total_worker_break_ticks: u64,
    pub breaks_taken: u64,
    pub deliveries_generated: u64,
    pub deliveries_handled: u64,
    pub units_stocked: u64,
    pub units_skipped: u64,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.customers_arrived += other.customers_arrived;
        self.customers_served += other.customers_served;
        self.customers_abandoned += other.customers_abandoned;
        self.total_customer_wait_ticks += other.total_customer_wait_ticks;
        self.total_worker_active_ticks += other.total_worker_active_ticks;
        self.total_worker_break_ticks += other.total_worker_break_ticks;
        self.breaks_taken += other.breaks_taken;
        self.deliveries_generated += other.deliveries_generated;
        self.deliveries_handled += other.deliveries_handled;
        self.units_stocked += other.units_stocked;
        self.units_skipped += other.units_skipped;
    }
}

/// Shared sink for per-worker statistics
#[derive(Debug, Default)]
pub struct StatsAggregator {
    totals: Mutex<RunStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, partial: &RunStats) -> Result<(), SimError> {
        let mut totals = self
            .totals
            .lock()
            .map_err(|_| SimError::internal("statistics lock is poisoned"))?;
        totals.merge(partial);
        Ok(())
    }

    pub fn totals(&self) -> Result<RunStats, SimError> {
        self.totals
            .lock()
            .map(|totals| totals.clone())
            .map_err(|_| SimError::internal("statistics lock is poisoned"))
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: RunConfig,
    pub final_tick: Tick,
    pub stats: RunStats,
    pub final_stock: Vec<(String, u32)>,
    pub section_tallies: Vec<SectionTally>,
    pub snapshots: Vec<StockSnapshot>,
}

impl RunReport {
    /// Mean ticks a served customer waited
    pub fn average_wait(&self) -> f64 {
        if self.stats.customers_served == 0 {
            return 0.0;
        }
        self.stats.total_customer_wait_ticks as f64 / self.stats.customers_served as f64
    }

    /// Mean ticks each assistant spent walking and stocking
    pub fn average_active_per_assistant(&self) -> f64 {
        self.stats.total_worker_active_ticks as f64 / self.assistants()
    }

    /// Mean ticks each assistant spent neither working nor on break
    pub fn average_idle_per_assistant(&self) -> f64 {
        let available = self.config.total_ticks as f64 * self.assistants();
        let busy = (self.stats.total_worker_active_ticks + self.stats.total_worker_break_ticks) as f64;
        (available - busy) / self.assistants()
    }

    pub fn stock_of(&self, section: &str) -> Option<u32> {
        self.final_stock
            .iter()
            .find(|(name, _)| name == section)
            .map(|(_, stock)| *stock)
    }

    /// Write the report to the log, one line per entry
    pub fn log(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }

    fn assistants(&self) -> f64 {
        self.config.assistant_count.max(1) as f64
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tick = {}, End of day", self.final_tick)?;
        writeln!(f, "End of Day Statistics:")?;
        writeln!(f, "------------------------")?;
        writeln!(f, "Remaining items in each section:")?;
        for (name, stock) in &self.final_stock {
            writeln!(f, "  {}: {}", name, stock)?;
        }
        writeln!(f, "Customers arrived: {}", self.stats.customers_arrived)?;
        writeln!(f, "Total number of customers served: {}", self.stats.customers_served)?;
        writeln!(f, "Customers still waiting at close: {}", self.stats.customers_abandoned)?;
        writeln!(f, "Average wait time for customers served: {:.2} ticks", self.average_wait())?;
        writeln!(
            f,
            "Deliveries: {} generated, {} handled ({} units stocked, {} skipped)",
            self.stats.deliveries_generated,
            self.stats.deliveries_handled,
            self.stats.units_stocked,
            self.stats.units_skipped
        )?;
        writeln!(
            f,
            "Average physically working (moving & stocking) time for assistants: {:.2} ticks",
            self.average_active_per_assistant()
        )?;
        writeln!(
            f,
            "Average wasted time for assistants (waiting for an action and not on break): {:.2} ticks",
            self.average_idle_per_assistant()
        )?;
        write!(f, "------------------------")
    }
}
