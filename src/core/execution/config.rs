use crate::core::errors::ConfigError;
use crate::core::types::Tick;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chance of a customer walking in on any tick
pub const CUSTOMER_PROBABILITY: f64 = 0.10;
/// Chance of a delivery arriving on any tick
pub const DELIVERY_PROBABILITY: f64 = 0.01;
/// Ticks between logged stock snapshots
pub const SNAPSHOT_INTERVAL: Tick = 100;
/// Ticks an assistant spends walking to a section
pub const WALK_TICKS: u64 = 10;
/// Ticks of work an assistant does before earning a break
pub const BREAK_AFTER_TICKS: u64 = 200;
/// Length of an assistant's break
pub const BREAK_TICKS: u64 = 150;
/// Units in a single delivery
pub const BATCH_SIZE: u32 = 10;
/// Stock a delivery aims not to exceed in any section
pub const SECTION_CAPACITY: u32 = 10;
/// Most assistants a single run will start
pub const MAX_ASSISTANTS: usize = 1024;

/// Configuration for a store simulation run
///
/// This struct holds the three values collected by a front end (assistants,
/// run length, tick size) plus the tunables that shape the store's
/// behaviour. It is immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of stocker workers
    pub assistant_count: usize,
    /// Length of the run in ticks
    pub total_ticks: Tick,
    /// Wall time of one tick in milliseconds
    pub tick_duration_ms: u64,
    #[serde(default = "default_customer_probability")]
    pub customer_probability: f64,
    #[serde(default = "default_delivery_probability")]
    pub delivery_probability: f64,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: Tick,
    #[serde(default = "default_walk_ticks")]
    pub walk_ticks: u64,
    #[serde(default = "default_break_after_ticks")]
    pub break_after_ticks: u64,
    #[serde(default = "default_break_ticks")]
    pub break_ticks: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_section_capacity")]
    pub section_capacity: u32,
    /// Seed for the tick driver's RNG; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_customer_probability() -> f64 {
    CUSTOMER_PROBABILITY
}
fn default_delivery_probability() -> f64 {
    DELIVERY_PROBABILITY
}
fn default_snapshot_interval() -> Tick {
    SNAPSHOT_INTERVAL
}
fn default_walk_ticks() -> u64 {
    WALK_TICKS
}
fn default_break_after_ticks() -> u64 {
    BREAK_AFTER_TICKS
}
fn default_break_ticks() -> u64 {
    BREAK_TICKS
}
fn default_batch_size() -> u32 {
    BATCH_SIZE
}
fn default_section_capacity() -> u32 {
    SECTION_CAPACITY
}

impl RunConfig {
    /// Create a configuration with the default store tunables
    ///
    /// # Arguments
    /// * `assistant_count` - Number of stocker workers, `1..=MAX_ASSISTANTS`
    /// * `total_ticks` - Length of the run in ticks
    /// * `tick_duration_ms` - Wall-clock length of one tick; `0` runs flat out
    ///
    /// # Returns
    /// An unvalidated configuration; call `validate()` or pass it to `start`
    pub fn new(assistant_count: usize, total_ticks: Tick, tick_duration_ms: u64) -> Self {
        Self {
            assistant_count,
            total_ticks,
            tick_duration_ms,
            customer_probability: CUSTOMER_PROBABILITY,
            delivery_probability: DELIVERY_PROBABILITY,
            snapshot_interval: SNAPSHOT_INTERVAL,
            walk_ticks: WALK_TICKS,
            break_after_ticks: BREAK_AFTER_TICKS,
            break_ticks: BREAK_TICKS,
            batch_size: BATCH_SIZE,
            section_capacity: SECTION_CAPACITY,
            seed: None,
        }
    }

    /// Parse the three values collected by a front end
    ///
    /// The tick count is accepted as a decimal and rounded up, so `"10.5"`
    /// runs for 11 ticks.
    pub fn from_inputs(assistants: &str, ticks: &str, tick_ms: &str) -> Result<Self, ConfigError> {
        let assistant_count: usize = assistants.trim().parse().map_err(|_| ConfigError::NotANumber {
            field: "assistant count",
            value: assistants.trim().to_string(),
        })?;
        let ticks_value: f64 = ticks.trim().parse().map_err(|_| ConfigError::NotANumber {
            field: "tick count",
            value: ticks.trim().to_string(),
        })?;
        if !ticks_value.is_finite() || ticks_value <= 0.0 || ticks_value > u64::MAX as f64 {
            return Err(ConfigError::OutOfRange {
                field: "tick count",
                reason: format!("expected a positive number, got {}", ticks.trim()),
            });
        }
        let tick_duration_ms: u64 = tick_ms.trim().parse().map_err(|_| ConfigError::NotANumber {
            field: "tick duration",
            value: tick_ms.trim().to_string(),
        })?;

        let config = Self::new(assistant_count, ticks_value.ceil() as Tick, tick_duration_ms);
        config.validate()?;
        Ok(config)
    }

    /// Set the chance of a customer arriving on each tick
    ///
    /// # Arguments
    /// * `p` - Probability in `[0, 1]`; `0.0` disables random customers
    ///
    /// # Returns
    /// A new configuration with the specified arrival rate
    pub fn with_customer_probability(mut self, p: f64) -> Self {
        self.customer_probability = p;
        self
    }

    /// Set the chance of a delivery arriving on each tick
    ///
    /// # Arguments
    /// * `p` - Probability in `[0, 1]`; `0.0` disables random deliveries
    ///
    /// # Returns
    /// A new configuration with the specified delivery rate
    pub fn with_delivery_probability(mut self, p: f64) -> Self {
        self.delivery_probability = p;
        self
    }

    /// Set how often the stock levels are recorded
    ///
    /// # Arguments
    /// * `interval` - Ticks between snapshots, must be non-zero
    ///
    /// # Returns
    /// A new configuration with the specified snapshot interval
    pub fn with_snapshot_interval(mut self, interval: Tick) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the time an assistant needs to reach a section
    ///
    /// # Arguments
    /// * `ticks` - Walk time in ticks, counted as active time
    ///
    /// # Returns
    /// A new configuration with the specified walk time
    pub fn with_walk_ticks(mut self, ticks: u64) -> Self {
        self.walk_ticks = ticks;
        self
    }

    /// Set when assistants earn a break and how long it lasts
    ///
    /// # Arguments
    /// * `after_ticks` - Ticks since the last break before another is due
    /// * `length_ticks` - Length of each break in ticks
    ///
    /// # Returns
    /// A new configuration with the specified break policy
    pub fn with_breaks(mut self, after_ticks: u64, length_ticks: u64) -> Self {
        self.break_after_ticks = after_ticks;
        self.break_ticks = length_ticks;
        self
    }

    /// Set the number of units a generated delivery distributes
    ///
    /// # Arguments
    /// * `units` - Budget per delivery, must be non-zero
    ///
    /// # Returns
    /// A new configuration with the specified batch size
    pub fn with_batch_size(mut self, units: u32) -> Self {
        self.batch_size = units;
        self
    }

    /// Set the stock level deliveries try not to exceed
    ///
    /// # Arguments
    /// * `units` - Soft cap per section, judged against observed stock
    ///
    /// # Returns
    /// A new configuration with the specified section capacity
    ///
    /// # Note
    /// The cap is advisory; concurrent sales and restocks can move a
    /// section past it.
    pub fn with_section_capacity(mut self, units: u32) -> Self {
        self.section_capacity = units;
        self
    }

    /// Seed the tick driver's random number generator
    ///
    /// # Arguments
    /// * `seed` - Seed for customer and delivery decisions
    ///
    /// # Returns
    /// A new configuration with the specified seed
    ///
    /// # Note
    /// Thread scheduling still varies between runs, so a seed does not make
    /// a run reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Wall-clock length of one tick
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_ms)
    }

    /// Check every field; called before any worker starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assistant_count == 0 {
            return Err(ConfigError::OutOfRange {
                field: "assistant count",
                reason: "at least one assistant is required".to_string(),
            });
        }
        if self.assistant_count > MAX_ASSISTANTS {
            return Err(ConfigError::OutOfRange {
                field: "assistant count",
                reason: format!(
                    "at most {} assistants are supported, got {}",
                    MAX_ASSISTANTS, self.assistant_count
                ),
            });
        }
        if self.total_ticks == 0 {
            return Err(ConfigError::OutOfRange {
                field: "tick count",
                reason: "the run must last at least one tick".to_string(),
            });
        }
        if self.snapshot_interval == 0 {
            return Err(ConfigError::OutOfRange {
                field: "snapshot interval",
                reason: "must be at least one tick".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "batch size",
                reason: "a delivery must carry at least one unit".to_string(),
            });
        }
        self.customer_distribution()?;
        self.delivery_distribution()?;
        Ok(())
    }

    pub(crate) fn customer_distribution(&self) -> Result<Bernoulli, ConfigError> {
        probability("customer probability", self.customer_probability)
    }

    pub(crate) fn delivery_distribution(&self) -> Result<Bernoulli, ConfigError> {
        probability("delivery probability", self.delivery_probability)
    }
}

fn probability(field: &'static str, p: f64) -> Result<Bernoulli, ConfigError> {
    Bernoulli::new(p).map_err(|_| ConfigError::OutOfRange {
        field,
        reason: format!("{} is not a probability in [0, 1]", p),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let config = RunConfig::new(2, 1000, 5);
        assert_eq!(config.customer_probability, 0.10);
        assert_eq!(config.delivery_probability, 0.01);
        assert_eq!(config.walk_ticks, 10);
        assert_eq!(config.break_after_ticks, 200);
        assert_eq!(config.break_ticks, 150);
        assert_eq!(config.tick_duration(), Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RunConfig::new(1, 50, 0)
            .with_customer_probability(0.0)
            .with_delivery_probability(0.0)
            .with_breaks(20, 5)
            .with_seed(42);
        assert_eq!(config.customer_probability, 0.0);
        assert_eq!(config.break_after_ticks, 20);
        assert_eq!(config.break_ticks, 5);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_from_inputs() {
        let config = RunConfig::from_inputs(" 3", "500", "10 ").unwrap();
        assert_eq!(config.assistant_count, 3);
        assert_eq!(config.total_ticks, 500);
        assert_eq!(config.tick_duration_ms, 10);

        let fractional = RunConfig::from_inputs("1", "10.5", "0").unwrap();
        assert_eq!(fractional.total_ticks, 11);
    }

    #[test]
    fn test_from_inputs_rejects_garbage() {
        assert_eq!(
            RunConfig::from_inputs("three", "10", "1"),
            Err(ConfigError::NotANumber {
                field: "assistant count",
                value: "three".to_string()
            })
        );
        assert!(matches!(
            RunConfig::from_inputs("1", "-4", "1"),
            Err(ConfigError::OutOfRange { field: "tick count", .. })
        ));
        assert!(matches!(
            RunConfig::from_inputs("1", "10", "-1"),
            Err(ConfigError::NotANumber { field: "tick duration", .. })
        ));
        assert!(matches!(
            RunConfig::from_inputs("0", "10", "1"),
            Err(ConfigError::OutOfRange { field: "assistant count", .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_assistant_count() {
        assert!(matches!(
            RunConfig::from_inputs("18446744073709551615", "5", "0"),
            Err(ConfigError::OutOfRange { field: "assistant count", .. })
        ));
        assert!(RunConfig::new(MAX_ASSISTANTS, 5, 0).validate().is_ok());
        assert!(RunConfig::new(MAX_ASSISTANTS + 1, 5, 0).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_probability() {
        let config = RunConfig::new(1, 10, 0).with_customer_probability(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "customer probability", .. })
        ));
        let config = RunConfig::new(1, 10, 0).with_delivery_probability(f64::NAN);
        assert!(config.validate().is_err());
    }
}
