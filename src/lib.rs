pub mod core;

// Re-export commonly used types
pub use crate::core::errors::{ConfigError, SimError};
pub use crate::core::execution::{start, RunConfig, Simulation, TickObserver};
pub use crate::core::stats::{RunReport, RunStats};
pub use crate::core::types::{SectionTally, StockSnapshot, Tick, DEFAULT_CATALOG, INITIAL_STOCK};
