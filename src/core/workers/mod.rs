pub mod customer;
pub mod stocker;

// Re-export commonly used types
pub use customer::{Customer, CustomerOutcome};
pub use stocker::{should_restock, Stocker, StockerState};
