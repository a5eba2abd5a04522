pub mod config;
pub mod simulation_engine;
pub mod tick_driver;

// Re-export commonly used types
pub use config::RunConfig;
pub use simulation_engine::{start, Simulation};
pub use tick_driver::{DriverState, TickDriver, TickObserver};
