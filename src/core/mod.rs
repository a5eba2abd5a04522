pub mod clock;
pub mod delivery;
pub mod errors;
pub mod execution;
pub mod sections;
pub mod stats;
pub mod types;
pub mod workers;
