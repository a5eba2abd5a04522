pub mod channel;
pub mod generator;

// Re-export commonly used types
pub use channel::{delivery_channel, DeliveryReceiver, DeliverySender, Received};
pub use generator::{Delivery, DeliveryGenerator};
