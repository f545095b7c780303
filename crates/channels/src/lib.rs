//! Real-time delivery for StudyHall.
//!
//! - **Broadcaster**: room publish with a per-subscriber fallback
//! - **InMemoryTransport**: a `Transport` backed by mpsc channels

pub mod broadcaster;
pub mod in_memory;

pub use broadcaster::{Broadcaster, DeliveryPath, DeliveryReport};
pub use in_memory::{DeliveredEvent, InMemoryTransport};
