//! Response cache and in-memory message store for StudyHall.

pub mod cache;
pub mod store;

pub use cache::{DEFAULT_LEARNER_LEVEL, ResponseCache, fingerprint};
pub use store::{InMemoryMessageStore, StoredMessage};
