//! # StudyHall Core
//!
//! Domain types, collaborator traits, and error definitions for the StudyHall
//! AI response orchestration engine. This crate has **no framework
//! dependencies**; it defines the domain model that every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator (completion API, persistent store, real-time
//! transport) is a narrow trait defined here. Implementations live in their
//! respective crates, so tests can swap in mocks and the dependency graph
//! points inward on core.

pub mod backoff;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use backoff::exponential_backoff;
pub use error::{
    CompletionError, DeliveryError, Error, FailureClass, Result, StoreError, UserFacingError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationId, Message, Role, Thread};
pub use provider::{CompletionRequest, CompletionResponse, PromptMessage, Provider};
pub use store::{MessageId, MessageStore};
pub use transport::{ChannelId, SubscriberId, Transport};
