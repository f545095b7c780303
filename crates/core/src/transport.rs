//! Transport trait: the abstraction over the real-time push layer.
//!
//! A Transport fans events out to the live subscribers of a channel (a study
//! thread's room). Every subscriber is also reachable on a personal channel
//! named after its ID, which is how per-subscriber delivery is expressed
//! without a third operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// A real-time channel (room) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    /// The personal channel that reaches exactly one subscriber.
    pub fn personal(subscriber: &SubscriberId) -> Self {
        Self(format!("subscriber:{}", subscriber.0))
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live connection subscribed to one or more channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub String);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The core Transport trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name (e.g., "socket", "in_memory").
    fn name(&self) -> &str;

    /// Publish `event` with `payload` to every live subscriber of `channel`.
    ///
    /// Returns the number of subscribers the event was handed to.
    async fn publish(
        &self,
        channel: &ChannelId,
        event: &str,
        payload: &serde_json::Value,
    ) -> std::result::Result<usize, DeliveryError>;

    /// Current members of `channel`.
    async fn members_of(
        &self,
        channel: &ChannelId,
    ) -> std::result::Result<Vec<SubscriberId>, DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_channel_is_derived_from_subscriber() {
        let sub = SubscriberId("sock-42".into());
        assert_eq!(ChannelId::personal(&sub).0, "subscriber:sock-42");
    }

    #[test]
    fn channel_id_serialization() {
        let json = serde_json::to_string(&ChannelId::from("thread-7")).unwrap();
        assert_eq!(json, "\"thread-7\"");
    }
}
