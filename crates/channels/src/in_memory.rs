//! In-memory transport, useful for tests and the CLI.
//!
//! Each connected subscriber owns an mpsc receiver. A subscriber is always
//! reachable on its personal channel, and on any room it subscribed to.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use studyhall_core::error::DeliveryError;
use studyhall_core::transport::{ChannelId, SubscriberId, Transport};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

const SUBSCRIBER_BUFFER: usize = 64;

/// An event as received by a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredEvent {
    pub channel: ChannelId,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct State {
    connections: HashMap<SubscriberId, mpsc::Sender<DeliveredEvent>>,
    rooms: HashMap<ChannelId, BTreeSet<SubscriberId>>,
}

pub struct InMemoryTransport {
    state: RwLock<State>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Open a connection for `subscriber`, replacing any previous one.
    pub async fn connect(&self, subscriber: SubscriberId) -> mpsc::Receiver<DeliveredEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.state.write().await.connections.insert(subscriber, tx);
        rx
    }

    /// Drop the connection and every room membership of `subscriber`.
    pub async fn disconnect(&self, subscriber: &SubscriberId) {
        let mut state = self.state.write().await;
        state.connections.remove(subscriber);
        for members in state.rooms.values_mut() {
            members.remove(subscriber);
        }
        state.rooms.retain(|_, members| !members.is_empty());
    }

    pub async fn subscribe(&self, channel: &ChannelId, subscriber: &SubscriberId) {
        self.state
            .write()
            .await
            .rooms
            .entry(channel.clone())
            .or_default()
            .insert(subscriber.clone());
    }

    pub async fn unsubscribe(&self, channel: &ChannelId, subscriber: &SubscriberId) {
        let mut state = self.state.write().await;
        if let Some(members) = state.rooms.get_mut(channel) {
            members.remove(subscriber);
            if members.is_empty() {
                state.rooms.remove(channel);
            }
        }
    }

    fn recipients(state: &State, channel: &ChannelId) -> Vec<SubscriberId> {
        if let Some(members) = state.rooms.get(channel) {
            return members.iter().cloned().collect();
        }
        state
            .connections
            .keys()
            .find(|s| ChannelId::personal(s) == *channel)
            .cloned()
            .into_iter()
            .collect()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn publish(
        &self,
        channel: &ChannelId,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<usize, DeliveryError> {
        let state = self.state.read().await;
        let mut delivered = 0;

        for subscriber in Self::recipients(&state, channel) {
            let Some(tx) = state.connections.get(&subscriber) else {
                continue;
            };
            let event = DeliveredEvent {
                channel: channel.clone(),
                event: event.to_string(),
                payload: payload.clone(),
            };
            match tx.try_send(event) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(subscriber = %subscriber, error = %e, "Subscriber unreachable"),
            }
        }

        Ok(delivered)
    }

    async fn members_of(&self, channel: &ChannelId) -> Result<Vec<SubscriberId>, DeliveryError> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .get(channel)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}
