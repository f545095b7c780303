//! Broadcaster: fans a generated reply out to a conversation's live
//! subscribers.
//!
//! Delivery is a two-step protocol over the narrow [`Transport`] interface:
//!
//! 1. publish to the room and check how many subscribers received it;
//! 2. if nobody did, re-resolve the room's membership and publish once to
//!    each member's personal channel.
//!
//! If the fallback reaches nobody either, the failure is logged and returned.
//! It is never retried: the reply is already persisted.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use studyhall_core::error::DeliveryError;
use studyhall_core::transport::{ChannelId, SubscriberId, Transport};
use tracing::{debug, info, warn};

/// Which path delivered the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPath {
    Room,
    PerSubscriber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub channel: ChannelId,
    pub path: DeliveryPath,
    pub recipients: usize,
}

pub struct Broadcaster {
    transport: Arc<dyn Transport>,
    event_name: String,
}

impl Broadcaster {
    pub fn new(transport: Arc<dyn Transport>, event_name: impl Into<String>) -> Self {
        Self {
            transport,
            event_name: event_name.into(),
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Deliver `payload` to every live subscriber of `channel`.
    pub async fn deliver(
        &self,
        channel: &ChannelId,
        payload: &serde_json::Value,
    ) -> Result<DeliveryReport, DeliveryError> {
        match self
            .transport
            .publish(channel, &self.event_name, payload)
            .await
        {
            Ok(recipients) if recipients > 0 => {
                debug!(channel = %channel, recipients, "Delivered to room");
                return Ok(DeliveryReport {
                    channel: channel.clone(),
                    path: DeliveryPath::Room,
                    recipients,
                });
            }
            Ok(_) => {
                warn!(channel = %channel, "Room publish reached no subscribers, falling back");
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Room publish failed, falling back");
            }
        }

        let members = self.transport.members_of(channel).await.inspect_err(|e| {
            warn!(channel = %channel, error = %e, "Could not resolve channel membership");
        })?;

        let recipients = self.deliver_each(&members, payload).await;
        if recipients == 0 {
            warn!(
                channel = %channel,
                members = members.len(),
                "Delivery reached no subscribers"
            );
            return Err(DeliveryError::NoRecipients {
                channel: channel.to_string(),
            });
        }

        info!(channel = %channel, recipients, "Delivered per subscriber");
        Ok(DeliveryReport {
            channel: channel.clone(),
            path: DeliveryPath::PerSubscriber,
            recipients,
        })
    }

    async fn deliver_each(&self, members: &[SubscriberId], payload: &serde_json::Value) -> usize {
        let sends = members.iter().map(|member| async move {
            let personal = ChannelId::personal(member);
            match self
                .transport
                .publish(&personal, &self.event_name, payload)
                .await
            {
                Ok(n) => n.min(1),
                Err(e) => {
                    debug!(subscriber = %member, error = %e, "Per-subscriber publish failed");
                    0
                }
            }
        });
        join_all(sends).await.into_iter().sum()
    }
}
