//! Realtime fan-out of newly stored mentions.
//!
//! Delivery is fire-and-forget and at-most-once: subscribers connected to
//! an owner's channel when a record is published receive it, nobody else
//! does, and nothing is queued for later. A pipeline built without a
//! transport simply reports every notification as undelivered.
//!
//! | Event | Channel | Payload |
//! |-------|---------|---------|
//! | `mention.created` | `mentions:<owner>` | the stored [`EnrichedMention`](crate::models::EnrichedMention) |

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const MENTION_CREATED: &str = "mention.created";

/// Per-subscriber buffer; slow subscribers lag rather than block publishers.
const CHANNEL_CAPACITY: usize = 256;

pub fn owner_channel(owner_id: &str) -> String {
    format!("mentions:{owner_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Publish without waiting for subscribers. Returns whether anyone was
    /// listening on `channel`.
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) -> bool;
}

/// In-process transport: one `tokio::sync::broadcast` channel per logical
/// channel name, created on first subscribe.
#[derive(Default)]
pub struct BroadcastHub {
    channels: Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_owner(&self, owner_id: &str) -> broadcast::Receiver<RealtimeEvent> {
        self.subscribe(&owner_channel(owner_id))
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        channels.get(channel).map_or(0, |tx| tx.receiver_count())
    }
}

#[async_trait]
impl RealtimeTransport for BroadcastHub {
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) -> bool {
        let mut channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = channels.get(channel) else {
            return false;
        };

        let message = RealtimeEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        };
        match tx.send(message) {
            Ok(receivers) => {
                debug!(channel, event, receivers, "Published realtime event");
                true
            }
            Err(_) => {
                // Every subscriber has gone away.
                channels.remove(channel);
                false
            }
        }
    }
}

/// Optional transport handle held by the gateway.
#[derive(Clone, Default)]
pub struct Notifier {
    transport: Option<Arc<dyn RealtimeTransport>>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A notifier with no transport; every call returns `false`.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Push `payload` to the owner's channel. Returns whether it reached at
    /// least one live subscriber.
    pub async fn notify<T: Serialize + ?Sized>(&self, owner_id: &str, event: &str, payload: &T) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(owner = owner_id, event, error = %e, "Could not serialize realtime payload");
                return false;
            }
        };
        transport.publish(&owner_channel(owner_id), event, payload).await
    }
}
