//! Per-workspace publish/subscribe event channels.
//!
//! The synchronizer only needs [`EventChannel::subscribe`]; transports that
//! bridge a remote push channel implement that trait. [`BroadcastEventBus`]
//! is the in-process implementation, built on `tokio::sync::broadcast`.

use crate::error::{Result, SyncError};
use crate::events::VfsEvent;
use crate::types::WorkspaceId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default buffer size of each broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A source of change notifications, one stream per workspace and topic.
pub trait EventChannel: Send + Sync {
    /// Subscribe to `topic` on the channel of `workspace_id`.
    ///
    /// Messages published after this call are delivered to the receiver.
    fn subscribe(
        &self,
        workspace_id: &WorkspaceId,
        topic: &str,
    ) -> Result<broadcast::Receiver<VfsEvent>>;
}

/// In-process event bus with one broadcast channel per `(workspace, topic)`.
#[derive(Clone)]
pub struct BroadcastEventBus {
    channels: Arc<DashMap<(WorkspaceId, String), broadcast::Sender<VfsEvent>>>,
    capacity: usize,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    fn sender(&self, workspace_id: &WorkspaceId, topic: &str) -> broadcast::Sender<VfsEvent> {
        self.channels
            .entry((workspace_id.clone(), topic.to_string()))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, workspace_id: &WorkspaceId, topic: &str, event: VfsEvent) -> usize {
        let key = (workspace_id.clone(), topic.to_string());
        let Some(sender) = self.channels.get(&key).map(|entry| entry.clone()) else {
            trace!("No channel for workspace {} topic {}", workspace_id, topic);
            return 0;
        };

        match sender.send(event) {
            Ok(receivers) => {
                debug!(
                    "Event published on {}/{} to {} receivers",
                    workspace_id, topic, receivers
                );
                receivers
            }
            Err(_) => {
                trace!("No active receivers on {}/{}", workspace_id, topic);
                0
            }
        }
    }

    /// Number of live receivers on a channel
    pub fn subscriber_count(&self, workspace_id: &WorkspaceId, topic: &str) -> usize {
        self.channels
            .get(&(workspace_id.clone(), topic.to_string()))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the channel of a workspace topic; its receivers observe `Closed`.
    pub fn close(&self, workspace_id: &WorkspaceId, topic: &str) -> bool {
        self.channels
            .remove(&(workspace_id.clone(), topic.to_string()))
            .is_some()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventChannel for BroadcastEventBus {
    fn subscribe(
        &self,
        workspace_id: &WorkspaceId,
        topic: &str,
    ) -> Result<broadcast::Receiver<VfsEvent>> {
        if self.capacity == 0 {
            return Err(SyncError::channel("channel capacity must be positive"));
        }
        debug!("Subscribing to {} on workspace {}", topic, workspace_id);
        Ok(self.sender(workspace_id, topic).subscribe())
    }
}
