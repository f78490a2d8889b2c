//! Approval UI channel.
//!
//! The coordinator hands outgoing requests to an [`ApprovalChannel`]. The
//! default channel is [`ApprovalEventBus`], a broadcast bus any number of
//! frontends can subscribe to. A channel that cannot deliver is treated as
//! an immediate timeout.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::request::{ApprovalRequest, ApprovalResolution, RequestId};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Event published to approval frontends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ApprovalEvent {
    /// A request is waiting for an answer.
    #[serde(rename = "approval_requested")]
    Requested(ApprovalRequest),
    /// A request ended; frontends should retire its prompt.
    #[serde(rename = "approval_resolved")]
    Resolved {
        /// The request.
        id: RequestId,
        /// How it ended.
        outcome: ApprovalResolution,
    },
}

impl ApprovalEvent {
    /// Event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Requested(_) => "approval_requested",
            Self::Resolved { .. } => "approval_resolved",
        }
    }
}

/// Outbound side of the approval UI boundary.
pub trait ApprovalChannel: Send + Sync {
    /// Deliver an event. Returns `false` if nobody can receive it.
    fn deliver(&self, event: ApprovalEvent) -> bool;
}

/// Broadcast bus for approval events.
#[derive(Debug, Clone)]
pub struct ApprovalEventBus {
    sender: broadcast::Sender<Arc<ApprovalEvent>>,
}

impl ApprovalEventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of receivers that got it.
    pub fn publish(&self, event: ApprovalEvent) -> usize {
        let event = Arc::new(event);
        if let Ok(count) = self.sender.send(Arc::clone(&event)) {
            debug!(event_type = event.event_type(), receiver_count = count, "approval event published");
            count
        } else {
            trace!(event_type = event.event_type(), "no receivers for approval event");
            0
        }
    }

    /// Subscribe to events.
    #[must_use]
    pub fn subscribe(&self) -> ApprovalEventReceiver {
        ApprovalEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ApprovalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalChannel for ApprovalEventBus {
    fn deliver(&self, event: ApprovalEvent) -> bool {
        self.publish(event) > 0
    }
}

/// Receiver for approval events.
pub struct ApprovalEventReceiver {
    receiver: broadcast::Receiver<Arc<ApprovalEvent>>,
}

impl ApprovalEventReceiver {
    /// Receive the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<ApprovalEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "approval receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ApprovalEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "approval receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

impl std::fmt::Debug for ApprovalEventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalEventReceiver").finish_non_exhaustive()
    }
}
