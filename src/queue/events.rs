//! Lifecycle notifications for anyone watching the queue.

use convertd_common::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum QueueEvent {
    JobQueued { job_id: JobId, tool: String },
    JobStarted { job_id: JobId, tool: String },
    JobCompleted { job_id: JobId, duration_ms: u64 },
    JobFailed { job_id: JobId, error: String },
}

impl QueueEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            QueueEvent::JobQueued { job_id, .. }
            | QueueEvent::JobStarted { job_id, .. }
            | QueueEvent::JobCompleted { job_id, .. }
            | QueueEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Best-effort fan-out; slow or absent subscribers never block the queue.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: QueueEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for queue event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
