//! Event Bus Port
//!
//! Best-effort broadcast of job lifecycle events to external consumers
//! (dashboard, log followers). Losing an event is acceptable; blocking a
//! store write is not.

use async_trait::async_trait;
use krait_core::{Job, JobId, JobStatus, OutputLine, Result};
use serde::Serialize;
use tokio::sync::broadcast;

/// Job lifecycle event as published on the bus and over the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobEvent {
    Created {
        job: Job,
    },
    StatusChanged {
        job_id: JobId,
        status: JobStatus,
        exit_code: Option<i64>,
    },
    Output {
        job_id: JobId,
        line: OutputLine,
    },
    /// An exploitation-class follow-up was withheld by policy. A recorded
    /// decision, not an error.
    FollowUpSkipped {
        job_id: JobId,
        job_type: String,
        target: String,
        reason: String,
    },
}

/// Event publisher port.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: JobEvent) -> Result<()>;
}

/// Event subscriber port.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self) -> EventReceiver;
}

/// Receiver wrapper over the broadcast channel.
#[derive(Debug)]
pub struct EventReceiver {
    pub receiver: broadcast::Receiver<JobEvent>,
}

impl EventReceiver {
    /// Next event, skipping over lagged gaps. `None` once the bus closes.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event subscriber lagged, dropping events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
