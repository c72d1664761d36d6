//! InMemoryBus adapter using tokio::broadcast
//!
//! Concrete implementation of the EventPublisher and EventSubscriber
//! ports. Delivery is best-effort: publishing to a bus with no live
//! subscribers succeeds and the event is dropped.

use async_trait::async_trait;
use krait_core::Result;
use krait_ports::{EventPublisher, EventReceiver, EventSubscriber, JobEvent};
use tokio::sync::broadcast;

pub struct InMemoryBus {
    sender: broadcast::Sender<JobEvent>,
    capacity: usize,
}

impl InMemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish(&self, event: JobEvent) -> Result<()> {
        // SendError only means no receivers are subscribed right now.
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryBus {
    async fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
