//! Broadcast fan-out sink
//!
//! Bridges the synchronous [`MessageSink`] seam to a tokio broadcast channel
//! that the transport layer subscribes to.

use tokio::sync::broadcast;
use tracing::debug;
use vanish_core::{MessageRecord, MessageSink};

/// Sink publishing every sent message to all subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<MessageRecord>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` records per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MessageRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl MessageSink for BroadcastSink {
    fn deliver(&self, record: &MessageRecord) {
        // No subscribers is a normal state, not a delivery failure
        if self.sender.send(record.clone()).is_err() {
            debug!("Message {} broadcast with no subscribers", record.id);
        }
    }
}
