//! Best-effort live broadcast of finished records.
//!
//! Subscribers only see records published while they are subscribed. There
//! is no replay; late or lagging subscribers recover by reading the store.

use crate::record::StoredRecord;
use tokio::sync::broadcast;
use tracing::trace;

/// Fan-out channel for newly stored records.
#[derive(Clone)]
pub struct LivePublisher {
    sender: broadcast::Sender<StoredRecord>,
}

impl LivePublisher {
    /// Create a publisher whose subscribers may lag by up to `capacity` records.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Start receiving records published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoredRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send `record` to every current subscriber. Returns how many received it.
    pub fn publish(&self, record: StoredRecord) -> usize {
        match self.sender.send(record) {
            Ok(delivered) => delivered,
            Err(_) => {
                trace!("no live subscribers, dropping record");
                0
            }
        }
    }
}

impl Default for LivePublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
