//! In-process queue backend
//!
//! Topic-keyed FIFOs shared through a cloneable hub. Suitable for tests and
//! single-node runs:
//! - process crash = all messages lost (no persistence)
//! - `ack` is a no-op (delivery is effectively at-most-once)
//!
//! For durability and multi-machine deployments, use the Redis backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{MessageQueue, QueueError};
use crate::domain::QueueMessage;

#[derive(Default)]
struct SharedState {
    /// FIFO per topic; entries are `(sequence, payload)`
    topics: HashMap<String, VecDeque<(u64, String)>>,
    next_id: u64,
}

/// Hub handing out [`MemoryQueue`] bindings that share one set of topics
#[derive(Clone, Default)]
pub struct MemoryQueueHub {
    state: Arc<Mutex<SharedState>>,
}

impl MemoryQueueHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a queue to `topic`; all queues from the same hub see the same
    /// messages.
    pub fn queue(&self, topic: &str) -> MemoryQueue {
        MemoryQueue {
            state: Arc::clone(&self.state),
            topic: topic.to_string(),
        }
    }
}

/// One topic binding handed out by [`MemoryQueueHub`]
pub struct MemoryQueue {
    state: Arc<Mutex<SharedState>>,
    topic: String,
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn produce(&self, payload: &str) -> Result<String, QueueError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state
            .topics
            .entry(self.topic.clone())
            .or_default()
            .push_back((id, payload.to_string()));
        Ok(id.to_string())
    }

    async fn consume(&mut self) -> Option<QueueMessage> {
        let mut state = self.state.lock();
        let (id, data) = state.topics.get_mut(&self.topic)?.pop_front()?;
        Some(QueueMessage {
            id: id.to_string(),
            data,
        })
    }

    async fn ack(&mut self, _id: &str) -> bool {
        true
    }

    async fn close(&mut self) {
        tracing::debug!(topic = %self.topic, "memory queue closed");
    }
}
