//! Message-queue substrate
//!
//! Durable hop between stages with at-least-once delivery:
//! - `redis` - Redis Streams with consumer groups and per-consumer
//!   pending-entry recovery (production backend)
//! - `memory` - topic-keyed in-process FIFO for tests and single-node runs
//!
//! Both backends implement [`MessageQueue`]. Transport failures during
//! `consume`/`ack` are logged and reported as "no message" / "ack failed";
//! callers must never treat a failed ack as completion.

pub mod error;
pub mod memory;
pub mod redis;

use async_trait::async_trait;

pub use error::QueueError;
pub use memory::{MemoryQueue, MemoryQueueHub};
pub use redis::RedisStreamQueue;

use crate::domain::QueueMessage;

/// Connection parameters for one topic binding
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
    /// Stream name (topic)
    pub topic: String,
    /// Consumer group name
    pub group: String,
    /// Unique consumer identity within the group
    pub consumer_name: String,
}

impl QueueConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Grouped-consumer transport shared by every stage worker
///
/// A connected queue is bound to exactly one topic. Producers call
/// `produce`; consumers alternate `consume`/`ack`.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append one message to the bound topic, returning the assigned id.
    async fn produce(&self, payload: &str) -> Result<String, QueueError>;

    /// Fetch the next message owned by this consumer, or `None` when the
    /// topic is empty. Pending (delivered-but-unacked) entries are drained
    /// before new entries are read.
    async fn consume(&mut self) -> Option<QueueMessage>;

    /// Acknowledge one message id. Returns `false` when the ack did not take
    /// effect; the message then stays pending and will be re-delivered.
    async fn ack(&mut self, id: &str) -> bool;

    /// Release transport resources.
    async fn close(&mut self);
}
