//! Stage workers and the shared worker runtime
//!
//! Each stage is a long-running worker over one consumer-group topic. The
//! runtime owns the consume/classify/ack cycle; stage workers only implement
//! [`StageWorker::handle_task`].
//!
//! ## Error classification
//!
//! - `Malformed` - retrying cannot succeed (bad JSON, missing payload file,
//!   unsupported format). The message is ACK'd and dropped as poison.
//! - `Transient` - queue/store/downstream I/O. The message is left un-ACK'd
//!   and returns to the pending-entry list for retry.
//! - `Fatal` - unrecoverable worker state; terminates the loop.

pub mod chunk;
pub mod clean;
pub mod enrich;
pub mod index;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::Instrument;

pub use chunk::ChunkWorker;
pub use clean::CleanWorker;
pub use enrich::EnrichWorker;
pub use index::IndexWorker;

use crate::core::shutdown::ShutdownReason;
use crate::data::queue::{MessageQueue, QueueError};
use crate::data::registry::RegistryError;
use crate::data::store::StoreError;
use crate::data::vector::VectorStoreError;
use crate::domain::TaskMessage;

/// Pipeline stage identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Stage {
    Clean,
    Chunk,
    Enrich,
    Index,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Chunk => "chunk",
            Stage::Enrich => "enrich",
            Stage::Index => "index",
        }
    }

    /// Topic this stage consumes from
    pub fn topic(&self) -> &'static str {
        match self {
            Stage::Clean => "clean_flow",
            Stage::Chunk => "chunk_flow",
            Stage::Enrich => "enrich_flow",
            Stage::Index => "index_flow",
        }
    }

    /// Consumer group for this stage's topic
    pub fn group(&self) -> &'static str {
        match self {
            Stage::Clean => "clean_group",
            Stage::Chunk => "chunk_group",
            Stage::Enrich => "enrich_group",
            Stage::Index => "index_group",
        }
    }

    /// Topic the next stage consumes from, if any
    pub fn downstream_topic(&self) -> Option<&'static str> {
        match self {
            Stage::Clean => Some(Stage::Chunk.topic()),
            Stage::Chunk => Some(Stage::Enrich.topic()),
            Stage::Enrich => Some(Stage::Index.topic()),
            Stage::Index => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task-level failure, classified for the ack decision
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("malformed task: {0}")]
    Malformed(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal worker failure: {0}")]
    Fatal(String),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            // A payload path that does not exist cannot be repaired by retry.
            StoreError::NotFound { .. } => TaskError::Malformed(err.to_string()),
            other => TaskError::Transient(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::Malformed(err.to_string())
    }
}

impl From<QueueError> for TaskError {
    fn from(err: QueueError) -> Self {
        TaskError::Transient(err.to_string())
    }
}

impl From<VectorStoreError> for TaskError {
    fn from(err: VectorStoreError) -> Self {
        TaskError::Transient(err.to_string())
    }
}

impl From<RegistryError> for TaskError {
    fn from(err: RegistryError) -> Self {
        TaskError::Transient(err.to_string())
    }
}

/// One pipeline stage worker
#[async_trait]
pub trait StageWorker: Send {
    fn stage(&self) -> Stage;

    /// The queue this worker consumes from.
    fn consumer(&mut self) -> &mut dyn MessageQueue;

    /// Process one decoded task. All side effects (persist + downstream
    /// produce) happen here; the runtime acks afterwards.
    async fn handle_task(&mut self, task: &TaskMessage) -> Result<(), TaskError>;

    /// Release resources on shutdown.
    async fn close(&mut self);
}

/// Run one consume/handle/ack cycle.
///
/// Returns `Ok(true)` when a message was taken off the queue (regardless of
/// task outcome), `Ok(false)` when the queue was empty, and `Err` only for
/// fatal failures.
pub async fn process_one<W>(worker: &mut W) -> Result<bool, TaskError>
where
    W: StageWorker + ?Sized,
{
    let stage = worker.stage();
    let Some(message) = worker.consumer().consume().await else {
        return Ok(false);
    };

    let task = match TaskMessage::from_json(&message.data) {
        Ok(task) => task,
        Err(e) => {
            tracing::warn!(error = %e, id = %message.id, "undecodable task message, dropping");
            worker.consumer().ack(&message.id).await;
            return Ok(true);
        }
    };

    let span = tracing::info_span!("task", stage = %stage, trace_id = %task.trace_id);
    let outcome = worker.handle_task(&task).instrument(span).await;

    match outcome {
        Ok(()) => {
            if !worker.consumer().ack(&message.id).await {
                tracing::warn!(id = %message.id, "ack failed; message will be re-delivered");
            }
            Ok(true)
        }
        Err(TaskError::Malformed(reason)) => {
            tracing::warn!(
                file_path = %task.file_path,
                trace_id = %task.trace_id,
                reason,
                "dropping poison message"
            );
            worker.consumer().ack(&message.id).await;
            Ok(true)
        }
        Err(TaskError::Transient(reason)) => {
            tracing::error!(
                file_path = %task.file_path,
                trace_id = %task.trace_id,
                reason,
                "task failed; leaving message pending for retry"
            );
            Ok(true)
        }
        Err(fatal) => Err(fatal),
    }
}

/// Worker loop: process messages until a shutdown request, sleeping
/// `poll_interval` when the topic is empty. The loop only observes the
/// shutdown signal between tasks, so a stop request never interrupts an
/// ack-in-progress; whatever was in flight either completes or returns to
/// the pending-entry list.
pub async fn run_worker<W>(
    worker: &mut W,
    mut shutdown: watch::Receiver<Option<ShutdownReason>>,
    poll_interval: Duration,
) -> Result<(), TaskError>
where
    W: StageWorker,
{
    tracing::info!(stage = %worker.stage(), "worker started");

    let result = loop {
        if let Some(reason) = *shutdown.borrow() {
            tracing::info!(stage = %worker.stage(), reason = %reason, "stopping on shutdown request");
            break Ok(());
        }

        let processed = tokio::select! {
            _ = shutdown.changed() => continue,
            result = process_one(worker) => result,
        };

        match processed {
            Ok(true) => {}
            Ok(false) => {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(e) => {
                tracing::error!(stage = %worker.stage(), error = %e, "worker terminating");
                break Err(e);
            }
        }
    };

    worker.close().await;
    tracing::info!(stage = %worker.stage(), "worker stopped");
    result
}
