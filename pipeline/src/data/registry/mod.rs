//! Status registry
//!
//! Tracks chunk-level progress for resumability and file-level completion
//! for idempotence. Invariant for every implementation: once a file is
//! complete, its chunk-progress set is gone.
//!
//! The in-memory implementation is authoritative for single-node runs; the
//! Redis implementation backs multi-node deployments with the same contract.

pub mod memory;
pub mod redis;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStatusRegistry;
pub use redis::RedisStatusRegistry;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry connection error: {0}")]
    Connection(String),

    #[error("registry backend error: {0}")]
    Backend(String),
}

impl From<deadpool_redis::PoolError> for RegistryError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        RegistryError::Connection(err.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for RegistryError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        RegistryError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait StatusRegistry: Send + Sync {
    /// Whether the whole file has been indexed.
    async fn is_file_processed(&self, file_name: &str) -> Result<bool, RegistryError>;

    /// Chunk ids already indexed for a file still in progress.
    async fn get_processed_chunks(&self, file_name: &str)
    -> Result<HashSet<String>, RegistryError>;

    /// Union `chunk_ids` into the file's progress set.
    async fn mark_chunks_processed(
        &self,
        file_name: &str,
        chunk_ids: &[String],
    ) -> Result<(), RegistryError>;

    /// Record file completion and purge the progress set.
    async fn mark_file_complete(
        &self,
        file_name: &str,
        file_hash: &str,
    ) -> Result<(), RegistryError>;
}
