//! Redis-backed status registry
//!
//! Key layout:
//! - `{prefix}:completed_files` - hash of `file_name -> file_hash`
//! - `{prefix}:chunks:{file_name}` - set of indexed chunk ids
//!
//! `mark_file_complete` writes the hash entry and deletes the chunk set, so
//! the completion invariant holds across workers sharing the registry.

use std::collections::HashSet;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};

use super::{RegistryError, StatusRegistry};

pub struct RedisStatusRegistry {
    pool: Pool,
    key_prefix: String,
}

impl RedisStatusRegistry {
    pub fn connect(url: &str, key_prefix: &str) -> Result<Self, RegistryError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RegistryError::Connection(e.to_string()))?;
        Ok(Self {
            pool,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// Reuse an existing pool (e.g. the queue's)
    pub fn with_pool(pool: Pool, key_prefix: &str) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.to_string(),
        }
    }

    fn completed_key(&self) -> String {
        format!("{}:completed_files", self.key_prefix)
    }

    fn chunks_key(&self, file_name: &str) -> String {
        format!("{}:chunks:{}", self.key_prefix, file_name)
    }
}

#[async_trait]
impl StatusRegistry for RedisStatusRegistry {
    async fn is_file_processed(&self, file_name: &str) -> Result<bool, RegistryError> {
        let mut conn = self.pool.get().await?;
        let exists: bool = deadpool_redis::redis::cmd("HEXISTS")
            .arg(self.completed_key())
            .arg(file_name)
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn get_processed_chunks(
        &self,
        file_name: &str,
    ) -> Result<HashSet<String>, RegistryError> {
        let mut conn = self.pool.get().await?;
        let members: Vec<String> = deadpool_redis::redis::cmd("SMEMBERS")
            .arg(self.chunks_key(file_name))
            .query_async(&mut conn)
            .await?;
        Ok(members.into_iter().collect())
    }

    async fn mark_chunks_processed(
        &self,
        file_name: &str,
        chunk_ids: &[String],
    ) -> Result<(), RegistryError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let mut cmd = deadpool_redis::redis::cmd("SADD");
        cmd.arg(self.chunks_key(file_name));
        for id in chunk_ids {
            cmd.arg(id.as_str());
        }
        let _: i64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn mark_file_complete(
        &self,
        file_name: &str,
        file_hash: &str,
    ) -> Result<(), RegistryError> {
        let mut conn = self.pool.get().await?;
        let _: i64 = deadpool_redis::redis::cmd("HSET")
            .arg(self.completed_key())
            .arg(file_name)
            .arg(file_hash)
            .query_async(&mut conn)
            .await?;
        let _: i64 = deadpool_redis::redis::cmd("DEL")
            .arg(self.chunks_key(file_name))
            .query_async(&mut conn)
            .await?;
        tracing::debug!(file_name, "file marked complete");
        Ok(())
    }
}
