//! In-memory status registry

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{RegistryError, StatusRegistry};

#[derive(Default)]
struct Inner {
    /// file_name -> file_hash
    completed_files: HashMap<String, String>,
    /// file_name -> indexed chunk ids (purged on completion)
    temp_chunks: HashMap<String, HashSet<String>>,
}

#[derive(Default)]
pub struct MemoryStatusRegistry {
    inner: RwLock<Inner>,
}

impl MemoryStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded hash for a completed file, if any
    pub fn completed_hash(&self, file_name: &str) -> Option<String> {
        self.inner.read().completed_files.get(file_name).cloned()
    }
}

#[async_trait]
impl StatusRegistry for MemoryStatusRegistry {
    async fn is_file_processed(&self, file_name: &str) -> Result<bool, RegistryError> {
        Ok(self.inner.read().completed_files.contains_key(file_name))
    }

    async fn get_processed_chunks(
        &self,
        file_name: &str,
    ) -> Result<HashSet<String>, RegistryError> {
        Ok(self
            .inner
            .read()
            .temp_chunks
            .get(file_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_chunks_processed(
        &self,
        file_name: &str,
        chunk_ids: &[String],
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        inner
            .temp_chunks
            .entry(file_name.to_string())
            .or_default()
            .extend(chunk_ids.iter().cloned());
        Ok(())
    }

    async fn mark_file_complete(
        &self,
        file_name: &str,
        file_hash: &str,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        inner
            .completed_files
            .insert(file_name.to_string(), file_hash.to_string());
        inner.temp_chunks.remove(file_name);
        Ok(())
    }
}
