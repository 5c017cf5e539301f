//! Hybrid vector store interface
//!
//! The Index stage only depends on this trait; a remote store client plugs
//! in behind it. Delete ids are the same stable ids assigned at node
//! construction, which is what makes the compensating rollback in the Index
//! stage possible.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryHybridStore;

use crate::embedding::EmbeddingError;

/// Default dense vector dimensionality
pub const DEFAULT_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("vector store configuration error: {0}")]
    Config(String),

    #[error("vector store backend error: {0}")]
    Backend(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Retrieval mode for [`VectorStore::search`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Dense,
    Sparse,
    Hybrid,
}

/// Node shape accepted by the store: stable id, text, flat metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedNode {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// Store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub uri: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    /// Dense vector dimensionality; meaningful only when dense is enabled
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_true")]
    pub enable_sparse: bool,
    #[serde(default = "default_true")]
    pub enable_dense: bool,
    #[serde(default)]
    pub overwrite: bool,
}

fn default_collection_name() -> String {
    "product_knowledge_base".to_string()
}

fn default_dim() -> usize {
    DEFAULT_DIM
}

fn default_true() -> bool {
    true
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            token: None,
            collection_name: default_collection_name(),
            dim: default_dim(),
            enable_sparse: true,
            enable_dense: true,
            overwrite: false,
        }
    }
}

impl VectorStoreConfig {
    pub fn validate(&self) -> Result<(), VectorStoreError> {
        if self.uri.is_empty() {
            return Err(VectorStoreError::Config(
                "'uri' is required and cannot be empty".to_string(),
            ));
        }
        if !self.enable_sparse && !self.enable_dense {
            return Err(VectorStoreError::Config(
                "at least one of 'enable_sparse' or 'enable_dense' must be true".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a batch of nodes. Returns `false` when the write was rejected
    /// without raising (callers treat that the same as a failure).
    async fn insert(&self, nodes: &[IndexedNode]) -> Result<bool, VectorStoreError>;

    /// Remove nodes by their stable ids.
    async fn delete_batch(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    /// Retrieve nodes for a query. Hybrid mode fetches `2 * top_k` from each
    /// of the dense and sparse sides and de-duplicates by node id.
    async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        top_k: usize,
    ) -> Result<Vec<IndexedNode>, VectorStoreError>;
}
