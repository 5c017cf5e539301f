//! In-process hybrid store
//!
//! Reference implementation of [`VectorStore`] used by tests and
//! single-node runs: dense retrieval is cosine similarity over vectors from
//! an [`EmbeddingService`], sparse retrieval is term-overlap scoring over
//! the node text. Not durable; a remote store client replaces this behind
//! the same trait in production.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{IndexedNode, SearchMode, VectorStore, VectorStoreConfig, VectorStoreError};
use crate::embedding::EmbeddingService;

struct StoredNode {
    node: IndexedNode,
    dense: Option<Vec<f32>>,
}

pub struct MemoryHybridStore {
    config: VectorStoreConfig,
    embedder: Option<Arc<dyn EmbeddingService>>,
    inner: RwLock<HashMap<String, StoredNode>>,
}

impl MemoryHybridStore {
    pub fn new(
        config: VectorStoreConfig,
        embedder: Option<Arc<dyn EmbeddingService>>,
    ) -> Result<Self, VectorStoreError> {
        config.validate()?;
        if config.enable_dense && embedder.is_none() {
            return Err(VectorStoreError::Config(
                "dense retrieval is enabled but no embedding service was provided".to_string(),
            ));
        }
        Ok(Self {
            config,
            embedder,
            inner: RwLock::new(HashMap::new()),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    async fn dense_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<IndexedNode>, VectorStoreError> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            VectorStoreError::Config("dense retrieval requires an embedding service".to_string())
        })?;
        let query_vector = embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| VectorStoreError::Backend("empty query embedding".to_string()))?;

        let inner = self.inner.read();
        let mut scored: Vec<(f32, &StoredNode)> = inner
            .values()
            .filter_map(|stored| {
                stored
                    .dense
                    .as_ref()
                    .map(|v| (cosine_similarity(&query_vector, v), stored))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, stored)| stored.node.clone())
            .collect())
    }

    fn sparse_candidates(&self, query: &str, limit: usize) -> Vec<IndexedNode> {
        let terms: HashSet<String> = tokenize(query);
        let inner = self.inner.read();
        let mut scored: Vec<(usize, &StoredNode)> = inner
            .values()
            .filter_map(|stored| {
                let overlap = tokenize(&stored.node.text)
                    .intersection(&terms)
                    .count();
                (overlap > 0).then_some((overlap, stored))
            })
            .collect();
        // Tie-break on id for deterministic ordering.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.node.id.cmp(&b.1.node.id)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, stored)| stored.node.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryHybridStore {
    async fn insert(&self, nodes: &[IndexedNode]) -> Result<bool, VectorStoreError> {
        if nodes.is_empty() {
            return Ok(true);
        }

        let dense = if self.config.enable_dense
            && let Some(embedder) = self.embedder.as_ref()
        {
            let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
            match embedder.embed(&texts).await {
                Ok(vectors) => vectors.into_iter().map(Some).collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "embedding failed; insert rejected");
                    return Ok(false);
                }
            }
        } else {
            vec![None; nodes.len()]
        };

        let mut inner = self.inner.write();
        for (node, dense) in nodes.iter().zip(dense) {
            inner.insert(
                node.id.clone(),
                StoredNode {
                    node: node.clone(),
                    dense,
                },
            );
        }
        tracing::debug!(
            collection = %self.config.collection_name,
            inserted = nodes.len(),
            total = inner.len(),
            "nodes inserted"
        );
        Ok(true)
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut inner = self.inner.write();
        for id in ids {
            inner.remove(id);
        }
        tracing::debug!(deleted = ids.len(), "nodes deleted");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        top_k: usize,
    ) -> Result<Vec<IndexedNode>, VectorStoreError> {
        match mode {
            SearchMode::Dense => self.dense_candidates(query, top_k).await,
            SearchMode::Sparse => Ok(self.sparse_candidates(query, top_k)),
            SearchMode::Hybrid => {
                // Over-fetch from each enabled side, then de-duplicate by id.
                let mut combined: Vec<IndexedNode> = Vec::new();
                if self.config.enable_dense && self.embedder.is_some() {
                    combined.extend(self.dense_candidates(query, top_k * 2).await?);
                }
                if self.config.enable_sparse {
                    combined.extend(self.sparse_candidates(query, top_k * 2));
                }
                let mut seen = HashSet::new();
                combined.retain(|node| seen.insert(node.id.clone()));
                combined.truncate(top_k);
                Ok(combined)
            }
        }
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
