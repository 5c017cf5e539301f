//! Index stage
//!
//! Materializes payload nodes into the vector store with idempotent,
//! resumable, compensating-rollback semantics:
//! - already-completed files short-circuit to success
//! - chunk-level progress in the registry survives restarts, so retries
//!   only write the batches that are missing
//! - under strict consistency, a failing batch deletes whatever it managed
//!   to insert before re-raising, leaving no orphans behind

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{Stage, StageWorker, TaskError};
use crate::data::queue::MessageQueue;
use crate::data::registry::StatusRegistry;
use crate::data::store::ContentStore;
use crate::data::vector::{IndexedNode, VectorStore};
use crate::domain::{Node, RagTaskPayload, TaskMessage};
use crate::utils::path::file_name;

/// Nodes per vector-store write
pub const DEFAULT_BATCH_SIZE: usize = 50;

pub struct IndexWorker {
    consumer: Box<dyn MessageQueue>,
    store: ContentStore,
    vector: Arc<dyn VectorStore>,
    registry: Arc<dyn StatusRegistry>,
    batch_size: usize,
    strict_consistency: bool,
}

impl IndexWorker {
    pub fn new(
        consumer: Box<dyn MessageQueue>,
        store: ContentStore,
        vector: Arc<dyn VectorStore>,
        registry: Arc<dyn StatusRegistry>,
        batch_size: usize,
        strict_consistency: bool,
    ) -> Self {
        Self {
            consumer,
            store,
            vector,
            registry,
            batch_size: batch_size.max(1),
            strict_consistency,
        }
    }

    /// Insert one batch and record its progress. `inserted` tracks the ids
    /// the vector store accepted, for the caller's compensating rollback.
    async fn write_batch(
        &self,
        file_key: &str,
        batch: &[IndexedNode],
        inserted: &mut Vec<String>,
    ) -> Result<(), TaskError> {
        let ids: Vec<String> = batch.iter().map(|node| node.id.clone()).collect();

        if !self.vector.insert(batch).await? {
            return Err(TaskError::Transient(
                "vector store rejected batch".to_string(),
            ));
        }
        inserted.extend(ids.iter().cloned());

        self.registry.mark_chunks_processed(file_key, &ids).await?;
        Ok(())
    }
}

#[async_trait]
impl StageWorker for IndexWorker {
    fn stage(&self) -> Stage {
        Stage::Index
    }

    fn consumer(&mut self) -> &mut dyn MessageQueue {
        self.consumer.as_mut()
    }

    async fn handle_task(&mut self, task: &TaskMessage) -> Result<(), TaskError> {
        let raw = self.store.load(&task.file_path).await?;
        let payload = RagTaskPayload::from_slice(&raw)?;

        // Registry is keyed by the payload file this stage consumes.
        let file_key = task.file_path.as_str();

        if self.registry.is_file_processed(file_key).await? {
            tracing::info!(file_path = %task.file_path, "file already fully indexed");
            return Ok(());
        }

        let nodes = build_indexed_nodes(&payload, file_key);
        let processed = self.registry.get_processed_chunks(file_key).await?;
        let file_hash = Uuid::new_v5(&Uuid::NAMESPACE_DNS, file_key.as_bytes()).to_string();

        let mut written = 0usize;
        for batch in nodes.chunks(self.batch_size) {
            let to_process: Vec<IndexedNode> = batch
                .iter()
                .filter(|node| !processed.contains(&node.id))
                .cloned()
                .collect();
            if to_process.is_empty() {
                continue;
            }

            let mut inserted: Vec<String> = Vec::new();
            if let Err(e) = self.write_batch(file_key, &to_process, &mut inserted).await {
                if self.strict_consistency && !inserted.is_empty() {
                    tracing::warn!(
                        file_path = %task.file_path,
                        rollback = inserted.len(),
                        "batch failed, rolling back inserted nodes"
                    );
                    if let Err(delete_err) = self.vector.delete_batch(&inserted).await {
                        tracing::error!(error = %delete_err, "compensating delete failed");
                    }
                }
                return Err(e);
            }
            written += to_process.len();
        }

        self.registry.mark_file_complete(file_key, &file_hash).await?;

        tracing::info!(
            file_path = %task.file_path,
            nodes = nodes.len(),
            written,
            skipped = processed.len(),
            "file indexed"
        );
        Ok(())
    }

    async fn close(&mut self) {
        self.consumer.close().await;
    }
}

/// Construct store-ready nodes from a payload.
///
/// Nodes with empty `page_content` are skipped. The stable id is
/// `{file_path}:{internal_id}`, falling back to an md5 of the content when
/// the node never got an internal id.
pub fn build_indexed_nodes(payload: &RagTaskPayload, file_path: &str) -> Vec<IndexedNode> {
    payload
        .content
        .nodes
        .iter()
        .filter(|node| !node.page_content.trim().is_empty())
        .map(|node| build_one(node, file_path))
        .collect()
}

fn build_one(node: &Node, file_path: &str) -> IndexedNode {
    let internal_id = node
        .metadata
        .get("internal_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let suffix = internal_id
        .clone()
        .unwrap_or_else(|| format!("{:x}", md5::compute(node.page_content.as_bytes())));

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "file_name".to_string(),
        file_name(file_path).to_string(),
    );
    metadata.insert("internal_id".to_string(), internal_id.unwrap_or_default());
    for (target, source) in [
        ("author", "author"),
        ("title", "title"),
        ("keywords", "keywords"),
        ("summary", "summary"),
        ("insert_date", "insertDate"),
    ] {
        metadata.insert(target.to_string(), flat_value(node.metadata.get(source)));
    }

    IndexedNode {
        id: format!("{file_path}:{suffix}"),
        text: node.page_content.clone(),
        metadata,
    }
}

/// Flatten a metadata value: arrays join with `"|"`, missing keys become `""`.
fn flat_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("|"),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::{Map, json};

    use super::*;
    use crate::data::queue::MemoryQueueHub;
    use crate::data::registry::{MemoryStatusRegistry, RegistryError};
    use crate::data::vector::{MemoryHybridStore, VectorStoreConfig};
    use crate::domain::ContentBody;
    use crate::stages::process_one;

    fn sparse_store() -> Arc<MemoryHybridStore> {
        let config = VectorStoreConfig {
            uri: "memory://test".into(),
            enable_dense: false,
            enable_sparse: true,
            ..Default::default()
        };
        Arc::new(MemoryHybridStore::new(config, None).unwrap())
    }

    fn node_with_id(content: &str, internal_id: &str) -> Node {
        let mut metadata = Map::new();
        metadata.insert("internal_id".into(), json!(internal_id));
        metadata.insert("author".into(), json!("Kim"));
        metadata.insert("keywords".into(), json!(["k1", "k2"]));
        metadata.insert("insertDate".into(), json!("2024-01-01 00:00:00"));
        Node::new(content, metadata)
    }

    async fn seed_payload(dir: &std::path::Path, nodes: Vec<Node>) -> String {
        let payload = RagTaskPayload {
            content: ContentBody {
                nodes,
                ..Default::default()
            },
            metadata: Map::new(),
        };
        let path = dir
            .join("doc_part0_chunked_enriched.json")
            .to_string_lossy()
            .to_string();
        tokio::fs::write(&path, payload.to_json().unwrap())
            .await
            .unwrap();
        path
    }

    fn make_worker(
        hub: &MemoryQueueHub,
        vector: Arc<dyn VectorStore>,
        registry: Arc<dyn StatusRegistry>,
        batch_size: usize,
    ) -> IndexWorker {
        IndexWorker::new(
            Box::new(hub.queue(Stage::Index.topic())),
            ContentStore::new(),
            vector,
            registry,
            batch_size,
            true,
        )
    }

    async fn push_task(hub: &MemoryQueueHub, file_path: &str) {
        let msg = TaskMessage::new(file_path, "enrichment_complete", "trace-index");
        hub.queue(Stage::Index.topic())
            .produce(&msg.to_json().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_happy_path_marks_file_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_payload(
            dir.path(),
            vec![
                node_with_id("one", "part0_0"),
                node_with_id("two", "part0_1"),
                node_with_id("three", "part0_2"),
            ],
        )
        .await;

        let hub = MemoryQueueHub::new();
        let store = sparse_store();
        let registry = Arc::new(MemoryStatusRegistry::new());
        let mut worker = make_worker(&hub, store.clone(), registry.clone(), 50);
        push_task(&hub, &path).await;

        assert!(process_one(&mut worker).await.unwrap());
        assert_eq!(store.len(), 3);
        assert!(registry.is_file_processed(&path).await.unwrap());
        assert!(registry.get_processed_chunks(&path).await.unwrap().is_empty());

        // Deterministic uuid5 file hash.
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_DNS, path.as_bytes()).to_string();
        assert_eq!(registry.completed_hash(&path), Some(expected));
    }

    #[tokio::test]
    async fn test_indexed_ids_and_flat_metadata() {
        let payload = RagTaskPayload {
            content: ContentBody {
                nodes: vec![node_with_id("text body", "part0_0")],
                ..Default::default()
            },
            metadata: Map::new(),
        };
        let nodes = build_indexed_nodes(&payload, "data/doc_part0.json");

        assert_eq!(nodes[0].id, "data/doc_part0.json:part0_0");
        assert_eq!(nodes[0].metadata["file_name"], "doc_part0.json");
        assert_eq!(nodes[0].metadata["internal_id"], "part0_0");
        assert_eq!(nodes[0].metadata["author"], "Kim");
        assert_eq!(nodes[0].metadata["keywords"], "k1|k2");
        assert_eq!(nodes[0].metadata["insert_date"], "2024-01-01 00:00:00");
        assert_eq!(nodes[0].metadata["title"], "");
        assert_eq!(nodes[0].metadata["summary"], "");
    }

    #[tokio::test]
    async fn test_md5_fallback_without_internal_id() {
        let payload = RagTaskPayload {
            content: ContentBody {
                nodes: vec![Node::new("raw content", Map::new())],
                ..Default::default()
            },
            metadata: Map::new(),
        };
        let nodes = build_indexed_nodes(&payload, "f.json");

        let expected = format!("{:x}", md5::compute(b"raw content"));
        assert_eq!(nodes[0].id, format!("f.json:{expected}"));
        assert_eq!(nodes[0].metadata["internal_id"], "");
    }

    #[tokio::test]
    async fn test_empty_content_nodes_skipped() {
        let payload = RagTaskPayload {
            content: ContentBody {
                nodes: vec![Node::new("  ", Map::new()), node_with_id("kept", "part0_1")],
                ..Default::default()
            },
            metadata: Map::new(),
        };
        assert_eq!(build_indexed_nodes(&payload, "f.json").len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_payload(dir.path(), vec![node_with_id("one", "part0_0")]).await;

        let hub = MemoryQueueHub::new();
        let store = sparse_store();
        let registry = Arc::new(MemoryStatusRegistry::new());
        registry.mark_file_complete(&path, "existing").await.unwrap();

        let mut worker = make_worker(&hub, store.clone(), registry.clone(), 50);
        push_task(&hub, &path).await;
        assert!(process_one(&mut worker).await.unwrap());

        // Nothing inserted, hash untouched.
        assert_eq!(store.len(), 0);
        assert_eq!(registry.completed_hash(&path), Some("existing".into()));
    }

    #[tokio::test]
    async fn test_resume_skips_processed_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_payload(
            dir.path(),
            vec![
                node_with_id("one", "part0_0"),
                node_with_id("two", "part0_1"),
            ],
        )
        .await;

        let hub = MemoryQueueHub::new();
        let store = sparse_store();
        let registry = Arc::new(MemoryStatusRegistry::new());
        registry
            .mark_chunks_processed(&path, &[format!("{path}:part0_0")])
            .await
            .unwrap();

        let mut worker = make_worker(&hub, store.clone(), registry.clone(), 50);
        push_task(&hub, &path).await;
        process_one(&mut worker).await.unwrap();

        // Only the unprocessed chunk was written; file completed anyway.
        assert_eq!(store.len(), 1);
        assert!(registry.is_file_processed(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_payload_completes_with_zero_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_payload(dir.path(), vec![]).await;

        let hub = MemoryQueueHub::new();
        let store = sparse_store();
        let registry = Arc::new(MemoryStatusRegistry::new());
        let mut worker = make_worker(&hub, store.clone(), registry.clone(), 50);
        push_task(&hub, &path).await;

        assert!(process_one(&mut worker).await.unwrap());
        assert_eq!(store.len(), 0);
        assert!(registry.is_file_processed(&path).await.unwrap());
    }

    /// Registry that accepts reads but refuses progress writes
    struct FailingRegistry {
        inner: MemoryStatusRegistry,
    }

    #[async_trait]
    impl StatusRegistry for FailingRegistry {
        async fn is_file_processed(&self, file_name: &str) -> Result<bool, RegistryError> {
            self.inner.is_file_processed(file_name).await
        }

        async fn get_processed_chunks(
            &self,
            file_name: &str,
        ) -> Result<HashSet<String>, RegistryError> {
            self.inner.get_processed_chunks(file_name).await
        }

        async fn mark_chunks_processed(
            &self,
            _file_name: &str,
            _chunk_ids: &[String],
        ) -> Result<(), RegistryError> {
            Err(RegistryError::Backend("write refused".into()))
        }

        async fn mark_file_complete(
            &self,
            file_name: &str,
            file_hash: &str,
        ) -> Result<(), RegistryError> {
            self.inner.mark_file_complete(file_name, file_hash).await
        }
    }

    #[tokio::test]
    async fn test_strict_consistency_rolls_back_failed_batch() {
        let dir = tempfile::tempdir().unwrap();
        let nodes: Vec<Node> = (0..50)
            .map(|i| node_with_id(&format!("content {i}"), &format!("part0_{i}")))
            .collect();
        let path = seed_payload(dir.path(), nodes).await;

        let hub = MemoryQueueHub::new();
        let store = sparse_store();
        let registry = Arc::new(FailingRegistry {
            inner: MemoryStatusRegistry::new(),
        });
        let mut worker = make_worker(&hub, store.clone(), registry.clone(), 50);
        push_task(&hub, &path).await;

        // Insert succeeds, progress write fails, rollback deletes the batch.
        assert!(process_one(&mut worker).await.unwrap());
        assert_eq!(store.len(), 0);
        assert!(!registry.is_file_processed(&path).await.unwrap());
        assert!(registry.get_processed_chunks(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_larger_than_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_payload(dir.path(), vec![node_with_id("only", "part0_0")]).await;

        let hub = MemoryQueueHub::new();
        let store = sparse_store();
        let registry = Arc::new(MemoryStatusRegistry::new());
        let mut worker = make_worker(&hub, store.clone(), registry.clone(), 500);
        push_task(&hub, &path).await;

        process_one(&mut worker).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(registry.is_file_processed(&path).await.unwrap());
    }

    #[test]
    fn test_flat_value_shapes() {
        assert_eq!(flat_value(None), "");
        assert_eq!(flat_value(Some(&json!("x"))), "x");
        assert_eq!(flat_value(Some(&json!(["a", "b"]))), "a|b");
        assert_eq!(flat_value(Some(&json!(3))), "3");
        assert_eq!(flat_value(Some(&Value::Null)), "");
    }
}
