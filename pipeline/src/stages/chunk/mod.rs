//! Chunk stage
//!
//! Splits every node of a payload with the strategy named by
//! `chunk_method`, merges strategy metadata over the original node metadata
//! (right-biased), then resets the instruction and hands the payload to the
//! Enrich stage. A payload that arrives with no explicit enrichment
//! instruction leaves with the `[summary, keywords]` default.

pub mod strategy;

use async_trait::async_trait;

use super::{Stage, StageWorker, TaskError};
use crate::data::queue::MessageQueue;
use crate::data::store::ContentStore;
use crate::domain::{ChunkMethod, EnrichmentMethod, Node, RagTaskPayload, TaskMessage};
use crate::utils::path::stage_output_path;

use strategy::chunker_for;

const OUTPUT_STAGE: &str = "chunking_complete";
const OUTPUT_SUFFIX: &str = "chunked";

pub struct ChunkWorker {
    consumer: Box<dyn MessageQueue>,
    publisher: Box<dyn MessageQueue>,
    store: ContentStore,
}

impl ChunkWorker {
    pub fn new(
        consumer: Box<dyn MessageQueue>,
        publisher: Box<dyn MessageQueue>,
        store: ContentStore,
    ) -> Self {
        Self {
            consumer,
            publisher,
            store,
        }
    }
}

#[async_trait]
impl StageWorker for ChunkWorker {
    fn stage(&self) -> Stage {
        Stage::Chunk
    }

    fn consumer(&mut self) -> &mut dyn MessageQueue {
        self.consumer.as_mut()
    }

    async fn handle_task(&mut self, task: &TaskMessage) -> Result<(), TaskError> {
        let raw = self.store.load(&task.file_path).await?;
        let mut payload = RagTaskPayload::from_slice(&raw)?;

        let instructions = payload.content.pipeline_instructions.clone();
        let chunker = chunker_for(instructions.chunk_method);

        let mut chunked: Vec<Node> = Vec::new();
        for node in &payload.content.nodes {
            for piece in chunker.split(&node.page_content, &instructions) {
                let mut metadata = node.metadata.clone();
                // Right-biased: strategy metadata wins on key collision.
                for (key, value) in piece.metadata {
                    metadata.insert(key, value);
                }
                chunked.push(Node::new(piece.chunk_content, metadata));
            }
        }

        let node_count = chunked.len();
        payload.content.nodes = chunked;

        let next = &mut payload.content.pipeline_instructions;
        next.chunk_method = ChunkMethod::None;
        if next.enrichment_methods == vec![EnrichmentMethod::None] {
            // No explicit instruction means "do a sensible default enrichment".
            next.enrichment_methods = vec![EnrichmentMethod::Summary, EnrichmentMethod::Keywords];
        }

        let output_path = stage_output_path(&task.file_path, OUTPUT_SUFFIX);
        self.store.save(&payload.to_json()?, &output_path).await?;

        let message = TaskMessage::new(&output_path, OUTPUT_STAGE, task.trace_id.clone());
        self.publisher.produce(&message.to_json()?).await?;

        tracing::info!(
            input = %task.file_path,
            output = %output_path,
            nodes = node_count,
            method = ?instructions.chunk_method,
            "payload chunked"
        );
        Ok(())
    }

    async fn close(&mut self) {
        self.consumer.close().await;
        self.publisher.close().await;
    }
}
