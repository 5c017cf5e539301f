//! Clean stage
//!
//! Consumes a raw-source task, parses the file by extension, applies the
//! format cleaner, and writes every yielded fragment as an independent
//! payload with one downstream message each. The input is ACK'd only after
//! all fragments are persisted and published.

pub mod cleaner;
pub mod html;
pub mod parser;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Stage, StageWorker, TaskError};
use crate::data::queue::MessageQueue;
use crate::data::store::ContentStore;
use crate::domain::{ContentBody, Node, PipelineInstructions, RagTaskPayload, TaskMessage};
use crate::utils::path::{file_extension, fragment_path};

use cleaner::cleaner_for_extension;
use parser::{ParseError, parser_for_extension};

/// Stage name stamped on outgoing messages
const OUTPUT_STAGE: &str = "clean_complete";

pub struct CleanWorker {
    consumer: Box<dyn MessageQueue>,
    publisher: Box<dyn MessageQueue>,
    store: ContentStore,
}

impl CleanWorker {
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

impl From<ParseError> for TaskError {
    fn from(err: ParseError) -> Self {
        // Parsing is deterministic over the same bytes; retry cannot succeed.
        TaskError::Malformed(err.to_string())
    }
}

#[async_trait]
impl StageWorker for CleanWorker {
    fn stage(&self) -> Stage {
        Stage::Clean
    }

    fn consumer(&mut self) -> &mut dyn MessageQueue {
        self.consumer.as_mut()
    }

    async fn handle_task(&mut self, task: &TaskMessage) -> Result<(), TaskError> {
        tracing::info!(file_path = %task.file_path, "cleaning source document");

        let raw = self.store.load(&task.file_path).await?;
        let ext = file_extension(&task.file_path);
        let parser = parser_for_extension(&ext)?;
        let records = parser.parse(&raw)?;
        let cleaner = cleaner_for_extension(&ext);

        let mut published = 0usize;
        for (idx, seeds) in cleaner.clean(records).enumerate() {
            let nodes: Vec<Node> = seeds
                .into_iter()
                .map(|seed| Node::new(seed.page_content, seed.metadata))
                .collect();

            let mut metadata = Map::new();
            metadata.insert("fragment_index".to_string(), Value::from(idx));
            metadata.insert(
                "source".to_string(),
                Value::String(task.file_path.clone()),
            );

            let payload = RagTaskPayload {
                content: ContentBody {
                    pipeline_instructions: PipelineInstructions::default(),
                    nodes,
                    ..Default::default()
                },
                metadata,
            };

            let path = fragment_path(&task.file_path, idx);
            self.store.save(&payload.to_json()?, &path).await?;

            // Fresh trace id per fragment; downstream stages propagate it.
            let message = TaskMessage::new(&path, OUTPUT_STAGE, Uuid::new_v4().to_string());
            self.publisher.produce(&message.to_json()?).await?;
            published += 1;
        }

        tracing::info!(
            file_path = %task.file_path,
            fragments = published,
            "document cleaned"
        );
        Ok(())
    }

    async fn close(&mut self) {
        self.consumer.close().await;
        self.publisher.close().await;
    }
}
