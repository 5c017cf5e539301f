//! Enrich stage
//!
//! Annotates node metadata with LLM-derived fields under bounded
//! concurrency, then resets `enrichment_methods` and hands the payload to
//! the Index stage. Payloads whose instructions contain `none` skip the LLM
//! entirely but still move forward, so re-delivery after a crash-and-ack
//! race is harmless.

pub mod master;
pub mod strategy;

use async_trait::async_trait;

use super::{Stage, StageWorker, TaskError};
use crate::data::queue::MessageQueue;
use crate::data::store::ContentStore;
use crate::domain::{EnrichmentMethod, RagTaskPayload, TaskMessage};
use crate::utils::path::stage_output_path;

pub use master::EnrichmentMaster;

const OUTPUT_STAGE: &str = "enrichment_complete";
const OUTPUT_SUFFIX: &str = "enriched";

pub struct EnrichWorker {
    consumer: Box<dyn MessageQueue>,
    publisher: Box<dyn MessageQueue>,
    store: ContentStore,
    master: EnrichmentMaster,
}

impl EnrichWorker {
    pub fn new(
        consumer: Box<dyn MessageQueue>,
        publisher: Box<dyn MessageQueue>,
        store: ContentStore,
        master: EnrichmentMaster,
    ) -> Self {
        Self {
            consumer,
            publisher,
            store,
            master,
        }
    }

    async fn finish_stage(
        &mut self,
        task: &TaskMessage,
        payload: &RagTaskPayload,
    ) -> Result<(), TaskError> {
        let output_path = stage_output_path(&task.file_path, OUTPUT_SUFFIX);
        self.store.save(&payload.to_json()?, &output_path).await?;

        let message = TaskMessage::new(&output_path, OUTPUT_STAGE, task.trace_id.clone());
        self.publisher.produce(&message.to_json()?).await?;

        tracing::info!(input = %task.file_path, output = %output_path, "enrichment stage finished");
        Ok(())
    }
}

#[async_trait]
impl StageWorker for EnrichWorker {
    fn stage(&self) -> Stage {
        Stage::Enrich
    }

    fn consumer(&mut self) -> &mut dyn MessageQueue {
        self.consumer.as_mut()
    }

    async fn handle_task(&mut self, task: &TaskMessage) -> Result<(), TaskError> {
        let raw = self.store.load(&task.file_path).await?;
        let mut payload = RagTaskPayload::from_slice(&raw)?;

        let methods = &payload.content.pipeline_instructions.enrichment_methods;
        if methods.is_empty() || methods.contains(&EnrichmentMethod::None) {
            tracing::info!(file_path = %task.file_path, "no enrichment requested, passing through");
            return self.finish_stage(task, &payload).await;
        }

        self.master.process_payload(&mut payload).await;

        // Reset so reprocessing the persisted payload is a no-op.
        payload.content.pipeline_instructions.enrichment_methods = vec![EnrichmentMethod::None];
        self.finish_stage(task, &payload).await
    }

    async fn close(&mut self) {
        self.consumer.close().await;
        self.publisher.close().await;
    }
}
