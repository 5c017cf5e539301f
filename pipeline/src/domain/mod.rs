//! Domain model shared by every pipeline stage

pub mod message;
pub mod payload;

pub use message::{QueueMessage, TaskMessage};
pub use payload::{
    ChunkMethod, ContentBody, EnrichmentMethod, Node, PipelineInstructions, RagTaskPayload,
};
