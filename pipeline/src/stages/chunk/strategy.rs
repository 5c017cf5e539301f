//! Chunking strategies
//!
//! Static dispatch from [`ChunkMethod`] to a strategy value; methods without
//! an implementation fall back to the no-split strategy.

use serde_json::{Map, Value};

use crate::domain::{ChunkMethod, PipelineInstructions};

/// One piece of a split node
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    pub chunk_content: String,
    pub metadata: Map<String, Value>,
}

impl ChunkPiece {
    fn tagged(content: &str, strategy: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "strategy".to_string(),
            Value::String(strategy.to_string()),
        );
        Self {
            chunk_content: content.to_string(),
            metadata,
        }
    }
}

pub trait ChunkStrategy: Send + Sync {
    fn split(&self, text: &str, instructions: &PipelineInstructions) -> Vec<ChunkPiece>;
}

/// Whole text as a single chunk
pub struct NoSplitChunker;

impl ChunkStrategy for NoSplitChunker {
    fn split(&self, text: &str, _instructions: &PipelineInstructions) -> Vec<ChunkPiece> {
        vec![ChunkPiece::tagged(text, "none")]
    }
}

/// Similarity-based splitting; reserved until an embedding-backed splitter
/// lands, pieces are tagged so downstream can tell them apart.
pub struct SemanticChunker;

impl ChunkStrategy for SemanticChunker {
    fn split(&self, text: &str, _instructions: &PipelineInstructions) -> Vec<ChunkPiece> {
        vec![ChunkPiece::tagged(text, "semantic_pending")]
    }
}

static NO_SPLIT: NoSplitChunker = NoSplitChunker;
static SEMANTIC: SemanticChunker = SemanticChunker;

/// Strategy for a requested method; anything unimplemented resolves to
/// no-split.
pub fn chunker_for(method: ChunkMethod) -> &'static dyn ChunkStrategy {
    match method {
        ChunkMethod::Semantic => &SEMANTIC,
        _ => &NO_SPLIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_split_returns_single_tagged_chunk() {
        let pieces = NoSplitChunker.split("whole text", &PipelineInstructions::default());
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].chunk_content, "whole text");
        assert_eq!(pieces[0].metadata["strategy"], Value::String("none".into()));
    }

    #[test]
    fn test_semantic_is_pending() {
        let pieces = SemanticChunker.split("text", &PipelineInstructions::default());
        assert_eq!(
            pieces[0].metadata["strategy"],
            Value::String("semantic_pending".into())
        );
    }

    #[test]
    fn test_dispatch_falls_back_to_no_split() {
        let instructions = PipelineInstructions::default();
        for method in [
            ChunkMethod::None,
            ChunkMethod::Sentence,
            ChunkMethod::Llm,
            ChunkMethod::FixedSize,
        ] {
            let pieces = chunker_for(method).split("t", &instructions);
            assert_eq!(pieces[0].metadata["strategy"], Value::String("none".into()));
        }
        let pieces = chunker_for(ChunkMethod::Semantic).split("t", &instructions);
        assert_eq!(
            pieces[0].metadata["strategy"],
            Value::String("semantic_pending".into())
        );
    }
}
