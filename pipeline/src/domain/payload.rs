//! Canonical document payload persisted between stages
//!
//! The payload is a small state machine: each stage honours one instruction
//! and resets it afterwards (`chunk_method` after chunking,
//! `enrichment_methods` after enrichment), so re-delivering an already
//! processed payload is a no-op.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Splitting strategy requested for the Chunk stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMethod {
    #[default]
    None,
    Sentence,
    Semantic,
    Llm,
    FixedSize,
}

/// Metadata generation requested for the Enrich stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMethod {
    None,
    Summary,
    Questions,
    Entities,
    Keywords,
}

/// Mutable "what to do next" state embedded in the payload
///
/// Fields outside the recognised set are carried through unchanged in
/// `extra` so that newer producers can talk to older consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInstructions {
    #[serde(default)]
    pub chunk_method: ChunkMethod,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    #[serde(default = "default_enrichment_methods")]
    pub enrichment_methods: Vec<EnrichmentMethod>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_chunk_size() -> u32 {
    500
}

fn default_chunk_overlap() -> u32 {
    50
}

fn default_enrichment_methods() -> Vec<EnrichmentMethod> {
    vec![EnrichmentMethod::None]
}

impl Default for PipelineInstructions {
    fn default() -> Self {
        Self {
            chunk_method: ChunkMethod::None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            enrichment_methods: default_enrichment_methods(),
            extra: Map::new(),
        }
    }
}

/// Atomic unit of retrievable content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Node {
    pub fn new(page_content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBody {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub pipeline_instructions: PipelineInstructions,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ContentBody {
    fn default() -> Self {
        Self {
            version: default_version(),
            pipeline_instructions: PipelineInstructions::default(),
            nodes: Vec::new(),
        }
    }
}

/// Document payload persisted to the object store at every hop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagTaskPayload {
    pub content: ContentBody,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RagTaskPayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_defaults() {
        let instructions = PipelineInstructions::default();
        assert_eq!(instructions.chunk_method, ChunkMethod::None);
        assert_eq!(instructions.chunk_size, 500);
        assert_eq!(instructions.chunk_overlap, 50);
        assert_eq!(instructions.enrichment_methods, vec![EnrichmentMethod::None]);
    }

    #[test]
    fn test_payload_round_trip() {
        let mut metadata = Map::new();
        metadata.insert("internal_id".into(), Value::String("part0_0".into()));
        let payload = RagTaskPayload {
            content: ContentBody {
                nodes: vec![Node::new("hello", metadata)],
                ..Default::default()
            },
            metadata: Map::new(),
        };
        let json = payload.to_json().unwrap();
        let back = RagTaskPayload::from_slice(json.as_bytes()).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_unknown_instruction_fields_pass_through() {
        let raw = r#"{
            "content": {
                "pipeline_instructions": {
                    "chunk_method": "semantic",
                    "need_qa": true
                },
                "nodes": []
            }
        }"#;
        let payload = RagTaskPayload::from_slice(raw.as_bytes()).unwrap();
        let instructions = &payload.content.pipeline_instructions;
        assert_eq!(instructions.chunk_method, ChunkMethod::Semantic);
        assert_eq!(instructions.extra.get("need_qa"), Some(&Value::Bool(true)));

        // Unknown fields survive re-serialization unchanged.
        let json = payload.to_json().unwrap();
        assert!(json.contains("need_qa"));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&ChunkMethod::FixedSize).unwrap(),
            "\"fixed_size\""
        );
        assert_eq!(
            serde_json::to_string(&EnrichmentMethod::Summary).unwrap(),
            "\"summary\""
        );
    }

    #[test]
    fn test_sparse_payload_gets_defaults() {
        let payload = RagTaskPayload::from_slice(br#"{"content":{"nodes":[]}}"#).unwrap();
        assert_eq!(payload.content.version, "1.0");
        assert_eq!(
            payload.content.pipeline_instructions.enrichment_methods,
            vec![EnrichmentMethod::None]
        );
    }
}
