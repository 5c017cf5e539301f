//! Per-node enrichment engine
//!
//! Fans one LLM call out per non-empty node, gated by a semaphore, and
//! merges each decoded response into that node's metadata. One node's
//! failure (call error or undecodable JSON) never affects its peers; the
//! node is simply left without enrichment fields.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use super::strategy::{EnrichmentStrategy, strategies_for};
use crate::domain::RagTaskPayload;
use crate::llm::ChatModel;

/// Default cap on concurrent LLM calls per payload
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

pub struct EnrichmentMaster {
    llm: Arc<dyn ChatModel>,
    max_concurrency: usize,
}

impl EnrichmentMaster {
    pub fn new(llm: Arc<dyn ChatModel>, max_concurrency: usize) -> Self {
        Self {
            llm,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Enrich every node of the payload in place.
    pub async fn process_payload(&self, payload: &mut RagTaskPayload) {
        let methods = &payload.content.pipeline_instructions.enrichment_methods;
        let strategies = strategies_for(methods);
        if strategies.is_empty() {
            return;
        }

        let jobs: Vec<(usize, String)> = payload
            .content
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.page_content.trim().is_empty())
            .map(|(idx, node)| (idx, node.page_content.clone()))
            .collect();
        if jobs.is_empty() {
            return;
        }

        tracing::info!(
            nodes = jobs.len(),
            limit = self.max_concurrency,
            "enriching nodes"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let futures: Vec<_> = jobs
            .into_iter()
            .map(|(idx, content)| {
                let semaphore = Arc::clone(&semaphore);
                let llm = Arc::clone(&self.llm);
                let prompt = build_single_prompt(&content, &strategies);
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return (idx, None);
                    };
                    match llm.complete(&prompt).await {
                        Ok(response) => (idx, parse_json_response(&response)),
                        Err(e) => {
                            tracing::warn!(node = idx, error = %e, "node enrichment call failed");
                            (idx, None)
                        }
                    }
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        let mut enriched = 0usize;
        for (idx, data) in results {
            if let Some(fields) = data {
                let metadata = &mut payload.content.nodes[idx].metadata;
                for (key, value) in fields {
                    metadata.insert(key, value);
                }
                enriched += 1;
            }
        }
        tracing::info!(enriched, "node enrichment finished");
    }
}

/// Prompt for one node: all active task definitions plus a consolidated
/// response schema keyed by output field.
pub fn build_single_prompt(content: &str, strategies: &[&'static dyn EnrichmentStrategy]) -> String {
    let mut task_definitions = Vec::new();
    let mut output_schema = Map::new();
    for strategy in strategies {
        let mut definition = format!("- {}: {}", strategy.task_name(), strategy.task_description());
        for rule in strategy.quality_rules() {
            definition.push_str(&format!("\n  * {rule}"));
        }
        task_definitions.push(definition);
        output_schema.insert(strategy.output_field().to_string(), strategy.output_schema());
    }
    let schema = serde_json::to_string_pretty(&Value::Object(output_schema)).unwrap_or_default();

    format!(
        "You are a structured information extraction system. Analyze the text \
below and extract metadata.\n\n\
[Tasks]\n{tasks}\n\n\
[Output requirements]\n\
1. Return exactly one plain JSON object.\n\
2. The JSON must match this schema:\n{schema}\n\
3. Do not output explanations or Markdown fences.\n\n\
[Text]\n---\n{content}\n---\n",
        tasks = task_definitions.join("\n"),
    )
}

/// Decode one model response into a metadata map.
///
/// Tolerates one level of ``` / ```json fencing; anything that is not a JSON
/// object afterwards is rejected.
pub fn parse_json_response(response: &str) -> Option<Map<String, Value>> {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        };
        text = text.trim();
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            tracing::warn!(got = %other, "enrichment response is not a JSON object");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, response, "failed to decode enrichment response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::domain::{ContentBody, EnrichmentMethod, Node, PipelineInstructions};
    use crate::llm::LlmError;

    /// Chat model returning scripted responses in call order
    struct ScriptedChat {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
    }

    impl ScriptedChat {
        fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    fn payload(nodes: Vec<Node>, methods: Vec<EnrichmentMethod>) -> RagTaskPayload {
        RagTaskPayload {
            content: ContentBody {
                pipeline_instructions: PipelineInstructions {
                    enrichment_methods: methods,
                    ..Default::default()
                },
                nodes,
                ..Default::default()
            },
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_metadata_merged_into_nodes() {
        let llm = ScriptedChat::new(vec![Ok(
            r#"{"summary":"S","keywords":["k1","k2","k3","k4","k5"]}"#.to_string(),
        )]);
        let master = EnrichmentMaster::new(llm, 1);

        let mut p = payload(
            vec![Node::new("text", Map::new())],
            vec![EnrichmentMethod::Summary, EnrichmentMethod::Keywords],
        );
        master.process_payload(&mut p).await;

        let metadata = &p.content.nodes[0].metadata;
        assert_eq!(metadata["summary"], json!("S"));
        assert_eq!(metadata["keywords"], json!(["k1", "k2", "k3", "k4", "k5"]));
    }

    #[tokio::test]
    async fn test_bad_json_isolated_to_one_node() {
        // Concurrency of 1 keeps call order aligned with node order.
        let llm = ScriptedChat::new(vec![
            Ok(r#"{"summary":"first"}"#.to_string()),
            Ok("oops not json".to_string()),
            Ok(r#"{"summary":"third"}"#.to_string()),
        ]);
        let master = EnrichmentMaster::new(llm, 1);

        let mut p = payload(
            vec![
                Node::new("one", Map::new()),
                Node::new("two", Map::new()),
                Node::new("three", Map::new()),
            ],
            vec![EnrichmentMethod::Summary],
        );
        master.process_payload(&mut p).await;

        assert_eq!(p.content.nodes[0].metadata["summary"], json!("first"));
        assert!(p.content.nodes[1].metadata.is_empty());
        assert_eq!(p.content.nodes[2].metadata["summary"], json!("third"));
    }

    #[tokio::test]
    async fn test_call_failure_isolated() {
        let llm = ScriptedChat::new(vec![
            Err(LlmError::Api("HTTP 500".into())),
            Ok(r#"{"summary":"ok"}"#.to_string()),
        ]);
        let master = EnrichmentMaster::new(llm, 1);

        let mut p = payload(
            vec![Node::new("a", Map::new()), Node::new("b", Map::new())],
            vec![EnrichmentMethod::Summary],
        );
        master.process_payload(&mut p).await;

        assert!(p.content.nodes[0].metadata.is_empty());
        assert_eq!(p.content.nodes[1].metadata["summary"], json!("ok"));
    }

    #[tokio::test]
    async fn test_whitespace_only_nodes_skipped() {
        let llm = ScriptedChat::new(vec![Ok(r#"{"summary":"only"}"#.to_string())]);
        let master = EnrichmentMaster::new(llm, 1);

        let mut p = payload(
            vec![Node::new("   ", Map::new()), Node::new("real", Map::new())],
            vec![EnrichmentMethod::Summary],
        );
        master.process_payload(&mut p).await;

        assert!(p.content.nodes[0].metadata.is_empty());
        assert_eq!(p.content.nodes[1].metadata["summary"], json!("only"));
    }

    #[test]
    fn test_parse_strips_json_fence() {
        let fenced = "```json\n{\"summary\": \"S\"}\n```";
        assert_eq!(parse_json_response(fenced).unwrap()["summary"], json!("S"));
    }

    #[test]
    fn test_parse_strips_bare_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(parse_json_response(fenced).unwrap()["a"], json!(1));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_json_response("[1, 2]").is_none());
        assert!(parse_json_response("plain words").is_none());
    }

    #[test]
    fn test_prompt_contains_fields_and_rules() {
        let strategies = strategies_for(&[EnrichmentMethod::Summary, EnrichmentMethod::Questions]);
        let prompt = build_single_prompt("the text", &strategies);
        assert!(prompt.contains("\"summary\""));
        assert!(prompt.contains("\"suggested_questions\""));
        assert!(prompt.contains("No yes/no questions"));
        assert!(prompt.contains("the text"));
    }
}
