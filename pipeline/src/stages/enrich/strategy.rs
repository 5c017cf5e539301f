//! Enrichment strategies
//!
//! Each strategy contributes one output field to the per-node extraction
//! prompt: a task definition for the model and a structural constraint for
//! the consolidated response schema.

use serde_json::{Value, json};

use crate::domain::EnrichmentMethod;

pub trait EnrichmentStrategy: Send + Sync {
    fn method(&self) -> EnrichmentMethod;

    /// Logical task name used in the prompt
    fn task_name(&self) -> &'static str;

    /// What this enrichment means, for the model
    fn task_description(&self) -> &'static str;

    /// Key written into node metadata (and into the response schema)
    fn output_field(&self) -> &'static str;

    /// Structural constraint surfaced to the model
    fn output_schema(&self) -> Value;

    /// Optional quality/style constraints
    fn quality_rules(&self) -> &'static [&'static str] {
        &[]
    }

    /// Value to return when the text carries too little information
    fn failure_fallback(&self) -> Value {
        Value::String(String::new())
    }
}

pub struct SummaryStrategy;

impl EnrichmentStrategy for SummaryStrategy {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Summary
    }

    fn task_name(&self) -> &'static str {
        "summary"
    }

    fn task_description(&self) -> &'static str {
        "Write a summary of the text in at most 100 characters."
    }

    fn output_field(&self) -> &'static str {
        "summary"
    }

    fn output_schema(&self) -> Value {
        json!({"type": "string", "max_length": 100})
    }

    fn quality_rules(&self) -> &'static [&'static str] {
        &[
            "Do not copy sentences verbatim from the text",
            "Do not speculate beyond what the text states",
            "Keep a neutral tone",
        ]
    }
}

pub struct KeywordStrategy;

impl EnrichmentStrategy for KeywordStrategy {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Keywords
    }

    fn task_name(&self) -> &'static str {
        "keywords"
    }

    fn task_description(&self) -> &'static str {
        "Extract 5-8 core keywords from the text, returned as a list."
    }

    fn output_field(&self) -> &'static str {
        "keywords"
    }

    fn output_schema(&self) -> Value {
        json!({"type": "array", "items": "string", "min_items": 5, "max_items": 8})
    }

    fn failure_fallback(&self) -> Value {
        json!([])
    }
}

pub struct QuestionStrategy;

impl EnrichmentStrategy for QuestionStrategy {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Questions
    }

    fn task_name(&self) -> &'static str {
        "suggested_questions"
    }

    fn task_description(&self) -> &'static str {
        "Propose 3 questions a reader would ask that this text answers."
    }

    fn output_field(&self) -> &'static str {
        "suggested_questions"
    }

    fn output_schema(&self) -> Value {
        json!({"type": "array", "items": "string", "length": 3})
    }

    fn quality_rules(&self) -> &'static [&'static str] {
        &[
            "Questions must be specific to the text",
            "No yes/no questions",
        ]
    }

    fn failure_fallback(&self) -> Value {
        json!([])
    }
}

static SUMMARY: SummaryStrategy = SummaryStrategy;
static KEYWORDS: KeywordStrategy = KeywordStrategy;
static QUESTIONS: QuestionStrategy = QuestionStrategy;

/// Resolve the active strategies for the requested methods. Methods without
/// a strategy (`none`, `entities`) are skipped.
pub fn strategies_for(methods: &[EnrichmentMethod]) -> Vec<&'static dyn EnrichmentStrategy> {
    methods
        .iter()
        .filter_map(|method| -> Option<&'static dyn EnrichmentStrategy> {
            match method {
                EnrichmentMethod::Summary => Some(&SUMMARY),
                EnrichmentMethod::Keywords => Some(&KEYWORDS),
                EnrichmentMethod::Questions => Some(&QUESTIONS),
                EnrichmentMethod::None | EnrichmentMethod::Entities => None,
            }
        })
        .collect()
}
