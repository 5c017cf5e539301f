//! Inter-stage task envelope
//!
//! A `TaskMessage` is the lightweight signal that flows between stages: it
//! carries the object-store path of the payload to process, never the payload
//! itself. Serialized as JSON into the single `payload` field of a stream
//! entry.

use serde::{Deserialize, Serialize};

/// Envelope produced by one stage and consumed by the next
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMessage {
    /// Object-store path of the payload file to process
    pub file_path: String,
    /// Name of the stage that produced this message (informational)
    pub stage: String,
    /// Producer clock, Unix seconds
    #[serde(default)]
    pub timestamp: f64,
    /// Opaque correlation id, propagated unchanged across stages
    #[serde(default)]
    pub trace_id: String,
}

impl TaskMessage {
    /// Create a message stamped with the current producer clock
    pub fn new(
        file_path: impl Into<String>,
        stage: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            stage: stage.into(),
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            trace_id: trace_id.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Message handed out by the queue substrate
///
/// `id` is the ACK handle (Redis stream id or in-memory sequence number);
/// `data` is the raw JSON-serialized [`TaskMessage`]. Decoding is left to the
/// consumer so that malformed envelopes can be classified and dropped as
/// poison instead of wedging the pending-entry list.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_message_round_trip() {
        let msg = TaskMessage::new("data/report_part0.json", "clean_complete", "trace-1");
        let json = msg.to_json().unwrap();
        let back = TaskMessage::from_json(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_task_message_timestamp_is_set() {
        let msg = TaskMessage::new("a.json", "clean_complete", "t");
        assert!(msg.timestamp > 0.0);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let msg =
            TaskMessage::from_json(r#"{"file_path":"a.json","stage":"clean_complete"}"#).unwrap();
        assert_eq!(msg.timestamp, 0.0);
        assert_eq!(msg.trace_id, "");
    }
}
