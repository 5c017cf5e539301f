//! Redis Streams queue backend
//!
//! At-least-once delivery via consumer groups:
//! - `XADD` for publishing (single `payload` field)
//! - `XREADGROUP` for consuming
//! - `XACK` for acknowledgment
//!
//! ## Pending-entry recovery
//!
//! Each consumer carries a `check_pending` flag (initially `true`). While the
//! flag is set, `consume` reads the consumer's own pending-entry list from
//! offset `0` without blocking; only once that list is drained does it read
//! new entries at `>` with a bounded block. Reading a new entry flips the
//! flag back on, so a crash between read and ack is always repaired by the
//! next `consume` under the same consumer name.

use deadpool_redis::redis::{RedisResult, Value as RedisValue};
use deadpool_redis::{Config, Pool, Runtime};

use async_trait::async_trait;

use super::{MessageQueue, QueueConfig, QueueError};
use crate::domain::QueueMessage;

/// XREADGROUP block timeout for new entries, in milliseconds
const XREADGROUP_BLOCK_MS: u64 = 1000;

/// Redis Streams implementation of [`MessageQueue`]
pub struct RedisStreamQueue {
    pool: Pool,
    stream: String,
    group: String,
    consumer: String,
    check_pending: bool,
}

impl RedisStreamQueue {
    /// Bind to a topic, idempotently creating the consumer group at offset
    /// `0` with stream auto-creation.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let url = config.url();
        let pool = Config::from_url(&url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Connection(format!("failed to create pool for {url}: {e}")))?;

        let queue = Self {
            pool,
            stream: config.topic.clone(),
            group: config.group.clone(),
            consumer: config.consumer_name.clone(),
            check_pending: true,
        };
        queue.ensure_consumer_group().await?;

        tracing::debug!(
            stream = %queue.stream,
            group = %queue.group,
            consumer = %queue.consumer,
            "redis queue connected"
        );
        Ok(queue)
    }

    /// Create consumer group if not exists, ignoring BUSYGROUP
    async fn ensure_consumer_group(&self) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;

        let result: RedisResult<String> = deadpool_redis::redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::ConsumerGroup(format!(
                "failed to create consumer group {}: {e}",
                self.group
            ))),
        }
    }

    /// One XREADGROUP call. `last_id` is `"0"` for the pending-entry list or
    /// `">"` for new entries; `block` bounds the wait for new entries.
    /// Transport errors are logged and reported as "no message".
    async fn read_one(&self, last_id: &str, block: Option<u64>) -> Option<QueueMessage> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, stream = %self.stream, "failed to get redis connection");
                return None;
            }
        };

        let mut cmd = deadpool_redis::redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(&self.group).arg(&self.consumer);
        if let Some(ms) = block {
            cmd.arg("BLOCK").arg(ms);
        }
        cmd.arg("COUNT").arg(1).arg("STREAMS").arg(&self.stream).arg(last_id);

        let result: RedisResult<RedisValue> = cmd.query_async(&mut conn).await;
        match result {
            Ok(value) => parse_xreadgroup_response(value),
            Err(e) => {
                tracing::warn!(error = %e, stream = %self.stream, "XREADGROUP failed");
                None
            }
        }
    }
}

#[async_trait]
impl MessageQueue for RedisStreamQueue {
    async fn produce(&self, payload: &str) -> Result<String, QueueError> {
        let mut conn = self.pool.get().await?;

        let id: String = deadpool_redis::redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        Ok(id)
    }

    async fn consume(&mut self) -> Option<QueueMessage> {
        if self.check_pending {
            if let Some(msg) = self.read_one("0", None).await {
                // Still draining pending entries; keep the flag set.
                return Some(msg);
            }
            self.check_pending = false;
            tracing::debug!(consumer = %self.consumer, "pending entry list is empty");
        }

        let msg = self.read_one(">", Some(XREADGROUP_BLOCK_MS)).await;
        if msg.is_some() {
            // If processing fails without an ack, the next consume must
            // find this entry back in the pending list.
            self.check_pending = true;
        }
        msg
    }

    async fn ack(&mut self, id: &str) -> bool {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                self.check_pending = true;
                tracing::warn!(error = %e, id, "ack failed: no connection");
                return false;
            }
        };

        let result: RedisResult<i64> = deadpool_redis::redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.group)
            .arg(id)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(count) if count > 0 => {
                self.check_pending = false;
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.check_pending = true;
                tracing::warn!(error = %e, id, "XACK failed");
                false
            }
        }
    }

    async fn close(&mut self) {
        self.pool.close();
        tracing::debug!(stream = %self.stream, "redis queue closed");
    }
}

/// Parse an XREADGROUP response into the first delivered message
///
/// Response shape: `[[stream_name, [[id, [field, value, ...]]]]]`, or `Nil`
/// on timeout.
fn parse_xreadgroup_response(value: RedisValue) -> Option<QueueMessage> {
    let RedisValue::Array(streams) = value else {
        return None;
    };

    for stream_data in streams {
        let RedisValue::Array(parts) = stream_data else {
            continue;
        };
        if parts.len() < 2 {
            continue;
        }
        let RedisValue::Array(entries) = &parts[1] else {
            continue;
        };
        for entry in entries {
            if let RedisValue::Array(entry_parts) = entry
                && entry_parts.len() >= 2
                && let (RedisValue::BulkString(id_bytes), RedisValue::Array(fields)) =
                    (&entry_parts[0], &entry_parts[1])
                && let Ok(id) = String::from_utf8(id_bytes.clone())
                && let Some(payload) = extract_payload_from_fields(fields)
            {
                return Some(QueueMessage { id, data: payload });
            }
        }
    }
    None
}

/// Extract the `payload` field from a stream entry's flat field list
fn extract_payload_from_fields(fields: &[RedisValue]) -> Option<String> {
    let mut iter = fields.iter();
    while let Some(field) = iter.next() {
        if let RedisValue::BulkString(field_name) = field {
            if field_name == b"payload" {
                if let Some(RedisValue::BulkString(payload)) = iter.next() {
                    return String::from_utf8(payload.clone()).ok();
                }
            } else {
                iter.next(); // Skip value
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RedisValue {
        RedisValue::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_xreadgroup_entry() {
        let value = RedisValue::Array(vec![RedisValue::Array(vec![
            bulk("clean_flow"),
            RedisValue::Array(vec![RedisValue::Array(vec![
                bulk("1700000000000-0"),
                RedisValue::Array(vec![bulk("payload"), bulk(r#"{"file_path":"a.json"}"#)]),
            ])]),
        ])]);

        let msg = parse_xreadgroup_response(value).unwrap();
        assert_eq!(msg.id, "1700000000000-0");
        assert_eq!(msg.data, r#"{"file_path":"a.json"}"#);
    }

    #[test]
    fn test_parse_xreadgroup_nil_and_empty() {
        assert!(parse_xreadgroup_response(RedisValue::Nil).is_none());
        assert!(parse_xreadgroup_response(RedisValue::Array(vec![])).is_none());
    }

    #[test]
    fn test_extract_payload_skips_other_fields() {
        let fields = vec![
            bulk("meta"),
            bulk("ignored"),
            bulk("payload"),
            bulk("the-message"),
        ];
        assert_eq!(
            extract_payload_from_fields(&fields).as_deref(),
            Some("the-message")
        );
    }

    #[test]
    fn test_extract_payload_missing() {
        let fields = vec![bulk("meta"), bulk("ignored")];
        assert!(extract_payload_from_fields(&fields).is_none());
    }
}
