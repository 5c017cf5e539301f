//! Queue error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("consumer group error: {0}")]
    ConsumerGroup(String),
}

impl From<deadpool_redis::PoolError> for QueueError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        QueueError::Connection(err.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for QueueError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        QueueError::Stream(err.to_string())
    }
}
