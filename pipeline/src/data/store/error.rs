//! Object-store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("content not found: {path}")]
    NotFound { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}
