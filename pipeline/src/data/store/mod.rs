//! Payload object store
//!
//! Moves serialized payloads between stages via content paths. The backend
//! is selected per call from the path prefix:
//! - `s3://bucket/key` - S3 (or S3-compatible endpoint)
//! - `azure://container/blob` - Azure Blob (recognised, not wired to a
//!   vendor SDK in this build; reports a backend error)
//! - anything else - local filesystem

pub mod error;
pub mod filesystem;
pub mod s3;

pub use error::StoreError;

use filesystem::FilesystemStore;
use s3::S3ContentStore;

/// Storage backend implied by a path prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScheme {
    Local,
    S3,
    Azure,
}

impl StorageScheme {
    pub fn of(path: &str) -> Self {
        if path.starts_with("s3://") {
            StorageScheme::S3
        } else if path.starts_with("azure://") {
            StorageScheme::Azure
        } else {
            StorageScheme::Local
        }
    }
}

/// Prefix-dispatched load/save over the concrete backends
///
/// The S3 client is built lazily on first use so that purely local
/// deployments never touch AWS configuration.
#[derive(Default)]
pub struct ContentStore {
    s3: tokio::sync::OnceCell<S3ContentStore>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn s3(&self) -> Result<&S3ContentStore, StoreError> {
        self.s3
            .get_or_try_init(|| async { S3ContentStore::from_env().await })
            .await
    }

    /// Read the full contents at `path`.
    pub async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        match StorageScheme::of(path) {
            StorageScheme::Local => FilesystemStore::load(path).await,
            StorageScheme::S3 => self.s3().await?.load(path).await,
            StorageScheme::Azure => Err(StoreError::Backend(format!(
                "azure blob backend is not configured in this build: {path}"
            ))),
        }
    }

    /// Write `content` as UTF-8 at `path`, creating parent directories for
    /// local paths.
    pub async fn save(&self, content: &str, path: &str) -> Result<(), StoreError> {
        tracing::debug!(path, scheme = ?StorageScheme::of(path), size = content.len(), "saving content");
        match StorageScheme::of(path) {
            StorageScheme::Local => FilesystemStore::save(path, content).await,
            StorageScheme::S3 => self.s3().await?.save(path, content).await,
            StorageScheme::Azure => Err(StoreError::Backend(format!(
                "azure blob backend is not configured in this build: {path}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_dispatch() {
        assert_eq!(StorageScheme::of("s3://bucket/key.json"), StorageScheme::S3);
        assert_eq!(
            StorageScheme::of("azure://container/blob.json"),
            StorageScheme::Azure
        );
        assert_eq!(StorageScheme::of("data/file.json"), StorageScheme::Local);
        assert_eq!(StorageScheme::of("/abs/file.json"), StorageScheme::Local);
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("nested/out.json")
            .to_string_lossy()
            .to_string();

        let store = ContentStore::new();
        store.save("{\"ok\":true}", &path).await.unwrap();
        let bytes = store.load(&path).await.unwrap();
        assert_eq!(bytes, b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_local_missing_file_is_not_found() {
        let store = ContentStore::new();
        let err = store.load("definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_azure_reports_backend_error() {
        let store = ContentStore::new();
        let err = store.load("azure://container/blob.json").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
