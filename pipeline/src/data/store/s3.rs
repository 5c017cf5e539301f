//! S3 backend
//!
//! Credentials and region come from the ambient AWS configuration. An
//! optional custom endpoint (`RAGMILL_S3_ENDPOINT`) enables S3-compatible
//! services; path-style addressing is forced in that case.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use super::error::StoreError;

/// Environment variable for an S3-compatible endpoint override
const ENV_S3_ENDPOINT: &str = "RAGMILL_S3_ENDPOINT";

pub struct S3ContentStore {
    client: Client,
}

impl S3ContentStore {
    /// Build a client from the ambient AWS configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&config);
        if let Ok(endpoint) = std::env::var(ENV_S3_ENDPOINT) {
            // Path-style addressing is required for most S3-compatible services.
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(s3_config.build());
        tracing::debug!("s3 content store initialized");
        Ok(Self { client })
    }

    pub async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let (bucket, key) = split_uri(path)?;

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StoreError::NotFound {
                        path: path.to_string(),
                    }
                } else {
                    StoreError::Backend(format!("s3 get_object error: {service_err}"))
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("s3 body read error: {e}")))?;

        Ok(bytes.into_bytes().to_vec())
    }

    pub async fn save(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let (bucket, key) = split_uri(path)?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(content.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("s3 put_object error: {e}")))?;

        tracing::debug!(path, size = content.len(), "s3 object written");
        Ok(())
    }
}

/// Split `s3://bucket/key` into `(bucket, key)`
fn split_uri(path: &str) -> Result<(&str, &str), StoreError> {
    let rest = path
        .strip_prefix("s3://")
        .ok_or_else(|| StoreError::Backend(format!("not an s3 uri: {path}")))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(StoreError::Backend(format!(
            "s3 uri must be s3://bucket/key: {path}"
        ))),
    }
}
