//! Application configuration
//!
//! Layered the usual way: JSON config file, then environment, then CLI
//! flags. Every section has workable defaults for a localhost deployment;
//! external-service settings (vector store, embedding, LLM key) are
//! validated at worker init, not here, so only the stage that needs them
//! pays for them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::Cli;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT,
    ENV_VECTOR_SERVER_URL,
};
use crate::data::vector::VectorStoreConfig;
use crate::stages::enrich::master::DEFAULT_MAX_CONCURRENCY;
use crate::stages::index::DEFAULT_BATCH_SIZE;

// =============================================================================
// File config (all fields optional)
// =============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct FileConfig {
    queue: QueueFileConfig,
    worker: WorkerFileConfig,
    enrich: EnrichFileConfig,
    index: IndexFileConfig,
    vector: Option<VectorStoreConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct QueueFileConfig {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct WorkerFileConfig {
    poll_interval_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct EnrichFileConfig {
    max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct IndexFileConfig {
    batch_size: Option<usize>,
    strict_consistency: Option<bool>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

// =============================================================================
// Resolved config
// =============================================================================

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub max_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub batch_size: usize,
    pub strict_consistency: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub queue: QueueSettings,
    pub worker: WorkerSettings,
    pub enrich: EnrichSettings,
    pub index: IndexSettings,
    pub vector: VectorStoreConfig,
}

impl AppConfig {
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match Self::config_path(cli) {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(file, cli))
    }

    fn config_path(cli: &Cli) -> Option<PathBuf> {
        if let Some(path) = &cli.config {
            return Some(path.clone());
        }
        let default = PathBuf::from(CONFIG_FILE_NAME);
        default.exists().then_some(default)
    }

    fn merge(file: FileConfig, cli: &Cli) -> Self {
        let mut vector = file.vector.unwrap_or_default();
        if let Ok(url) = std::env::var(ENV_VECTOR_SERVER_URL)
            && !url.is_empty()
        {
            vector.uri = url;
        }

        Self {
            queue: QueueSettings {
                host: cli
                    .redis_host
                    .clone()
                    .or(file.queue.host)
                    .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string()),
                port: cli
                    .redis_port
                    .or(file.queue.port)
                    .unwrap_or(DEFAULT_REDIS_PORT),
            },
            worker: WorkerSettings {
                poll_interval: Duration::from_secs_f64(
                    file.worker
                        .poll_interval_secs
                        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                        .max(0.0),
                ),
            },
            enrich: EnrichSettings {
                max_concurrency: file
                    .enrich
                    .max_concurrency
                    .unwrap_or(DEFAULT_MAX_CONCURRENCY)
                    .max(1),
            },
            index: IndexSettings {
                batch_size: file.index.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
                strict_consistency: file.index.strict_consistency.unwrap_or(true),
            },
            vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["ragmill", "--type", "chunk"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::merge(FileConfig::default(), &cli(&[]));
        assert_eq!(config.queue.host, "localhost");
        assert_eq!(config.queue.port, 6379);
        assert_eq!(config.worker.poll_interval, Duration::from_secs(1));
        assert_eq!(config.enrich.max_concurrency, 5);
        assert_eq!(config.index.batch_size, 50);
        assert!(config.index.strict_consistency);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{"queue": {"host": "redis.internal", "port": 6380}}"#,
        )
        .unwrap();
        let config = AppConfig::merge(file, &cli(&["--redis-host", "cli-host"]));
        assert_eq!(config.queue.host, "cli-host");
        assert_eq!(config.queue.port, 6380);
    }

    #[test]
    fn test_file_sections_apply() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "worker": {"poll_interval_secs": 0.25},
                "enrich": {"max_concurrency": 8},
                "index": {"batch_size": 10, "strict_consistency": false},
                "vector": {"uri": "http://milvus:19530", "enable_dense": false}
            }"#,
        )
        .unwrap();
        let config = AppConfig::merge(file, &cli(&[]));
        assert_eq!(config.worker.poll_interval, Duration::from_millis(250));
        assert_eq!(config.enrich.max_concurrency, 8);
        assert_eq!(config.index.batch_size, 10);
        assert!(!config.index.strict_consistency);
        assert_eq!(config.vector.uri, "http://milvus:19530");
        assert!(!config.vector.enable_dense);
    }
}
