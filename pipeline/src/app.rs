//! Core application
//!
//! Wires one stage worker per process: queue bindings for the stage's topic
//! and its downstream topic, the object store, and the stage-specific
//! collaborators (LLM client for Enrich, vector store and registry for
//! Index). Horizontal scaling is more processes in the same consumer group.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::cli::{self, Cli};
use crate::core::config::AppConfig;
use crate::core::constants::{
    APP_NAME, ENV_EMBED_API_URL, ENV_LOG, REGISTRY_KEY_PREFIX, WORKER_NAME_PREFIX,
};
use crate::core::shutdown::ShutdownSignal;
use crate::data::queue::{MessageQueue, QueueConfig, RedisStreamQueue};
use crate::data::registry::RedisStatusRegistry;
use crate::data::store::ContentStore;
use crate::data::vector::MemoryHybridStore;
use crate::domain::TaskMessage;
use crate::embedding::{EmbeddingService, TeiEmbeddingClient};
use crate::llm::{DeepSeekClient, DeepSeekConfig};
use crate::stages::enrich::EnrichmentMaster;
use crate::stages::{
    ChunkWorker, CleanWorker, EnrichWorker, IndexWorker, Stage, run_worker,
};

pub struct CoreApp;

impl CoreApp {
    /// Run the worker process selected by the CLI
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        let cli = cli::parse();
        tracing::debug!(stage = %cli.worker_type, id = cli.id, "application starting");

        let config = AppConfig::load(&cli)?;

        let shutdown = ShutdownSignal::new();
        shutdown.listen_for_signals();

        Self::run_stage(&cli, &config, &shutdown).await
    }

    fn init_logging() {
        let default_filter = format!("info,{APP_NAME}=info");

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn run_stage(cli: &Cli, config: &AppConfig, shutdown: &ShutdownSignal) -> Result<()> {
        let stage = cli.worker_type;
        let consumer_name = format!("{WORKER_NAME_PREFIX}_{}_{}", stage.as_str(), cli.id);

        let consumer = Self::connect_queue(config, stage.topic(), stage.group(), &consumer_name)
            .await
            .context("failed to connect consumer queue")?;

        if let Some(seed) = &cli.seed {
            let message = TaskMessage::new(seed, "ingest", uuid::Uuid::new_v4().to_string());
            consumer
                .produce(&message.to_json()?)
                .await
                .context("failed to enqueue seed file")?;
            tracing::info!(file_path = %seed, topic = stage.topic(), "seed task enqueued");
        }

        let poll_interval = config.worker.poll_interval;
        match stage {
            Stage::Clean => {
                let publisher = Self::connect_downstream(config, stage, &consumer_name).await?;
                let mut worker =
                    CleanWorker::new(Box::new(consumer), publisher, ContentStore::new());
                run_worker(&mut worker, shutdown.watch(), poll_interval).await?;
            }
            Stage::Chunk => {
                let publisher = Self::connect_downstream(config, stage, &consumer_name).await?;
                let mut worker =
                    ChunkWorker::new(Box::new(consumer), publisher, ContentStore::new());
                run_worker(&mut worker, shutdown.watch(), poll_interval).await?;
            }
            Stage::Enrich => {
                let publisher = Self::connect_downstream(config, stage, &consumer_name).await?;
                let llm_config =
                    DeepSeekConfig::from_env().context("enrich worker needs LLM credentials")?;
                let llm = Arc::new(DeepSeekClient::new(llm_config)?);
                let master = EnrichmentMaster::new(llm, config.enrich.max_concurrency);
                let mut worker = EnrichWorker::new(
                    Box::new(consumer),
                    publisher,
                    ContentStore::new(),
                    master,
                );
                run_worker(&mut worker, shutdown.watch(), poll_interval).await?;
            }
            Stage::Index => {
                let embedder: Option<Arc<dyn EmbeddingService>> = if config.vector.enable_dense {
                    let url = std::env::var(ENV_EMBED_API_URL).with_context(|| {
                        format!("dense indexing needs {ENV_EMBED_API_URL} to be set")
                    })?;
                    Some(Arc::new(TeiEmbeddingClient::new(&url)?) as Arc<dyn EmbeddingService>)
                } else {
                    None
                };
                let vector = Arc::new(MemoryHybridStore::new(config.vector.clone(), embedder)?);
                let registry = Arc::new(RedisStatusRegistry::connect(
                    &Self::queue_config(config, stage.topic(), stage.group(), &consumer_name)
                        .url(),
                    REGISTRY_KEY_PREFIX,
                )?);
                let mut worker = IndexWorker::new(
                    Box::new(consumer),
                    ContentStore::new(),
                    vector,
                    registry,
                    config.index.batch_size,
                    config.index.strict_consistency,
                );
                run_worker(&mut worker, shutdown.watch(), poll_interval).await?;
            }
        }

        Ok(())
    }

    fn queue_config(config: &AppConfig, topic: &str, group: &str, consumer: &str) -> QueueConfig {
        QueueConfig {
            host: config.queue.host.clone(),
            port: config.queue.port,
            topic: topic.to_string(),
            group: group.to_string(),
            consumer_name: consumer.to_string(),
        }
    }

    async fn connect_queue(
        config: &AppConfig,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> Result<RedisStreamQueue> {
        let queue_config = Self::queue_config(config, topic, group, consumer);
        Ok(RedisStreamQueue::connect(&queue_config).await?)
    }

    async fn connect_downstream(
        config: &AppConfig,
        stage: Stage,
        consumer: &str,
    ) -> Result<Box<dyn MessageQueue>> {
        let topic = stage
            .downstream_topic()
            .expect("stage has a downstream topic");
        let queue = Self::connect_queue(config, topic, stage.group(), consumer)
            .await
            .context("failed to connect publisher queue")?;
        Ok(Box::new(queue))
    }
}
