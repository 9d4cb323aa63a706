//! Service initialization and application state setup

use anyhow::{Context, Result};
use mugen_core::{ArtifactResolver, Config, EngineKind, ReferenceComposer};
use mugen_storage::BlobStore;
use mugen_worker::{
    ArtifactProbeEngine, ArtifactPublisher, CommandEngine, GenerationEngine, GenerationQueue,
    GenerationQueueConfig, JobRegistry,
};
use std::sync::Arc;

use crate::services::{RequestLocks, UploadStager};
use crate::state::AppState;

/// Build every service and the shared state. Spawns the generation worker
/// pool, so it must run inside a Tokio runtime.
pub async fn initialize_services(
    config: &Config,
    blob_store: Option<Arc<dyn BlobStore>>,
) -> Result<Arc<AppState>> {
    for dir in [config.uploads_dir(), config.videos_dir()] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir))?;
    }

    let resolver = ArtifactResolver::new(config.videos_dir());
    let stager = UploadStager::from_config(config);

    let composer = ReferenceComposer::new(
        config.blob_base_url().map(String::from),
        config.blob_container(),
        config.blob_sas_token().map(String::from),
    );
    let publisher = ArtifactPublisher::new(blob_store, composer, config.upload_artifacts());

    let engine = create_engine(config)?;
    let registry = JobRegistry::new();
    let queue = GenerationQueue::new(
        registry.clone(),
        engine,
        publisher.clone(),
        GenerationQueueConfig::from_config(config),
    );

    tracing::info!(
        uploads_dir = %config.uploads_dir(),
        videos_dir = %config.videos_dir(),
        public_urls = publisher.composer().has_base_url(),
        upload_artifacts = publisher.uploads(),
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        resolver,
        stager,
        publisher,
        registry,
        queue,
        request_locks: RequestLocks::new(),
    }))
}

fn create_engine(config: &Config) -> Result<Arc<dyn GenerationEngine>> {
    match config.generation_engine() {
        EngineKind::Probe => Ok(Arc::new(ArtifactProbeEngine::new(
            config.generation_poll_interval(),
        ))),
        EngineKind::Command => {
            let template = config
                .generation_command()
                .ok_or_else(|| anyhow::anyhow!("GENERATION_COMMAND is not set"))?;
            let engine = CommandEngine::from_template(template)
                .context("Invalid GENERATION_COMMAND")?;
            tracing::info!(program = %engine.program(), "Command generation engine configured");
            Ok(Arc::new(engine))
        }
    }
}
