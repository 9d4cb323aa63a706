//! Blob store setup

use anyhow::{Context, Result};
use mugen_core::Config;
use mugen_storage::{create_blob_store, BlobStore};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn BlobStore>> {
    tracing::info!("Initializing blob store...");
    let store = create_blob_store(config)
        .await
        .context("Failed to initialize blob store")?;
    tracing::info!(
        backend = %store.backend_type(),
        container = %config.blob_container(),
        upload_artifacts = config.upload_artifacts(),
        "Blob store initialized"
    );
    Ok(store)
}
