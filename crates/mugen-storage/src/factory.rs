#[cfg(feature = "storage-azure")]
use crate::AzureBlobStore;
#[cfg(feature = "storage-local")]
use crate::LocalBlobStore;
use crate::{BlobBackend, BlobError, BlobResult, BlobStore};
use mugen_core::Config;
use std::sync::Arc;

/// Create a blob store backend based on configuration
pub async fn create_blob_store(config: &Config) -> BlobResult<Arc<dyn BlobStore>> {
    match config.blob_backend() {
        #[cfg(feature = "storage-azure")]
        BlobBackend::Azure => {
            let connection_string = config.blob_connection_string().ok_or_else(|| {
                BlobError::Config("BLOB_CONNECTION_STRING not configured".to_string())
            })?;

            let store = AzureBlobStore::new(connection_string)?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-azure"))]
        BlobBackend::Azure => Err(BlobError::Config(
            "Azure storage backend not available (storage-azure feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        BlobBackend::Local => {
            let store = LocalBlobStore::new(config.local_blob_path()).await?;
            store.create_container(config.blob_container()).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        BlobBackend::Local => Err(BlobError::Config(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
