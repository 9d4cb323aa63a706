//! Blob store abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must implement.

use crate::BlobBackend;
use async_trait::async_trait;
use bytes::Bytes;
use mugen_core::AppError;
use std::path::Path;
use thiserror::Error;

/// Blob store operation errors
///
/// Listing an empty container is `Ok(vec![])`. A missing container is
/// `ContainerNotFound` and an unreachable account is `Backend`, so callers can
/// always tell the three apart.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for blob store operations
pub type BlobResult<T> = Result<T, BlobError>;

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(msg) => AppError::NotFound(format!("Blob not found: {}", msg)),
            BlobError::ContainerNotFound(msg) => {
                AppError::NotFound(format!("Container not found: {}", msg))
            }
            BlobError::InvalidName(msg) => AppError::InvalidInput(msg),
            BlobError::UploadFailed(msg)
            | BlobError::DownloadFailed(msg)
            | BlobError::DeleteFailed(msg)
            | BlobError::Backend(msg) => AppError::Storage(msg),
            BlobError::Io(err) => AppError::Internal(format!("IO error: {}", err)),
            BlobError::Config(msg) => AppError::Internal(msg),
        }
    }
}

/// Blob store abstraction trait
///
/// Implementations hold no per-request state and are shared behind an `Arc`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` as `blob_name` in `container`, overwriting any existing blob.
    async fn upload_bytes(&self, blob_name: &str, container: &str, data: Bytes)
        -> BlobResult<()>;

    /// Upload a local file, overwriting any existing blob. Returns the size in bytes.
    async fn upload_file(
        &self,
        local_path: &Path,
        blob_name: &str,
        container: &str,
    ) -> BlobResult<u64> {
        let data = tokio::fs::read(local_path).await.map_err(|e| {
            BlobError::UploadFailed(format!(
                "Failed to read {}: {}",
                local_path.display(),
                e
            ))
        })?;
        let size = data.len() as u64;
        self.upload_bytes(blob_name, container, Bytes::from(data))
            .await?;
        Ok(size)
    }

    /// Names of all containers in the account, sorted.
    async fn list_containers(&self) -> BlobResult<Vec<String>>;

    /// Names of all blobs in `container`, sorted.
    async fn list_blobs(&self, container: &str) -> BlobResult<Vec<String>>;

    /// Check if a blob exists
    async fn exists(&self, blob_name: &str, container: &str) -> BlobResult<bool>;

    /// Read a whole blob into memory
    async fn read(&self, blob_name: &str, container: &str) -> BlobResult<Bytes>;

    /// Download a blob to `destination`, creating parent directories.
    /// Returns the number of bytes written.
    async fn download(
        &self,
        blob_name: &str,
        container: &str,
        destination: &Path,
    ) -> BlobResult<u64>;

    /// Delete a blob. Missing blobs are reported as `NotFound`.
    async fn delete(&self, blob_name: &str, container: &str) -> BlobResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> BlobBackend;
}
