use crate::names::{validate_blob_name, validate_container_name};
use crate::traits::{BlobError, BlobResult, BlobStore};
use crate::BlobBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store
///
/// Every container is a directory directly under the root and every blob is a
/// file inside it. Nested blob names map to nested directories.
#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore rooted at `root` (e.g. "data/blob_store").
    pub async fn new(root: impl Into<PathBuf>) -> BlobResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            BlobError::Config(format!(
                "Failed to create blob store directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `container` if it does not exist yet.
    pub async fn create_container(&self, container: &str) -> BlobResult<()> {
        let path = self.container_path(container)?;
        fs::create_dir_all(&path).await?;
        tracing::debug!(container = %container, path = %path.display(), "Container ready");
        Ok(())
    }

    fn container_path(&self, container: &str) -> BlobResult<PathBuf> {
        validate_container_name(container)?;
        Ok(self.root.join(container))
    }

    /// Resolve a blob path, requiring the container directory to exist.
    async fn blob_path(&self, blob_name: &str, container: &str) -> BlobResult<PathBuf> {
        validate_blob_name(blob_name)?;
        let container_path = self.container_path(container)?;

        if !is_dir(&container_path).await {
            return Err(BlobError::ContainerNotFound(container.to_string()));
        }

        Ok(container_path.join(blob_name))
    }

    fn not_found(blob_name: &str, container: &str) -> BlobError {
        BlobError::NotFound(format!("{}/{}", container, blob_name))
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload_bytes(
        &self,
        blob_name: &str,
        container: &str,
        data: Bytes,
    ) -> BlobResult<()> {
        let path = self.blob_path(blob_name, container).await?;
        let size = data.len();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            BlobError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            BlobError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            BlobError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            container = %container,
            blob = %blob_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob upload successful"
        );

        Ok(())
    }

    async fn list_containers(&self) -> BlobResult<Vec<String>> {
        let mut containers = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    containers.push(name.to_string());
                }
            }
        }

        containers.sort();
        Ok(containers)
    }

    async fn list_blobs(&self, container: &str) -> BlobResult<Vec<String>> {
        let container_path = self.container_path(container)?;
        if !is_dir(&container_path).await {
            return Err(BlobError::ContainerNotFound(container.to_string()));
        }

        let mut blobs = Vec::new();
        let mut pending = vec![container_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&container_path) {
                        let name = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        blobs.push(name);
                    }
                }
            }
        }

        blobs.sort();
        Ok(blobs)
    }

    async fn exists(&self, blob_name: &str, container: &str) -> BlobResult<bool> {
        let path = self.blob_path(blob_name, container).await?;
        Ok(fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false))
    }

    async fn read(&self, blob_name: &str, container: &str) -> BlobResult<Bytes> {
        let path = self.blob_path(blob_name, container).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Self::not_found(blob_name, container))
            }
            Err(e) => Err(BlobError::DownloadFailed(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn download(
        &self,
        blob_name: &str,
        container: &str,
        destination: &Path,
    ) -> BlobResult<u64> {
        let path = self.blob_path(blob_name, container).await?;
        if !fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(Self::not_found(blob_name, container));
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let start = std::time::Instant::now();
        let size = fs::copy(&path, destination).await.map_err(|e| {
            BlobError::DownloadFailed(format!(
                "Failed to copy {} to {}: {}",
                path.display(),
                destination.display(),
                e
            ))
        })?;

        tracing::info!(
            container = %container,
            blob = %blob_name,
            destination = %destination.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob download successful"
        );

        Ok(size)
    }

    async fn delete(&self, blob_name: &str, container: &str) -> BlobResult<()> {
        let path = self.blob_path(blob_name, container).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(container = %container, blob = %blob_name, "Local blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Self::not_found(blob_name, container))
            }
            Err(e) => Err(BlobError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn backend_type(&self) -> BlobBackend {
        BlobBackend::Local
    }
}
