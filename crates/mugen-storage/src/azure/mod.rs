//! Azure Blob Storage backend
//!
//! Data operations go through `object_store`'s Azure client, built for the
//! target container on every call. Listings use the Blob REST API directly
//! (see [`rest`]) so a missing container is reported as such.

mod connection_string;
mod rest;

pub use connection_string::AzureConnectionString;

use crate::names::{validate_blob_name, validate_container_name};
use crate::traits::{BlobError, BlobResult, BlobStore};
use crate::BlobBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::azure::{AzureConfigKey, MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use rest::ListingClient;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Azure Blob Storage implementation
#[derive(Clone)]
pub struct AzureBlobStore {
    connection: AzureConnectionString,
    listing: ListingClient,
}

impl AzureBlobStore {
    /// Create a new AzureBlobStore from a storage account connection string.
    pub fn new(connection_string: &str) -> BlobResult<Self> {
        let connection = AzureConnectionString::parse(connection_string)?;
        let listing = ListingClient::new(connection.clone())?;

        tracing::info!(
            account = %connection.account_name,
            endpoint = %connection.blob_endpoint,
            emulator = connection.use_emulator,
            "Azure blob store configured"
        );

        Ok(AzureBlobStore {
            connection,
            listing,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.connection.account_name
    }

    /// Build a client scoped to `container`.
    fn container_store(&self, container: &str) -> BlobResult<MicrosoftAzure> {
        validate_container_name(container)?;

        let conn = &self.connection;
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(conn.account_name.clone())
            .with_container_name(container.to_string());

        if conn.use_emulator {
            builder = builder.with_use_emulator(true);
        } else if conn.custom_endpoint {
            builder = builder
                .with_endpoint(conn.blob_endpoint.clone())
                .with_allow_http(conn.allows_http());
        }

        if let Some(sas) = &conn.sas_token {
            builder = builder.with_config(AzureConfigKey::SasKey, sas.clone());
        } else if let Some(key) = &conn.account_key {
            builder = builder.with_access_key(key.clone());
        }

        builder
            .build()
            .map_err(|e| BlobError::Config(format!("Failed to build Azure client: {}", e)))
    }

    fn location(blob_name: &str) -> BlobResult<ObjectPath> {
        validate_blob_name(blob_name)?;
        Ok(ObjectPath::from(blob_name.to_string()))
    }

    fn not_found(blob_name: &str, container: &str) -> BlobError {
        BlobError::NotFound(format!("{}/{}", container, blob_name))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload_bytes(
        &self,
        blob_name: &str,
        container: &str,
        data: Bytes,
    ) -> BlobResult<()> {
        let store = self.container_store(container)?;
        let location = Self::location(blob_name)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                container = %container,
                blob = %blob_name,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Azure upload failed"
            );
            match e {
                ObjectStoreError::NotFound { .. } => {
                    BlobError::ContainerNotFound(container.to_string())
                }
                other => BlobError::UploadFailed(other.to_string()),
            }
        })?;

        tracing::info!(
            container = %container,
            blob = %blob_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure upload successful"
        );

        Ok(())
    }

    async fn list_containers(&self) -> BlobResult<Vec<String>> {
        self.listing.list_containers().await
    }

    async fn list_blobs(&self, container: &str) -> BlobResult<Vec<String>> {
        validate_container_name(container)?;
        self.listing.list_blobs(container).await
    }

    async fn exists(&self, blob_name: &str, container: &str) -> BlobResult<bool> {
        let store = self.container_store(container)?;
        let location = Self::location(blob_name)?;

        let result: ObjectResult<_> = store.head(&location).await;
        match result {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(BlobError::Backend(e.to_string())),
        }
    }

    async fn read(&self, blob_name: &str, container: &str) -> BlobResult<Bytes> {
        let store = self.container_store(container)?;
        let location = Self::location(blob_name)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => Self::not_found(blob_name, container),
            other => BlobError::DownloadFailed(other.to_string()),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| BlobError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            container = %container,
            blob = %blob_name,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure read successful"
        );

        Ok(bytes)
    }

    async fn download(
        &self,
        blob_name: &str,
        container: &str,
        destination: &Path,
    ) -> BlobResult<u64> {
        let store = self.container_store(container)?;
        let location = Self::location(blob_name)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => Self::not_found(blob_name, container),
            other => {
                tracing::error!(
                    error = %other,
                    container = %container,
                    blob = %blob_name,
                    "Azure download failed"
                );
                BlobError::DownloadFailed(other.to_string())
            }
        })?;

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = result.into_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BlobError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;

        tracing::info!(
            container = %container,
            blob = %blob_name,
            destination = %destination.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure download successful"
        );

        Ok(written)
    }

    async fn delete(&self, blob_name: &str, container: &str) -> BlobResult<()> {
        if !self.exists(blob_name, container).await? {
            return Err(Self::not_found(blob_name, container));
        }

        let store = self.container_store(container)?;
        let location = Self::location(blob_name)?;

        let result: ObjectResult<_> = store.delete(&location).await;
        result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => Self::not_found(blob_name, container),
            other => {
                tracing::error!(
                    error = %other,
                    container = %container,
                    blob = %blob_name,
                    "Azure delete failed"
                );
                BlobError::DeleteFailed(other.to_string())
            }
        })?;

        tracing::info!(container = %container, blob = %blob_name, "Azure blob deleted");
        Ok(())
    }

    fn backend_type(&self) -> BlobBackend {
        BlobBackend::Azure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str = "DefaultEndpointsProtocol=https;AccountName=mugen;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net";

    #[test]
    fn test_new_parses_connection_string() {
        let store = AzureBlobStore::new(CONN).unwrap();
        assert_eq!(store.account_name(), "mugen");
        assert_eq!(store.backend_type(), BlobBackend::Azure);
    }

    #[test]
    fn test_container_store_rejects_invalid_container() {
        let store = AzureBlobStore::new(CONN).unwrap();
        assert!(matches!(
            store.container_store("Not_Valid"),
            Err(BlobError::InvalidName(_))
        ));
        assert!(store.container_store("mugenverse").is_ok());
    }

    #[test]
    fn test_location_rejects_traversal() {
        assert!(AzureBlobStore::location("../x.mp4").is_err());
        assert!(AzureBlobStore::location("data/generated_videos/x.mp4").is_ok());
    }
}
