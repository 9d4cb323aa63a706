use std::path::Path;
use std::sync::Arc;

use mugen_core::{ReferenceComposer, ReferenceStyle};
use mugen_storage::{BlobResult, BlobStore};

/// Turns a finished artifact into the reference handed back to callers,
/// uploading it first when artifact uploads are enabled.
#[derive(Clone)]
pub struct ArtifactPublisher {
    blob_store: Option<Arc<dyn BlobStore>>,
    composer: ReferenceComposer,
    upload_artifacts: bool,
}

impl ArtifactPublisher {
    pub fn new(
        blob_store: Option<Arc<dyn BlobStore>>,
        composer: ReferenceComposer,
        upload_artifacts: bool,
    ) -> Self {
        Self {
            blob_store,
            composer,
            upload_artifacts,
        }
    }

    pub fn composer(&self) -> &ReferenceComposer {
        &self.composer
    }

    /// True when `publish` will copy the artifact into the blob store.
    pub fn uploads(&self) -> bool {
        self.upload_artifacts && self.blob_store.is_some()
    }

    /// Upload `video_path` (if enabled) under the same relative name and
    /// compose its reference.
    pub async fn publish(&self, video_path: &str, style: ReferenceStyle) -> BlobResult<String> {
        if let Some(store) = self.blob_store.as_ref().filter(|_| self.upload_artifacts) {
            let blob_name = video_path.trim_start_matches('/');
            let size = store
                .upload_file(Path::new(video_path), blob_name, self.composer.container())
                .await?;
            tracing::info!(
                blob = %blob_name,
                container = %self.composer.container(),
                backend = %store.backend_type(),
                size_bytes = size,
                "Artifact published"
            );
        }

        let reference = self.composer.compose(style, video_path);
        if style == ReferenceStyle::PublicUrl && !self.composer.has_base_url() {
            tracing::warn!(
                video_path = %video_path,
                "No blob base URL configured, returning the local artifact path"
            );
        }
        Ok(reference)
    }
}
