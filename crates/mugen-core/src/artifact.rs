//! Artifact resolution
//!
//! Maps a request id to the path where the generation engine is expected to
//! write its video. The mapping is a pure function of the request id and the
//! configured directory: no hashing, no namespacing.

use std::path::{Path, PathBuf};

use crate::constants::VIDEO_EXTENSION;

#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    videos_dir: String,
}

impl ArtifactResolver {
    pub fn new(videos_dir: impl Into<String>) -> Self {
        let videos_dir: String = videos_dir.into();
        Self {
            videos_dir: videos_dir.trim_end_matches('/').to_string(),
        }
    }

    pub fn videos_dir(&self) -> &Path {
        Path::new(&self.videos_dir)
    }

    /// Path of the artifact as it appears in responses, e.g.
    /// `data/generated_videos/abc123.mp4`.
    pub fn video_path(&self, request_id: &str) -> String {
        format!("{}/{}.{}", self.videos_dir, request_id, VIDEO_EXTENSION)
    }

    pub fn resolve(&self, request_id: &str) -> PathBuf {
        PathBuf::from(self.video_path(request_id))
    }
}
