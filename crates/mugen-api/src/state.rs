//! Application state shared by every handler.

use mugen_core::{ArtifactResolver, Config};
use mugen_worker::{ArtifactPublisher, GenerationQueue, JobRegistry};

use crate::services::{RequestLocks, UploadStager};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub resolver: ArtifactResolver,
    pub stager: UploadStager,
    pub publisher: ArtifactPublisher,
    pub registry: JobRegistry,
    pub queue: GenerationQueue,
    /// Serializes intake per `request_id`.
    pub request_locks: RequestLocks,
}
