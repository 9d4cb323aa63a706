//! Generation worker
//!
//! Accepted jobs are recorded in a [`JobRegistry`], pushed onto a bounded
//! [`GenerationQueue`] and run by a small worker pool against a
//! [`GenerationEngine`]. On success the artifact is optionally published to the
//! blob store and the job carries the resulting reference.

pub mod engine;
pub mod publisher;
pub mod queue;
pub mod registry;

pub use engine::{
    artifact_ready, ArtifactProbeEngine, CommandEngine, EngineError, GenerationEngine,
    GenerationTask,
};
pub use publisher::ArtifactPublisher;
pub use queue::{GenerationQueue, GenerationQueueConfig};
pub use registry::{JobRegistry, RegistryError};
