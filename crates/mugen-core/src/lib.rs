//! Mugen Core Library
//!
//! This crate provides the domain models, error types, configuration and request
//! validation shared by every Mugen component.

pub mod artifact;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod reference;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use artifact::ArtifactResolver;
pub use config::{Config, EngineKind, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use reference::{ReferenceComposer, ReferenceStyle};
pub use storage_types::BlobBackend;
