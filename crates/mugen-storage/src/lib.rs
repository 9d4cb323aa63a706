//! Mugen Storage Library
//!
//! Blob store abstraction used to publish generated videos and to inspect the
//! remote account from the operator CLI. Backends: Azure Blob Storage and a
//! local directory tree.
//!
//! # Naming
//!
//! Every operation addresses a blob by `(container, blob_name)`. Container
//! names follow the Azure rules (3-63 lowercase letters, digits and single
//! hyphens). Blob names may contain `/` but must not start with one or contain
//! a `..` segment. Validation lives in the `names` module so all backends agree.

#[cfg(feature = "storage-azure")]
pub mod azure;
pub mod factory;
pub(crate) mod names;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-azure")]
pub use azure::{AzureBlobStore, AzureConnectionString};
pub use factory::create_blob_store;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
pub use mugen_core::BlobBackend;
pub use traits::{BlobError, BlobResult, BlobStore};
