pub mod request_locks;
pub mod staging;

pub use request_locks::RequestLocks;
pub use staging::{IntakeForm, UploadRole, UploadStager, UploadedFile};
