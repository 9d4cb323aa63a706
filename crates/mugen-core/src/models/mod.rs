pub mod generation;
pub mod job;

pub use generation::{GenerationInputs, GenerationKind, GenerationRequest, IntakeResponse};
pub use job::{Job, JobStatus};
