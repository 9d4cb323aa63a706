use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::generation::{GenerationInputs, GenerationKind, GenerationRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Forward-only lifecycle: `submitted -> queued -> running -> succeeded | failed`.
    /// Any non-terminal job may fail.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Submitted, JobStatus::Queued) => true,
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Succeeded) => true,
            (current, JobStatus::Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(JobStatus::Submitted),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// A generation job tracked from submission until its artifact is ready.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub request_id: String,
    pub kind: GenerationKind,
    pub status: JobStatus,
    pub inputs: GenerationInputs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub resolution: String,
    /// Where the engine is expected to write the video.
    pub video_path: String,
    /// Reference to the finished artifact, set once the job succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        request: GenerationRequest,
        kind: GenerationKind,
        inputs: GenerationInputs,
        default_resolution: &str,
        video_path: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            request_id: request.request_id,
            kind,
            status: JobStatus::Submitted,
            inputs,
            prompt: request.prompt,
            resolution: request
                .resolution
                .unwrap_or_else(|| default_resolution.to_string()),
            video_path,
            blob_path: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }
}
