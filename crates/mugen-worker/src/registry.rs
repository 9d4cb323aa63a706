//! In-memory job registry.
//!
//! Holds every job by id plus an index of the request ids that currently have
//! a non-terminal job, so a second submission for the same request id can be
//! rejected while the first is still in flight.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use mugen_core::models::{Job, JobStatus};
use mugen_core::AppError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Request {request_id} already has an active job {job_id}")]
    DuplicateRequest { request_id: String, job_id: Uuid },

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => AppError::NotFound(format!("Job {} not found", id)),
            RegistryError::DuplicateRequest { request_id, job_id } => AppError::Conflict(format!(
                "Request {} already has an active job {}",
                request_id, job_id
            )),
            err @ RegistryError::InvalidTransition { .. } => AppError::Internal(err.to_string()),
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<Uuid, Job>,
    active: HashMap<String, Uuid>,
}

#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly submitted job.
    pub async fn register(&self, job: Job) -> Result<Job, RegistryError> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.active.get(&job.request_id) {
            return Err(RegistryError::DuplicateRequest {
                request_id: job.request_id.clone(),
                job_id: *existing,
            });
        }

        inner.active.insert(job.request_id.clone(), job.id);
        inner.jobs.insert(job.id, job.clone());

        tracing::info!(
            job_id = %job.id,
            request_id = %job.request_id,
            kind = %job.kind,
            "Job registered"
        );

        Ok(job)
    }

    pub async fn get(&self, job_id: Uuid) -> Option<Job> {
        self.inner.read().await.jobs.get(&job_id).cloned()
    }

    /// Id of the in-flight job for `request_id`, if any.
    pub async fn active_job_for(&self, request_id: &str) -> Option<Uuid> {
        self.inner.read().await.active.get(request_id).copied()
    }

    /// Jobs newest first, optionally restricted to one request id.
    pub async fn list(&self, request_id: Option<&str>) -> Vec<Job> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|job| request_id.is_none_or(|rid| job.request_id == rid))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub async fn transition(&self, job_id: Uuid, next: JobStatus) -> Result<Job, RegistryError> {
        self.update(job_id, next, |_| {}).await
    }

    pub async fn mark_succeeded(
        &self,
        job_id: Uuid,
        blob_path: String,
    ) -> Result<Job, RegistryError> {
        self.update(job_id, JobStatus::Succeeded, move |job| {
            job.blob_path = Some(blob_path);
        })
        .await
    }

    pub async fn mark_failed(&self, job_id: Uuid, error: String) -> Result<Job, RegistryError> {
        self.update(job_id, JobStatus::Failed, move |job| {
            job.error = Some(error);
        })
        .await
    }

    async fn update<F>(&self, job_id: Uuid, next: JobStatus, apply: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job),
    {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(RegistryError::NotFound(job_id))?;

        if !job.status.can_transition_to(next) {
            return Err(RegistryError::InvalidTransition {
                job_id,
                from: job.status,
                to: next,
            });
        }

        let now = Utc::now();
        job.status = next;
        job.updated_at = now;
        if next == JobStatus::Running {
            job.started_at = Some(now);
        }
        if next.is_terminal() {
            job.finished_at = Some(now);
        }
        apply(job);

        let job = job.clone();
        if next.is_terminal() && inner.active.get(&job.request_id) == Some(&job.id) {
            inner.active.remove(&job.request_id);
        }

        tracing::debug!(
            job_id = %job.id,
            request_id = %job.request_id,
            status = %job.status,
            "Job status updated"
        );

        Ok(job)
    }

    /// Drop terminal jobs that finished more than `retention` ago.
    pub async fn prune_finished(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(1));

        let mut inner = self.inner.write().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.finished_at.is_some_and(|at| at <= cutoff))
        });
        let pruned = before - inner.jobs.len();

        if pruned > 0 {
            tracing::info!(pruned, remaining = inner.jobs.len(), "Pruned finished jobs");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mugen_core::models::{GenerationInputs, GenerationKind, GenerationRequest};

    fn job(request_id: &str) -> Job {
        Job::new(
            GenerationRequest {
                request_id: request_id.to_string(),
                prompt: None,
                resolution: None,
            },
            GenerationKind::ImageToVideo,
            GenerationInputs::default(),
            "1280*720",
            format!("data/generated_videos/{}.mp4", request_id),
        )
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = JobRegistry::new();
        let registered = registry.register(job("abc")).await.unwrap();

        let fetched = registry.get(registered.id).await.unwrap();
        assert_eq!(fetched.request_id, "abc");
        assert_eq!(registry.active_job_for("abc").await, Some(registered.id));
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_request_is_rejected() {
        let registry = JobRegistry::new();
        registry.register(job("abc")).await.unwrap();

        let err = registry.register(job("abc")).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRequest { .. }));
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_terminal_job_releases_request_id() {
        let registry = JobRegistry::new();
        let first = registry.register(job("abc")).await.unwrap();
        registry.mark_failed(first.id, "boom".to_string()).await.unwrap();

        assert_eq!(registry.active_job_for("abc").await, None);
        assert!(registry.register(job("abc")).await.is_ok());
    }

    #[tokio::test]
    async fn test_full_lifecycle_sets_timestamps() {
        let registry = JobRegistry::new();
        let job = registry.register(job("abc")).await.unwrap();

        registry.transition(job.id, JobStatus::Queued).await.unwrap();
        let running = registry.transition(job.id, JobStatus::Running).await.unwrap();
        assert!(running.started_at.is_some());

        let done = registry
            .mark_succeeded(job.id, "https://x/mugenverse/v.mp4".to_string())
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert!(done.finished_at.is_some());
        assert_eq!(done.blob_path.as_deref(), Some("https://x/mugenverse/v.mp4"));
    }

    #[tokio::test]
    async fn test_invalid_transition_is_rejected() {
        let registry = JobRegistry::new();
        let job = registry.register(job("abc")).await.unwrap();

        let err = registry
            .mark_succeeded(job.id, "x".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));
        assert_eq!(registry.get(job.id).await.unwrap().status, JobStatus::Submitted);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let registry = JobRegistry::new();
        let a = registry.register(job("a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = registry.register(job("b")).await.unwrap();

        let all = registry.list(None).await;
        assert_eq!(all.iter().map(|j| j.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let only_a = registry.list(Some("a")).await;
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, a.id);
    }

    #[tokio::test]
    async fn test_prune_keeps_live_jobs() {
        let registry = JobRegistry::new();
        let live = registry.register(job("live")).await.unwrap();
        let done = registry.register(job("done")).await.unwrap();
        registry.mark_failed(done.id, "x".to_string()).await.unwrap();

        let pruned = registry.prune_finished(Duration::ZERO).await;

        assert_eq!(pruned, 1);
        assert!(registry.get(live.id).await.is_some());
        assert!(registry.get(done.id).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = JobRegistry::new();
        let err = registry
            .transition(Uuid::new_v4(), JobStatus::Queued)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }
}
