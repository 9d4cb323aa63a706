//! Generation queue: bounded submission channel, worker pool and job reaper.
//!
//! Shutdown: [`GenerationQueue::shutdown`] stops the pool from taking new jobs.
//! Jobs already handed to a worker keep running until they finish or time out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use mugen_core::models::{Job, JobStatus};
use mugen_core::{AppError, Config, ReferenceStyle};

use crate::engine::{artifact_ready, EngineError, GenerationEngine, GenerationTask};
use crate::publisher::ArtifactPublisher;
use crate::registry::JobRegistry;

#[derive(Debug, Clone)]
pub struct GenerationQueueConfig {
    pub queue_size: usize,
    pub max_concurrent: usize,
    /// Upper bound for one engine run.
    pub timeout: Duration,
    /// Zero disables the reaper.
    pub reap_interval: Duration,
    pub retention: Duration,
}

impl Default for GenerationQueueConfig {
    fn default() -> Self {
        Self {
            queue_size: 100,
            max_concurrent: 1,
            timeout: Duration::from_secs(1800),
            reap_interval: Duration::from_secs(300),
            retention: Duration::from_secs(86_400),
        }
    }
}

impl GenerationQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_size: config.generation_queue_size(),
            max_concurrent: config.generation_max_concurrent(),
            timeout: config.generation_timeout(),
            reap_interval: config.job_reap_interval(),
            retention: config.job_retention(),
        }
    }
}

/// Shared by every spawned job.
struct WorkerContext {
    registry: JobRegistry,
    engine: Arc<dyn GenerationEngine>,
    publisher: ArtifactPublisher,
    timeout: Duration,
}

#[derive(Clone)]
pub struct GenerationQueue {
    tx: mpsc::Sender<Uuid>,
    shutdown_tx: mpsc::Sender<()>,
    registry: JobRegistry,
}

impl GenerationQueue {
    /// Create the queue and spawn its worker pool. Must be called from within
    /// a Tokio runtime.
    pub fn new(
        registry: JobRegistry,
        engine: Arc<dyn GenerationEngine>,
        publisher: ArtifactPublisher,
        config: GenerationQueueConfig,
    ) -> Self {
        let queue_size = config.queue_size.max(1);
        let max_concurrent = config.max_concurrent.max(1);
        let (tx, rx) = mpsc::channel(queue_size);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = max_concurrent,
            engine = engine.name(),
            timeout_secs = config.timeout.as_secs(),
            uploads = publisher.uploads(),
            "Generation queue initialized"
        );

        let context = Arc::new(WorkerContext {
            registry: registry.clone(),
            engine,
            publisher,
            timeout: config.timeout,
        });

        tokio::spawn(Self::worker_pool(
            rx,
            shutdown_rx,
            context,
            max_concurrent,
            config.reap_interval,
            config.retention,
        ));

        Self {
            tx,
            shutdown_tx,
            registry,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Move a registered job to `queued` and hand it to the pool.
    ///
    /// When the channel is full the job is marked failed and `QueueFull` is
    /// returned; the caller's request id is free again immediately.
    #[tracing::instrument(skip(self), fields(job.id = %job_id))]
    pub async fn submit(&self, job_id: Uuid) -> Result<Job, AppError> {
        let job = self.registry.transition(job_id, JobStatus::Queued).await?;

        match self.tx.try_send(job_id) {
            Ok(()) => {
                tracing::info!(request_id = %job.request_id, "Generation job enqueued");
                Ok(job)
            }
            Err(e) => {
                let message = match e {
                    TrySendError::Full(_) => {
                        tracing::warn!("Generation queue is full, rejecting job");
                        "Generation queue is full, please try again later"
                    }
                    TrySendError::Closed(_) => {
                        tracing::error!("Generation queue is closed, rejecting job");
                        "Generation queue is not accepting jobs"
                    }
                };
                if let Err(mark_err) = self
                    .registry
                    .mark_failed(job_id, message.to_string())
                    .await
                {
                    tracing::error!(error = %mark_err, "Failed to mark rejected job as failed");
                }
                Err(AppError::QueueFull)
            }
        }
    }

    /// Stop taking new jobs from the channel.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating generation queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<Uuid>,
        mut shutdown_rx: mpsc::Receiver<()>,
        context: Arc<WorkerContext>,
        max_concurrent: usize,
        reap_interval: Duration,
        retention: Duration,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if !reap_interval.is_zero() {
            let registry = context.registry.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(reap_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            registry.prune_finished(retention).await;
                        }
                        _ = reaper_shutdown_rx.recv() => break,
                    }
                }
            });
        }

        loop {
            let job_id = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Generation queue worker pool shutting down");
                    break;
                }
                next = rx.recv() => match next {
                    Some(job_id) => job_id,
                    None => break,
                },
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let context = context.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::process_job(job_id, context).await;
            });
        }

        let _ = reaper_shutdown_tx.send(()).await;
        tracing::info!("Generation queue worker pool stopped");
    }

    #[tracing::instrument(skip(context), fields(job.id = %job_id, job.status = tracing::field::Empty))]
    async fn process_job(job_id: Uuid, context: Arc<WorkerContext>) {
        let start = std::time::Instant::now();

        let job = match context.registry.transition(job_id, JobStatus::Running).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, "Could not start generation job");
                return;
            }
        };

        tracing::info!(
            request_id = %job.request_id,
            kind = %job.kind,
            engine = context.engine.name(),
            "Starting generation job"
        );

        let result = Self::run(&job, &context).await;
        let elapsed = start.elapsed();

        let update = match result {
            Ok(blob_path) => {
                tracing::Span::current().record("job.status", "succeeded");
                tracing::info!(
                    request_id = %job.request_id,
                    blob_path = %blob_path,
                    duration_ms = elapsed.as_millis(),
                    "Generation job succeeded"
                );
                context.registry.mark_succeeded(job_id, blob_path).await
            }
            Err(message) => {
                tracing::Span::current().record("job.status", "failed");
                tracing::error!(
                    request_id = %job.request_id,
                    error = %message,
                    duration_ms = elapsed.as_millis(),
                    "Generation job failed"
                );
                context.registry.mark_failed(job_id, message).await
            }
        };

        if let Err(e) = update {
            tracing::error!(error = %e, "Failed to record generation job outcome");
        }
    }

    /// Engine run, artifact check and publication. Returns the reference or a
    /// failure message for the job record.
    async fn run(job: &Job, context: &WorkerContext) -> Result<String, String> {
        let task = GenerationTask::from_job(job);

        tokio::time::timeout(context.timeout, context.engine.generate(&task))
            .await
            .map_err(|_| EngineError::Timeout(context.timeout))
            .and_then(|result| result)
            .map_err(|e| e.to_string())?;

        let exists = artifact_ready(&task.output_path).await.unwrap_or(false);
        if !exists {
            return Err(EngineError::MissingArtifact(task.output_path).to_string());
        }

        context
            .publisher
            .publish(&job.video_path, ReferenceStyle::PublicUrl)
            .await
            .map_err(|e| format!("Failed to publish artifact: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mugen_core::models::{GenerationInputs, GenerationKind, GenerationRequest};
    use mugen_core::ReferenceComposer;
    use mugen_storage::{BlobStore, LocalBlobStore};
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes the artifact after an optional delay, or fails.
    struct FakeEngine {
        delay: Duration,
        write: bool,
        fail: bool,
    }

    #[async_trait]
    impl GenerationEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn generate(&self, task: &GenerationTask) -> Result<(), EngineError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(EngineError::Failed {
                    code: Some(1),
                    stderr: "out of memory".to_string(),
                });
            }
            if self.write {
                tokio::fs::write(&task.output_path, b"video").await?;
            }
            Ok(())
        }
    }

    fn engine(delay_ms: u64, write: bool, fail: bool) -> Arc<dyn GenerationEngine> {
        Arc::new(FakeEngine {
            delay: Duration::from_millis(delay_ms),
            write,
            fail,
        })
    }

    fn publisher(store: Option<Arc<dyn BlobStore>>) -> ArtifactPublisher {
        ArtifactPublisher::new(
            store,
            ReferenceComposer::new(
                Some("https://acct.blob.core.windows.net".to_string()),
                "mugenverse",
                None,
            ),
            true,
        )
    }

    fn config(timeout: Duration, queue_size: usize) -> GenerationQueueConfig {
        GenerationQueueConfig {
            queue_size,
            max_concurrent: 1,
            timeout,
            reap_interval: Duration::ZERO,
            retention: Duration::from_secs(60),
        }
    }

    async fn register(registry: &JobRegistry, dir: &Path, request_id: &str) -> Job {
        let job = Job::new(
            GenerationRequest {
                request_id: request_id.to_string(),
                prompt: Some("waves".to_string()),
                resolution: None,
            },
            GenerationKind::ImageToVideo,
            GenerationInputs {
                image: Some(format!("{}_image.png", request_id)),
                ..Default::default()
            },
            "1280*720",
            dir.join(format!("{}.mp4", request_id))
                .to_string_lossy()
                .to_string(),
        );
        registry.register(job).await.unwrap()
    }

    async fn wait_terminal(registry: &JobRegistry, job_id: Uuid) -> Job {
        for _ in 0..500 {
            let job = registry.get(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    #[tokio::test]
    async fn test_job_succeeds_with_public_reference() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            engine(0, true, false),
            publisher(None),
            config(Duration::from_secs(5), 10),
        );

        let job = register(&registry, dir.path(), "req-ok").await;
        let queued = queue.submit(job.id).await.unwrap();
        assert_eq!(queued.status, JobStatus::Queued);

        let done = wait_terminal(&registry, job.id).await;
        assert_eq!(done.status, JobStatus::Succeeded);
        let blob_path = done.blob_path.unwrap();
        assert!(blob_path.starts_with("https://acct.blob.core.windows.net/mugenverse/"));
        assert!(blob_path.ends_with("req-ok.mp4"));
        assert!(done.started_at.is_some());
    }

    #[tokio::test]
    async fn test_job_uploads_artifact_when_enabled() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs")).await.unwrap();
        store.create_container("mugenverse").await.unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(store);

        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            engine(0, true, false),
            publisher(Some(store.clone())),
            config(Duration::from_secs(5), 10),
        );

        let job = register(&registry, dir.path(), "req-up").await;
        queue.submit(job.id).await.unwrap();
        let done = wait_terminal(&registry, job.id).await;

        assert_eq!(done.status, JobStatus::Succeeded);
        let blob_name = done.video_path.trim_start_matches('/');
        assert!(store.exists(blob_name, "mugenverse").await.unwrap());
    }

    #[tokio::test]
    async fn test_engine_failure_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            engine(0, false, true),
            publisher(None),
            config(Duration::from_secs(5), 10),
        );

        let job = register(&registry, dir.path(), "req-fail").await;
        queue.submit(job.id).await.unwrap();
        let done = wait_terminal(&registry, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("out of memory"));
        assert!(done.blob_path.is_none());
        assert_eq!(registry.active_job_for("req-fail").await, None);
    }

    #[tokio::test]
    async fn test_missing_artifact_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            engine(0, false, false),
            publisher(None),
            config(Duration::from_secs(5), 10),
        );

        let job = register(&registry, dir.path(), "req-none").await;
        queue.submit(job.id).await.unwrap();
        let done = wait_terminal(&registry, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("missing"));
    }

    /// Leaves a directory where the video should be.
    struct DirectoryEngine;

    #[async_trait]
    impl GenerationEngine for DirectoryEngine {
        fn name(&self) -> &'static str {
            "directory"
        }

        async fn generate(&self, task: &GenerationTask) -> Result<(), EngineError> {
            tokio::fs::create_dir_all(&task.output_path).await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_directory_artifact_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            Arc::new(DirectoryEngine),
            publisher(None),
            config(Duration::from_secs(5), 10),
        );

        let job = register(&registry, dir.path(), "req-dir").await;
        queue.submit(job.id).await.unwrap();
        let done = wait_terminal(&registry, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("missing"));
        assert!(done.blob_path.is_none());
    }

    #[tokio::test]
    async fn test_timeout_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            engine(2_000, true, false),
            publisher(None),
            config(Duration::from_millis(50), 10),
        );

        let job = register(&registry, dir.path(), "req-slow").await;
        queue.submit(job.id).await.unwrap();
        let done = wait_terminal(&registry, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_fails_job() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let queue = GenerationQueue::new(
            registry.clone(),
            engine(1_000, true, false),
            publisher(None),
            config(Duration::from_secs(5), 1),
        );

        // One job running, one held by the pool waiting for a permit, one in
        // the channel; the next is rejected.
        for request_id in ["a", "b", "c"] {
            let job = register(&registry, dir.path(), request_id).await;
            queue.submit(job.id).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let rejected = register(&registry, dir.path(), "d").await;

        let err = queue.submit(rejected.id).await.unwrap_err();
        assert!(matches!(err, AppError::QueueFull));
        let rejected = registry.get(rejected.id).await.unwrap();
        assert_eq!(rejected.status, JobStatus::Failed);
        assert_eq!(registry.active_job_for("d").await, None);
    }
}
