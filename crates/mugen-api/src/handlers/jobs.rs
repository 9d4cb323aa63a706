//! Asynchronous generation jobs.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use mugen_core::models::{GenerationKind, Job};
use mugen_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::ensure_no_active_job;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobListQuery {
    /// Only return jobs for this request id
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub count: usize,
}

/// Submit an image to video job
#[utoipa::path(
    post,
    path = "/jobs/image_to_video",
    tag = "jobs",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Job accepted", body = Job),
        (status = 400, description = "Invalid form, envelope or missing image", body = ErrorResponse),
        (status = 409, description = "A job for this request id is still running", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Generation queue is full", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(operation = "submit_image_to_video", request_id = tracing::field::Empty)
)]
pub async fn submit_image_to_video(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Job>), HttpAppError> {
    submit(&state, multipart?, GenerationKind::ImageToVideo).await
}

/// Submit a first and last frame to video job
#[utoipa::path(
    post,
    path = "/jobs/first_and_last_frame_to_video",
    tag = "jobs",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Job accepted", body = Job),
        (status = 400, description = "Invalid form, envelope or missing frames", body = ErrorResponse),
        (status = 409, description = "A job for this request id is still running", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Generation queue is full", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(operation = "submit_first_and_last_frame_to_video", request_id = tracing::field::Empty)
)]
pub async fn submit_first_and_last_frame_to_video(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Job>), HttpAppError> {
    submit(&state, multipart?, GenerationKind::FirstAndLastFrameToVideo).await
}

async fn submit(
    state: &AppState,
    multipart: Multipart,
    kind: GenerationKind,
) -> Result<(StatusCode, Json<Job>), HttpAppError> {
    let mut form = state.stager.read_form(multipart).await?;
    let uploads = form.uploads_for(kind)?;
    if uploads.is_empty() {
        let required = match kind {
            GenerationKind::ImageToVideo => "Field 'image' is required",
            GenerationKind::FirstAndLastFrameToVideo => "Fields 'first' and 'last' are required",
        };
        return Err(AppError::InvalidInput(required.to_string()).into());
    }

    let request = form.request;
    let request_id = request.request_id.clone();
    tracing::Span::current().record("request_id", request_id.as_str());

    let _guard = state.request_locks.acquire(&request_id).await;
    ensure_no_active_job(state, &request_id).await?;

    let inputs = state.stager.stage(&request_id, uploads).await?;
    let job = Job::new(
        request,
        kind,
        inputs,
        state.config.default_resolution(),
        state.resolver.video_path(&request_id),
    );

    let job = state.registry.register(job).await?;
    let job = state.queue.submit(job.id).await?;

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Get a job by id
#[utoipa::path(
    get,
    path = "/jobs/{job_id}",
    tag = "jobs",
    params(
        ("job_id" = Uuid, Path, description = "Job id")
    ),
    responses(
        (status = 200, description = "Job found", body = Job),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, HttpAppError> {
    match state.registry.get(job_id).await {
        Some(job) => Ok(Json(job)),
        None => {
            tracing::debug!(job_id = %job_id, "Job not found");
            Err(AppError::NotFound(format!("Job {} not found", job_id)).into())
        }
    }
}

/// List jobs, newest first
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "jobs",
    params(JobListQuery),
    responses(
        (status = 200, description = "Jobs", body = JobListResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobListQuery>,
) -> Json<JobListResponse> {
    let jobs = state.registry.list(query.request_id.as_deref()).await;
    Json(JobListResponse {
        count: jobs.len(),
        jobs,
    })
}
