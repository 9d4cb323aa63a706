//! Synchronous intake endpoints.
//!
//! Each call stages the uploaded images, then answers from whatever artifact
//! already exists for the request id. Nothing here waits for generation.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use mugen_core::models::{GenerationKind, IntakeResponse};
use mugen_core::{AppError, ReferenceStyle};
use mugen_worker::artifact_ready;

use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::ensure_no_active_job;
use crate::state::AppState;

/// Image to video, answering with the public blob URL
#[utoipa::path(
    post,
    path = "/process/v1/image_to_video",
    tag = "process",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Artifact found", body = IntakeResponse),
        (status = 400, description = "Invalid form, envelope or file", body = ErrorResponse),
        (status = 404, description = "Video file not found", body = ErrorResponse),
        (status = 409, description = "A job for this request id is still running", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 502, description = "Blob store failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(operation = "image_to_video_v1", request_id = tracing::field::Empty)
)]
pub async fn image_to_video_v1(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IntakeResponse>, HttpAppError> {
    intake(
        &state,
        multipart?,
        GenerationKind::ImageToVideo,
        ReferenceStyle::PublicUrl,
    )
    .await
}

/// Image to video, answering with the local artifact path
#[utoipa::path(
    post,
    path = "/process/v2/image_to_video",
    tag = "process",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Artifact found", body = IntakeResponse),
        (status = 400, description = "Invalid form, envelope or file", body = ErrorResponse),
        (status = 404, description = "Video file not found", body = ErrorResponse),
        (status = 409, description = "A job for this request id is still running", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(operation = "image_to_video_v2", request_id = tracing::field::Empty)
)]
pub async fn image_to_video_v2(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IntakeResponse>, HttpAppError> {
    intake(
        &state,
        multipart?,
        GenerationKind::ImageToVideo,
        ReferenceStyle::LocalPath,
    )
    .await
}

/// First and last frame to video, answering with the public blob URL
#[utoipa::path(
    post,
    path = "/process/v1/first_and_last_frame_to_video",
    tag = "process",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Artifact found", body = IntakeResponse),
        (status = 400, description = "Invalid form, envelope, file or unpaired frame", body = ErrorResponse),
        (status = 404, description = "Video file not found", body = ErrorResponse),
        (status = 409, description = "A job for this request id is still running", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 502, description = "Blob store failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(operation = "first_and_last_frame_to_video_v1", request_id = tracing::field::Empty)
)]
pub async fn first_and_last_frame_to_video_v1(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IntakeResponse>, HttpAppError> {
    intake(
        &state,
        multipart?,
        GenerationKind::FirstAndLastFrameToVideo,
        ReferenceStyle::PublicUrl,
    )
    .await
}

async fn intake(
    state: &AppState,
    multipart: Multipart,
    kind: GenerationKind,
    style: ReferenceStyle,
) -> Result<Json<IntakeResponse>, HttpAppError> {
    let mut form = state.stager.read_form(multipart).await?;
    let uploads = form.uploads_for(kind)?;
    let request_id = form.request.request_id.clone();
    tracing::Span::current().record("request_id", request_id.as_str());

    let _guard = state.request_locks.acquire(&request_id).await;
    ensure_no_active_job(state, &request_id).await?;

    let staged = uploads.len();
    state.stager.stage(&request_id, uploads).await?;

    let video_path = state.resolver.video_path(&request_id);
    let found = artifact_ready(state.resolver.resolve(&request_id)).await?;

    if !found {
        tracing::info!(
            kind = %kind,
            staged_files = staged,
            video_path = %video_path,
            "Artifact not available yet"
        );
        return Err(AppError::ArtifactNotFound { request_id }.into());
    }

    let blob_path = state.publisher.publish(&video_path, style).await?;

    tracing::info!(
        kind = %kind,
        staged_files = staged,
        blob_path = %blob_path,
        "Artifact returned"
    );

    Ok(Json(IntakeResponse {
        request_id,
        blob_path,
    }))
}
