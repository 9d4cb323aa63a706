//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use mugen_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mugen API",
        version = "0.1.0",
        description = "Intake service for image-to-video generation. Uploads are staged under the request id; finished videos are returned as blob references."
    ),
    paths(
        handlers::health::health,
        // Intake
        handlers::process::image_to_video_v1,
        handlers::process::image_to_video_v2,
        handlers::process::first_and_last_frame_to_video_v1,
        // Jobs
        handlers::jobs::submit_image_to_video,
        handlers::jobs::submit_first_and_last_frame_to_video,
        handlers::jobs::get_job,
        handlers::jobs::list_jobs,
    ),
    components(
        schemas(
            models::IntakeResponse,
            models::Job,
            models::JobStatus,
            models::GenerationKind,
            models::GenerationInputs,
            handlers::jobs::JobListResponse,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "process", description = "Synchronous intake returning an existing artifact"),
        (name = "jobs", description = "Queued generation jobs")
    )
)]
pub struct ApiDoc;
