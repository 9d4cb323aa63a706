//! Route configuration and setup

use crate::constants::{
    DOCS_PATH, HEALTH_PATH, JOBS_FIRST_AND_LAST_FRAME_TO_VIDEO, JOBS_IMAGE_TO_VIDEO, JOBS_PATH,
    JOB_PATH, OPENAPI_PATH, PROCESS_V1_FIRST_AND_LAST_FRAME_TO_VIDEO, PROCESS_V1_IMAGE_TO_VIDEO,
    PROCESS_V2_IMAGE_TO_VIDEO,
};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use mugen_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa_rapidoc::RapiDoc;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    crate::error::set_production_mode(config.is_production());

    let cors = setup_cors(config)?;

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        max_request_body_bytes = config.max_request_body_bytes(),
        "HTTP limits configured"
    );

    let app = Router::new()
        .route(HEALTH_PATH, get(handlers::health::health))
        .route(
            PROCESS_V1_IMAGE_TO_VIDEO,
            post(handlers::process::image_to_video_v1),
        )
        .route(
            PROCESS_V2_IMAGE_TO_VIDEO,
            post(handlers::process::image_to_video_v2),
        )
        .route(
            PROCESS_V1_FIRST_AND_LAST_FRAME_TO_VIDEO,
            post(handlers::process::first_and_last_frame_to_video_v1),
        )
        .route(JOBS_PATH, get(handlers::jobs::list_jobs))
        .route(
            JOBS_IMAGE_TO_VIDEO,
            post(handlers::jobs::submit_image_to_video),
        )
        .route(
            JOBS_FIRST_AND_LAST_FRAME_TO_VIDEO,
            post(handlers::jobs::submit_first_and_last_frame_to_video),
        )
        .route(JOB_PATH, get(handlers::jobs::get_job))
        .route(
            OPENAPI_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(RapiDoc::new(OPENAPI_PATH).path(DOCS_PATH))
        // Uploads are bounded by RequestBodyLimitLayer and the per-file check
        .layer(DefaultBodyLimit::disable())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_request_body_bytes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
