//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that
//! converts into `AppError` (including storage and registry errors) converts
//! into `HttpAppError` and renders with the same JSON body and logging.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mugen_core::{AppError, ErrorMetadata, LogLevel};
use mugen_storage::BlobError;
use mugen_worker::RegistryError;
use serde::Serialize;
use utoipa::ToSchema;

/// Hides error details from responses once set. Written once at startup.
static HIDE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

pub fn set_production_mode(production: bool) {
    HIDE_ERROR_DETAILS.store(production, Ordering::Relaxed);
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Wait 30-60 seconds and retry")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: both the trait and `AppError` are foreign to this crate).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<BlobError> for HttpAppError {
    fn from(err: BlobError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<RegistryError> for HttpAppError {
    fn from(err: RegistryError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<std::io::Error> for HttpAppError {
    fn from(err: std::io::Error) -> Self {
        HttpAppError(err.into())
    }
}

/// Requests that are not `multipart/form-data` at all.
impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        )))
    }
}

/// Failures while streaming fields; an exceeded body limit becomes 413.
impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        HttpAppError(multipart_error(err))
    }
}

pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart body: {}", err.body_text()))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let hide_details = HIDE_ERROR_DETAILS.load(Ordering::Relaxed) || app_error.is_sensitive();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details: (!hide_details).then(|| app_error.detailed_message()),
            error_type: (!hide_details).then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}
