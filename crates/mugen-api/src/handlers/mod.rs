pub mod health;
pub mod jobs;
pub mod process;

use mugen_core::AppError;

use crate::state::AppState;

/// Reject intake for a request id that still has a job in flight; staging
/// would overwrite that job's inputs.
pub(crate) async fn ensure_no_active_job(
    state: &AppState,
    request_id: &str,
) -> Result<(), AppError> {
    match state.registry.active_job_for(request_id).await {
        Some(job_id) => Err(AppError::Conflict(format!(
            "Request {} already has an active job {}",
            request_id, job_id
        ))),
        None => Ok(()),
    }
}
