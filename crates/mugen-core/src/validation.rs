//! Request envelope validation
//!
//! `request_id` becomes a filename stem on disk, so it is restricted to a safe
//! character set before any path is built from it.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

pub const MAX_REQUEST_ID_LENGTH: usize = 128;

static REQUEST_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("request id pattern is valid")
});

/// Validate a caller supplied request id.
pub fn validate_request_id(request_id: &str) -> Result<(), AppError> {
    if request_id.is_empty() {
        return Err(AppError::InvalidInput(
            "request_id cannot be empty".to_string(),
        ));
    }

    if request_id.len() > MAX_REQUEST_ID_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "request_id exceeds {} characters",
            MAX_REQUEST_ID_LENGTH
        )));
    }

    if !REQUEST_ID_PATTERN.is_match(request_id) || request_id.contains("..") {
        return Err(AppError::InvalidInput(
            "request_id may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    Ok(())
}

/// Extension of an uploaded filename: everything after the last `.`.
///
/// Filenames without a dot, or whose extension is empty or contains anything
/// other than ASCII letters and digits, are rejected.
pub fn extract_extension(filename: &str) -> Result<&str, AppError> {
    let (_, ext) = filename.rsplit_once('.').ok_or_else(|| {
        AppError::InvalidInput(format!("Filename '{}' has no extension", filename))
    })?;

    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidInput(format!(
            "Filename '{}' has an invalid extension",
            filename
        )));
    }

    Ok(ext)
}

/// Validate an uploaded filename against the allowed extension list and
/// return the extension exactly as the caller wrote it.
pub fn validate_file_extension<'a>(
    filename: &'a str,
    allowed_extensions: &[String],
) -> Result<&'a str, AppError> {
    let ext = extract_extension(filename)?;
    let lowered = ext.to_lowercase();

    if !allowed_extensions.is_empty() && !allowed_extensions.iter().any(|a| a == &lowered) {
        return Err(AppError::InvalidInput(format!(
            "File extension '{}' is not allowed. Allowed: {}",
            ext,
            allowed_extensions.join(", ")
        )));
    }

    Ok(ext)
}
