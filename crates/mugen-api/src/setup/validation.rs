//! Configuration validation
//!
//! Runs `Config::validate` and adds the checks that only matter to the HTTP
//! service.

use anyhow::Result;
use mugen_core::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.http_concurrency_limit() == 0 {
        return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT cannot be 0"));
    }

    if config.uploads_dir().trim().is_empty() || config.videos_dir().trim().is_empty() {
        return Err(anyhow::anyhow!("UPLOADS_DIR and VIDEOS_DIR must not be empty"));
    }

    if config.blob_base_url().is_none() {
        tracing::warn!("BLOB_BASE_URL is not set - v1 responses will carry local artifact paths");
    }

    if config.upload_artifacts() && config.blob_sas_token().is_none() {
        tracing::warn!(
            "UPLOAD_ARTIFACTS is enabled without BLOB_SAS_TOKEN - public references may not be readable"
        );
    }

    Ok(())
}
