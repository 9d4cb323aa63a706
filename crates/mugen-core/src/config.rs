//! Configuration module
//!
//! All settings are read once at startup by [`Config::from_env`] and then passed
//! to the HTTP layer and the worker pool through their state. Nothing reads the
//! environment after that point.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BLOB_CONTAINER, DEFAULT_LOCAL_BLOB_PATH, DEFAULT_RESOLUTION, DEFAULT_UPLOADS_DIR,
    DEFAULT_VIDEOS_DIR,
};
use crate::storage_types::BlobBackend;

// Common constants
const SERVER_PORT: u16 = 8000;
const MAX_UPLOAD_SIZE_MB: usize = 20;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;
const GENERATION_TIMEOUT_SECS: u64 = 1800;
const GENERATION_POLL_INTERVAL_MS: u64 = 1000;
const GENERATION_QUEUE_SIZE: usize = 100;
const GENERATION_MAX_CONCURRENT: usize = 1;
const JOB_RETENTION_SECS: u64 = 86_400;
const JOB_REAP_INTERVAL_SECS: u64 = 300;

/// Which generation engine the worker pool drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    /// Wait for an externally produced artifact to appear.
    Probe,
    /// Spawn the configured command for every job.
    Command,
}

impl std::str::FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "probe" => Ok(EngineKind::Probe),
            "command" => Ok(EngineKind::Command),
            other => Err(anyhow::anyhow!("Invalid generation engine: {}", other)),
        }
    }
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub http_concurrency_limit: usize,
}

/// Local paths and upload limits
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    pub uploads_dir: String,
    pub videos_dir: String,
    pub max_upload_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub default_resolution: String,
}

/// Blob storage settings
#[derive(Clone, Debug)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    pub base_url: Option<String>,
    pub sas_token: Option<String>,
    pub container: String,
    pub connection_string: Option<String>,
    pub local_path: String,
    pub upload_artifacts: bool,
}

/// Generation worker settings
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub engine: EngineKind,
    pub command: Option<String>,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub queue_size: usize,
    pub max_concurrent: usize,
    pub job_retention_secs: u64,
    pub job_reap_interval_secs: u64,
}

/// Full service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub intake: IntakeConfig,
    pub blob: BlobConfig,
    pub generation: GenerationConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: SERVER_PORT,
                environment: "development".to_string(),
                cors_origins: vec!["*".to_string()],
                http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
            },
            intake: IntakeConfig {
                uploads_dir: DEFAULT_UPLOADS_DIR.to_string(),
                videos_dir: DEFAULT_VIDEOS_DIR.to_string(),
                max_upload_size_bytes: megabytes(MAX_UPLOAD_SIZE_MB),
                allowed_extensions: split_list("jpg,jpeg,png,webp,bmp,gif"),
                default_resolution: DEFAULT_RESOLUTION.to_string(),
            },
            blob: BlobConfig {
                backend: BlobBackend::Local,
                base_url: None,
                sas_token: None,
                container: DEFAULT_BLOB_CONTAINER.to_string(),
                connection_string: None,
                local_path: DEFAULT_LOCAL_BLOB_PATH.to_string(),
                upload_artifacts: false,
            },
            generation: GenerationConfig {
                engine: EngineKind::Probe,
                command: None,
                timeout_secs: GENERATION_TIMEOUT_SECS,
                poll_interval_ms: GENERATION_POLL_INTERVAL_MS,
                queue_size: GENERATION_QUEUE_SIZE,
                max_concurrent: GENERATION_MAX_CONCURRENT,
                job_retention_secs: JOB_RETENTION_SECS,
                job_reap_interval_secs: JOB_REAP_INTERVAL_SECS,
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = ServiceConfig::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| defaults.server.environment.clone());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| defaults.server.cors_origins.clone());

        let max_upload_size_mb = parsed_var("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|_| defaults.intake.allowed_extensions.clone());

        let connection_string = non_empty_var("BLOB_CONNECTION_STRING");
        let backend = match non_empty_var("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<BlobBackend>()?,
            None if connection_string.is_some() => BlobBackend::Azure,
            None => BlobBackend::Local,
        };

        let engine = match non_empty_var("GENERATION_ENGINE") {
            Some(raw) => raw.parse::<EngineKind>()?,
            None => EngineKind::Probe,
        };

        Ok(ServiceConfig {
            server: ServerConfig {
                host: non_empty_var("HOST").unwrap_or(defaults.server.host),
                port: parsed_var("PORT", SERVER_PORT),
                environment,
                cors_origins,
                http_concurrency_limit: parsed_var("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)
                    .max(1),
            },
            intake: IntakeConfig {
                uploads_dir: non_empty_var("UPLOADS_DIR").unwrap_or(defaults.intake.uploads_dir),
                videos_dir: non_empty_var("VIDEOS_DIR").unwrap_or(defaults.intake.videos_dir),
                max_upload_size_bytes: megabytes(max_upload_size_mb),
                allowed_extensions,
                default_resolution: non_empty_var("DEFAULT_RESOLUTION")
                    .unwrap_or(defaults.intake.default_resolution),
            },
            blob: BlobConfig {
                backend,
                base_url: non_empty_var("BLOB_BASE_URL"),
                sas_token: non_empty_var("BLOB_SAS_TOKEN"),
                container: non_empty_var("BLOB_CONTAINER").unwrap_or(defaults.blob.container),
                connection_string,
                local_path: non_empty_var("LOCAL_BLOB_PATH").unwrap_or(defaults.blob.local_path),
                upload_artifacts: parsed_var("UPLOAD_ARTIFACTS", false),
            },
            generation: GenerationConfig {
                engine,
                command: non_empty_var("GENERATION_COMMAND"),
                timeout_secs: parsed_var("GENERATION_TIMEOUT_SECS", GENERATION_TIMEOUT_SECS),
                poll_interval_ms: parsed_var(
                    "GENERATION_POLL_INTERVAL_MS",
                    GENERATION_POLL_INTERVAL_MS,
                ),
                queue_size: parsed_var("GENERATION_QUEUE_SIZE", GENERATION_QUEUE_SIZE),
                max_concurrent: parsed_var("GENERATION_MAX_CONCURRENT", GENERATION_MAX_CONCURRENT),
                job_retention_secs: parsed_var("JOB_RETENTION_SECS", JOB_RETENTION_SECS),
                job_reap_interval_secs: parsed_var("JOB_REAP_INTERVAL_SECS", JOB_REAP_INTERVAL_SECS),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("PORT must be greater than 0"));
        }

        if self.is_production() && self.server.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.blob.backend == BlobBackend::Azure && self.blob.connection_string.is_none() {
            return Err(anyhow::anyhow!(
                "BLOB_CONNECTION_STRING must be set when using the azure storage backend"
            ));
        }

        if let Some(base_url) = &self.blob.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "BLOB_BASE_URL must start with http:// or https://"
                ));
            }
        }

        if self.blob.container.is_empty() {
            return Err(anyhow::anyhow!("BLOB_CONTAINER cannot be empty"));
        }

        if self.generation.engine == EngineKind::Command && self.generation.command.is_none() {
            return Err(anyhow::anyhow!(
                "GENERATION_COMMAND must be set when GENERATION_ENGINE=command"
            ));
        }

        if self.generation.queue_size == 0
            || self.generation.max_concurrent == 0
            || self.generation.timeout_secs == 0
        {
            return Err(anyhow::anyhow!(
                "GENERATION_QUEUE_SIZE, GENERATION_MAX_CONCURRENT and GENERATION_TIMEOUT_SECS must be greater than 0"
            ));
        }

        if self.intake.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        Ok(())
    }
}

/// Shared configuration handle.
///
/// Boxed so the state structs that embed it stay small.
#[derive(Clone, Debug)]
pub struct Config(Box<ServiceConfig>);

impl Config {
    pub fn new(config: ServiceConfig) -> Self {
        Config(Box::new(config))
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    pub fn host(&self) -> &str {
        &self.0.server.host
    }

    pub fn server_port(&self) -> u16 {
        self.0.server.port
    }

    pub fn environment(&self) -> &str {
        &self.0.server.environment
    }

    pub fn is_production(&self) -> bool {
        self.0.is_production()
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.server.cors_origins
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.0.server.http_concurrency_limit
    }

    pub fn uploads_dir(&self) -> &str {
        &self.0.intake.uploads_dir
    }

    pub fn videos_dir(&self) -> &str {
        &self.0.intake.videos_dir
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.0.intake.max_upload_size_bytes
    }

    /// Limit applied to a whole multipart body: two frames plus the envelope.
    pub fn max_request_body_bytes(&self) -> usize {
        self.0
            .intake
            .max_upload_size_bytes
            .saturating_mul(3)
            .saturating_add(megabytes(1))
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.0.intake.allowed_extensions
    }

    pub fn default_resolution(&self) -> &str {
        &self.0.intake.default_resolution
    }

    pub fn blob_backend(&self) -> BlobBackend {
        self.0.blob.backend
    }

    pub fn blob_base_url(&self) -> Option<&str> {
        self.0.blob.base_url.as_deref()
    }

    pub fn blob_sas_token(&self) -> Option<&str> {
        self.0.blob.sas_token.as_deref()
    }

    pub fn blob_container(&self) -> &str {
        &self.0.blob.container
    }

    pub fn blob_connection_string(&self) -> Option<&str> {
        self.0.blob.connection_string.as_deref()
    }

    pub fn local_blob_path(&self) -> &str {
        &self.0.blob.local_path
    }

    pub fn upload_artifacts(&self) -> bool {
        self.0.blob.upload_artifacts
    }

    pub fn generation_engine(&self) -> EngineKind {
        self.0.generation.engine
    }

    pub fn generation_command(&self) -> Option<&str> {
        self.0.generation.command.as_deref()
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.0.generation.timeout_secs)
    }

    pub fn generation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.0.generation.poll_interval_ms.max(10))
    }

    pub fn generation_queue_size(&self) -> usize {
        self.0.generation.queue_size
    }

    pub fn generation_max_concurrent(&self) -> usize {
        self.0.generation.max_concurrent
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.0.generation.job_retention_secs)
    }

    pub fn job_reap_interval(&self) -> Duration {
        Duration::from_secs(self.0.generation.job_reap_interval_secs.max(1))
    }
}

/// Megabytes to bytes, clamped at `usize::MAX`.
fn megabytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

impl From<ServiceConfig> for Config {
    fn from(config: ServiceConfig) -> Self {
        Config::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::new(ServiceConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.uploads_dir(), "data/uploaded_images");
        assert_eq!(config.videos_dir(), "data/generated_videos");
        assert_eq!(config.blob_container(), "mugenverse");
        assert_eq!(config.server_port(), 8000);
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let mut inner = ServiceConfig::default();
        inner.server.environment = "production".to_string();
        assert!(inner.validate().is_err());

        inner.server.cors_origins = vec!["https://app.example.com".to_string()];
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_azure_backend_requires_connection_string() {
        let mut inner = ServiceConfig::default();
        inner.blob.backend = BlobBackend::Azure;
        assert!(inner.validate().is_err());

        inner.blob.connection_string = Some("AccountName=acct;AccountKey=a2V5".to_string());
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_command_engine_requires_command() {
        let mut inner = ServiceConfig::default();
        inner.generation.engine = EngineKind::Command;
        assert!(inner.validate().is_err());

        inner.generation.command = Some("python generate.py".to_string());
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut inner = ServiceConfig::default();
        inner.blob.base_url = Some("ftp://example.com".to_string());
        assert!(inner.validate().is_err());
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("probe".parse::<EngineKind>().unwrap(), EngineKind::Probe);
        assert_eq!(" Command ".parse::<EngineKind>().unwrap(), EngineKind::Command);
        assert!("gpu".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_request_body_limit_covers_two_frames() {
        let config = Config::new(ServiceConfig::default());
        assert!(config.max_request_body_bytes() > config.max_upload_size_bytes() * 2);
    }

    #[test]
    fn test_huge_upload_limit_saturates() {
        assert_eq!(megabytes(2), 2 * 1024 * 1024);
        assert_eq!(megabytes(usize::MAX), usize::MAX);

        let mut inner = ServiceConfig::default();
        inner.intake.max_upload_size_bytes = usize::MAX / 2;
        let config = Config::new(inner);
        assert_eq!(config.max_request_body_bytes(), usize::MAX);
    }
}
