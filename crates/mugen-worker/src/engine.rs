//! Generation engines
//!
//! An engine receives a [`GenerationTask`] and returns once the video should be
//! present at `output_path`. Deadlines are enforced by the queue, not here.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

use mugen_core::models::{GenerationInputs, GenerationKind, Job};

/// Number of trailing stderr bytes kept in a failure message.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start generation command: {0}")]
    Spawn(String),

    #[error("Generation command exited with {}: {stderr}", exit_label(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generated artifact missing at {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything an engine needs to produce one video.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub job_id: Uuid,
    pub request_id: String,
    pub kind: GenerationKind,
    pub inputs: GenerationInputs,
    pub prompt: Option<String>,
    pub resolution: String,
    pub output_path: PathBuf,
}

impl GenerationTask {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            request_id: job.request_id.clone(),
            kind: job.kind,
            inputs: job.inputs.clone(),
            prompt: job.prompt.clone(),
            resolution: job.resolution.clone(),
            output_path: PathBuf::from(&job.video_path),
        }
    }

    /// Value for a command template placeholder, `None` when the task has none.
    fn placeholder(&self, name: &str) -> Option<String> {
        match name {
            "request_id" => Some(self.request_id.clone()),
            "task" => Some(self.kind.engine_task().to_string()),
            "size" => Some(self.resolution.clone()),
            "prompt" => self.prompt.clone(),
            "image" => self.inputs.image.clone(),
            "first" => self.inputs.first.clone(),
            "last" => self.inputs.last.clone(),
            "output" => Some(self.output_path.to_string_lossy().to_string()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait GenerationEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, task: &GenerationTask) -> Result<(), EngineError>;
}

/// Whether a finished artifact sits at `path`.
///
/// Only a regular file counts; a directory at that path is not a video.
pub async fn artifact_ready(path: impl AsRef<Path>) -> std::io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Waits for an external producer to drop the video at the expected path.
pub struct ArtifactProbeEngine {
    poll_interval: Duration,
}

impl ArtifactProbeEngine {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[async_trait]
impl GenerationEngine for ArtifactProbeEngine {
    fn name(&self) -> &'static str {
        "probe"
    }

    async fn generate(&self, task: &GenerationTask) -> Result<(), EngineError> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if artifact_ready(&task.output_path).await? {
                tracing::debug!(
                    job_id = %task.job_id,
                    path = %task.output_path.display(),
                    "Artifact appeared"
                );
                return Ok(());
            }
        }
    }
}

/// Runs a configured program per job.
///
/// The template is split on whitespace first, then each word has its
/// `{placeholder}`s substituted, so values containing spaces stay one argument.
/// A word that is exactly a placeholder with no value (e.g. `{image}` for a
/// first/last frame job) is left out.
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn from_template(template: &str) -> anyhow::Result<Self> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("Generation command template is empty"))?;

        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn render_args(&self, task: &GenerationTask) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|word| render_word(word, task))
            .collect()
    }
}

fn render_word(word: &str, task: &GenerationTask) -> Option<String> {
    if let Some(name) = word.strip_prefix('{').and_then(|w| w.strip_suffix('}')) {
        if !name.contains(['{', '}']) {
            return match task.placeholder(name) {
                Some(value) => Some(value),
                None if is_known_placeholder(name) => None,
                None => Some(word.to_string()),
            };
        }
    }

    let mut out = String::with_capacity(word.len());
    let mut rest = word;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_known_placeholder(&after[..close]) => {
                out.push_str(&task.placeholder(&after[..close]).unwrap_or_default());
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Some(out)
}

fn is_known_placeholder(name: &str) -> bool {
    matches!(
        name,
        "request_id" | "task" | "size" | "prompt" | "image" | "first" | "last" | "output"
    )
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

#[async_trait]
impl GenerationEngine for CommandEngine {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn generate(&self, task: &GenerationTask) -> Result<(), EngineError> {
        if let Some(parent) = task.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let args = self.render_args(task);
        tracing::info!(
            job_id = %task.job_id,
            request_id = %task.request_id,
            program = %self.program,
            task = task.kind.engine_task(),
            "Starting generation command"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Spawn(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(())
    }
}
