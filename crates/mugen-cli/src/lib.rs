//! Helpers shared by the `mugen-blob` binary.

use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<&'a str>,
    items: &'a [String],
    count: usize,
}

/// Render a container or blob listing. Text output is one name per line.
pub fn render_listing(
    names: &[String],
    container: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(names.join("\n")),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&Listing {
            container,
            items: names,
            count: names.len(),
        })?),
    }
}

/// Blob name used when uploading `path` without `--name`: the file name.
pub fn default_blob_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a blob name from {}", path.display()))
}

/// Local destination used when downloading without `--output`: the last
/// segment of the blob name, in the current directory.
pub fn default_output_path(blob_name: &str) -> String {
    blob_name
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(blob_name)
        .to_string()
}

/// Initialize tracing for the CLI. Logs go to stderr so `cat` output stays clean.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
