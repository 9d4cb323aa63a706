//! mugen-blob: inspect and manage the configured blob store.
//!
//! Reads the same environment (and `.env`) as the API server.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mugen_cli::{
    default_blob_name, default_output_path, init_tracing, render_listing, OutputFormat,
};
use mugen_core::Config;
use mugen_storage::create_blob_store;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "mugen-blob", about = "Mugen blob store CLI")]
struct Cli {
    /// Output format for listings
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List containers in the account
    Containers,
    /// List blobs in a container
    List {
        container: String,
    },
    /// Check whether a blob exists
    Exists {
        blob: String,
        /// Defaults to BLOB_CONTAINER
        #[arg(long)]
        container: Option<String>,
    },
    /// Upload a local file, overwriting any existing blob
    Upload {
        path: PathBuf,
        /// Blob name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Defaults to BLOB_CONTAINER
        #[arg(long)]
        container: Option<String>,
    },
    /// Download a blob to a local file
    Download {
        blob: String,
        /// Defaults to BLOB_CONTAINER
        #[arg(long)]
        container: Option<String>,
        /// Destination path (defaults to the blob's file name)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a blob to stdout
    Cat {
        blob: String,
        /// Defaults to BLOB_CONTAINER
        #[arg(long)]
        container: Option<String>,
    },
    /// Delete a blob
    Delete {
        blob: String,
        /// Defaults to BLOB_CONTAINER
        #[arg(long)]
        container: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let store = create_blob_store(&config)
        .await
        .context("Failed to initialize blob store")?;
    let container_or_default = |container: Option<String>| {
        container.unwrap_or_else(|| config.blob_container().to_string())
    };

    match cli.command {
        Commands::Containers => {
            let containers = store.list_containers().await?;
            println!("{}", render_listing(&containers, None, cli.format)?);
        }
        Commands::List { container } => {
            let blobs = store.list_blobs(&container).await?;
            if blobs.is_empty() && cli.format == OutputFormat::Text {
                eprintln!("Container '{}' is empty", container);
            } else {
                println!("{}", render_listing(&blobs, Some(&container), cli.format)?);
            }
        }
        Commands::Exists { blob, container } => {
            let container = container_or_default(container);
            let exists = store.exists(&blob, &container).await?;
            println!("{}", exists);
        }
        Commands::Upload {
            path,
            name,
            container,
        } => {
            let container = container_or_default(container);
            let name = match name {
                Some(name) => name,
                None => default_blob_name(&path)?,
            };
            let size = store.upload_file(&path, &name, &container).await?;
            println!("Uploaded {} to {}/{} ({} bytes)", path.display(), container, name, size);
        }
        Commands::Download {
            blob,
            container,
            output,
        } => {
            let container = container_or_default(container);
            let output = output.unwrap_or_else(|| PathBuf::from(default_output_path(&blob)));
            let size = store.download(&blob, &container, &output).await?;
            println!(
                "Downloaded {}/{} to {} ({} bytes)",
                container,
                blob,
                output.display(),
                size
            );
        }
        Commands::Cat { blob, container } => {
            let container = container_or_default(container);
            let data = store.read(&blob, &container).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
        Commands::Delete { blob, container } => {
            let container = container_or_default(container);
            store.delete(&blob, &container).await?;
            println!("Deleted {}/{}", container, blob);
        }
    }

    Ok(())
}
