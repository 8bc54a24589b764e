//! objgate command-line tool.
//!
//! Drives every gateway operation against the configured S3 deployment.
//!
//! Usage:
//!   objgate list                                  - List objects as JSON
//!   objgate upload <file> [--key K] [--url key|public|presigned]
//!   objgate download --key K [-o FILE]            - Stream bytes to FILE or stdout
//!   objgate delete --key K                        - Delete (idempotent)
//!   objgate move --from S --to D                  - Copy then delete
//!
//! `--bucket` falls back to `storage.default_bucket`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use objgate_core::storage::{
    ByteStream, ObjectBackend, ObjectStoreGateway, StorageError, UploadRequest,
};
use objgate_shared::{AppConfig, AppError};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Parser)]
#[command(name = "objgate")]
#[command(about = "List, upload, download, delete and move objects in S3 buckets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Bucket to operate on (defaults to storage.default_bucket)
    #[arg(short, long, global = true)]
    bucket: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every object in the bucket
    List,
    /// Upload a file
    Upload {
        /// File to upload
        file: PathBuf,
        /// Object key (defaults to the file name)
        #[arg(short, long)]
        key: Option<String>,
        /// MIME type stored with the object
        #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,
        /// What to print once uploaded
        #[arg(long, value_enum, default_value_t = UrlKind::Key)]
        url: UrlKind,
    },
    /// Download an object
    Download {
        /// Object key
        #[arg(short, long)]
        key: String,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete an object
    Delete {
        /// Object key
        #[arg(short, long)]
        key: String,
    },
    /// Move an object within the bucket
    Move {
        /// Source key
        #[arg(long)]
        from: String,
        /// Destination key
        #[arg(long)]
        to: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UrlKind {
    /// Print the stored key
    Key,
    /// Print the unsigned public URL
    Public,
    /// Print a presigned URL
    Presigned,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr, stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "objgate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    let gateway = ObjectStoreGateway::from_settings(&config.storage);
    let bucket = resolve_bucket(cli.bucket, gateway.default_bucket())?;
    info!(bucket, endpoint = ?config.storage.endpoint, "Storage gateway configured");

    if let Err(err) = run(&gateway, &bucket, cli.command).await {
        return Err(report(err));
    }
    Ok(())
}

async fn run<B: ObjectBackend>(
    gateway: &ObjectStoreGateway<B>,
    bucket: &str,
    command: Command,
) -> Result<(), CommandError> {
    match command {
        Command::List => {
            let objects = gateway.list_objects(bucket).await?;
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
        Command::Upload {
            file,
            key,
            content_type,
            url,
        } => {
            let key = match key {
                Some(key) => key,
                None => default_key(&file)?,
            };
            let handle = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let size = handle
                .metadata()
                .await
                .with_context(|| format!("Failed to stat {}", file.display()))?
                .len();
            let request =
                UploadRequest::new(bucket, key, content_type, size, ReaderStream::new(handle));

            let output = match url {
                UrlKind::Key => gateway.upload_object(request).await?,
                UrlKind::Public => gateway.upload_and_get_public_url(request).await?,
                UrlKind::Presigned => gateway.upload_and_get_presigned_url(request).await?,
            };
            println!("{output}");
        }
        Command::Download { key, output } => {
            let chunks = gateway.download_stream(bucket, &key).await?;
            match output {
                Some(path) => {
                    let file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    copy_chunks(chunks, file)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                None => {
                    copy_chunks(chunks, tokio::io::stdout())
                        .await
                        .context("Failed to write stdout")?;
                }
            }
        }
        Command::Delete { key } => gateway.delete_object(bucket, &key).await?,
        Command::Move { from, to } => gateway.move_object(bucket, &from, &to).await?,
    }
    Ok(())
}

/// Drain an object stream into `out`, returning the byte count.
async fn copy_chunks<W>(mut chunks: ByteStream, mut out: W) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(written)
}

/// Failure of a single command: a gateway error, or local I/O and encoding.
#[derive(Debug)]
enum CommandError {
    Storage(StorageError),
    Local(anyhow::Error),
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::Local(err)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::Local(err.into())
    }
}

/// Log a command failure with its HTTP-equivalent status and convert it for exit.
fn report(err: CommandError) -> anyhow::Error {
    match err {
        CommandError::Storage(err) => {
            let app = AppError::from(err);
            error!(status = app.status_code(), code = app.error_code(), "{app}");
            app.into()
        }
        CommandError::Local(err) => err,
    }
}

fn resolve_bucket(explicit: Option<String>, default: Option<&str>) -> Result<String> {
    explicit
        .or_else(|| default.map(str::to_string))
        .filter(|bucket| !bucket.is_empty())
        .context("No bucket given: pass --bucket or set OBJGATE__STORAGE__DEFAULT_BUCKET")
}

fn default_key(file: &Path) -> Result<String> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a key from {}", file.display()))
}
