//! Output sinks
//!
//! A sink owns the destination for the whole run. The control loop hands it
//! one record's statements at a time; `finish()` flushes whatever is still
//! buffered and closes the wire format.

mod json_batch;
mod quad;

use crate::statement::Statement;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncWrite, BufWriter};

pub use json_batch::BatchJsonSink;
pub use quad::{quad_line, QuadSink};

/// Errors writing to the destination.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Wire format of the statement stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One `subject <predicate> object .` line per statement.
    #[default]
    Quad,
    /// A single JSON array of per-subject objects.
    Json,
}

impl OutputFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Quad => "rdf",
            Self::Json => "json",
        }
    }
}

/// Where the statement stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// `-` means stdout.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(arg))
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("<stdout>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Consumes statements one record at a time.
#[async_trait]
pub trait OutputSink: Send {
    /// Write the statements derived from one record.
    async fn write_record(&mut self, statements: &[Statement]) -> Result<(), SinkError>;

    /// Flush buffered output and terminate the format. Called once.
    async fn finish(&mut self) -> Result<(), SinkError>;
}

pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Open `destination` and wrap it in a sink for `format`.
pub async fn open_sink(
    format: OutputFormat,
    destination: &Destination,
    batch_size: usize,
) -> Result<Box<dyn OutputSink>, SinkError> {
    let writer: BoxWriter = match destination {
        Destination::Stdout => Box::new(BufWriter::new(tokio::io::stdout())),
        Destination::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            Box::new(BufWriter::new(tokio::fs::File::create(path).await?))
        }
    };

    tracing::debug!(%destination, ?format, batch_size, "opened output sink");

    Ok(match format {
        OutputFormat::Quad => Box::new(QuadSink::new(writer)),
        OutputFormat::Json => Box::new(BatchJsonSink::new(writer, batch_size)),
    })
}
