//! Top-level error type for conversion runs

use crate::config::ConfigError;
use crate::mapping::MappingError;
use crate::record::RecordError;
use crate::schema::SchemaError;
use crate::sink::SinkError;
use crate::source::SourceError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure category, stable across the layered error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaParse,
    InvalidVersionTag,
    RecordParse,
    SourceUnavailable,
    TypeMismatch,
    Io,
    Cancelled,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SchemaParse => "SchemaParseError",
            Self::InvalidVersionTag => "InvalidVersionTag",
            Self::RecordParse => "RecordParseError",
            Self::SourceUnavailable => "SourceUnavailable",
            Self::TypeMismatch => "TypeMismatch",
            Self::Io => "IOError",
            Self::Cancelled => "Cancelled",
            Self::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Any error that ends a run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read schema template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write schema {path}: {source}")]
    SchemaWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run cancelled after {records} records")]
    Cancelled { records: u64 },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(SchemaError::Parse { .. }) => ErrorKind::SchemaParse,
            Self::Schema(SchemaError::InvalidVersionTag(_)) => ErrorKind::InvalidVersionTag,
            Self::Record(_) | Self::Source(SourceError::Record(_)) => ErrorKind::RecordParse,
            Self::Source(SourceError::SourceUnavailable { .. }) => ErrorKind::SourceUnavailable,
            Self::Source(SourceError::Io { .. }) => ErrorKind::Io,
            Self::Mapping(MappingError::TypeMismatch { .. }) => ErrorKind::TypeMismatch,
            Self::Sink(_) | Self::TemplateRead { .. } | Self::SchemaWrite { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}
