//! Run configuration
//!
//! A run is described by a YAML file, by command-line flags, or by both
//! (flags win). Only `version`, `schema` and `source` are required.
//!
//! ```yaml
//! version: v2
//! schema: schema/kg.dgraph
//! source:
//!   kind: cursor
//!   uri: file:///data/exports
//!   database: kg
//!   max_items: 100000
//! output:
//!   format: json
//!   path: out/v2.json
//! mapping:
//!   policy: include_all
//! on_malformed: skip
//! ```

use crate::mapping::MappingPolicy;
use crate::record::RecordLayout;
use crate::sink::{Destination, OutputFormat};
use crate::source::CursorSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CURSOR_BATCH_SIZE: usize = 2000;
pub const DEFAULT_OUTPUT_BATCH_SIZE: usize = 1000;

/// `<template>.<version>`, next to the template.
pub fn versioned_schema_path(template: &Path, version: &str) -> PathBuf {
    let mut name = template.as_os_str().to_os_string();
    name.push(".");
    name.push(version);
    PathBuf::from(name)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What to do with a record that cannot be read or lacks required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log a warning, count the record, continue.
    Skip,
    /// Stop the run with a record parse error.
    #[default]
    Abort,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Line-delimited JSON files.
    Files { nodes: PathBuf, edges: PathBuf },
    /// A document store reached by URI.
    Cursor(CursorConfig),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CursorConfig {
    pub uri: String,
    pub database: String,
    #[serde(default = "default_nodes_collection")]
    pub nodes_collection: String,
    #[serde(default = "default_edges_collection")]
    pub edges_collection: String,
    #[serde(default = "default_cursor_batch_size")]
    pub batch_size: usize,
    /// `-1` means unbounded.
    #[serde(default = "unbounded")]
    pub max_items: i64,
}

fn default_nodes_collection() -> String {
    "nodes".to_string()
}

fn default_edges_collection() -> String {
    "edges".to_string()
}

fn default_cursor_batch_size() -> usize {
    DEFAULT_CURSOR_BATCH_SIZE
}

fn unbounded() -> i64 {
    -1
}

impl CursorConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            nodes_collection: default_nodes_collection(),
            edges_collection: default_edges_collection(),
            batch_size: DEFAULT_CURSOR_BATCH_SIZE,
            max_items: unbounded(),
        }
    }

    pub fn settings(&self) -> CursorSettings {
        CursorSettings {
            database: self.database.clone(),
            nodes_collection: self.nodes_collection.clone(),
            edges_collection: self.edges_collection.clone(),
            batch_size: self.batch_size,
            max_items: u64::try_from(self.max_items).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// File to write; `-` for stdout. Unset means `<version>_data.<ext>`.
    pub path: Option<String>,
    /// Objects per flushed batch (JSON format).
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: None,
            batch_size: DEFAULT_OUTPUT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingConfig {
    pub policy: MappingPolicy,
    /// Also emit node identifiers under this predicate.
    pub identifier_predicate: Option<String>,
    /// Drop edges whose `negated` field is truthy.
    pub skip_negated_edges: bool,
    pub layout: RecordLayout,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Version prefix applied to every predicate and type.
    pub version: String,
    /// Schema template path.
    pub schema: PathBuf,
    /// Versioned schema output; defaults to `<schema>.<version>`.
    #[serde(default)]
    pub schema_out: Option<PathBuf>,
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
}

impl RunConfig {
    pub fn new(version: impl Into<String>, schema: impl Into<PathBuf>, source: SourceConfig) -> Self {
        Self {
            version: version.into(),
            schema: schema.into(),
            schema_out: None,
            source,
            output: OutputConfig::default(),
            mapping: MappingConfig::default(),
            on_malformed: MalformedPolicy::default(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Where the versioned schema artifact is written.
    pub fn schema_out_path(&self) -> PathBuf {
        match &self.schema_out {
            Some(path) => path.clone(),
            None => versioned_schema_path(&self.schema, &self.version),
        }
    }

    pub fn destination(&self) -> Destination {
        match &self.output.path {
            Some(path) => Destination::parse(path),
            None => Destination::File(PathBuf::from(format!(
                "{}_data.{}",
                self.version,
                self.output.format.extension()
            ))),
        }
    }

    /// Reject settings that would make the run meaningless. The version tag
    /// itself is checked when the schema is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.batch_size == 0 {
            return Err(ConfigError::Invalid("output.batch_size must be at least 1".into()));
        }
        if self.output.path.as_deref() == Some("") {
            return Err(ConfigError::Invalid("output.path must not be empty".into()));
        }
        if let Some(name) = &self.mapping.identifier_predicate {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("mapping.identifier_predicate must not be empty".into()));
            }
        }

        match &self.source {
            SourceConfig::Files { nodes, edges } => {
                if nodes.as_os_str().is_empty() || edges.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid("source needs both a nodes and an edges file".into()));
                }
            }
            SourceConfig::Cursor(cursor) => {
                if cursor.uri.is_empty() {
                    return Err(ConfigError::Invalid("source.uri must not be empty".into()));
                }
                if cursor.database.is_empty()
                    || cursor.nodes_collection.is_empty()
                    || cursor.edges_collection.is_empty()
                {
                    return Err(ConfigError::Invalid(
                        "source database and collection names must not be empty".into(),
                    ));
                }
                if cursor.batch_size == 0 {
                    return Err(ConfigError::Invalid("source.batch_size must be at least 1".into()));
                }
                if cursor.max_items < -1 {
                    return Err(ConfigError::Invalid(format!(
                        "source.max_items must be -1 (unbounded) or non-negative, got {}",
                        cursor.max_items
                    )));
                }
            }
        }
        Ok(())
    }
}
