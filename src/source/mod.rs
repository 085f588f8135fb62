//! Record sources
//!
//! A source yields a lazy sequence of role-tagged records: every node
//! record first, then every edge record. Two variants exist, one reading
//! line-delimited JSON files and one pulling batches from a document-store
//! cursor. Everything downstream depends only on [`RecordSource`].

mod cursor;
mod directory;
mod file;
mod memory;

use crate::record::{RawRecord, RecordError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use cursor::{CursorSettings, CursorSource, DocumentCursor, DocumentStore};
pub use directory::DirectoryStore;
pub use file::FileSource;
pub use memory::MemoryStore;

/// Errors raised while reading records.
#[derive(Debug, Error)]
pub enum SourceError {
    /// One record could not be read; the source can continue with the next.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The underlying store or file cannot be reached. Not retried.
    #[error("data source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("I/O error reading {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub(crate) fn unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(origin: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            origin: origin.into(),
            source,
        }
    }

    /// Record-level errors leave the source positioned at the next record.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

/// A lazy, pull-based producer of node and edge records.
///
/// Implementations yield all node records before any edge record and hold
/// at most one read batch in memory. After a recoverable error the next
/// call continues with the following record; after a fatal error the
/// source should not be polled again.
#[async_trait]
pub trait RecordSource: Send {
    /// Human-readable identity used in logs and errors.
    fn id(&self) -> &str;

    /// The next record, or `None` when both node and edge inputs are exhausted.
    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError>;
}

/// Open a document store by URI.
///
/// `file://<root>` opens a [`DirectoryStore`]. Network stores are external
/// collaborators; any other scheme is reported as unavailable.
pub fn connect(uri: &str) -> Result<Arc<dyn DocumentStore>, SourceError> {
    match uri.split_once("://") {
        Some(("file", root)) if !root.is_empty() => Ok(Arc::new(DirectoryStore::new(root))),
        Some((scheme, _)) => Err(SourceError::unavailable(
            uri,
            format!("no driver for scheme '{}'", scheme),
        )),
        None => Err(SourceError::unavailable(uri, "not a store URI")),
    }
}
