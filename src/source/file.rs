//! Line-delimited JSON file source

use super::{RecordSource, SourceError};
use crate::record::{RawRecord, RecordRole};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

type LineReader = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// One JSONL input, read a line at a time.
struct JsonLines {
    role: RecordRole,
    origin: Arc<str>,
    lines: LineReader,
    line: u64,
    done: bool,
}

impl JsonLines {
    fn new(role: RecordRole, origin: &str, reader: Box<dyn AsyncBufRead + Send + Unpin>) -> Self {
        Self {
            role,
            origin: Arc::from(origin),
            lines: reader.lines(),
            line: 0,
            done: false,
        }
    }

    async fn next(&mut self) -> Result<Option<RawRecord>, SourceError> {
        while !self.done {
            let text = self
                .lines
                .next_line()
                .await
                .map_err(|e| SourceError::io(self.origin.as_ref(), e))?;
            let Some(text) = text else {
                self.done = true;
                break;
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let record = RawRecord::parse_line(self.role, &text, self.origin.clone(), self.line)?;
            return Ok(Some(record));
        }
        Ok(None)
    }
}

/// Reads a nodes file to the end, then an edges file.
pub struct FileSource {
    id: String,
    nodes: JsonLines,
    edges: JsonLines,
}

impl FileSource {
    /// Open both files up front so a missing input fails before anything is emitted.
    pub async fn open(nodes: impl AsRef<Path>, edges: impl AsRef<Path>) -> Result<Self, SourceError> {
        let nodes = nodes.as_ref();
        let edges = edges.as_ref();
        let id = format!("files:{}+{}", nodes.display(), edges.display());

        let nodes_file = tokio::fs::File::open(nodes)
            .await
            .map_err(|e| SourceError::unavailable(nodes.display().to_string(), e))?;
        let edges_file = tokio::fs::File::open(edges)
            .await
            .map_err(|e| SourceError::unavailable(edges.display().to_string(), e))?;

        tracing::debug!(nodes = %nodes.display(), edges = %edges.display(), "opened record files");

        Ok(Self {
            id,
            nodes: JsonLines::new(
                RecordRole::Node,
                &nodes.display().to_string(),
                Box::new(BufReader::new(nodes_file)),
            ),
            edges: JsonLines::new(
                RecordRole::Edge,
                &edges.display().to_string(),
                Box::new(BufReader::new(edges_file)),
            ),
        })
    }

    /// Read from arbitrary buffered readers; `nodes_origin`/`edges_origin` name them in errors.
    pub fn from_readers<N, E>(nodes_origin: &str, nodes: N, edges_origin: &str, edges: E) -> Self
    where
        N: AsyncBufRead + Send + Unpin + 'static,
        E: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            id: format!("files:{}+{}", nodes_origin, edges_origin),
            nodes: JsonLines::new(RecordRole::Node, nodes_origin, Box::new(nodes)),
            edges: JsonLines::new(RecordRole::Edge, edges_origin, Box::new(edges)),
        }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        if let Some(record) = self.nodes.next().await? {
            return Ok(Some(record));
        }
        self.edges.next().await
    }
}
