//! Directory-backed document store (`file://<root>`)
//!
//! Collection `c` of database `d` is the JSONL file `<root>/d/c.jsonl`.

use super::cursor::{DocumentCursor, DocumentStore};
use super::SourceError;
use crate::record::RecordError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

pub struct DirectoryStore {
    id: String,
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            id: format!("file://{}", root.display()),
            root,
        }
    }

    pub fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.root.join(database).join(format!("{}.jsonl", collection))
    }
}

struct DirectoryCursor {
    origin: String,
    lines: Lines<BufReader<File>>,
    line: u64,
    batch_size: usize,
    /// A bad line found mid-batch, reported on the following call.
    pending_error: Option<SourceError>,
}

#[async_trait]
impl DocumentCursor for DirectoryCursor {
    async fn next_batch(&mut self) -> Result<Vec<Value>, SourceError> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let text = self
                .lines
                .next_line()
                .await
                .map_err(|e| SourceError::io(self.origin.clone(), e))?;
            let Some(text) = text else { break };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&text) {
                Ok(doc) => batch.push(doc),
                Err(e) => {
                    let err = SourceError::Record(RecordError::Malformed {
                        origin: self.origin.clone(),
                        line: self.line,
                        message: e.to_string(),
                    });
                    if batch.is_empty() {
                        return Err(err);
                    }
                    self.pending_error = Some(err);
                    break;
                }
            }
        }
        Ok(batch)
    }
}

#[async_trait]
impl DocumentStore for DirectoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_cursor(
        &self,
        database: &str,
        collection: &str,
        batch_size: usize,
    ) -> Result<Box<dyn DocumentCursor>, SourceError> {
        let path = self.collection_path(database, collection);
        let file = File::open(&path).await.map_err(|e| {
            SourceError::unavailable(&self.id, format!("{}: {}", path.display(), e))
        })?;
        Ok(Box::new(DirectoryCursor {
            origin: path.display().to_string(),
            lines: BufReader::new(file).lines(),
            line: 0,
            batch_size: batch_size.max(1),
            pending_error: None,
        }))
    }
}
