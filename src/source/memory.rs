//! In-process document store

use super::cursor::{DocumentCursor, DocumentStore};
use super::SourceError;
use crate::record::RecordError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Collections held in memory, keyed by database and collection name.
///
/// A collection that was never populated reads as empty.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<(String, String), Arc<Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_many(
        &mut self,
        database: &str,
        collection: &str,
        documents: impl IntoIterator<Item = Value>,
    ) {
        let docs = self
            .collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();
        Arc::make_mut(docs).extend(documents);
    }

    /// Seed a collection from a JSONL file. Blank lines are ignored.
    pub async fn load_jsonl(
        &mut self,
        database: &str,
        collection: &str,
        path: impl AsRef<Path>,
    ) -> Result<usize, SourceError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::unavailable(origin.clone(), e))?;

        let mut docs = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let doc: Value = serde_json::from_str(line).map_err(|e| RecordError::Malformed {
                origin: origin.clone(),
                line: idx as u64 + 1,
                message: e.to_string(),
            })?;
            docs.push(doc);
        }

        let count = docs.len();
        self.insert_many(database, collection, docs);
        Ok(count)
    }

    pub fn len(&self, database: &str, collection: &str) -> usize {
        self.collections
            .get(&(database.to_string(), collection.to_string()))
            .map_or(0, |docs| docs.len())
    }
}

struct MemoryCursor {
    docs: Arc<Vec<Value>>,
    position: usize,
    batch_size: usize,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_batch(&mut self) -> Result<Vec<Value>, SourceError> {
        let end = (self.position + self.batch_size).min(self.docs.len());
        let batch = self.docs[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn open_cursor(
        &self,
        database: &str,
        collection: &str,
        batch_size: usize,
    ) -> Result<Box<dyn DocumentCursor>, SourceError> {
        let docs = self
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MemoryCursor {
            docs,
            position: 0,
            batch_size: batch_size.max(1),
        }))
    }
}
