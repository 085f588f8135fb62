//! Document-store cursor source
//!
//! The store itself is an external collaborator reached through
//! [`DocumentStore`]. [`CursorSource`] drains the nodes collection, then the
//! edges collection, one batch at a time, and stops early once `max_items`
//! records have been produced.

use super::{RecordSource, SourceError};
use crate::record::{RawRecord, RecordRole};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// A store that can open cursors over collections of JSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn id(&self) -> &str;

    async fn open_cursor(
        &self,
        database: &str,
        collection: &str,
        batch_size: usize,
    ) -> Result<Box<dyn DocumentCursor>, SourceError>;
}

/// A forward-only cursor. An empty batch means the cursor is exhausted.
#[async_trait]
pub trait DocumentCursor: Send {
    async fn next_batch(&mut self) -> Result<Vec<Value>, SourceError>;
}

/// Where and how much to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSettings {
    pub database: String,
    pub nodes_collection: String,
    pub edges_collection: String,
    pub batch_size: usize,
    /// Upper bound on node and edge records together; `None` is unbounded.
    pub max_items: Option<u64>,
}

enum CursorState {
    Unopened,
    Open(Box<dyn DocumentCursor>),
    Exhausted,
}

struct Collection {
    role: RecordRole,
    name: String,
    origin: Arc<str>,
    state: CursorState,
    buffer: VecDeque<Value>,
    ordinal: u64,
}

impl Collection {
    fn new(role: RecordRole, database: &str, name: &str) -> Self {
        Self {
            role,
            name: name.to_string(),
            origin: Arc::from(format!("{}.{}", database, name)),
            state: CursorState::Unopened,
            buffer: VecDeque::new(),
            ordinal: 0,
        }
    }

    async fn next(
        &mut self,
        store: &dyn DocumentStore,
        database: &str,
        batch_size: usize,
    ) -> Result<Option<RawRecord>, SourceError> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                self.ordinal += 1;
                let record = RawRecord::from_value(self.role, doc, self.origin.clone(), self.ordinal)?;
                return Ok(Some(record));
            }

            match &mut self.state {
                CursorState::Exhausted => return Ok(None),
                CursorState::Unopened => {
                    let cursor = store.open_cursor(database, &self.name, batch_size).await?;
                    tracing::debug!(collection = %self.origin, batch_size, "opened cursor");
                    self.state = CursorState::Open(cursor);
                }
                CursorState::Open(cursor) => {
                    let batch = match cursor.next_batch().await {
                        Ok(batch) => batch,
                        Err(e) if e.is_recoverable() => {
                            self.ordinal += 1;
                            return Err(e);
                        }
                        Err(e) => return Err(e),
                    };
                    if batch.is_empty() {
                        tracing::debug!(collection = %self.origin, documents = self.ordinal, "cursor exhausted");
                        self.state = CursorState::Exhausted;
                    } else {
                        self.buffer.extend(batch);
                    }
                }
            }
        }
    }
}

/// Reads node then edge documents through a [`DocumentStore`].
pub struct CursorSource {
    id: String,
    store: Arc<dyn DocumentStore>,
    settings: CursorSettings,
    nodes: Collection,
    edges: Collection,
    produced: u64,
}

impl CursorSource {
    pub fn new(store: Arc<dyn DocumentStore>, settings: CursorSettings) -> Self {
        let id = format!("{}/{}", store.id(), settings.database);
        let nodes = Collection::new(RecordRole::Node, &settings.database, &settings.nodes_collection);
        let edges = Collection::new(RecordRole::Edge, &settings.database, &settings.edges_collection);
        Self {
            id,
            store,
            settings,
            nodes,
            edges,
            produced: 0,
        }
    }

    fn limit_reached(&self) -> bool {
        self.settings.max_items.is_some_and(|max| self.produced >= max)
    }
}

#[async_trait]
impl RecordSource for CursorSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        if self.limit_reached() {
            return Ok(None);
        }

        let store = self.store.as_ref();
        let database = self.settings.database.as_str();
        let batch_size = self.settings.batch_size;

        let next = match self.nodes.next(store, database, batch_size).await {
            Ok(None) => self.edges.next(store, database, batch_size).await,
            other => other,
        };

        match next {
            Ok(Some(record)) => {
                self.produced += 1;
                Ok(Some(record))
            }
            Err(e) if e.is_recoverable() => {
                self.produced += 1;
                Err(e)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(batch_size: usize, max_items: Option<u64>) -> CursorSettings {
        CursorSettings {
            database: "kg".to_string(),
            nodes_collection: "nodes".to_string(),
            edges_collection: "edges".to_string(),
            batch_size,
            max_items,
        }
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_many(
            "kg",
            "nodes",
            (1..=5).map(|i| json!({"id": format!("n{}", i)})),
        );
        store.insert_many(
            "kg",
            "edges",
            vec![json!({"subject":"n1","predicate":"p","object":"n2"})],
        );
        store
    }

    async fn drain(src: &mut CursorSource) -> Vec<RawRecord> {
        let mut out = Vec::new();
        while let Some(record) = src.next_record().await.unwrap() {
            out.push(record);
        }
        out
    }

    /// Counts cursor opens so tests can assert nothing was read.
    struct CountingStore {
        inner: MemoryStore,
        opens: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        fn id(&self) -> &str {
            "counting"
        }

        async fn open_cursor(
            &self,
            database: &str,
            collection: &str,
            batch_size: usize,
        ) -> Result<Box<dyn DocumentCursor>, SourceError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open_cursor(database, collection, batch_size).await
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        fn id(&self) -> &str {
            "failing"
        }

        async fn open_cursor(
            &self,
            _database: &str,
            _collection: &str,
            _batch_size: usize,
        ) -> Result<Box<dyn DocumentCursor>, SourceError> {
            Err(SourceError::unavailable("failing", "connection refused"))
        }
    }

    #[tokio::test]
    async fn reads_every_document_across_batches() {
        let mut src = CursorSource::new(Arc::new(store()), settings(2, None));
        let records = drain(&mut src).await;
        assert_eq!(records.len(), 6);
        assert_eq!(records[4].text("id").as_deref(), Some("n5"));
        assert_eq!(records[5].role(), RecordRole::Edge);
        assert_eq!(records[5].origin(), "kg.edges");
    }

    #[tokio::test]
    async fn max_items_counts_nodes_and_edges_together() {
        let mut src = CursorSource::new(Arc::new(store()), settings(10, Some(3)));
        let records = drain(&mut src).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.role() == RecordRole::Node));
    }

    // --- Scenario: max_items = 0 ---

    #[tokio::test]
    async fn max_items_zero_never_opens_a_cursor() {
        let store = Arc::new(CountingStore {
            inner: store(),
            opens: AtomicUsize::new(0),
        });
        let mut src = CursorSource::new(store.clone(), settings(10, Some(0)));
        assert!(src.next_record().await.unwrap().is_none());
        assert_eq!(store.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn edges_cursor_opens_only_after_nodes_are_drained() {
        let store = Arc::new(CountingStore {
            inner: store(),
            opens: AtomicUsize::new(0),
        });
        let mut src = CursorSource::new(store.clone(), settings(10, None));
        src.next_record().await.unwrap();
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);
        drain(&mut src).await;
        assert_eq!(store.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_object_documents_are_recoverable() {
        let mut store = MemoryStore::new();
        store.insert_many("kg", "nodes", vec![json!("oops"), json!({"id": "n2"})]);
        let mut src = CursorSource::new(Arc::new(store), settings(10, None));

        let err = src.next_record().await.unwrap_err();
        assert!(err.is_recoverable());
        let record = src.next_record().await.unwrap().unwrap();
        assert_eq!(record.line(), 2);
    }

    #[tokio::test]
    async fn unreachable_store_is_source_unavailable() {
        let mut src = CursorSource::new(Arc::new(FailingStore), settings(10, None));
        let err = src.next_record().await.unwrap_err();
        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
    }
}
