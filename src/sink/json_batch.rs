//! Batched JSON array output
//!
//! Statements are grouped into one object per subject, in the order the
//! subjects first appear within a record:
//!
//! ```json
//! {"dgraph.type":["v1_Gene"],"uid":"_:n1","v1_name":"BRCA1","v1_related":[{"uid":"_:n2"}]}
//! ```
//!
//! Objects are buffered up to `batch_size` and then written, so memory stays
//! bounded regardless of run length. The whole run forms a single array.

use super::{OutputSink, SinkError};
use crate::statement::{Literal, ObjectTerm, Statement};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};

fn object_value(object: &ObjectTerm) -> Value {
    match object {
        ObjectTerm::Node(label) => {
            let mut reference = Map::new();
            reference.insert("uid".to_string(), Value::String(format!("_:{}", label)));
            Value::Object(reference)
        }
        ObjectTerm::Literal(Literal::String(s)) | ObjectTerm::Literal(Literal::DateTime(s)) => {
            Value::String(s.clone())
        }
        ObjectTerm::Literal(Literal::Int(i)) => Value::from(*i),
        ObjectTerm::Literal(Literal::Float(x)) => {
            Number::from_f64(*x).map_or(Value::Null, Value::Number)
        }
        ObjectTerm::Literal(Literal::Bool(b)) => Value::Bool(*b),
    }
}

/// Collapse one record's statements into per-subject objects.
pub(crate) fn group_by_subject(statements: &[Statement]) -> Vec<Value> {
    let mut objects: Vec<(&str, Map<String, Value>)> = Vec::new();

    for statement in statements {
        let idx = match objects.iter().position(|(s, _)| *s == statement.subject) {
            Some(idx) => idx,
            None => {
                let mut object = Map::new();
                object.insert(
                    "uid".to_string(),
                    Value::String(format!("_:{}", statement.subject)),
                );
                objects.push((statement.subject.as_str(), object));
                objects.len() - 1
            }
        };

        let object = &mut objects[idx].1;
        let value = object_value(&statement.object);
        match object.get_mut(&statement.predicate) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                // Repeated single-valued predicate: keep both rather than overwrite.
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if statement.list => {
                object.insert(statement.predicate.clone(), Value::Array(vec![value]));
            }
            None => {
                object.insert(statement.predicate.clone(), value);
            }
        }
    }

    objects.into_iter().map(|(_, o)| Value::Object(o)).collect()
}

/// Writes a single JSON array, flushing every `batch_size` objects.
pub struct BatchJsonSink<W> {
    writer: W,
    batch_size: usize,
    pending: Vec<Value>,
    written: u64,
    opened: bool,
}

impl<W: AsyncWrite + Send + Unpin> BatchJsonSink<W> {
    pub fn new(writer: W, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            writer,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            written: 0,
            opened: false,
        }
    }

    /// Objects written so far (not counting the pending batch).
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn flush_batch(&mut self) -> Result<(), SinkError> {
        let mut buf = Vec::new();
        if !self.opened {
            buf.extend_from_slice(b"[\n");
            self.opened = true;
        }
        for object in self.pending.drain(..) {
            if self.written > 0 {
                buf.extend_from_slice(b",\n");
            }
            serde_json::to_writer(&mut buf, &object)?;
            self.written += 1;
        }
        self.writer.write_all(&buf).await?;
        tracing::trace!(objects = self.written, "flushed JSON batch");
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> OutputSink for BatchJsonSink<W> {
    async fn write_record(&mut self, statements: &[Statement]) -> Result<(), SinkError> {
        self.pending.extend(group_by_subject(statements));
        if self.pending.len() >= self.batch_size {
            self.flush_batch().await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.flush_batch().await?;
        let tail: &[u8] = if self.written > 0 { b"\n]\n" } else { b"]\n" };
        self.writer.write_all(tail).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
