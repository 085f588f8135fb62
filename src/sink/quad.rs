//! Line-oriented quad text

use super::{OutputSink, SinkError};
use crate::statement::{Literal, ObjectTerm, Statement};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Render one statement as `_:subject <predicate> object .` (no newline).
pub fn quad_line(statement: &Statement) -> String {
    format!(
        "_:{} <{}> {} .",
        statement.subject,
        statement.predicate,
        object_text(&statement.object)
    )
}

fn quoted(text: &str) -> String {
    Value::from(text).to_string()
}

fn object_text(object: &ObjectTerm) -> String {
    match object {
        ObjectTerm::Node(label) => format!("_:{}", label),
        ObjectTerm::Literal(Literal::String(s)) => quoted(s),
        ObjectTerm::Literal(Literal::Int(i)) => format!("\"{}\"^^<xs:int>", i),
        ObjectTerm::Literal(Literal::Float(x)) => format!("\"{}\"^^<xs:float>", x),
        ObjectTerm::Literal(Literal::Bool(b)) => format!("\"{}\"^^<xs:boolean>", b),
        ObjectTerm::Literal(Literal::DateTime(s)) => format!("{}^^<xs:dateTime>", quoted(s)),
    }
}

/// Writes statements as they arrive; nothing is held back between records.
pub struct QuadSink<W> {
    writer: W,
    buf: String,
}

impl<W: AsyncWrite + Send + Unpin> QuadSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> OutputSink for QuadSink<W> {
    async fn write_record(&mut self, statements: &[Statement]) -> Result<(), SinkError> {
        self.buf.clear();
        for statement in statements {
            self.buf.push_str(&quad_line(statement));
            self.buf.push('\n');
        }
        self.writer.write_all(self.buf.as_bytes()).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}
