//! Raw node/edge records as read from a source
//!
//! A record is a flat JSON object. It lives for one step of the pipeline:
//! read, mapped, emitted, dropped.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Whether a record describes a node or an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordRole {
    Node,
    Edge,
}

impl fmt::Display for RecordRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => f.write_str("node"),
            Self::Edge => f.write_str("edge"),
        }
    }
}

/// A record that could not be turned into statements.
///
/// Record-level errors are recoverable: the run either skips the record or
/// aborts, depending on the configured malformed-record policy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    #[error("{origin}:{line}: malformed record: {message}")]
    Malformed {
        origin: String,
        line: u64,
        message: String,
    },

    #[error("{origin}:{line}: {role} record is missing required field `{field}`")]
    MissingField {
        origin: String,
        line: u64,
        role: RecordRole,
        field: String,
    },
}

impl RecordError {
    pub fn line(&self) -> u64 {
        match self {
            Self::Malformed { line, .. } | Self::MissingField { line, .. } => *line,
        }
    }
}

/// Which record fields carry identity, type and edge endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordLayout {
    /// Node identifier (also the optional edge identifier).
    pub id: String,
    /// Node type/category; a string or a list of strings.
    pub category: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// CURIE prefixes removed from categories and edge predicates (`biolink:Gene` -> `Gene`).
    pub strip_curie_prefixes: Vec<String>,
    /// Type asserted for nodes that carry no category.
    pub default_node_type: String,
    /// Type asserted for reified edge nodes.
    pub default_edge_type: String,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            category: "category".to_string(),
            subject: "subject".to_string(),
            predicate: "predicate".to_string(),
            object: "object".to_string(),
            strip_curie_prefixes: vec!["biolink".to_string()],
            default_node_type: "Node".to_string(),
            default_edge_type: "Edge".to_string(),
        }
    }
}

impl RecordLayout {
    /// Fields consumed structurally for this role; never mapped as predicates.
    pub fn is_reserved(&self, role: RecordRole, field: &str) -> bool {
        match role {
            RecordRole::Node => field == self.id || field == self.category,
            RecordRole::Edge => {
                field == self.id
                    || field == self.subject
                    || field == self.predicate
                    || field == self.object
            }
        }
    }

    /// Strip a configured CURIE prefix and sanitize into a schema name.
    pub fn schema_name(&self, raw: &str) -> String {
        let local = self
            .strip_curie_prefixes
            .iter()
            .find_map(|prefix| {
                raw.strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix(':'))
            })
            .unwrap_or(raw);
        sanitize_name(local)
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// One node or edge record.
#[derive(Debug, Clone)]
pub struct RawRecord {
    role: RecordRole,
    fields: Map<String, Value>,
    origin: Arc<str>,
    line: u64,
}

impl RawRecord {
    pub fn new(role: RecordRole, fields: Map<String, Value>, origin: Arc<str>, line: u64) -> Self {
        Self {
            role,
            fields,
            origin,
            line,
        }
    }

    /// Build a record from a decoded JSON document; anything but an object is malformed.
    pub fn from_value(
        role: RecordRole,
        value: Value,
        origin: Arc<str>,
        line: u64,
    ) -> Result<Self, RecordError> {
        match value {
            Value::Object(fields) => Ok(Self::new(role, fields, origin, line)),
            other => Err(RecordError::Malformed {
                origin: origin.to_string(),
                line,
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
        }
    }

    /// Parse one line of line-delimited JSON.
    pub fn parse_line(
        role: RecordRole,
        text: &str,
        origin: Arc<str>,
        line: u64,
    ) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(text).map_err(|e| RecordError::Malformed {
            origin: origin.to_string(),
            line,
            message: e.to_string(),
        })?;
        Self::from_value(role, value, origin, line)
    }

    pub fn role(&self) -> RecordRole {
        self.role
    }

    /// Fields in key order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// 1-based line (file sources) or document ordinal (cursor sources).
    pub fn line(&self) -> u64 {
        self.line
    }

    /// A scalar field rendered as text; absent, null and empty values are `None`.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A required scalar text field.
    pub fn require_text(&self, field: &str) -> Result<String, RecordError> {
        self.text(field).ok_or_else(|| RecordError::MissingField {
            origin: self.origin.to_string(),
            line: self.line,
            role: self.role,
            field: field.to_string(),
        })
    }

    /// A string or list-of-strings field flattened to its non-empty texts.
    pub fn texts(&self, field: &str) -> Vec<String> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(_) => self.text(field).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Truthiness of a flag-like field (`true`, `"true"`, `"1"`, `"yes"`, non-zero numbers).
    pub fn flag(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => {
                matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
            }
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
