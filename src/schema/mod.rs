//! Schema templates and their versioned form
//!
//! `load(template_text, version_prefix)` parses a declaration template and
//! rewrites every declared name as `{version_prefix}_{name}`. The result is
//! both an in-memory lookup table for field mapping and a rendered artifact
//! handed to the database's bulk loader alongside the data stream.

mod template;
mod versioned;

use thiserror::Error;

pub use template::{
    is_identifier, parse_template, Declaration, PredicateDecl, ScalarKind, SchemaTemplate,
    TemplateEntry, TypeDecl, TypeField, ValueKind, METADATA_PREDICATE_PREFIX, METADATA_TYPE,
};
pub use versioned::{load, version_name, VersionTag, VersionedSchema, VERSION_SEPARATOR};

/// Errors from loading a schema template.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid version tag `{0}`: only letters, digits and underscores are allowed")]
    InvalidVersionTag(String),
}

impl SchemaError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
