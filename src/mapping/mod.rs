//! Field-to-predicate mapping
//!
//! Decides which record fields become predicates, applies the version
//! prefix, and coerces values to the kind the versioned schema declares.
//! A schema declaration always wins over what inspection of the value would
//! suggest; inspection only fills in kinds for undeclared fields under
//! [`MappingPolicy::IncludeAll`], where undeclared object values also
//! become [`NestedObject`]s instead of JSON text.

mod coerce;

use crate::record::{sanitize_name, RawRecord, RecordLayout};
use crate::schema::{ScalarKind, ValueKind, VersionedSchema};
use crate::statement::ObjectTerm;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub use coerce::{coerce, infer_kind, value_text};

/// Which record fields are mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingPolicy {
    /// Only fields with a predicate declaration in the schema.
    #[default]
    Minimal,
    /// Every field; undeclared ones get a kind inferred from their value.
    IncludeAll,
}

/// One record field after prefixing and coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedField {
    /// Versioned predicate name.
    pub predicate: String,
    pub value: ObjectTerm,
    pub kind: ValueKind,
    /// The predicate has a declaration in the versioned schema.
    pub declared: bool,
}

/// An undeclared object value mapped under `IncludeAll`. It is emitted as
/// a blank node linked from its parent through `predicate`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NestedObject {
    /// Versioned predicate linking the parent to this object.
    pub predicate: String,
    /// The field held a list, so the link is multi-valued.
    pub list: bool,
    pub fields: Vec<MappedField>,
    pub objects: Vec<NestedObject>,
}

/// A non-fatal coercion that dropped data: values beyond the first bound
/// for a single-valued predicate, either from one multi-valued field or
/// from a second field whose name sanitizes to the same predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct LossyCoercion {
    pub origin: String,
    pub line: u64,
    pub field: String,
    pub predicate: String,
    pub dropped: usize,
}

impl fmt::Display for LossyCoercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: `{}` is single-valued; dropped {} value(s) of field `{}`",
            self.origin, self.line, self.predicate, self.dropped, self.field
        )
    }
}

/// Fatal mapping failures.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{origin}:{line}: field `{field}` value {value} does not match declared type {expected} of `{predicate}`")]
    TypeMismatch {
        origin: String,
        line: u64,
        field: String,
        predicate: String,
        expected: ScalarKind,
        value: String,
    },
}

/// The mapped fields of one record plus any lossy coercions it caused.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    pub fields: Vec<MappedField>,
    pub objects: Vec<NestedObject>,
    pub lossy: Vec<LossyCoercion>,
}

impl Mapping {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.objects.is_empty()
    }
}

/// Maps raw records onto versioned predicates.
pub struct FieldMapper<'a> {
    schema: &'a VersionedSchema,
    layout: &'a RecordLayout,
    policy: MappingPolicy,
}

impl<'a> FieldMapper<'a> {
    pub fn new(schema: &'a VersionedSchema, layout: &'a RecordLayout, policy: MappingPolicy) -> Self {
        Self {
            schema,
            layout,
            policy,
        }
    }

    pub fn policy(&self) -> MappingPolicy {
        self.policy
    }

    /// Map every non-reserved field of `record`, in field-name order.
    pub fn map(&self, record: &RawRecord) -> Result<Mapping, MappingError> {
        let mut mapping = Mapping::default();

        for (field, value) in record.fields() {
            if field.starts_with('_') || self.layout.is_reserved(record.role(), field) {
                continue;
            }
            self.map_entry(record, field, value, &mut mapping)?;
        }

        Ok(mapping)
    }

    fn map_entry(
        &self,
        record: &RawRecord,
        field: &str,
        value: &Value,
        mapping: &mut Mapping,
    ) -> Result<(), MappingError> {
        let values = present_values(value);
        if values.is_empty() {
            return Ok(());
        }

        let name = sanitize_name(field);
        if let Some(decl) = self.schema.predicate(&name) {
            return self.map_field(record, field, decl.name.clone(), decl.kind, true, values, mapping);
        }
        if self.policy == MappingPolicy::Minimal {
            tracing::trace!(field = %field, "undeclared field dropped");
            return Ok(());
        }

        let predicate = self.schema.tag().apply(&name);
        let mut scalars = Vec::with_capacity(values.len());
        for item in values {
            match item {
                Value::Object(entries) => {
                    self.map_object(record, &predicate, value.is_array(), entries, mapping)?
                }
                other => scalars.push(other),
            }
        }
        if scalars.is_empty() {
            return Ok(());
        }

        let kind = infer_kind(&scalars, value.is_array());
        self.map_field(record, field, predicate, kind, false, scalars, mapping)
    }

    fn map_object(
        &self,
        record: &RawRecord,
        predicate: &str,
        list: bool,
        entries: &Map<String, Value>,
        mapping: &mut Mapping,
    ) -> Result<(), MappingError> {
        let mut inner = Mapping::default();
        for (field, value) in entries {
            if !field.starts_with('_') {
                self.map_entry(record, field, value, &mut inner)?;
            }
        }
        mapping.lossy.append(&mut inner.lossy);

        if inner.is_empty() {
            tracing::trace!(predicate, "empty nested object dropped");
            return Ok(());
        }
        mapping.objects.push(NestedObject {
            predicate: predicate.to_string(),
            list,
            fields: inner.fields,
            objects: inner.objects,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn map_field(
        &self,
        record: &RawRecord,
        field: &str,
        predicate: String,
        kind: ValueKind,
        declared: bool,
        mut values: Vec<&Value>,
        mapping: &mut Mapping,
    ) -> Result<(), MappingError> {
        if !kind.list && mapping.fields.iter().any(|f| f.predicate == predicate) {
            report_loss(record, field, &predicate, values.len(), mapping);
            return Ok(());
        }
        if !kind.list && values.len() > 1 {
            report_loss(record, field, &predicate, values.len() - 1, mapping);
            values.truncate(1);
        }

        let mut coerced = Vec::with_capacity(values.len());
        for value in &values {
            match coerce(value, kind.scalar) {
                Some(term) => coerced.push(term),
                None if self.policy == MappingPolicy::Minimal => {
                    return Err(MappingError::TypeMismatch {
                        origin: record.origin().to_string(),
                        line: record.line(),
                        field: field.to_string(),
                        predicate,
                        expected: kind.scalar,
                        value: value.to_string(),
                    });
                }
                None => {
                    tracing::warn!(
                        origin = record.origin(),
                        line = record.line(),
                        field = %field,
                        expected = %kind.scalar,
                        "value does not coerce; emitting as string"
                    );
                    let kind = ValueKind {
                        scalar: ScalarKind::String,
                        list: kind.list,
                    };
                    for value in &values {
                        mapping.fields.push(MappedField {
                            predicate: predicate.clone(),
                            value: ObjectTerm::string(value_text(value)),
                            kind,
                            declared,
                        });
                    }
                    return Ok(());
                }
            }
        }

        for value in coerced {
            mapping.fields.push(MappedField {
                predicate: predicate.clone(),
                value,
                kind,
                declared,
            });
        }
        Ok(())
    }
}

fn report_loss(record: &RawRecord, field: &str, predicate: &str, dropped: usize, mapping: &mut Mapping) {
    let lossy = LossyCoercion {
        origin: record.origin().to_string(),
        line: record.line(),
        field: field.to_string(),
        predicate: predicate.to_string(),
        dropped,
    };
    tracing::warn!("{}", lossy);
    mapping.lossy.push(lossy);
}

/// Non-empty values of a field: list items, or the scalar itself.
fn present_values(value: &Value) -> Vec<&Value> {
    fn present(v: &Value) -> bool {
        match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    match value {
        Value::Array(items) => items.iter().filter(|v| present(v)).collect(),
        other if present(other) => vec![other],
        _ => Vec::new(),
    }
}
