//! Statement emission for node and edge records
//!
//! Nodes become one type assertion per category plus one statement per
//! mapped field. Edges become a single `subject <predicate> object`
//! statement; an edge carrying attribute fields is additionally reified as
//! an edge node that holds the attributes and links back to both endpoints.
//! Nested objects hang off their parent as blank nodes labelled
//! `{parent}_{predicate}_{n}`, numbered per parent in field order.

use crate::mapping::{MappedField, Mapping, NestedObject};
use crate::record::{sanitize_name, RawRecord, RecordError, RecordLayout, RecordRole};
use crate::schema::VersionTag;
use crate::statement::{ObjectTerm, Statement};

/// Blank-node label for a node identifier.
pub fn node_label(id: &str) -> String {
    sanitize_name(id)
}

/// Turns mapped records into statements.
///
/// Holds the edge ordinal used to label reified edges without an `id`,
/// so one emitter must be used for the whole run.
pub struct StatementEmitter<'a> {
    tag: &'a VersionTag,
    layout: &'a RecordLayout,
    identifier_predicate: Option<String>,
    edge_ordinal: u64,
}

impl<'a> StatementEmitter<'a> {
    pub fn new(tag: &'a VersionTag, layout: &'a RecordLayout) -> Self {
        Self {
            tag,
            layout,
            identifier_predicate: None,
            edge_ordinal: 0,
        }
    }

    /// Also emit each node's identifier as a literal under this (unversioned) predicate name.
    pub fn with_identifier_predicate(mut self, name: Option<&str>) -> Self {
        self.identifier_predicate = name.map(|n| self.tag.apply(&sanitize_name(n)));
        self
    }

    pub fn emit(&mut self, record: &RawRecord, mapping: Mapping) -> Result<Vec<Statement>, RecordError> {
        match record.role() {
            RecordRole::Node => self.emit_node(record, mapping),
            RecordRole::Edge => self.emit_edge(record, mapping),
        }
    }

    fn emit_node(&self, record: &RawRecord, mapping: Mapping) -> Result<Vec<Statement>, RecordError> {
        let id = record.require_text(&self.layout.id)?;
        let subject = node_label(&id);

        let mut types: Vec<String> = Vec::new();
        for category in record.texts(&self.layout.category) {
            let name = self.layout.schema_name(&category);
            if !types.contains(&name) {
                types.push(name);
            }
        }
        if types.is_empty() {
            types.push(sanitize_name(&self.layout.default_node_type));
        }

        let mut statements = Vec::with_capacity(types.len() + mapping.fields.len() + 1);
        for ty in &types {
            statements.push(Statement::type_assertion(&subject, self.tag.apply(ty)));
        }
        if let Some(predicate) = &self.identifier_predicate {
            statements.push(Statement::new(&subject, predicate, ObjectTerm::string(&id)));
        }
        attach(&subject, mapping.fields, mapping.objects, &mut statements);

        Ok(statements)
    }

    fn emit_edge(&mut self, record: &RawRecord, mapping: Mapping) -> Result<Vec<Statement>, RecordError> {
        let subject = node_label(&record.require_text(&self.layout.subject)?);
        let object = node_label(&record.require_text(&self.layout.object)?);
        let relation = self.layout.schema_name(&record.require_text(&self.layout.predicate)?);

        let ordinal = self.edge_ordinal;
        self.edge_ordinal += 1;

        let mut statements = vec![Statement::new(
            &subject,
            self.tag.apply(&relation),
            ObjectTerm::Node(object.clone()),
        )
        .listed()];

        if mapping.is_empty() {
            return Ok(statements);
        }

        let label = match record.text(&self.layout.id) {
            Some(id) => format!("edge_{}_{}", self.tag, sanitize_name(&id)),
            None => format!("edge_{}_{}", self.tag, ordinal),
        };

        statements.push(Statement::type_assertion(
            &label,
            self.tag.apply(&sanitize_name(&self.layout.default_edge_type)),
        ));
        statements.push(Statement::new(
            &label,
            self.tag.apply(&sanitize_name(&self.layout.subject)),
            ObjectTerm::Node(subject),
        ));
        statements.push(Statement::new(
            &label,
            self.tag.apply(&sanitize_name(&self.layout.object)),
            ObjectTerm::Node(object),
        ));
        statements.push(Statement::new(
            &label,
            self.tag.apply(&sanitize_name(&self.layout.predicate)),
            ObjectTerm::string(relation),
        ));
        attach(&label, mapping.fields, mapping.objects, &mut statements);

        Ok(statements)
    }
}

/// Statements for `fields` on `subject`, then one linked blank node per
/// nested object, depth first.
fn attach(subject: &str, fields: Vec<MappedField>, objects: Vec<NestedObject>, out: &mut Vec<Statement>) {
    out.extend(fields.into_iter().map(|f| Statement {
        subject: subject.to_string(),
        predicate: f.predicate,
        object: f.value,
        list: f.kind.list,
    }));

    for (n, object) in objects.into_iter().enumerate() {
        let label = format!("{}_{}_{}", subject, object.predicate, n);
        out.push(Statement {
            subject: subject.to_string(),
            predicate: object.predicate,
            object: ObjectTerm::Node(label.clone()),
            list: object.list,
        });
        attach(&label, object.fields, object.objects, out);
    }
}
