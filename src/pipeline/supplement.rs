//! Declarations for names the template does not cover
//!
//! Edge predicates, reified-edge bookkeeping predicates, category types and
//! (under `include_all`) arbitrary record fields can all produce names the
//! template never declared. The supplement collects them as they are emitted
//! so they can be appended to the schema artifact; its size is bounded by the
//! number of distinct names, not by the number of records.

use crate::schema::{PredicateDecl, ScalarKind, TypeDecl, TypeField, ValueKind, VersionedSchema};
use crate::statement::{Literal, ObjectTerm, Statement};
use std::collections::{BTreeMap, BTreeSet};

pub const SUPPLEMENT_HEADER: &str = "# inferred during conversion";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSupplement {
    predicates: BTreeMap<String, ValueKind>,
    types: BTreeMap<String, BTreeSet<String>>,
}

impl SchemaSupplement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every undeclared predicate and type in one record's statements.
    pub fn observe(&mut self, schema: &VersionedSchema, statements: &[Statement]) {
        for statement in statements {
            if statement.is_type_assertion() {
                if let ObjectTerm::Literal(Literal::String(ty)) = &statement.object {
                    if !schema.declares_type_name(ty) && !self.types.contains_key(ty) {
                        tracing::debug!(type_name = %ty, "undeclared type");
                        self.types.insert(ty.clone(), BTreeSet::new());
                    }
                }
                continue;
            }

            if !schema.declares_predicate_name(&statement.predicate) {
                let kind = statement.value_kind();
                match self.predicates.get_mut(&statement.predicate) {
                    Some(seen) => *seen = widen(*seen, kind),
                    None => {
                        tracing::debug!(predicate = %statement.predicate, %kind, "undeclared predicate");
                        self.predicates.insert(statement.predicate.clone(), kind);
                    }
                }
            }

            // Fields of inferred types: every predicate their instances carry.
            for ty in types_of(&statement.subject, statements) {
                if let Some(fields) = self.types.get_mut(ty) {
                    if !fields.contains(&statement.predicate) {
                        fields.insert(statement.predicate.clone());
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.types.is_empty()
    }

    pub fn predicates(&self) -> impl Iterator<Item = (&str, ValueKind)> {
        self.predicates.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Declaration text to append to the schema artifact; empty if nothing was inferred.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = format!("\n{}\n", SUPPLEMENT_HEADER);
        for (name, kind) in &self.predicates {
            out.push_str(&PredicateDecl::new(name.clone(), *kind).render());
            out.push('\n');
        }
        for (name, fields) in &self.types {
            let decl = TypeDecl {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|f| TypeField {
                        name: f.clone(),
                        reverse: false,
                    })
                    .collect(),
            };
            out.push('\n');
            out.push_str(&decl.render());
            out.push('\n');
        }
        out
    }
}

fn types_of<'s>(subject: &'s str, statements: &'s [Statement]) -> impl Iterator<Item = &'s str> {
    statements.iter().filter_map(move |s| match &s.object {
        ObjectTerm::Literal(Literal::String(ty)) if s.is_type_assertion() && s.subject == subject => {
            Some(ty.as_str())
        }
        _ => None,
    })
}

/// Conflicting scalar kinds widen to string; a list anywhere makes the predicate a list.
fn widen(a: ValueKind, b: ValueKind) -> ValueKind {
    ValueKind {
        scalar: if a.scalar == b.scalar {
            a.scalar
        } else {
            ScalarKind::String
        },
        list: a.list || b.list,
    }
}
