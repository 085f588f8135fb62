//! Version-prefixed schema
//!
//! Versioning is pure name rewriting: `{prefix}_{name}` for every declared
//! predicate and type, except the registry metadata vocabulary which all
//! versions share.

use super::template::{
    parse_template, Declaration, PredicateDecl, SchemaTemplate, TemplateEntry, TypeDecl, TypeField,
};
use super::SchemaError;
use std::collections::HashMap;
use std::fmt;

/// Separator between the version prefix and the original name.
pub const VERSION_SEPARATOR: char = '_';

/// Prefix a name with a version tag. Stateless; see [`VersionTag::apply`].
pub fn version_name(prefix: &str, name: &str) -> String {
    format!("{}{}{}", prefix, VERSION_SEPARATOR, name)
}

/// A validated version prefix (`[A-Za-z0-9_]+`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    /// Validate a version prefix. Invalid tags are rejected, never sanitized.
    pub fn new(tag: impl Into<String>) -> Result<Self, SchemaError> {
        let tag = tag.into();
        if super::template::is_identifier(&tag) {
            Ok(Self(tag))
        } else {
            Err(SchemaError::InvalidVersionTag(tag))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{tag}_{name}`
    pub fn apply(&self, name: &str) -> String {
        version_name(&self.0, name)
    }

    /// True if `name` already starts with `{tag}_`.
    pub fn is_applied_to(&self, name: &str) -> bool {
        name.strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with(VERSION_SEPARATOR))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The schema of one run: template declarations with every name versioned.
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone)]
pub struct VersionedSchema {
    tag: VersionTag,
    entries: Vec<TemplateEntry>,
    /// Original (unversioned) predicate name -> index into `entries`.
    predicates: HashMap<String, usize>,
    /// Original type name -> index into `entries`.
    types: HashMap<String, usize>,
}

impl VersionedSchema {
    /// Version every non-shared declaration of `template` with `tag`.
    pub fn from_template(template: &SchemaTemplate, tag: VersionTag) -> Result<Self, SchemaError> {
        let mut entries = Vec::with_capacity(template.entries.len());
        let mut predicates = HashMap::new();
        let mut types = HashMap::new();

        if let Some(line) = already_versioned(template, &tag) {
            return Err(SchemaError::parse(
                line,
                format!("template is already versioned with prefix `{}`", tag),
            ));
        }

        for entry in &template.entries {
            if entry.shared {
                entries.push(entry.clone());
                continue;
            }

            let declaration = match &entry.declaration {
                Declaration::Predicate(p) => {
                    predicates.insert(p.name.clone(), entries.len());
                    Declaration::Predicate(PredicateDecl {
                        name: tag.apply(&p.name),
                        ..p.clone()
                    })
                }
                Declaration::Type(t) => {
                    types.insert(t.name.clone(), entries.len());
                    Declaration::Type(TypeDecl {
                        name: tag.apply(&t.name),
                        fields: t
                            .fields
                            .iter()
                            .map(|f| TypeField {
                                name: tag.apply(&f.name),
                                reverse: f.reverse,
                            })
                            .collect(),
                    })
                }
            };

            entries.push(TemplateEntry {
                declaration,
                shared: false,
                line: entry.line,
            });
        }

        Ok(Self {
            tag,
            entries,
            predicates,
            types,
        })
    }

    pub fn tag(&self) -> &VersionTag {
        &self.tag
    }

    /// Look up a versioned predicate declaration by its original name.
    pub fn predicate(&self, original: &str) -> Option<&PredicateDecl> {
        self.predicates
            .get(original)
            .and_then(|&i| match &self.entries[i].declaration {
                Declaration::Predicate(p) => Some(p),
                Declaration::Type(_) => None,
            })
    }

    /// True if a versioned type with this original name is declared.
    pub fn declares_type(&self, original: &str) -> bool {
        self.types.contains_key(original)
    }

    /// True if `versioned` is the name of a declared predicate (versioned or shared).
    pub fn declares_predicate_name(&self, versioned: &str) -> bool {
        self.entries.iter().any(|e| match &e.declaration {
            Declaration::Predicate(p) => p.name == versioned,
            Declaration::Type(_) => false,
        })
    }

    /// True if `versioned` is the name of a declared type (versioned or shared).
    pub fn declares_type_name(&self, versioned: &str) -> bool {
        self.entries.iter().any(|e| match &e.declaration {
            Declaration::Type(t) => t.name == versioned,
            Declaration::Predicate(_) => false,
        })
    }

    /// All entries in template order.
    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }

    /// Versioned predicate declarations, excluding shared metadata.
    pub fn versioned_predicates(&self) -> impl Iterator<Item = &PredicateDecl> {
        self.entries.iter().filter(|e| !e.shared).filter_map(|e| match &e.declaration {
            Declaration::Predicate(p) => Some(p),
            Declaration::Type(_) => None,
        })
    }

    /// Versioned type declarations, excluding shared metadata.
    pub fn versioned_types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.entries.iter().filter(|e| !e.shared).filter_map(|e| match &e.declaration {
            Declaration::Type(t) => Some(t),
            Declaration::Predicate(_) => None,
        })
    }

    /// Serialize back to declaration syntax.
    ///
    /// Shared metadata comes first under a `# SchemaMetadata` header, then
    /// versioned predicates, then versioned types.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let shared: Vec<_> = self.entries.iter().filter(|e| e.shared).collect();
        if !shared.is_empty() {
            out.push_str("# SchemaMetadata\n");
            for entry in shared {
                out.push_str(&render_declaration(&entry.declaration));
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str(&format!("# version {}\n", self.tag));
        for predicate in self.versioned_predicates() {
            out.push_str(&predicate.render());
            out.push('\n');
        }
        for ty in self.versioned_types() {
            out.push('\n');
            out.push_str(&ty.render());
            out.push('\n');
        }

        out
    }
}

/// Line that marks `template` as a schema already rendered for `tag`: its
/// `# version <tag>` header, or the first entry when every versioned
/// declaration carries `{tag}_`. A single name such as `in_taxon` under tag
/// `in` is an ordinary name.
fn already_versioned(template: &SchemaTemplate, tag: &VersionTag) -> Option<usize> {
    if let Some((line, header)) = &template.version_header {
        if header == tag.as_str() {
            return Some(*line);
        }
    }

    let mut versioned = template.entries.iter().filter(|e| !e.shared);
    let first = versioned.next()?;
    if tag.is_applied_to(first.declaration.name())
        && versioned.all(|e| tag.is_applied_to(e.declaration.name()))
    {
        Some(first.line)
    } else {
        None
    }
}

fn render_declaration(declaration: &Declaration) -> String {
    match declaration {
        Declaration::Predicate(p) => p.render(),
        Declaration::Type(t) => t.render(),
    }
}

/// Parse `template_text` and version it with `version_prefix`.
///
/// The prefix is validated before the template is looked at, so an invalid
/// prefix never produces any output.
pub fn load(template_text: &str, version_prefix: &str) -> Result<VersionedSchema, SchemaError> {
    let tag = VersionTag::new(version_prefix)?;
    let template = parse_template(template_text)?;
    VersionedSchema::from_template(&template, tag)
}
