//! Schema template grammar
//!
//! A template is a Dgraph-style declaration file: one predicate per line
//! (`name: type @directive .`) and `type Name { ... }` blocks with one field
//! per line. Names in a template are unversioned; the same parser also reads
//! rendered versioned schemas, which keeps the artifact self-consumable.

use super::SchemaError;
use std::fmt;

/// Scalar value kind of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Uid,
    Default,
    Geo,
    Password,
}

impl ScalarKind {
    /// Parse a scalar type keyword as it appears in a declaration.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "datetime" => Some(Self::DateTime),
            "uid" => Some(Self::Uid),
            "default" => Some(Self::Default),
            "geo" => Some(Self::Geo),
            "password" => Some(Self::Password),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
            Self::Uid => "uid",
            Self::Default => "default",
            Self::Geo => "geo",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Declared value kind: a scalar, optionally list-typed (`[string]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueKind {
    pub scalar: ScalarKind,
    pub list: bool,
}

impl ValueKind {
    pub fn single(scalar: ScalarKind) -> Self {
        Self { scalar, list: false }
    }

    pub fn list_of(scalar: ScalarKind) -> Self {
        Self { scalar, list: true }
    }

    /// Parse `string` or `[string]`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.strip_prefix('[') {
            Some(inner) => {
                let inner = inner.strip_suffix(']')?;
                ScalarKind::parse(inner.trim()).map(Self::list_of)
            }
            None => ScalarKind::parse(text).map(Self::single),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "[{}]", self.scalar)
        } else {
            write!(f, "{}", self.scalar)
        }
    }
}

/// `name: kind @directives .`
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateDecl {
    pub name: String,
    pub kind: ValueKind,
    /// Directives verbatim, in declaration order (including `@reverse`).
    pub directives: Vec<String>,
    pub reverse: bool,
}

impl PredicateDecl {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            directives: Vec::new(),
            reverse: false,
        }
    }

    pub fn render(&self) -> String {
        let mut line = format!("{}: {}", self.name, self.kind);
        for directive in &self.directives {
            line.push(' ');
            line.push_str(directive);
        }
        line.push_str(" .");
        line
    }
}

/// A field listed inside a type block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeField {
    pub name: String,
    /// `<~name>`: the field refers to the reverse of a predicate.
    pub reverse: bool,
}

impl TypeField {
    pub fn render(&self) -> String {
        if self.reverse {
            format!("<~{}>", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// `type Name { fields }`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<TypeField>,
}

impl TypeDecl {
    pub fn render(&self) -> String {
        let mut out = format!("type {} {{\n", self.name);
        for field in &self.fields {
            out.push_str("  ");
            out.push_str(&field.render());
            out.push('\n');
        }
        out.push('}');
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Predicate(PredicateDecl),
    Type(TypeDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Self::Predicate(p) => &p.name,
            Self::Type(t) => &t.name,
        }
    }
}

/// One parsed declaration plus whether it belongs to the registry-owned
/// metadata vocabulary (never versioned).
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub declaration: Declaration,
    pub shared: bool,
    /// 1-based line where the declaration starts.
    pub line: usize,
}

/// A parsed, unversioned schema template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTemplate {
    pub entries: Vec<TemplateEntry>,
    /// `# version <tag>` header of a rendered schema: (line, tag).
    pub version_header: Option<(usize, String)>,
}

impl SchemaTemplate {
    pub fn predicates(&self) -> impl Iterator<Item = &PredicateDecl> {
        self.entries.iter().filter_map(|e| match &e.declaration {
            Declaration::Predicate(p) => Some(p),
            Declaration::Type(_) => None,
        })
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.entries.iter().filter_map(|e| match &e.declaration {
            Declaration::Type(t) => Some(t),
            Declaration::Predicate(_) => None,
        })
    }
}

/// Name of the registry metadata type, shared by every version.
pub const METADATA_TYPE: &str = "SchemaMetadata";
/// Predicates with this prefix belong to the registry metadata vocabulary.
pub const METADATA_PREDICATE_PREFIX: &str = "schema_metadata_";

/// True for identifiers made of `[A-Za-z0-9_]`.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a schema template.
pub fn parse_template(text: &str) -> Result<SchemaTemplate, SchemaError> {
    let mut template = SchemaTemplate::default();
    let mut seen = std::collections::HashSet::new();
    let mut metadata_section = false;
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((line_no, raw)) = lines.next() {
        let line = raw.trim();

        if line.is_empty() {
            metadata_section = false;
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            metadata_section = line.contains(METADATA_TYPE);
            if let Some(tag) = comment.trim().strip_prefix("version ") {
                template.version_header = Some((line_no, tag.trim().to_string()));
            }
            continue;
        }

        let declaration = if let Some(rest) = line.strip_prefix("type ") {
            Declaration::Type(parse_type_block(rest, line_no, &mut lines)?)
        } else {
            Declaration::Predicate(parse_predicate(line, line_no)?)
        };

        if !seen.insert((matches!(declaration, Declaration::Type(_)), declaration.name().to_string())) {
            return Err(SchemaError::parse(
                line_no,
                format!("duplicate declaration `{}`", declaration.name()),
            ));
        }

        let shared = metadata_section
            || match &declaration {
                Declaration::Type(t) => t.name == METADATA_TYPE,
                Declaration::Predicate(p) => p.name.starts_with(METADATA_PREDICATE_PREFIX),
            };

        template.entries.push(TemplateEntry {
            declaration,
            shared,
            line: line_no,
        });
    }

    Ok(template)
}

fn parse_predicate(line: &str, line_no: usize) -> Result<PredicateDecl, SchemaError> {
    let (name, rest) = line
        .split_once(':')
        .ok_or_else(|| SchemaError::parse(line_no, format!("expected `name: type .`, got `{}`", line)))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(SchemaError::parse(line_no, format!("invalid predicate name `{}`", name)));
    }

    let body = rest
        .trim()
        .strip_suffix('.')
        .ok_or_else(|| SchemaError::parse(line_no, format!("declaration of `{}` is missing the trailing `.`", name)))?;

    let tokens = split_tokens(body)
        .ok_or_else(|| SchemaError::parse(line_no, format!("unbalanced parentheses in declaration of `{}`", name)))?;
    let mut tokens = tokens.into_iter();
    let kind_text = tokens
        .next()
        .ok_or_else(|| SchemaError::parse(line_no, format!("declaration of `{}` has no type", name)))?;
    let kind = ValueKind::parse(kind_text)
        .ok_or_else(|| SchemaError::parse(line_no, format!("unknown type `{}` for `{}`", kind_text, name)))?;

    let mut decl = PredicateDecl::new(name, kind);
    for token in tokens {
        if !token.starts_with('@') {
            return Err(SchemaError::parse(
                line_no,
                format!("unexpected token `{}` in declaration of `{}`", token, name),
            ));
        }
        if token == "@reverse" {
            decl.reverse = true;
        }
        decl.directives.push(token.to_string());
    }

    Ok(decl)
}

/// Split on whitespace outside parentheses, so `@index(exact, term)` stays one token.
/// `None` if the parentheses do not balance.
fn split_tokens(text: &str) -> Option<Vec<&str>> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&text[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }

    if depth != 0 {
        return None;
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    Some(tokens)
}

fn parse_type_block<'a>(
    header: &str,
    line_no: usize,
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
) -> Result<TypeDecl, SchemaError> {
    let (name, after) = header
        .split_once('{')
        .ok_or_else(|| SchemaError::parse(line_no, "type declaration is missing `{`"))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(SchemaError::parse(line_no, format!("invalid type name `{}`", name)));
    }

    let mut decl = TypeDecl {
        name: name.to_string(),
        fields: Vec::new(),
    };

    // Fields may follow the brace on the header line, and the block may close there too.
    if push_type_fields(&mut decl, after, line_no)? {
        return Ok(decl);
    }

    for (field_line_no, raw) in lines.by_ref() {
        if push_type_fields(&mut decl, raw, field_line_no)? {
            return Ok(decl);
        }
    }

    Err(SchemaError::parse(line_no, format!("type `{}` is never closed", name)))
}

/// Parse the fields on one line of a type block. Returns true once `}` is seen.
fn push_type_fields(decl: &mut TypeDecl, line: &str, line_no: usize) -> Result<bool, SchemaError> {
    let (content, closed) = match line.split_once('}') {
        Some((before, _)) => (before, true),
        None => (line, false),
    };
    let content = content.trim();
    if content.is_empty() || content.starts_with('#') {
        return Ok(closed);
    }

    for token in content.split_whitespace() {
        let field = match token.strip_prefix("<~").and_then(|t| t.strip_suffix('>')) {
            Some(inner) => TypeField {
                name: inner.to_string(),
                reverse: true,
            },
            None => TypeField {
                name: token.to_string(),
                reverse: false,
            },
        };
        if !is_identifier(&field.name) {
            return Err(SchemaError::parse(
                line_no,
                format!("invalid field `{}` in type `{}`", token, decl.name),
            ));
        }
        decl.fields.push(field);
    }

    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
# SchemaMetadata
schema_metadata_version: string @index(exact) .
schema_metadata_is_active: bool .

# Node predicates
id: string @index(exact) @upsert .
name: string @index(term) .
category: [string] @index(exact) .
information_content: float .
subject: uid @reverse .

type Node {
  id
  name
  category
  <~subject>
}

type SchemaMetadata {
  schema_metadata_version
}
";

    #[test]
    fn parses_predicates_with_kinds_and_directives() {
        let template = parse_template(TEMPLATE).unwrap();
        let names: Vec<_> = template.predicates().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "schema_metadata_version",
                "schema_metadata_is_active",
                "id",
                "name",
                "category",
                "information_content",
                "subject"
            ]
        );

        let category = template.predicates().find(|p| p.name == "category").unwrap();
        assert_eq!(category.kind, ValueKind::list_of(ScalarKind::String));
        assert_eq!(category.directives, vec!["@index(exact)"]);

        let subject = template.predicates().find(|p| p.name == "subject").unwrap();
        assert!(subject.reverse);
        assert_eq!(subject.kind, ValueKind::single(ScalarKind::Uid));
    }

    #[test]
    fn parses_type_blocks_including_reverse_fields() {
        let template = parse_template(TEMPLATE).unwrap();
        let node = template.types().find(|t| t.name == "Node").unwrap();
        assert_eq!(node.fields.len(), 4);
        assert_eq!(
            node.fields[3],
            TypeField {
                name: "subject".to_string(),
                reverse: true
            }
        );
    }

    #[test]
    fn metadata_declarations_are_marked_shared() {
        let template = parse_template(TEMPLATE).unwrap();
        let shared: Vec<_> = template
            .entries
            .iter()
            .filter(|e| e.shared)
            .map(|e| e.declaration.name().to_string())
            .collect();
        assert_eq!(
            shared,
            vec!["schema_metadata_version", "schema_metadata_is_active", "SchemaMetadata"]
        );
    }

    #[test]
    fn directives_with_several_tokenizers_stay_whole() {
        let template = parse_template(
            "name: string @index(exact, term) @lang .\nsynonym: [string] @index(hash, trigram) .\n",
        )
        .unwrap();
        let name = template.predicates().next().unwrap();
        assert_eq!(name.directives, vec!["@index(exact, term)", "@lang"]);
        assert_eq!(name.render(), "name: string @index(exact, term) @lang .");

        let synonym = template.predicates().nth(1).unwrap();
        assert_eq!(synonym.directives, vec!["@index(hash, trigram)"]);
        assert_eq!(parse_template(&format!("{}\n", synonym.render())).unwrap().entries.len(), 1);
    }

    #[test]
    fn unbalanced_directive_parentheses_are_rejected() {
        assert!(matches!(
            parse_template("name: string @index(exact, term .\n"),
            Err(SchemaError::Parse { line: 1, .. })
        ));
        assert!(parse_template("name: string @index) .\n").is_err());
    }

    #[test]
    fn version_header_is_recorded() {
        let template = parse_template("# version v3\nv3_name: string .\n").unwrap();
        assert_eq!(template.version_header, Some((1, "v3".to_string())));
        assert_eq!(parse_template("# Node properties\n").unwrap().version_header, None);
    }

    #[test]
    fn one_line_type_block() {
        let template = parse_template("type Edge { subject object }\n").unwrap();
        let edge = template.types().next().unwrap();
        assert_eq!(edge.fields.len(), 2);
    }

    #[test]
    fn empty_type_block_is_allowed() {
        let template = parse_template("type Gene {\n}\n").unwrap();
        assert!(template.types().next().unwrap().fields.is_empty());
    }

    #[test]
    fn unknown_type_is_a_parse_error_with_line() {
        let err = parse_template("id: string .\nscore: decimal .\n").unwrap_err();
        match err {
            SchemaError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("decimal"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_trailing_dot_is_rejected() {
        assert!(matches!(
            parse_template("name: string @index(term)\n"),
            Err(SchemaError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn unclosed_type_block_is_rejected() {
        assert!(matches!(
            parse_template("type Node {\n  id\n  name\n"),
            Err(SchemaError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn duplicate_predicate_is_rejected() {
        assert!(matches!(
            parse_template("id: string .\nid: int .\n"),
            Err(SchemaError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn stray_tokens_are_rejected() {
        assert!(parse_template("name: string index .\n").is_err());
        assert!(parse_template("bad-name: string .\n").is_err());
    }
}
