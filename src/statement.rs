//! The atomic output unit: subject, predicate, object

use crate::schema::{ScalarKind, ValueKind};
use std::fmt;

/// Predicate used for type assertions. Owned by the database, never versioned.
pub const TYPE_PREDICATE: &str = "dgraph.type";

/// A typed literal object.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(String),
}

impl Literal {
    pub fn scalar_kind(&self) -> ScalarKind {
        match self {
            Self::String(_) => ScalarKind::String,
            Self::Int(_) => ScalarKind::Int,
            Self::Float(_) => ScalarKind::Float,
            Self::Bool(_) => ScalarKind::Bool,
            Self::DateTime(_) => ScalarKind::DateTime,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::DateTime(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// The object position of a statement: a node reference or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectTerm {
    /// Blank-node label of another node (without the `_:` marker).
    Node(String),
    Literal(Literal),
}

impl ObjectTerm {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    pub fn scalar_kind(&self) -> ScalarKind {
        match self {
            Self::Node(_) => ScalarKind::Uid,
            Self::Literal(l) => l.scalar_kind(),
        }
    }
}

/// One subject-predicate-object statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Blank-node label of the subject (without the `_:` marker).
    pub subject: String,
    pub predicate: String,
    pub object: ObjectTerm,
    /// The predicate is multi-valued; batch JSON renders it as an array.
    pub list: bool,
}

impl Statement {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: ObjectTerm) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
            list: false,
        }
    }

    pub fn listed(mut self) -> Self {
        self.list = true;
        self
    }

    /// A `dgraph.type` assertion.
    pub fn type_assertion(subject: impl Into<String>, versioned_type: impl Into<String>) -> Self {
        Self::new(subject, TYPE_PREDICATE, ObjectTerm::string(versioned_type)).listed()
    }

    pub fn is_type_assertion(&self) -> bool {
        self.predicate == TYPE_PREDICATE
    }

    /// The value kind this statement implies for its predicate.
    pub fn value_kind(&self) -> ValueKind {
        ValueKind {
            scalar: self.object.scalar_kind(),
            list: self.list,
        }
    }
}
