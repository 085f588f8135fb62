//! kgstream: versioned knowledge-graph bulk-load conversion
//!
//! Converts node and edge records (line-delimited JSON files or a
//! document-store cursor) into a graph database's bulk-load formats, while
//! deriving a versioned schema from a declaration template. Every predicate
//! and type name is prefixed with a version tag, so several versions of the
//! same graph can be loaded side by side.
//!
//! # Core Concepts
//!
//! - **Versioned schema**: a template with each name rewritten as `{tag}_{name}`
//! - **Record source**: a lazy, pull-based stream of node then edge records
//! - **Statements**: subject, predicate, object triples derived per record
//! - **Sinks**: quad text or batched JSON, written as the stream advances
//!
//! # Example
//!
//! ```
//! use kgstream::schema::load;
//!
//! let schema = load("name: string @index(term) .\n", "v1").unwrap();
//! assert_eq!(schema.render(), "# version v1\nv1_name: string @index(term) .\n");
//! ```

pub mod config;
pub mod emit;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod sink;
pub mod source;
pub mod statement;

pub use config::{CursorConfig, MalformedPolicy, RunConfig, SourceConfig};
pub use emit::StatementEmitter;
pub use error::{ConvertError, ErrorKind};
pub use mapping::{FieldMapper, MappingPolicy};
pub use pipeline::{convert, CancellationToken, Pipeline, PipelineOptions, RunReport};
pub use record::{RawRecord, RecordError, RecordLayout, RecordRole};
pub use schema::{load, SchemaError, VersionTag, VersionedSchema};
pub use sink::{open_sink, Destination, OutputFormat, OutputSink};
pub use source::{connect, CursorSource, FileSource, RecordSource, SourceError};
pub use statement::{Literal, ObjectTerm, Statement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
