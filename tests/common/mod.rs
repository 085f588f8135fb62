//! Shared fixtures for kgstream integration tests
//!
//! A `Workspace` is a temporary directory holding a schema template and
//! node/edge inputs, plus helpers to build run configurations against it.

#![allow(dead_code)]

use kgstream::config::{CursorConfig, RunConfig, SourceConfig};
use kgstream::OutputFormat;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TEMPLATE: &str = "\
# SchemaMetadata
schema_metadata_version: string @index(exact) .
schema_metadata_is_active: bool .
type SchemaMetadata {
  schema_metadata_version
  schema_metadata_is_active
}

# Node properties
name: string @index(term) .
description: string .
synonym: [string] .
information_content: float .

# Edge properties
knowledge_level: string .
publications: [string] .

type Gene {
  name
  synonym
}
";

pub const NODES: &str = r#"{"id":"HGNC:1100","category":["biolink:Gene"],"name":"BRCA1","synonym":["RNF53","BRCC1"],"information_content":83.4,"_id":"65f0"}
{"id":"MONDO:0007254","category":"biolink:Disease","name":"breast cancer","description":"A carcinoma of the breast.","xref":["DOID:1612"]}
{"id":"CHEBI:41774","name":"tamoxifen"}
"#;

pub const EDGES: &str = r#"{"subject":"HGNC:1100","predicate":"biolink:gene_associated_with_condition","object":"MONDO:0007254"}
{"id":"e2","subject":"CHEBI:41774","predicate":"biolink:treats","object":"MONDO:0007254","knowledge_level":"knowledge_assertion","publications":["PMID:1","PMID:2"]}
"#;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Template, nodes and edges fixtures written into a fresh directory.
    pub fn new() -> Self {
        Self::with_inputs(TEMPLATE, NODES, EDGES)
    }

    pub fn with_inputs(template: &str, nodes: &str, edges: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let ws = Self { dir };
        ws.write("schema.dgraph", template);
        ws.write("nodes.jsonl", nodes);
        ws.write("edges.jsonl", edges);
        ws
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(path, contents).expect("write fixture");
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).expect("read output")
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// File-source run writing `<version>.<ext>` and `schema.<version>`.
    pub fn file_config(&self, version: &str, format: OutputFormat) -> RunConfig {
        let mut config = RunConfig::new(
            version,
            self.path("schema.dgraph"),
            SourceConfig::Files {
                nodes: self.path("nodes.jsonl"),
                edges: self.path("edges.jsonl"),
            },
        );
        self.direct_output(&mut config, version, format);
        config
    }

    /// Document-store run over `<root>/kg/{nodes,edges}.jsonl`.
    pub fn cursor_config(&self, version: &str, format: OutputFormat, max_items: i64) -> RunConfig {
        self.write("kg/nodes.jsonl", NODES);
        self.write("kg/edges.jsonl", EDGES);

        let mut cursor = CursorConfig::new(format!("file://{}", self.root().display()), "kg");
        cursor.batch_size = 2;
        cursor.max_items = max_items;

        let mut config = RunConfig::new(version, self.path("schema.dgraph"), SourceConfig::Cursor(cursor));
        self.direct_output(&mut config, version, format);
        config
    }

    fn direct_output(&self, config: &mut RunConfig, version: &str, format: OutputFormat) {
        config.output.format = format;
        config.output.path = Some(
            self.path(&format!("{}.{}", version, format.extension()))
                .display()
                .to_string(),
        );
        config.schema_out = Some(self.path(&format!("schema.{}", version)));
    }
}
