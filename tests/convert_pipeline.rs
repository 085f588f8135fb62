//! End-to-end conversion runs
//!
//! Each test drives `kgstream::convert` against files in a temporary
//! workspace and inspects the versioned schema and data artifacts it leaves
//! behind.

mod common;

use common::{Workspace, EDGES, NODES, TEMPLATE};
use kgstream::schema::parse_template;
use kgstream::{convert, CancellationToken, ErrorKind, MalformedPolicy, MappingPolicy, OutputFormat};
use regex_lite::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

const EXPECTED_QUADS: &str = r#"_:HGNC_1100 <dgraph.type> "v1_Gene" .
_:HGNC_1100 <v1_information_content> "83.4"^^<xs:float> .
_:HGNC_1100 <v1_name> "BRCA1" .
_:HGNC_1100 <v1_synonym> "RNF53" .
_:HGNC_1100 <v1_synonym> "BRCC1" .
_:MONDO_0007254 <dgraph.type> "v1_Disease" .
_:MONDO_0007254 <v1_description> "A carcinoma of the breast." .
_:MONDO_0007254 <v1_name> "breast cancer" .
_:CHEBI_41774 <dgraph.type> "v1_Node" .
_:CHEBI_41774 <v1_name> "tamoxifen" .
_:HGNC_1100 <v1_gene_associated_with_condition> _:MONDO_0007254 .
_:CHEBI_41774 <v1_treats> _:MONDO_0007254 .
_:edge_v1_e2 <dgraph.type> "v1_Edge" .
_:edge_v1_e2 <v1_subject> _:CHEBI_41774 .
_:edge_v1_e2 <v1_object> _:MONDO_0007254 .
_:edge_v1_e2 <v1_predicate> "treats" .
_:edge_v1_e2 <v1_knowledge_level> "knowledge_assertion" .
_:edge_v1_e2 <v1_publications> "PMID:1" .
_:edge_v1_e2 <v1_publications> "PMID:2" .
"#;

fn quad_regex() -> Regex {
    Regex::new(r#"^_:(\w+) <([^>]+)> (.+) \.$"#).unwrap()
}

/// Every predicate and type name the schema artifact declares.
fn declared_names(schema_text: &str) -> BTreeSet<String> {
    let template = parse_template(schema_text).unwrap();
    template
        .entries
        .iter()
        .map(|e| e.declaration.name().to_string())
        .collect()
}

// --- Scenario: node then edge with the fixture template ---

#[tokio::test]
async fn file_run_writes_versioned_schema_and_quads() {
    let ws = Workspace::new();
    let config = ws.file_config("v1", OutputFormat::Quad);

    let report = convert(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(ws.read("v1.rdf"), EXPECTED_QUADS);
    assert_eq!((report.nodes, report.edges, report.statements), (3, 2, 19));
    assert_eq!(report.skipped_malformed, 0);

    let schema = ws.read("schema.v1");
    assert!(schema.starts_with("# SchemaMetadata\nschema_metadata_version: string @index(exact) .\n"));
    assert!(schema.contains("# version v1\nv1_name: string @index(term) .\n"));
    assert!(schema.contains("type v1_Gene {\n  v1_name\n  v1_synonym\n}\n"));
    assert!(schema.contains("# inferred during conversion\n"));
    assert!(schema.contains("v1_treats: [uid] .\n"));
    assert!(schema.contains("v1_subject: uid .\n"));
    assert!(schema.contains("type v1_Edge {\n"));
    assert!(!schema.contains("v1_schema_metadata"));
    assert!(!schema.contains("v1_SchemaMetadata"));
}

// --- Scenario: every emitted name carries the prefix and is declared ---

#[tokio::test]
async fn every_emitted_name_is_versioned_and_declared() {
    let ws = Workspace::new();
    let mut config = ws.file_config("v7", OutputFormat::Quad);
    config.mapping.policy = MappingPolicy::IncludeAll;

    convert(&config, CancellationToken::new()).await.unwrap();

    let declared = declared_names(&ws.read("schema.v7"));
    let line_re = quad_regex();
    let type_re = Regex::new(r#"^"v7_\w+"$"#).unwrap();

    let data = ws.read("v7.rdf");
    assert!(!data.is_empty());
    for line in data.lines() {
        let caps = line_re.captures(line).unwrap_or_else(|| panic!("bad quad line: {line}"));
        let predicate = &caps[2];
        let object = &caps[3];
        if predicate == "dgraph.type" {
            assert!(type_re.is_match(object), "unversioned type in: {line}");
            let ty = object.trim_matches('"');
            assert!(declared.contains(ty), "undeclared type {ty}");
        } else {
            assert!(predicate.starts_with("v7_"), "unversioned predicate in: {line}");
            assert!(declared.contains(predicate), "undeclared predicate {predicate}");
        }
    }
}

// --- Scenario: include_all maps undeclared fields, never underscore fields ---

#[tokio::test]
async fn include_all_extends_the_schema_with_inferred_fields() {
    let ws = Workspace::new();
    let mut config = ws.file_config("v1", OutputFormat::Quad);
    config.mapping.policy = MappingPolicy::IncludeAll;

    convert(&config, CancellationToken::new()).await.unwrap();

    let data = ws.read("v1.rdf");
    assert!(data.contains("_:MONDO_0007254 <v1_xref> \"DOID:1612\" .\n"));
    assert!(!data.contains("_id"));
    assert!(ws.read("schema.v1").contains("v1_xref: [string] .\n"));
}

#[tokio::test]
async fn include_all_nested_objects_become_blank_nodes_in_both_formats() {
    let nodes = r#"{"id":"n1","name":"x","provenance":{"source":"infores:a","retrieved":{"year":2024}}}
"#;
    let ws = Workspace::with_inputs(TEMPLATE, nodes, "");

    let mut config = ws.file_config("v1", OutputFormat::Quad);
    config.mapping.policy = MappingPolicy::IncludeAll;
    convert(&config, CancellationToken::new()).await.unwrap();

    let data = ws.read("v1.rdf");
    assert!(data.contains("_:n1 <v1_provenance> _:n1_v1_provenance_0 .\n"));
    assert!(data.contains("_:n1_v1_provenance_0 <v1_source> \"infores:a\" .\n"));
    assert!(data.contains(
        "_:n1_v1_provenance_0_v1_retrieved_0 <v1_year> \"2024\"^^<xs:int> .\n"
    ));
    let names = declared_names(&ws.read("schema.v1"));
    for name in ["v1_provenance", "v1_source", "v1_retrieved", "v1_year"] {
        assert!(names.contains(name), "{} missing from schema", name);
    }
    assert!(ws.read("schema.v1").contains("v1_provenance: uid .\n"));

    let mut config = ws.file_config("v1", OutputFormat::Json);
    config.mapping.policy = MappingPolicy::IncludeAll;
    convert(&config, CancellationToken::new()).await.unwrap();

    let objects: Vec<Value> = serde_json::from_str(&ws.read("v1.json")).unwrap();
    let node = objects.iter().find(|o| o["uid"] == "_:n1").unwrap();
    assert_eq!(node["v1_provenance"], serde_json::json!({"uid": "_:n1_v1_provenance_0"}));
    let nested = objects.iter().find(|o| o["uid"] == "_:n1_v1_provenance_0").unwrap();
    assert_eq!(nested["v1_source"], "infores:a");
}

// --- Scenario: same input twice ---

#[tokio::test]
async fn runs_are_deterministic() {
    let ws = Workspace::new();
    let config = ws.file_config("v1", OutputFormat::Json);

    convert(&config, CancellationToken::new()).await.unwrap();
    let (data, schema) = (ws.read("v1.json"), ws.read("schema.v1"));

    convert(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(ws.read("v1.json"), data);
    assert_eq!(ws.read("schema.v1"), schema);
}

// --- Scenario: two versions side by side ---

#[tokio::test]
async fn different_prefixes_share_no_predicates() {
    let ws = Workspace::new();
    convert(&ws.file_config("v1", OutputFormat::Quad), CancellationToken::new())
        .await
        .unwrap();
    convert(&ws.file_config("v2", OutputFormat::Quad), CancellationToken::new())
        .await
        .unwrap();

    let re = quad_regex();
    let predicates = |text: &str| -> BTreeSet<String> {
        text.lines()
            .filter_map(|l| re.captures(l).map(|c| c[2].to_string()))
            .filter(|p| p != "dgraph.type")
            .collect()
    };
    let v1 = predicates(&ws.read("v1.rdf"));
    let v2 = predicates(&ws.read("v2.rdf"));
    assert!(!v1.is_empty());
    assert!(v1.is_disjoint(&v2));
    assert_eq!(
        v1.iter().map(|p| p.replacen("v1_", "v2_", 1)).collect::<BTreeSet<_>>(),
        v2
    );
}

// --- Scenario: invalid version prefix ---

#[tokio::test]
async fn invalid_prefix_produces_no_output_at_all() {
    let ws = Workspace::new();
    let config = ws.file_config("v-1", OutputFormat::Quad);

    let err = convert(&config, CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidVersionTag);
    assert!(!ws.exists("schema.v-1"));
    assert!(!ws.exists("v-1.rdf"));
}

#[tokio::test]
async fn template_already_carrying_the_prefix_is_rejected() {
    let ws = Workspace::with_inputs("v1_name: string .\n", NODES, EDGES);
    let err = convert(&ws.file_config("v1", OutputFormat::Quad), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaParse);
    assert!(!ws.exists("v1.rdf"));
}

// --- Scenario: malformed line, skip vs abort ---

#[tokio::test]
async fn malformed_line_aborts_or_is_skipped_per_policy() {
    let nodes = "{\"id\":\"n1\",\"name\":\"a\"}\n{\"id\": \"n2\",\n{\"id\":\"n3\",\"name\":\"c\"}\n";
    let ws = Workspace::with_inputs(TEMPLATE, nodes, "");

    let err = convert(&ws.file_config("v1", OutputFormat::Quad), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecordParse);
    assert!(err.to_string().contains("nodes.jsonl:2"));

    let mut config = ws.file_config("v1", OutputFormat::Quad);
    config.on_malformed = MalformedPolicy::Skip;
    let report = convert(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(report.skipped_malformed, 1);
    assert_eq!(report.nodes, 2);
    assert!(ws.read("v1.rdf").contains("_:n3 <v1_name> \"c\" ."));
}

#[tokio::test]
async fn type_mismatch_stops_the_run() {
    let nodes = "{\"id\":\"n1\",\"information_content\":\"high\"}\n";
    let ws = Workspace::with_inputs(TEMPLATE, nodes, "");
    let err = convert(&ws.file_config("v1", OutputFormat::Quad), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[tokio::test]
async fn failed_run_keeps_converted_output_and_schema() {
    let mut nodes: String = (0..50)
        .map(|i| format!("{{\"id\":\"n{}\",\"name\":\"x\"}}\n", i))
        .collect();
    nodes.push_str("{\"id\":\"bad\",\"information_content\":\"high\"}\n");
    let ws = Workspace::with_inputs(TEMPLATE, &nodes, "");
    let config = ws.file_config("v1", OutputFormat::Quad);

    let err = convert(&config, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let data = ws.read("v1.rdf");
    assert_eq!(data.lines().count(), 100);
    assert!(data.ends_with("_:n49 <v1_name> \"x\" .\n"));

    let schema = ws.read("schema.v1");
    assert!(schema.contains("type v1_Node"));
}

// --- Scenario: JSON batch output ---

#[tokio::test]
async fn json_output_groups_statements_per_subject() {
    let ws = Workspace::new();
    let mut config = ws.file_config("v1", OutputFormat::Json);
    config.output.batch_size = 2;

    convert(&config, CancellationToken::new()).await.unwrap();

    let text = ws.read("v1.json");
    assert!(text.starts_with("[\n") && text.ends_with("\n]\n"));
    let objects: Vec<Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(objects.len(), 6);

    let gene = &objects[0];
    assert_eq!(gene["uid"], "_:HGNC_1100");
    assert_eq!(gene["dgraph.type"], serde_json::json!(["v1_Gene"]));
    assert_eq!(gene["v1_synonym"], serde_json::json!(["RNF53", "BRCC1"]));
    assert_eq!(gene["v1_information_content"], 83.4);

    let edge = objects.iter().find(|o| o["uid"] == "_:edge_v1_e2").unwrap();
    assert_eq!(edge["v1_subject"], serde_json::json!({"uid": "_:CHEBI_41774"}));
    assert_eq!(edge["v1_publications"], serde_json::json!(["PMID:1", "PMID:2"]));
}

// --- Scenario: document-store cursor ---

#[tokio::test]
async fn cursor_run_respects_max_items() {
    let ws = Workspace::new();
    let config = ws.cursor_config("v1", OutputFormat::Json, 3);

    let report = convert(&config, CancellationToken::new()).await.unwrap();

    assert_eq!((report.nodes, report.edges), (3, 0));
    let objects: Vec<Value> = serde_json::from_str(&ws.read("v1.json")).unwrap();
    assert_eq!(objects.len(), 3);
}

#[tokio::test]
async fn cursor_run_matches_file_run_when_unbounded() {
    let ws = Workspace::new();
    convert(&ws.cursor_config("v1", OutputFormat::Quad, -1), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ws.read("v1.rdf"), EXPECTED_QUADS);
}

#[tokio::test]
async fn zero_max_items_yields_empty_stream_and_plain_schema() {
    let ws = Workspace::new();
    let config = ws.cursor_config("v1", OutputFormat::Json, 0);

    let report = convert(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.records(), 0);
    assert_eq!(ws.read("v1.json"), "[\n]\n");
    let schema = ws.read("schema.v1");
    assert!(schema.contains("v1_name: string @index(term) ."));
    assert!(!schema.contains("# inferred during conversion"));
}

#[tokio::test]
async fn unsupported_store_scheme_is_source_unavailable() {
    let ws = Workspace::new();
    let mut config = ws.cursor_config("v1", OutputFormat::Quad, -1);
    if let kgstream::SourceConfig::Cursor(cursor) = &mut config.source {
        cursor.uri = "mongodb://localhost:27017".to_string();
    }

    let err = convert(&config, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(!ws.exists("v1.rdf"));
}

// --- Scenario: cancellation before the first record ---

#[tokio::test]
async fn cancelled_run_reports_cancellation_and_terminates_output() {
    let ws = Workspace::new();
    let config = ws.file_config("v1", OutputFormat::Json);
    let token = CancellationToken::new();
    token.cancel();

    let err = convert(&config, token).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(ws.read("v1.json"), "[\n]\n");
    assert!(ws.exists("schema.v1"));
}
