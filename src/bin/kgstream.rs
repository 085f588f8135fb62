//! kgstream CLI: versioned knowledge-graph bulk-load conversion.
//!
//! Usage:
//!   kgstream convert --version-prefix v2 --schema kg.dgraph --mock nodes.jsonl edges.jsonl
//!   kgstream convert --config run.yaml [--stream] [--max-items N]
//!   kgstream schema --version-prefix v2 --schema kg.dgraph [--output -]

use clap::{ArgAction, Args, Parser, Subcommand};
use kgstream::config::{versioned_schema_path, ConfigError, CursorConfig};
use kgstream::pipeline::{load_schema, write_schema};
use kgstream::{
    convert, CancellationToken, ConvertError, ErrorKind, MalformedPolicy, MappingPolicy, OutputFormat,
    RunConfig, SourceConfig,
};
use std::path::PathBuf;
use tracing::Level;

const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "kgstream",
    version,
    about = "Convert node/edge records into versioned graph bulk-load files"
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the versioned schema and convert all records
    Convert(ConvertArgs),
    /// Write only the versioned schema
    Schema {
        /// Version tag prefixed to every predicate and type
        #[arg(long)]
        version_prefix: String,
        /// Schema template
        #[arg(long)]
        schema: PathBuf,
        /// Output file, `-` for stdout (default: <schema>.<version-prefix>)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// YAML run configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Version tag prefixed to every predicate and type
    #[arg(long)]
    version_prefix: Option<String>,
    /// Schema template
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Versioned schema output (default: <schema>.<version-prefix>)
    #[arg(long)]
    schema_out: Option<PathBuf>,
    /// Read line-delimited JSON files instead of a document store
    #[arg(long, num_args = 2, value_names = ["NODES", "EDGES"])]
    mock: Option<Vec<PathBuf>>,
    /// Document store URI (file://<root>)
    #[arg(long, conflicts_with = "mock")]
    uri: Option<String>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    nodes_collection: Option<String>,
    #[arg(long)]
    edges_collection: Option<String>,
    /// Documents fetched per cursor round trip
    #[arg(long)]
    cursor_batch_size: Option<usize>,
    /// Stop after this many node+edge records (-1: unbounded)
    #[arg(long, allow_negative_numbers = true)]
    max_items: Option<i64>,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Output file, `-` for stdout
    #[arg(short, long)]
    output: Option<String>,
    /// Write the statement stream to stdout
    #[arg(long, conflicts_with = "output")]
    stream: bool,
    /// Map every record field, not just those declared in the schema
    #[arg(long)]
    include_all_fields: bool,
    #[arg(long, value_enum)]
    on_malformed: Option<MalformedPolicy>,
    /// Objects per flushed batch (JSON format)
    #[arg(long)]
    batch_size: Option<usize>,
    /// Drop edges whose `negated` field is true
    #[arg(long)]
    skip_negated: bool,
    /// Also emit each node identifier under this predicate
    #[arg(long)]
    id_predicate: Option<String>,
}

fn invalid(message: impl Into<String>) -> ConvertError {
    ConfigError::Invalid(message.into()).into()
}

/// Merge the optional config file with command-line flags.
fn build_config(args: ConvertArgs) -> Result<RunConfig, ConvertError> {
    let base = args.config.as_ref().map(RunConfig::load).transpose()?;

    let source = if let Some(files) = args.mock {
        match <[PathBuf; 2]>::try_from(files) {
            Ok([nodes, edges]) => SourceConfig::Files { nodes, edges },
            Err(_) => return Err(invalid("--mock takes a nodes file and an edges file")),
        }
    } else if let Some(uri) = args.uri {
        // Only the URI changes; the other cursor settings still come from the file.
        match base.as_ref().map(|b| &b.source) {
            Some(SourceConfig::Cursor(cursor)) => SourceConfig::Cursor(CursorConfig {
                uri,
                ..cursor.clone()
            }),
            _ => {
                let database = args
                    .database
                    .clone()
                    .ok_or_else(|| invalid("--uri needs --database"))?;
                SourceConfig::Cursor(CursorConfig::new(uri, database))
            }
        }
    } else if let Some(base) = &base {
        base.source.clone()
    } else {
        return Err(invalid("no record source: pass --mock NODES EDGES, --uri, or --config"));
    };

    let version = args
        .version_prefix
        .or_else(|| base.as_ref().map(|b| b.version.clone()))
        .ok_or_else(|| invalid("--version-prefix is required"))?;
    let schema = args
        .schema
        .or_else(|| base.as_ref().map(|b| b.schema.clone()))
        .ok_or_else(|| invalid("--schema is required"))?;

    let mut config = match base {
        Some(base) => RunConfig {
            version,
            schema,
            source,
            ..base
        },
        None => RunConfig::new(version, schema, source),
    };

    let cursor_flags = args.database.is_some()
        || args.nodes_collection.is_some()
        || args.edges_collection.is_some()
        || args.cursor_batch_size.is_some()
        || args.max_items.is_some();
    match &mut config.source {
        SourceConfig::Cursor(cursor) => {
            if let Some(database) = args.database {
                cursor.database = database;
            }
            if let Some(name) = args.nodes_collection {
                cursor.nodes_collection = name;
            }
            if let Some(name) = args.edges_collection {
                cursor.edges_collection = name;
            }
            if let Some(size) = args.cursor_batch_size {
                cursor.batch_size = size;
            }
            if let Some(max) = args.max_items {
                cursor.max_items = max;
            }
        }
        SourceConfig::Files { .. } if cursor_flags => {
            return Err(invalid("cursor options need a document store source (--uri)"));
        }
        SourceConfig::Files { .. } => {}
    }

    if args.schema_out.is_some() {
        config.schema_out = args.schema_out;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.stream {
        config.output.path = Some("-".to_string());
    } else if args.output.is_some() {
        config.output.path = args.output;
    }
    if let Some(size) = args.batch_size {
        config.output.batch_size = size;
    }
    if args.include_all_fields {
        config.mapping.policy = MappingPolicy::IncludeAll;
    }
    if let Some(policy) = args.on_malformed {
        config.on_malformed = policy;
    }
    if args.skip_negated {
        config.mapping.skip_negated_edges = true;
    }
    if args.id_predicate.is_some() {
        config.mapping.identifier_predicate = args.id_predicate;
    }

    Ok(config)
}

fn exit_code(err: &ConvertError) -> i32 {
    if err.kind() == ErrorKind::Cancelled {
        EXIT_CANCELLED
    } else {
        1
    }
}

async fn cmd_convert(args: ConvertArgs) -> i32 {
    let config = match build_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current record");
            on_interrupt.cancel();
        }
    });

    match convert(&config, cancel).await {
        Ok(report) => {
            eprintln!(
                "Converted {} nodes and {} edges into {} statements ({} skipped, {} lossy).",
                report.nodes,
                report.edges,
                report.statements,
                report.skipped_malformed + report.skipped_negated,
                report.lossy_coercions
            );
            0
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.kind(), e);
            exit_code(&e)
        }
    }
}

async fn cmd_schema(version_prefix: String, schema: PathBuf, output: Option<String>) -> i32 {
    let versioned = match load_schema(&schema, &version_prefix).await {
        Ok(versioned) => versioned,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.kind(), e);
            return 1;
        }
    };

    match output.as_deref() {
        Some("-") => {
            print!("{}", versioned.render());
            0
        }
        other => {
            let path = other
                .map(PathBuf::from)
                .unwrap_or_else(|| versioned_schema_path(&schema, &version_prefix));
            match write_schema(&versioned, &path).await {
                Ok(()) => {
                    eprintln!("Wrote versioned schema to {}", path.display());
                    0
                }
                Err(e) => {
                    eprintln!("Error [{}]: {}", e.kind(), e);
                    1
                }
            }
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(async move {
        match cli.command {
            Commands::Convert(args) => cmd_convert(args).await,
            Commands::Schema {
                version_prefix,
                schema,
                output,
            } => cmd_schema(version_prefix, schema, output).await,
        }
    });
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_args(argv: &[&str]) -> ConvertArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Convert(args) => args,
            Commands::Schema { .. } => panic!("expected the convert subcommand"),
        }
    }

    fn yaml_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, text.as_bytes()).unwrap();
        file
    }

    const CURSOR_RUN: &str = "\
version: v1
schema: kg.dgraph
source:
  kind: cursor
  uri: file:///data/exports
  database: kg
  nodes_collection: genes
  edges_collection: links
  batch_size: 7
  max_items: 5
";

    #[test]
    fn uri_flag_keeps_the_rest_of_the_cursor_config() {
        let file = yaml_file(CURSOR_RUN);
        let path = file.path().to_str().unwrap();
        let args = convert_args(&["kgstream", "convert", "--config", path, "--uri", "file:///other"]);

        let config = build_config(args).unwrap();
        let SourceConfig::Cursor(cursor) = &config.source else {
            panic!("expected a cursor source");
        };
        assert_eq!(cursor.uri, "file:///other");
        assert_eq!(cursor.database, "kg");
        assert_eq!(cursor.nodes_collection, "genes");
        assert_eq!(cursor.edges_collection, "links");
        assert_eq!(cursor.batch_size, 7);
        assert_eq!(cursor.max_items, 5);
    }

    #[test]
    fn cursor_flags_still_override_file_values() {
        let file = yaml_file(CURSOR_RUN);
        let path = file.path().to_str().unwrap();
        let args = convert_args(&[
            "kgstream",
            "convert",
            "--config",
            path,
            "--uri",
            "file:///other",
            "--database",
            "kg2",
            "--max-items",
            "-1",
        ]);

        let config = build_config(args).unwrap();
        let SourceConfig::Cursor(cursor) = &config.source else {
            panic!("expected a cursor source");
        };
        assert_eq!(cursor.database, "kg2");
        assert_eq!(cursor.max_items, -1);
        assert_eq!(cursor.nodes_collection, "genes");
    }

    #[test]
    fn uri_without_config_needs_a_database() {
        let args = convert_args(&[
            "kgstream",
            "convert",
            "--version-prefix",
            "v1",
            "--schema",
            "kg.dgraph",
            "--uri",
            "file:///data",
        ]);
        assert!(build_config(args).is_err());
    }
}
