//! The conversion control loop
//!
//! One loop pulls a record, maps it, emits its statements and hands them to
//! the sink before pulling the next. Nothing but the sink's current batch
//! is held across records. [`convert`] wraps the loop with the steps of a
//! full run: version tag, template, schema artifact, source, sink, stream,
//! schema supplement.

mod cancel;
mod supplement;

use crate::config::{MalformedPolicy, RunConfig, SourceConfig};
use crate::emit::StatementEmitter;
use crate::error::ConvertError;
use crate::mapping::{FieldMapper, MappingPolicy};
use crate::record::{RecordError, RecordLayout, RecordRole};
use crate::schema::{parse_template, VersionTag, VersionedSchema};
use crate::sink::{open_sink, OutputSink};
use crate::source::{connect, CursorSource, FileSource, RecordSource, SourceError};
use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

pub use cancel::CancellationToken;
pub use supplement::{SchemaSupplement, SUPPLEMENT_HEADER};

/// Records between progress log lines.
pub const PROGRESS_INTERVAL: u64 = 50_000;

/// Per-run behaviour of the control loop.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub policy: MappingPolicy,
    pub on_malformed: MalformedPolicy,
    pub skip_negated_edges: bool,
    pub identifier_predicate: Option<String>,
    pub layout: RecordLayout,
}

impl PipelineOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            policy: config.mapping.policy,
            on_malformed: config.on_malformed,
            skip_negated_edges: config.mapping.skip_negated_edges,
            identifier_predicate: config.mapping.identifier_predicate.clone(),
            layout: config.mapping.layout.clone(),
        }
    }
}

/// Counters and inferred schema for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub nodes: u64,
    pub edges: u64,
    pub statements: u64,
    pub skipped_malformed: u64,
    pub skipped_negated: u64,
    pub lossy_coercions: u64,
    /// The run stopped early on cancellation; everything emitted was flushed.
    pub cancelled: bool,
    pub supplement: SchemaSupplement,
}

impl RunReport {
    /// Records converted into statements.
    pub fn records(&self) -> u64 {
        self.nodes + self.edges
    }
}

/// Drives one source into one sink under one versioned schema.
pub struct Pipeline<'a> {
    schema: &'a VersionedSchema,
    options: PipelineOptions,
    cancel: CancellationToken,
    progress_interval: u64,
}

impl<'a> Pipeline<'a> {
    pub fn new(schema: &'a VersionedSchema, options: PipelineOptions) -> Self {
        Self {
            schema,
            options,
            cancel: CancellationToken::new(),
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Stream every record of `source` into `sink`.
    ///
    /// Cancellation is not an error here: the sink is finished and the
    /// report comes back with `cancelled` set.
    pub async fn run(
        &self,
        source: &mut dyn RecordSource,
        sink: &mut dyn OutputSink,
    ) -> Result<RunReport, ConvertError> {
        let mut report = RunReport::default();
        self.run_into(source, sink, &mut report).await?;
        Ok(report)
    }

    /// Like [`Pipeline::run`], filling `report` as it goes so counters and
    /// the supplement survive a failed run.
    ///
    /// The sink is finished on every path. When the stream fails, a finish
    /// error is only logged and the stream error is returned.
    pub async fn run_into(
        &self,
        source: &mut dyn RecordSource,
        sink: &mut dyn OutputSink,
        report: &mut RunReport,
    ) -> Result<(), ConvertError> {
        let started = Instant::now();
        tracing::info!(source = source.id(), version = %self.schema.tag(), "conversion started");

        let streamed = self.stream(source, sink, report).await;
        let finished = sink.finish().await;

        match streamed {
            Ok(()) => finished?,
            Err(e) => {
                if let Err(finish_error) = finished {
                    tracing::warn!(error = %finish_error, "could not flush output after failure");
                }
                tracing::error!(
                    error = %e,
                    nodes = report.nodes,
                    edges = report.edges,
                    statements = report.statements,
                    "conversion failed"
                );
                return Err(e);
            }
        }

        tracing::info!(
            nodes = report.nodes,
            edges = report.edges,
            statements = report.statements,
            skipped_malformed = report.skipped_malformed,
            skipped_negated = report.skipped_negated,
            lossy_coercions = report.lossy_coercions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conversion finished"
        );

        Ok(())
    }

    async fn stream(
        &self,
        source: &mut dyn RecordSource,
        sink: &mut dyn OutputSink,
        report: &mut RunReport,
    ) -> Result<(), ConvertError> {
        let opts = &self.options;
        let mapper = FieldMapper::new(self.schema, &opts.layout, opts.policy);
        let mut emitter = StatementEmitter::new(self.schema.tag(), &opts.layout)
            .with_identifier_predicate(opts.identifier_predicate.as_deref());

        loop {
            if self.cancel.is_cancelled() {
                tracing::warn!(records = report.records(), "cancellation requested; stopping");
                report.cancelled = true;
                break;
            }

            let record = match source.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(SourceError::Record(e)) => {
                    self.malformed(e, report)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if opts.skip_negated_edges && record.role() == RecordRole::Edge && record.flag("negated") {
                tracing::debug!(origin = record.origin(), line = record.line(), "skipping negated edge");
                report.skipped_negated += 1;
                continue;
            }

            let mapping = mapper.map(&record)?;
            report.lossy_coercions += mapping.lossy.len() as u64;

            let statements = match emitter.emit(&record, mapping) {
                Ok(statements) => statements,
                Err(e) => {
                    self.malformed(e, report)?;
                    continue;
                }
            };

            report.supplement.observe(self.schema, &statements);
            sink.write_record(&statements).await?;

            report.statements += statements.len() as u64;
            match record.role() {
                RecordRole::Node => report.nodes += 1,
                RecordRole::Edge => report.edges += 1,
            }

            if report.records() % self.progress_interval == 0 {
                tracing::info!(
                    nodes = report.nodes,
                    edges = report.edges,
                    statements = report.statements,
                    "progress"
                );
            }
        }

        Ok(())
    }

    fn malformed(&self, error: RecordError, report: &mut RunReport) -> Result<(), ConvertError> {
        match self.options.on_malformed {
            MalformedPolicy::Abort => Err(error.into()),
            MalformedPolicy::Skip => {
                tracing::warn!(%error, "skipping malformed record");
                report.skipped_malformed += 1;
                Ok(())
            }
        }
    }
}

/// Open the configured record source.
pub async fn open_source(config: &SourceConfig) -> Result<Box<dyn RecordSource>, SourceError> {
    match config {
        SourceConfig::Files { nodes, edges } => Ok(Box::new(FileSource::open(nodes, edges).await?)),
        SourceConfig::Cursor(cursor) => {
            let store = connect(&cursor.uri)?;
            Ok(Box::new(CursorSource::new(store, cursor.settings())))
        }
    }
}

/// Read a template and version it. The tag is checked before the file is opened.
pub async fn load_schema(template: &Path, version: &str) -> Result<VersionedSchema, ConvertError> {
    let tag = VersionTag::new(version)?;
    let text = tokio::fs::read_to_string(template)
        .await
        .map_err(|source| ConvertError::TemplateRead {
            path: template.to_path_buf(),
            source,
        })?;
    Ok(VersionedSchema::from_template(&parse_template(&text)?, tag)?)
}

/// Write the rendered schema artifact, replacing any previous one.
pub async fn write_schema(schema: &VersionedSchema, path: &Path) -> Result<(), ConvertError> {
    let err = |source| ConvertError::SchemaWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(err)?;
    }
    tokio::fs::write(path, schema.render()).await.map_err(err)
}

async fn append_supplement(supplement: &SchemaSupplement, path: &Path) -> Result<(), ConvertError> {
    let err = |source| ConvertError::SchemaWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(err)?;
    file.write_all(supplement.render().as_bytes()).await.map_err(err)?;
    file.flush().await.map_err(err)
}

/// A complete run as described by `config`.
///
/// A cancelled or failed run still flushes what it emitted and appends the
/// supplement for it, then returns [`ConvertError::Cancelled`] or the
/// original error.
pub async fn convert(config: &RunConfig, cancel: CancellationToken) -> Result<RunReport, ConvertError> {
    VersionTag::new(&config.version)?;
    config.validate()?;

    let schema = load_schema(&config.schema, &config.version).await?;
    let schema_path = config.schema_out_path();
    write_schema(&schema, &schema_path).await?;
    tracing::info!(path = %schema_path.display(), version = %schema.tag(), "wrote versioned schema");

    let mut source = open_source(&config.source).await?;
    let destination = config.destination();
    let mut sink = open_sink(config.output.format, &destination, config.output.batch_size).await?;

    let mut report = RunReport::default();
    let outcome = Pipeline::new(&schema, PipelineOptions::from_config(config))
        .with_cancellation(cancel)
        .run_into(source.as_mut(), sink.as_mut(), &mut report)
        .await;

    if !report.supplement.is_empty() {
        match append_supplement(&report.supplement, &schema_path).await {
            Ok(()) => tracing::info!(
                path = %schema_path.display(),
                predicates = report.supplement.predicates().count(),
                types = report.supplement.type_names().count(),
                "appended inferred declarations to schema"
            ),
            Err(e) if outcome.is_err() => {
                tracing::warn!(error = %e, "could not append inferred declarations after failure")
            }
            Err(e) => return Err(e),
        }
    }
    outcome?;

    if report.cancelled {
        return Err(ConvertError::Cancelled {
            records: report.records(),
        });
    }

    tracing::info!(output = %destination, "output written");
    Ok(report)
}
