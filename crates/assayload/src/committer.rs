//! Batch orchestration
//!
//! A run moves through `Init → Validating → Staged → {PreviewDone | Committed}`.
//!
//! - **Init**: check the load plan order, open every input, the error file
//!   and the staging files, seed key and accession sequences from the store
//!   and resolve the run identity.
//! - **Validating**: feed each stream through its processor, parents first.
//! - **Staged**: flush the buffers to staging files and count outcomes.
//! - **PreviewDone**: stop; the store is untouched.
//! - **Committed**: bulk-load, rebuild expression summaries for the new
//!   assays and advance the accession registry, all in one transaction.
//!
//! Any fatal error aborts the run where it happens, after a `FATAL` line is
//! appended to the error file. Nothing reaches the store unless every stream
//! validated.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use assayload_common::{CommonError, RunMode};

use crate::accession::MGI_PREFIX;
use crate::age::AgeParser;
use crate::config::LoadConfig;
use crate::error::{LoadError, Result};
use crate::model::EntityKind;
use crate::pipeline::{run_stream, RunContext, StreamStats};
use crate::reader::TabReader;
use crate::report::ErrorReporter;
use crate::staging::{StagedFile, StagingBuffers, StagingWriter};
use crate::store::{CommitStats, SqliteStore};
use crate::vocab::{ReferenceValidator, Vocabulary};

/// One input stream of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSpec {
    pub entity: EntityKind,
    pub input: PathBuf,
}

impl StreamSpec {
    pub fn new(entity: EntityKind, input: impl Into<PathBuf>) -> Self {
        Self {
            entity,
            input: input.into(),
        }
    }
}

/// Ordered input streams of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    streams: Vec<StreamSpec>,
}

impl LoadPlan {
    pub fn new(streams: Vec<StreamSpec>) -> Self {
        Self { streams }
    }

    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    /// Every stream must come after the parents it references
    ///
    /// Required parents must be in the plan; optional parents only need to
    /// precede their children when present.
    pub fn validate(&self) -> Result<()> {
        for (index, stream) in self.streams.iter().enumerate() {
            let earlier = &self.streams[..index];
            let present = |entity: EntityKind| self.streams.iter().any(|s| s.entity == entity);
            let before = |entity: EntityKind| earlier.iter().any(|s| s.entity == entity);

            for parent in stream.entity.required_parents() {
                if !before(*parent) {
                    return Err(LoadError::DependencyOrder {
                        parent: *parent,
                        child: stream.entity,
                    });
                }
            }
            for parent in stream.entity.optional_parents() {
                if present(*parent) && !before(*parent) {
                    return Err(LoadError::DependencyOrder {
                        parent: *parent,
                        child: stream.entity,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Validating,
    Staged,
    PreviewDone,
    Committed,
}

/// An accepted preparation no accepted assay points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanPrep {
    pub entity: EntityKind,
    pub assay: String,
    pub prep_key: i64,
}

/// Everything a finished run reports
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub loader: String,
    pub mode: RunMode,
    pub state: RunState,
    pub load_date: String,
    pub streams: Vec<StreamStats>,
    pub staged: Vec<StagedFile>,
    pub error_file: PathBuf,
    pub rejected: usize,
    pub orphans: Vec<OrphanPrep>,
    pub accessions: Vec<String>,
    pub loaded_vocabularies: Vec<Vocabulary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitStats>,
}

/// Output of the validation phases, kept for the commit
struct StagedRun {
    streams: Vec<StreamStats>,
    staged: Vec<StagedFile>,
    orphans: Vec<OrphanPrep>,
    new_assays: Vec<i64>,
    accessions: Vec<String>,
    accession_max: Option<i64>,
    loaded_vocabularies: Vec<Vocabulary>,
}

pub struct BatchCommitter {
    config: LoadConfig,
    state: RunState,
    run_id: Uuid,
}

impl BatchCommitter {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            state: RunState::Init,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Open the configured store and run
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut store = SqliteStore::open(&self.config.store_path, self.config.mode)?;
        self.run_with_store(&mut store)
    }

    /// Run against an already open store
    pub fn run_with_store(&mut self, store: &mut SqliteStore) -> Result<RunSummary> {
        info!(
            run_id = %self.run_id,
            loader = %self.config.loader,
            mode = %self.config.mode,
            "load run starting"
        );

        let plan = self.config.plan();
        plan.validate()?;

        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| LoadError::resource(&self.config.output_dir, e))?;
        let mut reporter = ErrorReporter::create(&self.config.error_file())?;

        let run = match self.validate_and_stage(&plan, store, &mut reporter) {
            Ok(run) => run,
            Err(e) => return Err(abort(&mut reporter, e)),
        };

        let commit = if self.config.mode.mutates_store() {
            let accession_max: Vec<(String, i64)> = run
                .accession_max
                .map(|max| vec![(MGI_PREFIX.to_string(), max)])
                .unwrap_or_default();
            match store.commit_batch(&run.staged, &run.new_assays, &accession_max) {
                Ok(stats) => {
                    self.state = RunState::Committed;
                    Some(stats)
                },
                Err(e) => return Err(abort(&mut reporter, e)),
            }
        } else {
            self.state = RunState::PreviewDone;
            None
        };

        let summary = RunSummary {
            run_id: self.run_id,
            loader: self.config.loader.to_string(),
            mode: self.config.mode,
            state: self.state,
            load_date: self.config.load_date.to_string(),
            rejected: reporter.total_rejected(),
            streams: run.streams,
            staged: run.staged,
            error_file: self.config.error_file(),
            orphans: run.orphans,
            accessions: run.accessions,
            loaded_vocabularies: run.loaded_vocabularies,
            commit,
        };

        info!(
            run_id = %self.run_id,
            state = ?summary.state,
            rejected = summary.rejected,
            accessions = summary.accessions.len(),
            "load run finished"
        );
        Ok(summary)
    }

    fn validate_and_stage(
        &mut self,
        plan: &LoadPlan,
        store: &SqliteStore,
        reporter: &mut ErrorReporter,
    ) -> Result<StagedRun> {
        let loader = self.config.loader;

        // Init
        let mut inputs = Vec::with_capacity(plan.streams().len());
        for spec in plan.streams() {
            let processor = loader.processor(spec.entity).ok_or_else(|| {
                CommonError::config(format!("{} loader cannot read a {} stream", loader, spec.entity))
            })?;
            let reader = TabReader::open(&spec.input, spec.entity, processor.columns())?;
            inputs.push((processor, reader));
        }

        let tables = loader.tables();
        let writer = StagingWriter::create(&self.config.output_dir, &tables, loader.stages_images())?;

        let mut vocab = ReferenceValidator::new(store);
        let created_by = vocab
            .lookup(Vocabulary::User, &self.config.created_by)?
            .ok_or_else(|| LoadError::UnknownIdentity(self.config.created_by.clone()))?;

        let mut ctx = RunContext::new(
            vocab,
            StagingBuffers::new(self.config.load_date),
            AgeParser::new()?,
            created_by,
        );
        for table in tables.iter().filter(|t| t.key_column().is_some()) {
            ctx.keys.initialize(*table, store)?;
        }
        ctx.accessions.initialize(MGI_PREFIX, store)?;

        // Validating
        self.state = RunState::Validating;
        let mut streams = Vec::with_capacity(inputs.len());
        for (mut processor, reader) in inputs {
            streams.push(run_stream(processor.as_mut(), reader, &mut ctx, reporter)?);
        }

        // Staged
        let staged = writer.flush(&ctx.staging)?;
        reporter.finish()?;
        self.state = RunState::Staged;

        let orphans = orphan_preps(&ctx, loader.prep());
        for orphan in &orphans {
            warn!(
                entity = %orphan.entity,
                assay = %orphan.assay,
                prep_key = orphan.prep_key,
                "preparation has no accepted assay"
            );
        }

        for (table, issued) in ctx.keys.issued() {
            if issued > 0 {
                info!(table = %table, issued, last = ?ctx.keys.last(table), "keys allocated");
            }
        }

        Ok(StagedRun {
            streams,
            staged,
            orphans,
            accession_max: ctx.accessions.last_minted(MGI_PREFIX),
            accessions: ctx.minted.iter().map(|a| a.acc_id.clone()).collect(),
            loaded_vocabularies: ctx.vocab.loaded_vocabularies(),
            new_assays: ctx.new_assays,
        })
    }
}

/// Record a fatal error in the error file and hand it back
fn abort(reporter: &mut ErrorReporter, err: LoadError) -> LoadError {
    if let Err(report_err) = reporter.fatal(&err) {
        warn!(error = %report_err, "could not record fatal error");
    }
    err
}

fn orphan_preps(ctx: &RunContext<'_>, prep: EntityKind) -> Vec<OrphanPrep> {
    ctx.xref
        .keys_of(prep)
        .into_iter()
        .filter(|(_, key)| !ctx.prep_used(prep, *key))
        .map(|(assay, key)| OrphanPrep {
            entity: prep,
            assay: assay.to_string(),
            prep_key: key,
        })
        .collect()
}
