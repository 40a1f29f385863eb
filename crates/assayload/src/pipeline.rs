//! Record validation pipeline
//!
//! A stream processor turns one input row into zero or more staged records.
//! Every field check runs even after the first failure so a rejected row is
//! reported with all of its problems at once. Rejected rows consume no keys.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::accession::{Accession, AccessionMinter, MGI_LOGICAL_DB, MGI_PREFIX};
use crate::age::{AgeParser, AgeRange};
use crate::error::Result;
use crate::keys::KeyAllocator;
use crate::model::{EntityKind, Table};
use crate::reader::InputRow;
use crate::report::ErrorReporter;
use crate::staging::StagingBuffers;
use crate::vocab::ReferenceValidator;
use crate::xref::CrossReferenceResolver;

/// Failure reasons collected while checking one row
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RowCheck {
    reasons: Vec<String>,
}

impl RowCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    /// Require a non-blank field; returns it trimmed
    pub fn required<'r>(&mut self, label: &str, raw: &'r str) -> Option<&'r str> {
        let value = raw.trim();
        if value.is_empty() {
            self.fail(format!("Missing {}", label));
            None
        } else {
            Some(value)
        }
    }

    /// Parse an age, recording a reason when it is malformed
    pub fn age(&mut self, ages: &AgeParser, raw: &str, allow_unresolved: bool) -> Option<AgeRange> {
        match ages.parse(raw) {
            Some(age) if age.is_resolved() || allow_unresolved => Some(age),
            _ => {
                self.fail(format!("Invalid Age: '{}'", raw.trim()));
                None
            },
        }
    }

    /// Optional decimal field
    pub fn decimal(&mut self, label: &str, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return Some(String::new());
        }
        match value.parse::<f64>() {
            Ok(v) if v >= 0.0 => Some(value.to_string()),
            _ => {
                self.fail(format!("Invalid {}: '{}'", label, value));
                None
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// `Some(outcome)` when the row has failed
    pub fn rejection(self) -> Option<RowOutcome> {
        (!self.reasons.is_empty()).then_some(RowOutcome::Rejected(self.reasons))
    }

    /// Reject the row with the reasons collected so far
    pub fn reject(self) -> RowOutcome {
        RowOutcome::Rejected(self.reasons)
    }
}

/// What happened to one input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted,
    Rejected(Vec<String>),
}

impl RowOutcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        RowOutcome::Rejected(vec![reason.into()])
    }
}

/// Per-row logic of one input stream
pub trait StreamProcessor {
    fn entity(&self) -> EntityKind;

    /// Column count of the stream's layout
    fn columns(&self) -> usize;

    /// Validate one row and stage its records
    ///
    /// Field problems are returned as [`RowOutcome::Rejected`]; an `Err` is
    /// fatal for the whole run.
    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome>;
}

/// Accepted and rejected row counts of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub entity: EntityKind,
    pub accepted: usize,
    pub rejected: usize,
}

/// All state of one run: caches, sequences, business keys and buffers
pub struct RunContext<'s> {
    pub vocab: ReferenceValidator<'s>,
    pub keys: KeyAllocator,
    pub accessions: AccessionMinter,
    pub xref: CrossReferenceResolver,
    pub staging: StagingBuffers,
    pub ages: AgeParser,
    /// User key of the run identity
    pub created_by: i64,
    pub new_assays: Vec<i64>,
    pub minted: Vec<Accession>,
    used_preps: HashMap<EntityKind, Vec<i64>>,
    sequence_nums: HashMap<(Table, i64), i64>,
}

impl<'s> RunContext<'s> {
    pub fn new(
        vocab: ReferenceValidator<'s>,
        staging: StagingBuffers,
        ages: AgeParser,
        created_by: i64,
    ) -> Self {
        Self {
            vocab,
            keys: KeyAllocator::new(),
            accessions: AccessionMinter::new(),
            xref: CrossReferenceResolver::new(),
            staging,
            ages,
            created_by,
            new_assays: Vec::new(),
            minted: Vec::new(),
            used_preps: HashMap::new(),
            sequence_nums: HashMap::new(),
        }
    }

    /// Next 1-based sequence number of a `table` row under `parent_key`
    pub fn next_sequence(&mut self, table: Table, parent_key: i64) -> i64 {
        let seq = self.sequence_nums.entry((table, parent_key)).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Allocate an object key and its accession ID together
    ///
    /// Every sequence involved is checked before any of them advances, so
    /// either both the key and the accession are issued or neither is.
    pub fn mint_accessioned(
        &mut self,
        table: Table,
        mgi_type: i64,
        created_by: i64,
    ) -> Result<(i64, Accession)> {
        self.keys.ensure_initialized(&[table, Table::Accession])?;
        self.accessions.ensure_initialized(MGI_PREFIX)?;

        let object_key = self.keys.next(table)?;
        let accession_key = self.keys.next(Table::Accession)?;
        let accession = self.accessions.mint(MGI_PREFIX)?;

        self.staging.push(
            Table::Accession,
            vec![
                accession_key.to_string(),
                accession.acc_id.clone(),
                accession.prefix.clone(),
                accession.numeric_part.to_string(),
                MGI_LOGICAL_DB.to_string(),
                object_key.to_string(),
                mgi_type.to_string(),
                "0".to_string(),
                "1".to_string(),
            ],
            created_by,
        );
        debug!(object_key, acc_id = %accession.acc_id, "accession minted");
        self.minted.push(accession.clone());

        Ok((object_key, accession))
    }

    /// Note that an accepted row points at preparation `prep_key`
    pub fn use_prep(&mut self, entity: EntityKind, prep_key: i64) {
        self.used_preps.entry(entity).or_default().push(prep_key);
    }

    pub fn prep_used(&self, entity: EntityKind, prep_key: i64) -> bool {
        self.used_preps.get(&entity).is_some_and(|keys| keys.contains(&prep_key))
    }
}

/// Feed every row of one stream through `processor`
pub fn run_stream<I>(
    processor: &mut dyn StreamProcessor,
    rows: I,
    ctx: &mut RunContext<'_>,
    reporter: &mut ErrorReporter,
) -> Result<StreamStats>
where
    I: IntoIterator<Item = Result<InputRow>>,
{
    let entity = processor.entity();
    let mut stats = StreamStats {
        entity,
        accepted: 0,
        rejected: 0,
    };

    info!(stream = %entity, "validating stream");

    for row in rows {
        let row = row?;
        match processor.process(ctx, &row)? {
            RowOutcome::Accepted => stats.accepted += 1,
            RowOutcome::Rejected(reasons) => {
                reporter.reject(row.line, entity, &reasons)?;
                stats.rejected += 1;
            },
        }
    }

    info!(
        stream = %entity,
        accepted = stats.accepted,
        rejected = stats.rejected,
        "stream complete"
    );
    Ok(stats)
}
