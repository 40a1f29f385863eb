//! Probe and antibody preparation streams
//!
//! A preparation row carries the assay number it belongs to; the accepted
//! prep is registered under that business key for the assay stream to pick
//! up. Preps are written before their assays are validated, so a prep whose
//! assay is rejected later stays in the output as an orphan.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{EntityKind, Table};
use crate::pipeline::{RowCheck, RowOutcome, RunContext, StreamProcessor};
use crate::reader::InputRow;
use crate::vocab::Vocabulary;
use crate::xref::BusinessKey;

/// Checks shared by both prep streams: the assay number and duplicates
///
/// Returns the business key and whether it was already taken.
fn prep_assay(ctx: &RunContext<'_>, check: &mut RowCheck, entity: EntityKind, raw: &str) -> (BusinessKey, bool) {
    let assay = BusinessKey::new(raw);
    let blank = check.required("Assay ID", raw).is_none();
    let duplicate = !blank && ctx.xref.is_registered(entity, &assay);
    if duplicate {
        check.fail(format!("Duplicate prep for assay '{}'", assay));
    }
    (assay, blank || duplicate)
}

/// Columns: assay#, probe ID, prep type, hybridization, label, visualization
#[derive(Default)]
pub struct ProbePrepProcessor;

impl ProbePrepProcessor {
    pub const COLUMNS: usize = 6;

    pub fn new() -> Self {
        Self
    }
}

impl StreamProcessor for ProbePrepProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::ProbePrep
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let (assay, unusable_key) = prep_assay(ctx, &mut check, EntityKind::ProbePrep, row.field(0));

        let probe = ctx.vocab.check(&mut check, Vocabulary::Probe, row.field(1))?;
        let prep_type = ctx.vocab.check(&mut check, Vocabulary::PrepType, row.field(2))?;
        let sense = ctx.vocab.check(&mut check, Vocabulary::PrepSense, row.field(3))?;
        let label = ctx.vocab.check(&mut check, Vocabulary::PrepLabel, row.field(4))?;
        let visualization = ctx.vocab.check(&mut check, Vocabulary::PrepVisualization, row.field(5))?;

        match (probe, prep_type, sense, label, visualization) {
            (Some(probe), Some(_), Some(sense), Some(label), Some(visualization)) if check.is_ok() => {
                let key = ctx.keys.next(Table::ProbePrep)?;
                ctx.staging.push(
                    Table::ProbePrep,
                    vec![
                        key.to_string(),
                        probe.to_string(),
                        sense.to_string(),
                        label.to_string(),
                        visualization.to_string(),
                        row.field(2).trim().to_string(),
                    ],
                    ctx.created_by,
                );
                ctx.xref.register(EntityKind::ProbePrep, assay, key);
                Ok(RowOutcome::Accepted)
            },
            _ => {
                if !unusable_key {
                    ctx.xref.mark_rejected(EntityKind::ProbePrep, assay);
                }
                Ok(check.reject())
            },
        }
    }
}

/// Columns: assay#, antibody ID, secondary, label
///
/// Identical (antibody, secondary, label) combinations share one prep.
#[derive(Default)]
pub struct AntibodyPrepProcessor {
    shared: HashMap<(i64, i64, i64), i64>,
}

impl AntibodyPrepProcessor {
    pub const COLUMNS: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamProcessor for AntibodyPrepProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::AntibodyPrep
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let (assay, unusable_key) = prep_assay(ctx, &mut check, EntityKind::AntibodyPrep, row.field(0));

        let antibody = ctx.vocab.check(&mut check, Vocabulary::Antibody, row.field(1))?;
        let secondary = ctx.vocab.check(&mut check, Vocabulary::PrepSecondary, row.field(2))?;
        let label = ctx.vocab.check(&mut check, Vocabulary::PrepLabel, row.field(3))?;

        let (Some(antibody), Some(secondary), Some(label), true) = (antibody, secondary, label, check.is_ok()) else {
            if !unusable_key {
                ctx.xref.mark_rejected(EntityKind::AntibodyPrep, assay);
            }
            return Ok(check.reject());
        };

        let key = match self.shared.get(&(antibody, secondary, label)) {
            Some(key) => *key,
            None => {
                let key = ctx.keys.next(Table::AntibodyPrep)?;
                ctx.staging.push(
                    Table::AntibodyPrep,
                    vec![key.to_string(), antibody.to_string(), secondary.to_string(), label.to_string()],
                    ctx.created_by,
                );
                self.shared.insert((antibody, secondary, label), key);
                key
            },
        };
        ctx.xref.register(EntityKind::AntibodyPrep, assay, key);

        Ok(RowOutcome::Accepted)
    }
}
