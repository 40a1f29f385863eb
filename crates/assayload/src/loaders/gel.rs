//! Gel lane and gel band streams (RT-PCR, northern and western blots)

use std::collections::HashSet;

use crate::age::format_bound;
use crate::error::Result;
use crate::loaders::{check_structure, parent_rejected};
use crate::model::{EntityKind, Table};
use crate::pipeline::{RowCheck, RowOutcome, RunContext, StreamProcessor};
use crate::reader::InputRow;
use crate::vocab::Vocabulary;
use crate::xref::{BusinessKey, Parent};

/// Gel control value of a lane that carries a sample (and so a structure)
const SAMPLE_LANE: &str = "No";

/// Columns: assay#, lane#, label, genotype ID, RNA type, control, sample
/// amount, sex, age, age note, lane note, structure, Theiler stage
///
/// Rows repeating an (assay, lane) key add structures to that lane; they
/// are checked like the first row of the lane.
#[derive(Default)]
pub struct GelLaneProcessor {
    sample_lanes: HashSet<i64>,
    linked: HashSet<(i64, i64)>,
}

impl GelLaneProcessor {
    pub const COLUMNS: usize = 13;

    pub fn new() -> Self {
        Self::default()
    }

    fn link_structure(&mut self, ctx: &mut RunContext<'_>, lane_key: i64, structure_key: i64) {
        if self.linked.insert((lane_key, structure_key)) {
            ctx.staging.push(
                Table::GelLaneStructure,
                vec![lane_key.to_string(), structure_key.to_string()],
                ctx.created_by,
            );
        }
    }
}

impl StreamProcessor for GelLaneProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::GelLane
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let (Some(assay_id), Some(lane_id)) = (
            check.required("Assay ID", row.field(0)),
            check.required("Lane ID", row.field(1)),
        ) else {
            return Ok(check.reject());
        };

        let assay = BusinessKey::new(assay_id);
        let lane = assay.child(lane_id);

        let assay_key = match ctx.xref.require(EntityKind::Assay, &assay, EntityKind::GelLane, row.line)? {
            Parent::Found(key) => key,
            Parent::Rejected => {
                ctx.xref.mark_rejected(EntityKind::GelLane, lane);
                return Ok(RowOutcome::rejected(parent_rejected(EntityKind::Assay, &assay)));
            },
        };

        if ctx.xref.was_rejected(EntityKind::GelLane, &lane) {
            return Ok(RowOutcome::rejected(parent_rejected(EntityKind::GelLane, &lane)));
        }

        let existing = ctx.xref.resolve(EntityKind::GelLane, &lane);
        let sample_lane = match existing {
            Some(lane_key) => self.sample_lanes.contains(&lane_key),
            None => row.field(5).trim() == SAMPLE_LANE,
        };

        let genotype = ctx.vocab.check(&mut check, Vocabulary::Genotype, row.field(3))?;
        let rna_type = ctx.vocab.check(&mut check, Vocabulary::GelRnaType, row.field(4))?;
        let control = ctx.vocab.check(&mut check, Vocabulary::GelControl, row.field(5))?;
        let sex = ctx.vocab.check(&mut check, Vocabulary::Sex, row.field(7))?;
        let age = check.age(&ctx.ages, row.field(8), true);
        let structure = if sample_lane {
            check_structure(ctx, &mut check, row.field(11), row.field(12))?
        } else {
            None
        };

        let (Some(genotype), Some(rna_type), Some(control), Some(_), Some(age), true) =
            (genotype, rna_type, control, sex, age, check.is_ok())
        else {
            if existing.is_none() {
                ctx.xref.mark_rejected(EntityKind::GelLane, lane);
            }
            return Ok(check.reject());
        };

        // Continuation row: one more structure for an existing sample lane
        if let Some(lane_key) = existing {
            if let Some(structure_key) = structure {
                self.link_structure(ctx, lane_key, structure_key);
            }
            return Ok(RowOutcome::Accepted);
        }

        let key = ctx.keys.next(Table::GelLane)?;
        let seq = ctx.next_sequence(Table::GelLane, assay_key);
        ctx.staging.push(
            Table::GelLane,
            vec![
                key.to_string(),
                assay_key.to_string(),
                genotype.to_string(),
                rna_type.to_string(),
                control.to_string(),
                seq.to_string(),
                row.field(2).trim().to_string(),
                row.field(6).trim().to_string(),
                row.field(7).trim().to_string(),
                age.age.clone(),
                format_bound(age.min),
                format_bound(age.max),
                row.field(9).trim().to_string(),
                row.field(10).trim().to_string(),
            ],
            ctx.created_by,
        );

        if let Some(structure_key) = structure {
            self.sample_lanes.insert(key);
            self.link_structure(ctx, key, structure_key);
        }
        ctx.xref.register(EntityKind::GelLane, lane, key);

        Ok(RowOutcome::Accepted)
    }
}

/// Columns: assay#, lane#, row#, band size, units, strength, row note,
/// band note
///
/// Gel rows are created on first use, keyed by (assay, row#); the first
/// band of a row fixes its size, units and note.
#[derive(Default)]
pub struct GelBandProcessor;

impl GelBandProcessor {
    pub const COLUMNS: usize = 8;

    pub fn new() -> Self {
        Self
    }
}

impl StreamProcessor for GelBandProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::GelBand
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let (Some(assay_id), Some(lane_id), Some(row_id)) = (
            check.required("Assay ID", row.field(0)),
            check.required("Lane ID", row.field(1)),
            check.required("Row ID", row.field(2)),
        ) else {
            return Ok(check.reject());
        };

        let assay = BusinessKey::new(assay_id);
        let lane = assay.child(lane_id);
        let gel_row = assay.child(row_id);

        let assay_key = match ctx.xref.require(EntityKind::Assay, &assay, EntityKind::GelBand, row.line)? {
            Parent::Found(key) => key,
            Parent::Rejected => return Ok(RowOutcome::rejected(parent_rejected(EntityKind::Assay, &assay))),
        };
        let lane_key = match ctx.xref.require(EntityKind::GelLane, &lane, EntityKind::GelBand, row.line)? {
            Parent::Found(key) => key,
            Parent::Rejected => return Ok(RowOutcome::rejected(parent_rejected(EntityKind::GelLane, &lane))),
        };

        let size = check.decimal("Band Size", row.field(3));
        let units = ctx.vocab.check(&mut check, Vocabulary::GelUnits, row.field(4))?;
        let strength = ctx.vocab.check(&mut check, Vocabulary::GelStrength, row.field(5))?;

        let (Some(size), Some(units), Some(strength), true) = (size, units, strength, check.is_ok()) else {
            return Ok(check.reject());
        };

        let row_key = match ctx.xref.resolve(EntityKind::GelRow, &gel_row) {
            Some(key) => key,
            None => {
                let key = ctx.keys.next(Table::GelRow)?;
                let seq = ctx.next_sequence(Table::GelRow, assay_key);
                ctx.staging.push(
                    Table::GelRow,
                    vec![
                        key.to_string(),
                        assay_key.to_string(),
                        units.to_string(),
                        seq.to_string(),
                        size,
                        row.field(6).trim().to_string(),
                    ],
                    ctx.created_by,
                );
                ctx.xref.register(EntityKind::GelRow, gel_row, key);
                key
            },
        };

        let band_key = ctx.keys.next(Table::GelBand)?;
        ctx.staging.push(
            Table::GelBand,
            vec![
                band_key.to_string(),
                lane_key.to_string(),
                row_key.to_string(),
                strength.to_string(),
                row.field(7).trim().to_string(),
            ],
            ctx.created_by,
        );

        Ok(RowOutcome::Accepted)
    }
}
