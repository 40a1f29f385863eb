//! Specimen and in situ result streams (in situ and immunohistochemistry)

use std::collections::HashSet;

use crate::age::format_bound;
use crate::error::Result;
use crate::loaders::{check_structure, parent_rejected};
use crate::model::{EntityKind, Table};
use crate::pipeline::{RowCheck, RowOutcome, RunContext, StreamProcessor};
use crate::reader::InputRow;
use crate::vocab::Vocabulary;
use crate::xref::{BusinessKey, Parent};

/// Columns: assay#, specimen#, label, genotype ID, age, age note, sex,
/// fixation, embedding, hybridization, note
#[derive(Default)]
pub struct SpecimenProcessor;

impl SpecimenProcessor {
    pub const COLUMNS: usize = 11;

    pub fn new() -> Self {
        Self
    }
}

impl StreamProcessor for SpecimenProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::Specimen
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let (Some(assay_id), Some(specimen_id)) = (
            check.required("Assay ID", row.field(0)),
            check.required("Specimen ID", row.field(1)),
        ) else {
            return Ok(check.reject());
        };

        let assay = BusinessKey::new(assay_id);
        let specimen = assay.child(specimen_id);

        let assay_key = match ctx.xref.require(EntityKind::Assay, &assay, EntityKind::Specimen, row.line)? {
            Parent::Found(key) => key,
            Parent::Rejected => {
                ctx.xref.mark_rejected(EntityKind::Specimen, specimen);
                return Ok(RowOutcome::rejected(parent_rejected(EntityKind::Assay, &assay)));
            },
        };

        let duplicate = ctx.xref.is_registered(EntityKind::Specimen, &specimen);
        if duplicate {
            check.fail(format!("Duplicate specimen '{}'", specimen));
        }

        let genotype = ctx.vocab.check(&mut check, Vocabulary::Genotype, row.field(3))?;
        let age = check.age(&ctx.ages, row.field(4), false);
        let sex = ctx.vocab.check(&mut check, Vocabulary::Sex, row.field(6))?;
        let fixation = ctx.vocab.check(&mut check, Vocabulary::Fixation, row.field(7))?;
        let embedding = ctx.vocab.check(&mut check, Vocabulary::Embedding, row.field(8))?;
        let hybridization = ctx.vocab.check(&mut check, Vocabulary::Hybridization, row.field(9))?;

        let (Some(genotype), Some(age), Some(_), Some(fixation), Some(embedding), Some(_), true) =
            (genotype, age, sex, fixation, embedding, hybridization, check.is_ok())
        else {
            if !duplicate {
                ctx.xref.mark_rejected(EntityKind::Specimen, specimen);
            }
            return Ok(check.reject());
        };

        let key = ctx.keys.next(Table::Specimen)?;
        let seq = ctx.next_sequence(Table::Specimen, assay_key);
        ctx.staging.push(
            Table::Specimen,
            vec![
                key.to_string(),
                assay_key.to_string(),
                embedding.to_string(),
                fixation.to_string(),
                genotype.to_string(),
                seq.to_string(),
                row.field(2).trim().to_string(),
                row.field(6).trim().to_string(),
                age.age.clone(),
                format_bound(age.min),
                format_bound(age.max),
                row.field(5).trim().to_string(),
                row.field(9).trim().to_string(),
                row.field(10).trim().to_string(),
            ],
            ctx.created_by,
        );
        ctx.xref.register(EntityKind::Specimen, specimen, key);

        Ok(RowOutcome::Accepted)
    }
}

/// Columns: assay#, specimen#, result#, strength, pattern, structure,
/// Theiler stage, note, images (comma separated)
///
/// Rows repeating an (assay, specimen, result) key add structures to the
/// result created by the first of them. Every row passes the full set of
/// checks, repeated or not.
#[derive(Default)]
pub struct ResultProcessor {
    linked: HashSet<(i64, i64)>,
}

impl ResultProcessor {
    pub const COLUMNS: usize = 9;

    pub fn new() -> Self {
        Self::default()
    }

    fn link_structure(&mut self, ctx: &mut RunContext<'_>, result_key: i64, structure_key: i64) {
        if self.linked.insert((result_key, structure_key)) {
            ctx.staging.push(
                Table::ResultStructure,
                vec![result_key.to_string(), structure_key.to_string()],
                ctx.created_by,
            );
        }
    }
}

impl StreamProcessor for ResultProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::Result
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let (Some(assay_id), Some(specimen_id), Some(result_id)) = (
            check.required("Assay ID", row.field(0)),
            check.required("Specimen ID", row.field(1)),
            check.required("Result ID", row.field(2)),
        ) else {
            return Ok(check.reject());
        };

        let specimen = BusinessKey::composite(&[assay_id, specimen_id]);
        let result = specimen.child(result_id);

        let specimen_key = match ctx.xref.require(EntityKind::Specimen, &specimen, EntityKind::Result, row.line)? {
            Parent::Found(key) => key,
            Parent::Rejected => {
                ctx.xref.mark_rejected(EntityKind::Result, result);
                return Ok(RowOutcome::rejected(parent_rejected(EntityKind::Specimen, &specimen)));
            },
        };

        if ctx.xref.was_rejected(EntityKind::Result, &result) {
            return Ok(RowOutcome::rejected(parent_rejected(EntityKind::Result, &result)));
        }

        let strength = ctx.vocab.check(&mut check, Vocabulary::Strength, row.field(3))?;
        let pattern = ctx.vocab.check(&mut check, Vocabulary::Pattern, row.field(4))?;
        let structure = check_structure(ctx, &mut check, row.field(5), row.field(6))?;
        let existing = ctx.xref.resolve(EntityKind::Result, &result);

        let (Some(strength), Some(pattern), Some(structure), true) = (strength, pattern, structure, check.is_ok()) else {
            if existing.is_none() {
                ctx.xref.mark_rejected(EntityKind::Result, result);
            }
            return Ok(check.reject());
        };

        // Continuation row: one more structure for an existing result
        if let Some(result_key) = existing {
            self.link_structure(ctx, result_key, structure);
            return Ok(RowOutcome::Accepted);
        }

        let key = ctx.keys.next(Table::InSituResult)?;
        let seq = ctx.next_sequence(Table::InSituResult, specimen_key);
        ctx.staging.push(
            Table::InSituResult,
            vec![
                key.to_string(),
                specimen_key.to_string(),
                strength.to_string(),
                pattern.to_string(),
                seq.to_string(),
                row.field(7).trim().to_string(),
            ],
            ctx.created_by,
        );
        self.link_structure(ctx, key, structure);

        for image in row.field(8).split(',').map(str::trim).filter(|i| !i.is_empty()) {
            ctx.staging.push_image(key, image);
        }
        ctx.xref.register(EntityKind::Result, result, key);

        Ok(RowOutcome::Accepted)
    }
}
