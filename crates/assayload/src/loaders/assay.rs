//! Assay stream
//!
//! Columns: assay#, marker ID, reference (J:), assay type, reporter gene,
//! note, createdBy.
//!
//! Each accepted assay gets its key and MGI accession ID together. The
//! assay, its note chunks and its accession row are stamped with the
//! assay's own createdBy user rather than the run identity.

use tracing::debug;

use crate::error::Result;
use crate::loaders::{key_or_null, note_chunks, NOTE_CHUNK};
use crate::model::{EntityKind, Table};
use crate::pipeline::{RowCheck, RowOutcome, RunContext, StreamProcessor};
use crate::reader::InputRow;
use crate::vocab::{mgi_type, Vocabulary};
use crate::xref::BusinessKey;

pub struct AssayProcessor {
    prep: EntityKind,
}

impl AssayProcessor {
    pub const COLUMNS: usize = 7;

    /// `prep` is the preparation stream assays link to
    pub fn new(prep: EntityKind) -> Self {
        Self { prep }
    }
}

impl StreamProcessor for AssayProcessor {
    fn entity(&self) -> EntityKind {
        EntityKind::Assay
    }

    fn columns(&self) -> usize {
        Self::COLUMNS
    }

    fn process(&mut self, ctx: &mut RunContext<'_>, row: &InputRow) -> Result<RowOutcome> {
        let mut check = RowCheck::new();
        let assay = BusinessKey::new(row.field(0));
        let blank = check.required("Assay ID", row.field(0)).is_none();
        let duplicate = !blank && ctx.xref.is_registered(EntityKind::Assay, &assay);
        if duplicate {
            check.fail(format!("Duplicate assay '{}'", assay));
        }

        let marker = ctx.vocab.check(&mut check, Vocabulary::Marker, row.field(1))?;
        let reference = ctx.vocab.check(&mut check, Vocabulary::Reference, row.field(2))?;
        let assay_type = ctx.vocab.check(&mut check, Vocabulary::AssayType, row.field(3))?;
        let reporter = ctx.vocab.check_optional(&mut check, Vocabulary::ReporterGene, row.field(4))?;
        let created_by = ctx.vocab.check(&mut check, Vocabulary::User, row.field(6))?;

        // The prep link is optional, but a prep that was rejected takes its assay with it
        let prep = ctx.xref.resolve(self.prep, &assay);
        if prep.is_none() && ctx.xref.was_rejected(self.prep, &assay) {
            check.fail(format!("{} for assay '{}' was rejected", self.prep, assay));
        }

        let (Some(marker), Some(reference), Some(assay_type), Some(created_by), true) =
            (marker, reference, assay_type, created_by, check.is_ok())
        else {
            if !blank && !duplicate {
                ctx.xref.mark_rejected(EntityKind::Assay, assay);
            }
            return Ok(check.reject());
        };

        let (assay_key, accession) = ctx.mint_accessioned(Table::Assay, mgi_type::ASSAY, created_by)?;

        let (probe_prep, antibody_prep) = match self.prep {
            EntityKind::AntibodyPrep => (None, prep),
            _ => (prep, None),
        };
        ctx.staging.push(
            Table::Assay,
            vec![
                assay_key.to_string(),
                assay_type.to_string(),
                reference.to_string(),
                marker.to_string(),
                key_or_null(probe_prep),
                key_or_null(antibody_prep),
                key_or_null(reporter),
            ],
            created_by,
        );

        for (seq, chunk) in note_chunks(row.field(5).trim(), NOTE_CHUNK).into_iter().enumerate() {
            ctx.staging.push(
                Table::AssayNote,
                vec![assay_key.to_string(), (seq + 1).to_string(), chunk],
                created_by,
            );
        }

        if let Some(prep_key) = prep {
            ctx.use_prep(self.prep, prep_key);
        }
        debug!(assay = %assay, assay_key, acc_id = %accession, "assay accepted");
        ctx.xref.register(EntityKind::Assay, assay, assay_key);
        ctx.new_assays.push(assay_key);

        Ok(RowOutcome::Accepted)
    }
}
