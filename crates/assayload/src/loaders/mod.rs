//! Assay loader families
//!
//! Each loader reads a fixed set of streams, parents first:
//!
//! | Loader | Streams |
//! |--------|---------|
//! | `insitu` | probe prep, assay, specimen, result |
//! | `immuno` | antibody prep, assay, specimen, result |
//! | `gel` | probe prep, assay, gel lane, gel band |

pub mod assay;
pub mod gel;
pub mod insitu;
pub mod prep;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{EntityKind, Table};
use crate::pipeline::{RowCheck, RunContext, StreamProcessor};
use crate::vocab::{parse_stage, structure_term, Vocabulary};
use crate::xref::BusinessKey;

/// Assay notes are stored in chunks of this many characters
pub const NOTE_CHUNK: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    InSitu,
    Immuno,
    Gel,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::InSitu => "insitu",
            LoaderKind::Immuno => "immuno",
            LoaderKind::Gel => "gel",
        }
    }

    /// Preparation stream paired with this loader's assays
    pub fn prep(&self) -> EntityKind {
        match self {
            LoaderKind::Immuno => EntityKind::AntibodyPrep,
            LoaderKind::InSitu | LoaderKind::Gel => EntityKind::ProbePrep,
        }
    }

    /// Input streams in processing order with their default file names
    pub fn streams(&self) -> [(EntityKind, &'static str); 4] {
        match self {
            LoaderKind::InSitu => [
                (EntityKind::ProbePrep, "In_Situ_probeprep.txt"),
                (EntityKind::Assay, "In_Situ_assay.txt"),
                (EntityKind::Specimen, "In_Situ_specimen.txt"),
                (EntityKind::Result, "In_Situ_results.txt"),
            ],
            LoaderKind::Immuno => [
                (EntityKind::AntibodyPrep, "Immuno_prep.txt"),
                (EntityKind::Assay, "Immuno_assay.txt"),
                (EntityKind::Specimen, "Immuno_specimen.txt"),
                (EntityKind::Result, "Immuno_results.txt"),
            ],
            LoaderKind::Gel => [
                (EntityKind::ProbePrep, "RT_PCR_probeprep.txt"),
                (EntityKind::Assay, "RT_PCR_assay.txt"),
                (EntityKind::GelLane, "RT_PCR_gellane.txt"),
                (EntityKind::GelBand, "RT_PCR_gelband.txt"),
            ],
        }
    }

    /// Tables staged by this loader, in bulk-load order
    pub fn tables(&self) -> Vec<Table> {
        let prep = match self.prep() {
            EntityKind::AntibodyPrep => Table::AntibodyPrep,
            _ => Table::ProbePrep,
        };
        let children: &[Table] = match self {
            LoaderKind::InSitu | LoaderKind::Immuno => &[Table::Specimen, Table::InSituResult, Table::ResultStructure],
            LoaderKind::Gel => &[Table::GelLane, Table::GelLaneStructure, Table::GelRow, Table::GelBand],
        };

        let mut tables = vec![prep, Table::Assay, Table::AssayNote];
        tables.extend_from_slice(children);
        tables.push(Table::Accession);
        tables
    }

    /// Whether results carry image references
    pub fn stages_images(&self) -> bool {
        !matches!(self, LoaderKind::Gel)
    }

    /// Stream processor for `entity`
    pub fn processor(&self, entity: EntityKind) -> Option<Box<dyn StreamProcessor>> {
        let processor: Box<dyn StreamProcessor> = match entity {
            EntityKind::ProbePrep => Box::new(prep::ProbePrepProcessor::new()),
            EntityKind::AntibodyPrep => Box::new(prep::AntibodyPrepProcessor::new()),
            EntityKind::Assay => Box::new(assay::AssayProcessor::new(self.prep())),
            EntityKind::Specimen => Box::new(insitu::SpecimenProcessor::new()),
            EntityKind::Result => Box::new(insitu::ResultProcessor::new()),
            EntityKind::GelLane => Box::new(gel::GelLaneProcessor::new()),
            EntityKind::GelBand => Box::new(gel::GelBandProcessor::new()),
            EntityKind::GelRow => return None,
        };
        Some(processor)
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a note into stored chunks (character based)
pub fn note_chunks(note: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = note.chars().collect();
    chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect()
}

/// Render an optional key for staging ("" loads as NULL)
pub(crate) fn key_or_null(key: Option<i64>) -> String {
    key.map(|k| k.to_string()).unwrap_or_default()
}

/// Reason given to a row whose parent row was rejected
pub(crate) fn parent_rejected(parent: EntityKind, key: &BusinessKey) -> String {
    format!("{} '{}' was rejected", parent, key)
}

/// Resolve a structure name at a Theiler stage
pub(crate) fn check_structure(
    ctx: &mut RunContext<'_>,
    check: &mut RowCheck,
    name: &str,
    stage: &str,
) -> Result<Option<i64>> {
    let Some(stage_num) = parse_stage(stage) else {
        check.fail(format!("Invalid Theiler Stage: '{}'", stage.trim()));
        return Ok(None);
    };

    let key = ctx.vocab.lookup(Vocabulary::Structure, &structure_term(name, stage_num))?;
    if key.is_none() {
        check.fail(format!("Invalid Structure: '{}' (TS{})", name.trim(), stage_num));
    }
    Ok(key)
}
