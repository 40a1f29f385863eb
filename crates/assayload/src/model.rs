//! Entity kinds and the table catalog shared by staging and the store
//!
//! [`EntityKind`] names an input record stream and the namespace of its
//! business keys. [`Table`] names a staged/persisted relation and fixes its
//! column order, which is the bulk-load format of the store.

use serde::{Deserialize, Serialize};

/// An input record stream and the business-key namespace it populates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ProbePrep,
    AntibodyPrep,
    Assay,
    Specimen,
    Result,
    GelLane,
    GelRow,
    GelBand,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ProbePrep => "probe_prep",
            EntityKind::AntibodyPrep => "antibody_prep",
            EntityKind::Assay => "assay",
            EntityKind::Specimen => "specimen",
            EntityKind::Result => "result",
            EntityKind::GelLane => "gel_lane",
            EntityKind::GelRow => "gel_row",
            EntityKind::GelBand => "gel_band",
        }
    }

    /// Parents a row of this stream must resolve; a missing one is fatal
    pub fn required_parents(&self) -> &'static [EntityKind] {
        match self {
            EntityKind::Specimen | EntityKind::GelLane => &[EntityKind::Assay],
            EntityKind::Result => &[EntityKind::Specimen],
            EntityKind::GelBand => &[EntityKind::Assay, EntityKind::GelLane],
            _ => &[],
        }
    }

    /// Parents looked up tolerantly (absence is not an error)
    pub fn optional_parents(&self) -> &'static [EntityKind] {
        match self {
            EntityKind::Assay => &[EntityKind::ProbePrep, EntityKind::AntibodyPrep],
            _ => &[],
        }
    }

    pub fn is_preparation(&self) -> bool {
        matches!(self, EntityKind::ProbePrep | EntityKind::AntibodyPrep)
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const ALL: [EntityKind; 8] = [
            EntityKind::ProbePrep,
            EntityKind::AntibodyPrep,
            EntityKind::Assay,
            EntityKind::Specimen,
            EntityKind::Result,
            EntityKind::GelLane,
            EntityKind::GelRow,
            EntityKind::GelBand,
        ];
        let s = s.trim();
        ALL.into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown stream '{}'", s))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit columns appended to every staged row
pub const AUDIT_COLUMNS: [&str; 3] = ["created_by_key", "creation_date", "modification_date"];

/// A staged relation of the persisted store
///
/// The declaration order is the bulk-load order: every table comes after the
/// tables its foreign keys point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    ProbePrep,
    AntibodyPrep,
    Assay,
    AssayNote,
    Specimen,
    InSituResult,
    ResultStructure,
    GelLane,
    GelLaneStructure,
    GelRow,
    GelBand,
    Accession,
}

impl Table {
    pub const ALL: [Table; 12] = [
        Table::ProbePrep,
        Table::AntibodyPrep,
        Table::Assay,
        Table::AssayNote,
        Table::Specimen,
        Table::InSituResult,
        Table::ResultStructure,
        Table::GelLane,
        Table::GelLaneStructure,
        Table::GelRow,
        Table::GelBand,
        Table::Accession,
    ];

    /// Store table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::ProbePrep => "gxd_probe_prep",
            Table::AntibodyPrep => "gxd_antibody_prep",
            Table::Assay => "gxd_assay",
            Table::AssayNote => "gxd_assay_note",
            Table::Specimen => "gxd_specimen",
            Table::InSituResult => "gxd_insitu_result",
            Table::ResultStructure => "gxd_isresult_structure",
            Table::GelLane => "gxd_gel_lane",
            Table::GelLaneStructure => "gxd_gel_lane_structure",
            Table::GelRow => "gxd_gel_row",
            Table::GelBand => "gxd_gel_band",
            Table::Accession => "acc_accession",
        }
    }

    /// Staging file name inside the output directory
    pub fn staging_file(&self) -> String {
        format!("{}.bcp", self.name())
    }

    /// Surrogate key column, for tables that own a key sequence
    pub fn key_column(&self) -> Option<&'static str> {
        match self {
            Table::ProbePrep => Some("probe_prep_key"),
            Table::AntibodyPrep => Some("antibody_prep_key"),
            Table::Assay => Some("assay_key"),
            Table::Specimen => Some("specimen_key"),
            Table::InSituResult => Some("result_key"),
            Table::GelLane => Some("gel_lane_key"),
            Table::GelRow => Some("gel_row_key"),
            Table::GelBand => Some("gel_band_key"),
            Table::Accession => Some("accession_key"),
            Table::AssayNote | Table::ResultStructure | Table::GelLaneStructure => None,
        }
    }

    /// Body columns in staging order (audit columns excluded)
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::ProbePrep => &[
                "probe_prep_key",
                "probe_key",
                "sense_key",
                "label_key",
                "visualization_key",
                "prep_type",
            ],
            Table::AntibodyPrep => &["antibody_prep_key", "antibody_key", "secondary_key", "label_key"],
            Table::Assay => &[
                "assay_key",
                "assay_type_key",
                "refs_key",
                "marker_key",
                "probe_prep_key",
                "antibody_prep_key",
                "reporter_gene_key",
            ],
            Table::AssayNote => &["assay_key", "sequence_num", "assay_note"],
            Table::Specimen => &[
                "specimen_key",
                "assay_key",
                "embedding_key",
                "fixation_key",
                "genotype_key",
                "sequence_num",
                "specimen_label",
                "sex",
                "age",
                "age_min",
                "age_max",
                "age_note",
                "hybridization",
                "specimen_note",
            ],
            Table::InSituResult => &[
                "result_key",
                "specimen_key",
                "strength_key",
                "pattern_key",
                "sequence_num",
                "result_note",
            ],
            Table::ResultStructure => &["result_key", "structure_key"],
            Table::GelLane => &[
                "gel_lane_key",
                "assay_key",
                "genotype_key",
                "gel_rna_type_key",
                "gel_control_key",
                "sequence_num",
                "lane_label",
                "sample_amount",
                "sex",
                "age",
                "age_min",
                "age_max",
                "age_note",
                "lane_note",
            ],
            Table::GelLaneStructure => &["gel_lane_key", "structure_key"],
            Table::GelRow => &["gel_row_key", "assay_key", "gel_units_key", "sequence_num", "size", "row_note"],
            Table::GelBand => &["gel_band_key", "gel_lane_key", "gel_row_key", "strength_key", "band_note"],
            Table::Accession => &[
                "accession_key",
                "acc_id",
                "prefix_part",
                "numeric_part",
                "logical_db_key",
                "object_key",
                "mgi_type_key",
                "private",
                "preferred",
            ],
        }
    }

    /// Total staged width: body columns plus audit columns
    pub fn width(&self) -> usize {
        self.columns().len() + AUDIT_COLUMNS.len()
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_load_order_puts_parents_first() {
        let position = |t: Table| Table::ALL.iter().position(|x| *x == t).unwrap_or(usize::MAX);
        assert!(position(Table::ProbePrep) < position(Table::Assay));
        assert!(position(Table::Assay) < position(Table::Specimen));
        assert!(position(Table::Specimen) < position(Table::InSituResult));
        assert!(position(Table::InSituResult) < position(Table::ResultStructure));
        assert!(position(Table::GelLane) < position(Table::GelBand));
        assert!(position(Table::GelRow) < position(Table::GelBand));
    }

    #[test]
    fn test_key_column_is_first_column() {
        for table in Table::ALL {
            if let Some(key) = table.key_column() {
                assert_eq!(table.columns()[0], key, "{}", table);
            }
        }
    }

    #[test]
    fn test_parent_declarations() {
        assert_eq!(EntityKind::Result.required_parents(), &[EntityKind::Specimen]);
        assert!(EntityKind::Assay.required_parents().is_empty());
        assert!(EntityKind::Assay.optional_parents().contains(&EntityKind::ProbePrep));
    }
}
