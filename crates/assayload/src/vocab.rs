//! Controlled vocabulary validation
//!
//! One memoizing validator serves every vocabulary. The first lookup in a
//! vocabulary loads its whole term→key table from the [`TermSource`]; the
//! table is then kept, read-only, for the rest of the run.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::RowCheck;

/// Where a vocabulary's terms live in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermOrigin {
    /// `voc_term` rows with this vocabulary name
    Controlled(&'static str),
    /// Preferred accession IDs of objects of this MGI type
    Accession(i64),
    /// `mgi_user` logins
    User,
    /// `gxd_structure` terms keyed by [`structure_term`]
    Structure,
}

/// Every vocabulary a loader validates against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vocabulary {
    PrepType,
    PrepSense,
    PrepLabel,
    PrepVisualization,
    PrepSecondary,
    AssayType,
    ReporterGene,
    Embedding,
    Fixation,
    Hybridization,
    Sex,
    Strength,
    Pattern,
    GelRnaType,
    GelControl,
    GelUnits,
    GelStrength,
    Marker,
    Probe,
    Antibody,
    Genotype,
    Reference,
    User,
    Structure,
}

/// MGI object types of accessioned objects
pub mod mgi_type {
    pub const REFERENCE: i64 = 1;
    pub const MARKER: i64 = 2;
    pub const PROBE: i64 = 3;
    pub const ANTIBODY: i64 = 6;
    pub const ASSAY: i64 = 8;
    pub const GENOTYPE: i64 = 12;
}

impl Vocabulary {
    pub fn origin(&self) -> TermOrigin {
        use TermOrigin::{Accession, Controlled};

        match self {
            Vocabulary::PrepType => Controlled("prep_type"),
            Vocabulary::PrepSense => Controlled("prep_sense"),
            Vocabulary::PrepLabel => Controlled("prep_label"),
            Vocabulary::PrepVisualization => Controlled("prep_visualization"),
            Vocabulary::PrepSecondary => Controlled("prep_secondary"),
            Vocabulary::AssayType => Controlled("assay_type"),
            Vocabulary::ReporterGene => Controlled("reporter_gene"),
            Vocabulary::Embedding => Controlled("embedding"),
            Vocabulary::Fixation => Controlled("fixation"),
            Vocabulary::Hybridization => Controlled("hybridization"),
            Vocabulary::Sex => Controlled("sex"),
            Vocabulary::Strength => Controlled("strength"),
            Vocabulary::Pattern => Controlled("pattern"),
            Vocabulary::GelRnaType => Controlled("gel_rna_type"),
            Vocabulary::GelControl => Controlled("gel_control"),
            Vocabulary::GelUnits => Controlled("gel_units"),
            Vocabulary::GelStrength => Controlled("gel_strength"),
            Vocabulary::Marker => Accession(mgi_type::MARKER),
            Vocabulary::Probe => Accession(mgi_type::PROBE),
            Vocabulary::Antibody => Accession(mgi_type::ANTIBODY),
            Vocabulary::Genotype => Accession(mgi_type::GENOTYPE),
            Vocabulary::Reference => Accession(mgi_type::REFERENCE),
            Vocabulary::User => TermOrigin::User,
            Vocabulary::Structure => TermOrigin::Structure,
        }
    }

    /// Label used in rejection reasons
    pub fn label(&self) -> &'static str {
        match self {
            Vocabulary::PrepType => "Prep Type",
            Vocabulary::PrepSense => "Prep Sense",
            Vocabulary::PrepLabel => "Prep Label",
            Vocabulary::PrepVisualization => "Prep Visualization",
            Vocabulary::PrepSecondary => "Secondary Antibody",
            Vocabulary::AssayType => "Assay Type",
            Vocabulary::ReporterGene => "Reporter Gene",
            Vocabulary::Embedding => "Embedding Method",
            Vocabulary::Fixation => "Fixation Method",
            Vocabulary::Hybridization => "Hybridization",
            Vocabulary::Sex => "Sex",
            Vocabulary::Strength => "Strength",
            Vocabulary::Pattern => "Pattern",
            Vocabulary::GelRnaType => "Gel RNA Type",
            Vocabulary::GelControl => "Gel Control",
            Vocabulary::GelUnits => "Gel Units",
            Vocabulary::GelStrength => "Gel Strength",
            Vocabulary::Marker => "Marker",
            Vocabulary::Probe => "Probe",
            Vocabulary::Antibody => "Antibody",
            Vocabulary::Genotype => "Genotype",
            Vocabulary::Reference => "Reference",
            Vocabulary::User => "User",
            Vocabulary::Structure => "Structure",
        }
    }
}

impl std::fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lookup term for a structure name at a Theiler stage
pub fn structure_term(name: &str, stage: u8) -> String {
    format!("TS{}:{}", stage, name.trim())
}

/// Parse a Theiler stage given as "15" or "TS15"
pub fn parse_stage(raw: &str) -> Option<u8> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("TS").unwrap_or(raw);
    digits.parse::<u8>().ok().filter(|s| (1..=28).contains(s))
}

/// Supplies full term tables, one vocabulary at a time
pub trait TermSource {
    fn load_terms(&self, vocabulary: Vocabulary) -> Result<HashMap<String, i64>>;
}

impl TermSource for HashMap<Vocabulary, HashMap<String, i64>> {
    fn load_terms(&self, vocabulary: Vocabulary) -> Result<HashMap<String, i64>> {
        Ok(self.get(&vocabulary).cloned().unwrap_or_default())
    }
}

/// Run-scoped, lazily populated vocabulary cache
pub struct ReferenceValidator<'s> {
    source: &'s dyn TermSource,
    cache: HashMap<Vocabulary, HashMap<String, i64>>,
}

impl<'s> ReferenceValidator<'s> {
    pub fn new(source: &'s dyn TermSource) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    fn table(&mut self, vocabulary: Vocabulary) -> Result<&HashMap<String, i64>> {
        if !self.cache.contains_key(&vocabulary) {
            let terms = self.source.load_terms(vocabulary)?;
            debug!(vocabulary = %vocabulary, terms = terms.len(), "vocabulary loaded");
            self.cache.insert(vocabulary, terms);
        }
        Ok(&self.cache[&vocabulary])
    }

    /// Surrogate key of `raw`, if the vocabulary knows it
    pub fn lookup(&mut self, vocabulary: Vocabulary, raw: &str) -> Result<Option<i64>> {
        let raw = raw.trim();
        Ok(self.table(vocabulary)?.get(raw).copied())
    }

    /// `(key, true)` for a known value, `(0, false)` otherwise
    pub fn validate(&mut self, vocabulary: Vocabulary, raw: &str) -> Result<(i64, bool)> {
        Ok(self
            .lookup(vocabulary, raw)?
            .map_or((0, false), |key| (key, true)))
    }

    /// Validate a required value, recording a reason on failure
    pub fn check(
        &mut self,
        check: &mut RowCheck,
        vocabulary: Vocabulary,
        raw: &str,
    ) -> Result<Option<i64>> {
        let key = self.lookup(vocabulary, raw)?;
        if key.is_none() {
            check.fail(format!("Invalid {}: '{}'", vocabulary, raw.trim()));
        }
        Ok(key)
    }

    /// Validate a value that may be left blank
    pub fn check_optional(
        &mut self,
        check: &mut RowCheck,
        vocabulary: Vocabulary,
        raw: &str,
    ) -> Result<Option<i64>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        self.check(check, vocabulary, raw)
    }

    /// Vocabularies materialized so far, in declaration order
    pub fn loaded_vocabularies(&self) -> Vec<Vocabulary> {
        let mut loaded: Vec<Vocabulary> = self.cache.keys().copied().collect();
        loaded.sort();
        loaded
    }
}
