//! Surrogate key allocation
//!
//! Every keyed table has its own sequence, seeded once per run from the
//! maximum key already persisted. Keys are handed out strictly increasing
//! and only once a row has passed every check, so rejected rows leave no
//! gaps in a sequence.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{LoadError, Result};
use crate::model::Table;

/// Maximum persisted values the allocators are seeded from
pub trait KeySource {
    /// Largest key in `table`, 0 for an empty table
    fn max_key(&self, table: Table) -> Result<i64>;

    /// Largest accession number issued under `prefix`, 0 if none
    fn max_accession(&self, prefix: &str) -> Result<i64>;
}

/// A seeded counter: `start + n` on the n-th call to [`Sequence::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    start: i64,
    issued: i64,
}

impl Sequence {
    pub fn new(start: i64) -> Self {
        Self { start, issued: 0 }
    }

    pub fn advance(&mut self) -> i64 {
        self.issued += 1;
        self.start + self.issued
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    /// Last value handed out, if any
    pub fn last(&self) -> Option<i64> {
        (self.issued > 0).then_some(self.start + self.issued)
    }

    pub fn issued(&self) -> i64 {
        self.issued
    }
}

/// Per-table surrogate key sequences for one run
#[derive(Debug, Default)]
pub struct KeyAllocator {
    sequences: HashMap<Table, Sequence>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` from the store; returns the starting key
    pub fn initialize(&mut self, table: Table, source: &dyn KeySource) -> Result<i64> {
        let start = source.max_key(table)?;
        self.seed(table, start);
        Ok(start)
    }

    /// Seed `table` with an explicit starting key
    pub fn seed(&mut self, table: Table, start: i64) {
        debug!(table = %table, start, "key sequence seeded");
        self.sequences.insert(table, Sequence::new(start));
    }

    pub fn is_initialized(&self, table: Table) -> bool {
        self.sequences.contains_key(&table)
    }

    /// Fail unless every table in `tables` has been seeded
    pub fn ensure_initialized(&self, tables: &[Table]) -> Result<()> {
        match tables.iter().find(|t| !self.is_initialized(**t)) {
            Some(table) => Err(LoadError::not_initialized(table)),
            None => Ok(()),
        }
    }

    /// Next key of `table`
    pub fn next(&mut self, table: Table) -> Result<i64> {
        self.sequences
            .get_mut(&table)
            .map(Sequence::advance)
            .ok_or_else(|| LoadError::not_initialized(table))
    }

    pub fn starting_key(&self, table: Table) -> Option<i64> {
        self.sequences.get(&table).map(Sequence::start)
    }

    pub fn last(&self, table: Table) -> Option<i64> {
        self.sequences.get(&table).and_then(Sequence::last)
    }

    /// Keys issued per table, in bulk-load order
    pub fn issued(&self) -> Vec<(Table, i64)> {
        Table::ALL
            .iter()
            .filter_map(|t| self.sequences.get(t).map(|s| (*t, s.issued())))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct FixedSource(i64);

    impl KeySource for FixedSource {
        fn max_key(&self, _table: Table) -> Result<i64> {
            Ok(self.0)
        }

        fn max_accession(&self, _prefix: &str) -> Result<i64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_next_continues_from_persisted_max() {
        let mut keys = KeyAllocator::new();
        assert_eq!(keys.initialize(Table::Assay, &FixedSource(1000)).unwrap(), 1000);

        assert_eq!(keys.next(Table::Assay).unwrap(), 1001);
        assert_eq!(keys.next(Table::Assay).unwrap(), 1002);
        assert_eq!(keys.last(Table::Assay), Some(1002));
    }

    #[test]
    fn test_sequences_are_independent() {
        let mut keys = KeyAllocator::new();
        keys.seed(Table::Assay, 10);
        keys.seed(Table::Specimen, 500);

        assert_eq!(keys.next(Table::Assay).unwrap(), 11);
        assert_eq!(keys.next(Table::Specimen).unwrap(), 501);
        assert_eq!(keys.next(Table::Assay).unwrap(), 12);
    }

    #[test]
    fn test_next_before_initialize_fails() {
        let mut keys = KeyAllocator::new();
        let err = keys.next(Table::GelBand).unwrap_err();
        assert!(matches!(err, LoadError::NotInitialized(ref t) if t == "gxd_gel_band"));
    }

    #[test]
    fn test_ensure_initialized_names_missing_table() {
        let mut keys = KeyAllocator::new();
        keys.seed(Table::Assay, 0);

        assert!(keys.ensure_initialized(&[Table::Assay]).is_ok());
        let err = keys.ensure_initialized(&[Table::Assay, Table::Accession]).unwrap_err();
        assert!(err.to_string().contains("acc_accession"));
    }

    #[test]
    fn test_unused_sequence_reports_no_last_key() {
        let mut keys = KeyAllocator::new();
        keys.seed(Table::Specimen, 42);
        assert_eq!(keys.last(Table::Specimen), None);
        assert_eq!(keys.starting_key(Table::Specimen), Some(42));
    }

    proptest! {
        #[test]
        fn prop_keys_are_unique_and_increasing(start in 0i64..1_000_000, calls in 1usize..200) {
            let mut keys = KeyAllocator::new();
            keys.seed(Table::Specimen, start);

            let issued: Vec<i64> = (0..calls).map(|_| keys.next(Table::Specimen).unwrap()).collect();

            prop_assert_eq!(issued[0], start + 1);
            prop_assert!(issued.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(*issued.last().unwrap(), start + calls as i64);
        }
    }
}
