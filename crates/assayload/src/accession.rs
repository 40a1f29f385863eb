//! Accession identifier minting
//!
//! Accession IDs are the public names of new objects: a namespace prefix
//! followed by a number drawn from a sequence shared by every object ever
//! accessioned under that prefix.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::keys::{KeySource, Sequence};

/// Namespace of MGI accession IDs
pub const MGI_PREFIX: &str = "MGI:";

/// Logical database of MGI accession IDs
pub const MGI_LOGICAL_DB: i64 = 1;

/// A freshly minted accession ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accession {
    pub acc_id: String,
    pub prefix: String,
    pub numeric_part: i64,
}

impl Accession {
    fn new(prefix: &str, numeric_part: i64) -> Self {
        Self {
            acc_id: format!("{}{}", prefix, numeric_part),
            prefix: prefix.to_string(),
            numeric_part,
        }
    }
}

impl std::fmt::Display for Accession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.acc_id)
    }
}

#[derive(Debug, Default)]
pub struct AccessionMinter {
    sequences: HashMap<String, Sequence>,
}

impl AccessionMinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `prefix` from the persisted registry; returns the current maximum
    pub fn initialize(&mut self, prefix: &str, source: &dyn KeySource) -> Result<i64> {
        let max = source.max_accession(prefix)?;
        self.seed(prefix, max);
        Ok(max)
    }

    pub fn seed(&mut self, prefix: &str, max: i64) {
        debug!(prefix, max, "accession sequence seeded");
        self.sequences.insert(prefix.to_string(), Sequence::new(max));
    }

    pub fn ensure_initialized(&self, prefix: &str) -> Result<()> {
        if self.sequences.contains_key(prefix) {
            Ok(())
        } else {
            Err(LoadError::not_initialized(prefix))
        }
    }

    /// Next accession ID in `prefix`
    pub fn mint(&mut self, prefix: &str) -> Result<Accession> {
        let sequence = self
            .sequences
            .get_mut(prefix)
            .ok_or_else(|| LoadError::not_initialized(prefix))?;
        Ok(Accession::new(prefix, sequence.advance()))
    }

    /// Highest number minted in `prefix` during this run
    pub fn last_minted(&self, prefix: &str) -> Option<i64> {
        self.sequences.get(prefix).and_then(Sequence::last)
    }

    pub fn minted(&self, prefix: &str) -> i64 {
        self.sequences.get(prefix).map_or(0, Sequence::issued)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_continues_after_seed() {
        let mut minter = AccessionMinter::new();
        minter.seed(MGI_PREFIX, 5_000_000);

        let first = minter.mint(MGI_PREFIX).unwrap();
        assert_eq!(first.acc_id, "MGI:5000001");
        assert_eq!(first.numeric_part, 5_000_001);
        assert_eq!(first.prefix, "MGI:");

        assert_eq!(minter.mint(MGI_PREFIX).unwrap().to_string(), "MGI:5000002");
        assert_eq!(minter.last_minted(MGI_PREFIX), Some(5_000_002));
        assert_eq!(minter.minted(MGI_PREFIX), 2);
    }

    #[test]
    fn test_unseeded_prefix_fails() {
        let mut minter = AccessionMinter::new();
        assert!(matches!(minter.mint("J:"), Err(LoadError::NotInitialized(_))));
        assert!(minter.ensure_initialized(MGI_PREFIX).is_err());
        assert_eq!(minter.minted(MGI_PREFIX), 0);
    }
}
