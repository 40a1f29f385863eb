//! Common types used across the assay loaders

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Processing mode of a load run
///
/// `Preview` validates and stages everything but never touches the persisted
/// store; `Load` additionally bulk-loads the staging files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Preview,
    Load,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Preview => "preview",
            RunMode::Load => "load",
        }
    }

    /// Whether this mode mutates the persisted store
    pub fn mutates_store(&self) -> bool {
        matches!(self, RunMode::Load)
    }
}

impl std::str::FromStr for RunMode {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "preview" => Ok(RunMode::Preview),
            "load" => Ok(RunMode::Load),
            other => Err(CommonError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date stamped into the creation/modification audit columns of staged rows
///
/// Fixed once per run so that every row of a batch carries the same stamp and
/// re-running a batch with the same date reproduces the staging files exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadDate(NaiveDate);

impl LoadDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in local time
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }
}

impl std::str::FromStr for LoadDate {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), Self::FORMAT)
            .map(Self)
            .map_err(|e| CommonError::InvalidDate {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Display for LoadDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_from_str() {
        assert_eq!("preview".parse::<RunMode>().unwrap(), RunMode::Preview);
        assert_eq!("load".parse::<RunMode>().unwrap(), RunMode::Load);
        assert!(matches!("LOAD ".parse::<RunMode>(), Err(CommonError::InvalidMode(_))));
        assert!("bcp".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_only_load_mutates() {
        assert!(RunMode::Load.mutates_store());
        assert!(!RunMode::Preview.mutates_store());
    }

    #[test]
    fn test_load_date_round_trip_format() {
        let date: LoadDate = "2026-03-09".parse().unwrap();
        assert_eq!(date.to_string(), "2026-03-09");
        assert!("03/09/2026".parse::<LoadDate>().is_err());
    }
}
