//! Fatal error taxonomy for load runs
//!
//! Only conditions that abort the whole run are errors. A row that fails
//! field validation is not an error: its reasons travel as plain values to
//! the error file and the run continues.

use std::path::PathBuf;

use assayload_common::CommonError;
use thiserror::Error;

use crate::model::EntityKind;

/// Result type alias for load operations
pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    /// An input, staging, error or store file could not be opened
    #[error("Could not open file {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row has fewer columns than its stream layout
    #[error("Invalid Line ({line}) in {stream} file: expected {expected} columns, found {found}")]
    InvalidLine {
        stream: EntityKind,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A child row names a parent business key that no parent row carried
    #[error("Cannot find {parent} '{key}' referenced by {child} at line {line}")]
    MissingParent {
        parent: EntityKind,
        child: EntityKind,
        key: String,
        line: u64,
    },

    /// The load plan would read a child stream before its parent stream
    #[error("Load plan processes {child} before its parent {parent}")]
    DependencyOrder { parent: EntityKind, child: EntityKind },

    /// A key or accession sequence was used before being seeded
    #[error("Sequence '{0}' used before initialization")]
    NotInitialized(String),

    /// The run's createdBy identity is not a known user
    #[error("Unknown createdBy identity '{0}'")]
    UnknownIdentity(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Tab-delimited file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl LoadError {
    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            path: path.into(),
            source,
        }
    }

    pub fn not_initialized(sequence: impl std::fmt::Display) -> Self {
        Self::NotInitialized(sequence.to_string())
    }
}
