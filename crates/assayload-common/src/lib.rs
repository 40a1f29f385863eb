//! Assay Load Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the assay load workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup shared by every loader binary
//! - **Checksums**: digests of staging files, reported in run summaries
//! - **Types**: run modes and load dates stamped on staged rows
//!
//! # Example
//!
//! ```no_run
//! use assayload_common::checksum::file_digest;
//! use assayload_common::Result;
//!
//! fn describe(path: &str) -> Result<()> {
//!     let digest = file_digest(path)?;
//!     tracing::info!(path, %digest, "staging file digest");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{LoadDate, RunMode};
