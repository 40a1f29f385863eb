//! Assay Load Library
//!
//! Validates denormalized, tab-delimited assay submissions against the
//! expression store's vocabularies and turns them into surrogate-keyed,
//! bulk-loadable staging files, optionally loading them.
//!
//! # Supported Loaders
//!
//! - **In situ**: probe prep, assay, specimen and result streams
//! - **Immunohistochemistry**: antibody prep, assay, specimen and result streams
//! - **Gel**: probe prep, assay, gel lane and gel band streams
//!
//! # Example
//!
//! ```no_run
//! use assayload::{BatchCommitter, LoadConfig, LoaderKind};
//! use assayload_common::RunMode;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = LoadConfig::new(LoaderKind::InSitu, "./data/J12345");
//!     config.mode = RunMode::Preview;
//!     config.created_by = "gxd_loader".to_string();
//!
//!     let summary = BatchCommitter::new(config).run()?;
//!     println!("{}", serde_json::to_string_pretty(&summary)?);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod accession;
pub mod age;
pub mod committer;
pub mod config;
pub mod error;
pub mod keys;
pub mod loaders;
pub mod model;
pub mod pipeline;
pub mod reader;
pub mod report;
pub mod staging;
pub mod store;
pub mod vocab;
pub mod xref;

pub use committer::{BatchCommitter, LoadPlan, RunState, RunSummary, StreamSpec};
pub use config::LoadConfig;
pub use error::{LoadError, Result};
pub use loaders::LoaderKind;
pub use model::{EntityKind, Table};
pub use store::SqliteStore;
