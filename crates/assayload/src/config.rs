//! Run configuration
//!
//! A [`LoadConfig`] says which loader runs, in which mode, over which files,
//! against which store and on whose behalf. The binary builds it from CLI
//! flags (each backed by an `ASSAYLOAD_*` environment variable); tests build
//! it directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use assayload_common::{CommonError, LoadDate, RunMode};
use serde::{Deserialize, Serialize};

use crate::committer::{LoadPlan, StreamSpec};
use crate::loaders::LoaderKind;
use crate::model::EntityKind;

/// Store file used when none is configured
pub const DEFAULT_STORE_FILE: &str = "gxd.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub loader: LoaderKind,
    pub mode: RunMode,
    /// Directory holding the input files
    pub data_dir: PathBuf,
    /// Directory receiving staging and error files
    pub output_dir: PathBuf,
    pub store_path: PathBuf,
    /// Login of the user the run acts for
    pub created_by: String,
    /// Date stamped into every staged row
    pub load_date: LoadDate,
    /// Input file names overriding the loader defaults
    #[serde(default)]
    pub inputs: BTreeMap<EntityKind, PathBuf>,
}

impl LoadConfig {
    /// Defaults: preview mode, outputs and store inside `data_dir`, today's date
    pub fn new(loader: LoaderKind, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            loader,
            mode: RunMode::Preview,
            output_dir: data_dir.clone(),
            store_path: data_dir.join(DEFAULT_STORE_FILE),
            data_dir,
            created_by: String::new(),
            load_date: LoadDate::today(),
            inputs: BTreeMap::new(),
        }
    }

    /// Parse `stream=file` overrides such as `specimen=Specimens.txt`
    pub fn with_input_overrides<I, S>(mut self, overrides: I) -> Result<Self, CommonError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in overrides {
            let spec = spec.as_ref();
            let (stream, file) = spec
                .split_once('=')
                .ok_or_else(|| CommonError::config(format!("input override '{}' is not stream=file", spec)))?;
            let entity: EntityKind = stream.parse().map_err(CommonError::config)?;
            if !self.loader.streams().iter().any(|(e, _)| *e == entity) {
                return Err(CommonError::config(format!(
                    "{} loader has no {} stream",
                    self.loader, entity
                )));
            }
            self.inputs.insert(entity, PathBuf::from(file.trim()));
        }
        Ok(self)
    }

    /// Input file of `entity`, resolved against the data directory
    pub fn input_path(&self, entity: EntityKind, default_file: &str) -> PathBuf {
        let file = self
            .inputs
            .get(&entity)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(default_file));
        self.data_dir.join(file)
    }

    /// The loader's streams in processing order
    pub fn plan(&self) -> LoadPlan {
        LoadPlan::new(
            self.loader
                .streams()
                .into_iter()
                .map(|(entity, file)| StreamSpec::new(entity, self.input_path(entity, file)))
                .collect(),
        )
    }

    pub fn error_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}.error", self.loader))
    }

    /// Validate values the CLI cannot check on its own
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.created_by.trim().is_empty() {
            return Err(CommonError::config("createdBy identity is required"));
        }
        Ok(())
    }
}
