//! Output buffers and staging files
//!
//! Accepted records are buffered per target table for the whole run and
//! written once, at the end of validation, as tab-delimited files in the
//! store's bulk-load column order. The files are created up front so an
//! unwritable output directory fails the run before any row is read.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use assayload_common::checksum::file_digest;
use assayload_common::LoadDate;
use csv::{QuoteStyle, Writer, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{LoadError, Result};
use crate::model::Table;

/// Side file pairing in situ results with figure labels
pub const RESULT_IMAGE_FILE: &str = "Result_Image.txt";

/// In-memory rows awaiting staging, keyed by table
#[derive(Debug)]
pub struct StagingBuffers {
    load_date: String,
    rows: BTreeMap<Table, Vec<Vec<String>>>,
    images: Vec<(i64, String)>,
}

impl StagingBuffers {
    pub fn new(load_date: LoadDate) -> Self {
        Self {
            load_date: load_date.to_string(),
            rows: BTreeMap::new(),
            images: Vec::new(),
        }
    }

    /// Append a row of body columns, stamped with audit columns
    pub fn push(&mut self, table: Table, mut fields: Vec<String>, created_by: i64) {
        debug_assert_eq!(fields.len(), table.columns().len(), "{}", table);
        fields.push(created_by.to_string());
        fields.push(self.load_date.clone());
        fields.push(self.load_date.clone());
        self.rows.entry(table).or_default().push(fields);
    }

    pub fn push_image(&mut self, result_key: i64, label: &str) {
        self.images.push((result_key, label.trim().to_string()));
    }

    pub fn rows(&self, table: Table) -> &[Vec<String>] {
        self.rows.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.rows(table).len()
    }

    pub fn images(&self) -> &[(i64, String)] {
        &self.images
    }
}

/// A flushed staging file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFile {
    pub table: Table,
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

fn tab_writer(path: &Path) -> Result<Writer<File>> {
    let file = File::create(path).map_err(|e| LoadError::resource(path, e))?;
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(file))
}

/// In-progress name of a staging file
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// One staging file being written under its partial name
///
/// A file dropped before [`PendingFile::finish`] removes its partial file.
struct PendingFile {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<Writer<File>>,
    staged: bool,
}

impl PendingFile {
    fn create(path: PathBuf) -> Result<Self> {
        let partial = partial_path(&path);
        let writer = tab_writer(&partial)?;
        Ok(Self {
            path,
            partial,
            writer: Some(writer),
            staged: false,
        })
    }

    fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_record(record)?;
        }
        Ok(())
    }

    /// Flush, close and move into place
    fn finish(&mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| LoadError::resource(&self.partial, e))?;
        }
        fs::rename(&self.partial, &self.path).map_err(|e| LoadError::resource(&self.path, e))?;
        self.staged = true;
        Ok(self.path.clone())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.staged {
            return;
        }
        drop(self.writer.take());
        if let Err(e) = fs::remove_file(&self.partial) {
            warn!(path = %self.partial.display(), error = %e, "could not remove partial staging file");
        }
    }
}

/// Open staging files of one run
///
/// Files are written under `.partial` names and only replace the previous
/// run's output in [`StagingWriter::flush`]; a run that aborts before then
/// removes its partial files and leaves the earlier output untouched.
pub struct StagingWriter {
    files: Vec<(Table, PendingFile)>,
    images: Option<PendingFile>,
}

impl StagingWriter {
    /// Create one partial staging file per table in `dir`
    pub fn create(dir: &Path, tables: &[Table], with_images: bool) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| LoadError::resource(dir, e))?;

        let mut writer = Self {
            files: Vec::with_capacity(tables.len()),
            images: None,
        };
        for table in tables {
            let file = PendingFile::create(dir.join(table.staging_file()))?;
            writer.files.push((*table, file));
        }
        if with_images {
            writer.images = Some(PendingFile::create(dir.join(RESULT_IMAGE_FILE))?);
        }

        debug!(dir = %dir.display(), files = writer.files.len(), "staging files created");
        Ok(writer)
    }

    /// Write every buffered row and move the files into place
    pub fn flush(mut self, buffers: &StagingBuffers) -> Result<Vec<StagedFile>> {
        let mut staged = Vec::with_capacity(self.files.len());

        for (table, file) in self.files.iter_mut() {
            let table = *table;
            let rows = buffers.rows(table);
            for row in rows {
                file.write_record(row)?;
            }
            let path = file.finish()?;

            let sha256 = file_digest(&path)?;
            info!(table = %table, rows = rows.len(), path = %path.display(), "staged");
            staged.push(StagedFile {
                table,
                path,
                rows: rows.len(),
                sha256,
            });
        }

        if let Some(file) = self.images.as_mut() {
            for (result_key, label) in buffers.images() {
                file.write_record([result_key.to_string().as_str(), label.as_str()])?;
            }
            let path = file.finish()?;
            debug!(images = buffers.images().len(), path = %path.display(), "result images staged");
        }

        Ok(staged)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn load_date() -> LoadDate {
        LoadDate::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn note_row(key: &str, seq: &str, note: &str) -> Vec<String> {
        vec![key.to_string(), seq.to_string(), note.to_string()]
    }

    #[test]
    fn test_push_appends_audit_columns() {
        let mut buffers = StagingBuffers::new(load_date());
        buffers.push(Table::AssayNote, note_row("1001", "1", "note"), 1400);

        let row = &buffers.rows(Table::AssayNote)[0];
        assert_eq!(row.len(), Table::AssayNote.width());
        assert_eq!(&row[3..], &["1400", "2024-03-01", "2024-03-01"]);
    }

    #[test]
    fn test_flush_writes_tab_delimited_files() {
        let dir = TempDir::new().unwrap();
        let mut buffers = StagingBuffers::new(load_date());
        buffers.push(Table::AssayNote, note_row("1001", "1", "a \"quoted\" note"), 7);
        buffers.push_image(55, "Fig. 1A");

        let writer = StagingWriter::create(dir.path(), &[Table::AssayNote, Table::Specimen], true).unwrap();
        let staged = writer.flush(&buffers).unwrap();

        assert_eq!(staged.len(), 2);
        assert_eq!(staged[0].rows, 1);
        assert_eq!(staged[1].rows, 0);
        assert_eq!(staged[0].sha256.len(), 64);

        let notes = fs::read_to_string(dir.path().join("gxd_assay_note.bcp")).unwrap();
        assert_eq!(notes, "1001\t1\ta \"quoted\" note\t7\t2024-03-01\t2024-03-01\n");
        assert_eq!(fs::read_to_string(dir.path().join("gxd_specimen.bcp")).unwrap(), "");

        let images = fs::read_to_string(dir.path().join(RESULT_IMAGE_FILE)).unwrap();
        assert_eq!(images, "55\tFig. 1A\n");
    }

    #[test]
    fn test_empty_fields_are_written_as_empty() {
        let dir = TempDir::new().unwrap();
        let mut buffers = StagingBuffers::new(load_date());
        buffers.push(Table::ResultStructure, vec!["9".to_string(), String::new()], 1);

        let staged = StagingWriter::create(dir.path(), &[Table::ResultStructure], false)
            .unwrap()
            .flush(&buffers)
            .unwrap();

        let content = fs::read_to_string(&staged[0].path).unwrap();
        assert_eq!(content, "9\t\t1\t2024-03-01\t2024-03-01\n");
    }

    #[test]
    fn test_unwritable_directory_is_resource_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let result = StagingWriter::create(&blocker.join("out"), &[Table::Assay], false);
        assert!(matches!(result, Err(LoadError::Resource { .. })));
    }

    #[test]
    fn test_unflushed_writer_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("gxd_assay.bcp");
        fs::write(&staged, "previous run\n").unwrap();

        let writer = StagingWriter::create(dir.path(), &[Table::Assay], true).unwrap();
        assert!(dir.path().join("gxd_assay.bcp.partial").exists());
        drop(writer);

        assert_eq!(fs::read_to_string(&staged).unwrap(), "previous run\n");
        assert!(!dir.path().join("gxd_assay.bcp.partial").exists());
        assert!(!dir.path().join("Result_Image.txt.partial").exists());
        assert!(!dir.path().join(RESULT_IMAGE_FILE).exists());
    }

    #[test]
    fn test_flush_replaces_previous_output() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("gxd_assay.bcp");
        fs::write(&staged, "previous run\n").unwrap();

        let buffers = StagingBuffers::new(load_date());
        StagingWriter::create(dir.path(), &[Table::Assay], false)
            .unwrap()
            .flush(&buffers)
            .unwrap();

        assert_eq!(fs::read_to_string(&staged).unwrap(), "");
        assert!(!dir.path().join("gxd_assay.bcp.partial").exists());
    }
}
