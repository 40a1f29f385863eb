//! Tab-delimited input stream reader
//!
//! Each input file is a headerless, tab-delimited stream with a fixed column
//! layout per entity. Quote characters carry no meaning (notes may contain
//! them), blank lines are skipped, extra trailing columns are ignored, and a
//! row with fewer columns than its layout aborts the run.
//!
//! Line numbers are physical line numbers of the file, blank lines included,
//! so error file entries point at the line an editor shows.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::{LoadError, Result};
use crate::model::EntityKind;

/// One tokenized input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// 1-based line number in the input file
    pub line: u64,
    fields: Vec<String>,
}

impl InputRow {
    pub fn new(line: u64, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    /// Field `index`, or "" when the row is shorter
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Ordered rows of one input file
pub struct TabReader<R: Read = File> {
    stream: EntityKind,
    columns: usize,
    lines: BufReader<R>,
    tokenizer: ReaderBuilder,
    buf: String,
    record: StringRecord,
    line: u64,
}

impl TabReader<File> {
    /// Open `path` for `stream`; failure to open is fatal
    pub fn open(path: impl AsRef<Path>, stream: EntityKind, columns: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LoadError::resource(path, e))?;
        Ok(Self::from_reader(file, stream, columns))
    }
}

impl<R: Read> TabReader<R> {
    pub fn from_reader(reader: R, stream: EntityKind, columns: usize) -> Self {
        let mut tokenizer = ReaderBuilder::new();
        tokenizer
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false);

        Self {
            stream,
            columns,
            lines: BufReader::new(reader),
            tokenizer,
            buf: String::new(),
            record: StringRecord::new(),
            line: 0,
        }
    }

    fn read_row(&mut self) -> Result<Option<InputRow>> {
        loop {
            self.buf.clear();
            if self.lines.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buf.trim_end_matches(['\n', '\r']);
            if text.is_empty() {
                continue;
            }

            self.tokenizer
                .from_reader(text.as_bytes())
                .read_record(&mut self.record)?;
            break;
        }

        if self.record.len() < self.columns {
            return Err(LoadError::InvalidLine {
                stream: self.stream,
                line: self.line,
                expected: self.columns,
                found: self.record.len(),
            });
        }

        let fields = self
            .record
            .iter()
            .take(self.columns)
            .map(str::to_string)
            .collect();

        Ok(Some(InputRow::new(self.line, fields)))
    }
}

impl<R: Read> Iterator for TabReader<R> {
    type Item = Result<InputRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row().transpose()
    }
}
