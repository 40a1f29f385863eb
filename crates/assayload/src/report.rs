//! Rejected-row reporting
//!
//! Every rejected input row becomes exactly one line of the error file:
//! `<line>\t<entity>\t<reason>; <reason>...`. Fatal conditions are appended
//! as a final `FATAL` line before the run aborts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{error, warn};

use crate::error::{LoadError, Result};
use crate::model::EntityKind;

pub struct ErrorReporter {
    out: Box<dyn Write>,
    rejected: BTreeMap<EntityKind, usize>,
}

impl ErrorReporter {
    /// Create (truncate) the error file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| LoadError::resource(path, e))?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(out: impl Write + 'static) -> Self {
        Self {
            out: Box::new(out),
            rejected: BTreeMap::new(),
        }
    }

    /// Report one rejected row with all its reasons
    pub fn reject(&mut self, line: u64, entity: EntityKind, reasons: &[String]) -> Result<()> {
        let reasons = reasons.join("; ");
        warn!(line, entity = %entity, reasons = %reasons, "row rejected");
        writeln!(self.out, "{}\t{}\t{}", line, entity, reasons)?;
        *self.rejected.entry(entity).or_default() += 1;
        Ok(())
    }

    /// Record the error that is about to abort the run
    pub fn fatal(&mut self, err: &LoadError) -> Result<()> {
        error!(error = %err, "fatal load error");
        writeln!(self.out, "FATAL\t{}", err)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn rejected(&self, entity: EntityKind) -> usize {
        self.rejected.get(&entity).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    #[test]
    fn test_one_line_per_rejected_row() {
        let buf = SharedBuf::default();
        let mut reporter = ErrorReporter::from_writer(buf.clone());

        reporter
            .reject(
                3,
                EntityKind::Specimen,
                &["Invalid Genotype: 'MGI:9'".to_string(), "Invalid Sex: 'Mixed'".to_string()],
            )
            .unwrap();
        reporter.reject(7, EntityKind::Assay, &["Invalid Marker: 'x'".to_string()]).unwrap();
        reporter.finish().unwrap();

        assert_eq!(
            buf.text(),
            "3\tspecimen\tInvalid Genotype: 'MGI:9'; Invalid Sex: 'Mixed'\n7\tassay\tInvalid Marker: 'x'\n"
        );
        assert_eq!(reporter.rejected(EntityKind::Specimen), 1);
        assert_eq!(reporter.rejected(EntityKind::Result), 0);
        assert_eq!(reporter.total_rejected(), 2);
    }

    #[test]
    fn test_fatal_line() {
        let buf = SharedBuf::default();
        let mut reporter = ErrorReporter::from_writer(buf.clone());

        reporter.fatal(&LoadError::not_initialized("gxd_assay")).unwrap();
        assert!(buf.text().starts_with("FATAL\tSequence 'gxd_assay'"));
    }
}
