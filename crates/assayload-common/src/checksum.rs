//! SHA-256 digests of staging files
//!
//! Preview and load runs of the same batch must stage identical content; the
//! run summary carries one digest per staging file so operators can compare
//! a preview against the later load without diffing the files by hand.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex-encoded SHA-256 of a file's contents
pub fn file_digest(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    reader_digest(&mut file)
}

/// Hex-encoded SHA-256 of everything readable from `reader`
pub fn reader_digest<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_reader_digest() {
        let mut cursor = Cursor::new(b"hello world");
        let digest = reader_digest(&mut cursor).unwrap();
        assert_eq!(digest, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[test]
    fn test_file_digest_matches_reader_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"1\t2\t2026-01-01\n").unwrap();

        let from_file = file_digest(file.path()).unwrap();
        let from_reader = reader_digest(&mut Cursor::new(b"1\t2\t2026-01-01\n")).unwrap();
        assert_eq!(from_file, from_reader);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(file_digest("/nonexistent/GXD_Assay.bcp").is_err());
    }
}
