//! Persisted expression store (SQLite)
//!
//! The store is the source of every controlled vocabulary and key maximum a
//! run is seeded from, and the destination of the bulk load. Preview runs
//! open it read-only.

pub mod schema;

use std::collections::HashMap;
use std::path::Path;

use assayload_common::{CommonError, RunMode};
use csv::ReaderBuilder;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Transaction};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{LoadError, Result};
use crate::keys::KeySource;
use crate::model::{Table, AUDIT_COLUMNS};
use crate::staging::StagedFile;
use crate::vocab::{structure_term, TermOrigin, TermSource, Vocabulary};

/// Strength term that marks a reading as not expressed
const ABSENT: &str = "Absent";

const REBUILD_INSITU: &str = r#"
    INSERT INTO gxd_expression (
        assay_key, refs_key, marker_key, assay_type_key, genotype_key, structure_key,
        specimen_key, gel_lane_key, age, age_min, age_max, is_expressed
    )
    SELECT a.assay_key, a.refs_key, a.marker_key, a.assay_type_key, s.genotype_key,
           rs.structure_key, s.specimen_key, NULL, s.age, s.age_min, s.age_max,
           MAX(CASE WHEN st.term = ?2 THEN 0 ELSE 1 END)
    FROM gxd_assay a
    JOIN gxd_specimen s ON s.assay_key = a.assay_key
    JOIN gxd_insitu_result r ON r.specimen_key = s.specimen_key
    JOIN gxd_isresult_structure rs ON rs.result_key = r.result_key
    JOIN voc_term st ON st.term_key = r.strength_key
    WHERE a.assay_key = ?1
    GROUP BY a.assay_key, a.refs_key, a.marker_key, a.assay_type_key, s.genotype_key,
             rs.structure_key, s.specimen_key, s.age, s.age_min, s.age_max
    ORDER BY s.specimen_key, rs.structure_key
"#;

const REBUILD_GEL: &str = r#"
    INSERT INTO gxd_expression (
        assay_key, refs_key, marker_key, assay_type_key, genotype_key, structure_key,
        specimen_key, gel_lane_key, age, age_min, age_max, is_expressed
    )
    SELECT a.assay_key, a.refs_key, a.marker_key, a.assay_type_key, l.genotype_key,
           ls.structure_key, NULL, l.gel_lane_key, l.age, l.age_min, l.age_max,
           MAX(CASE WHEN st.term = ?2 THEN 0 ELSE 1 END)
    FROM gxd_assay a
    JOIN gxd_gel_lane l ON l.assay_key = a.assay_key
    JOIN gxd_gel_lane_structure ls ON ls.gel_lane_key = l.gel_lane_key
    JOIN gxd_gel_band b ON b.gel_lane_key = l.gel_lane_key
    JOIN voc_term st ON st.term_key = b.strength_key
    WHERE a.assay_key = ?1
    GROUP BY a.assay_key, a.refs_key, a.marker_key, a.assay_type_key, l.genotype_key,
             ls.structure_key, l.gel_lane_key, l.age, l.age_min, l.age_max
    ORDER BY l.gel_lane_key, ls.structure_key
"#;

/// What a load-mode commit wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    pub rows_loaded: usize,
    pub expression_rows: usize,
    pub assays_summarized: usize,
}

/// Split "MGI:1234" into ("MGI:", Some(1234))
pub fn split_acc_id(acc_id: &str) -> (String, Option<i64>) {
    let digits_at = acc_id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(acc_id.len(), |(i, _)| i);
    let (prefix, digits) = acc_id.split_at(digits_at);
    (prefix.to_string(), digits.parse().ok())
}

pub struct SqliteStore {
    conn: Connection,
    mode: RunMode,
}

impl SqliteStore {
    /// Open the store at `path`; preview mode opens an existing store read-only
    pub fn open(path: &Path, mode: RunMode) -> Result<Self> {
        let conn = match mode {
            RunMode::Preview => {
                if !path.exists() {
                    let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "store does not exist");
                    return Err(LoadError::resource(path, missing));
                }
                Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?
            },
            RunMode::Load => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| LoadError::resource(parent, e))?;
                }
                let conn = Connection::open(path)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                schema::init_schema(&conn)?;
                conn
            },
        };

        debug!(path = %path.display(), mode = %mode, "store opened");
        Ok(Self { conn, mode })
    }

    /// Fresh in-memory store (tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            mode: RunMode::Load,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Add a lookup term to `vocabulary`
    ///
    /// Object vocabularies (marker, probe, ...) get a preferred accession ID
    /// pointing at `key`; structures need a stage and go through
    /// [`SqliteStore::add_structure`].
    pub fn add_term(&self, vocabulary: Vocabulary, term: &str, key: i64) -> Result<()> {
        match vocabulary.origin() {
            TermOrigin::Controlled(name) => {
                self.conn.execute(
                    "INSERT INTO voc_term (term_key, vocabulary, term) VALUES (?1, ?2, ?3)",
                    params![key, name, term],
                )?;
            },
            TermOrigin::Accession(mgi_type) => {
                let (prefix, numeric) = split_acc_id(term);
                self.conn.execute(
                    r#"
                    INSERT INTO acc_accession (
                        acc_id, prefix_part, numeric_part, logical_db_key,
                        object_key, mgi_type_key, private, preferred
                    ) VALUES (?1, ?2, ?3, 1, ?4, ?5, 0, 1)
                    "#,
                    params![term, prefix, numeric, key, mgi_type],
                )?;
            },
            TermOrigin::User => {
                self.conn.execute(
                    "INSERT INTO mgi_user (user_key, login) VALUES (?1, ?2)",
                    params![key, term],
                )?;
            },
            TermOrigin::Structure => {
                return Err(CommonError::config("structure terms need a stage: use add_structure").into());
            },
        }
        Ok(())
    }

    pub fn add_structure(&self, name: &str, stage: u8, key: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO gxd_structure (structure_key, stage, name) VALUES (?1, ?2, ?3)",
            params![key, stage, name],
        )?;
        Ok(())
    }

    /// Set the accession registry maximum of `prefix`
    pub fn set_accession_max(&self, prefix: &str, max: i64) -> Result<()> {
        upsert_accession_max(&self.conn, prefix, max)
    }

    pub fn row_count(&self, table: Table) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| row.get(0))?;
        Ok(count)
    }

    /// Bulk-load staging files and rebuild derived state in one transaction
    pub fn commit_batch(
        &mut self,
        staged: &[StagedFile],
        new_assays: &[i64],
        accession_max: &[(String, i64)],
    ) -> Result<CommitStats> {
        let tx = self.conn.transaction()?;
        let mut stats = CommitStats::default();

        let mut ordered: Vec<&StagedFile> = staged.iter().collect();
        ordered.sort_by_key(|f| f.table);

        for file in ordered {
            let loaded = bulk_load(&tx, file)?;
            debug!(table = %file.table, rows = loaded, "bulk loaded");
            stats.rows_loaded += loaded;
        }

        for assay_key in new_assays {
            stats.expression_rows += rebuild_expression(&tx, *assay_key)?;
            stats.assays_summarized += 1;
        }

        for (prefix, max) in accession_max {
            upsert_accession_max(&tx, prefix, *max)?;
        }

        tx.commit()?;
        info!(
            rows = stats.rows_loaded,
            expression_rows = stats.expression_rows,
            assays = stats.assays_summarized,
            "batch committed"
        );
        Ok(stats)
    }
}

fn bulk_load(tx: &Transaction<'_>, file: &StagedFile) -> Result<usize> {
    let table = file.table;
    let columns: Vec<&str> = table.columns().iter().chain(AUDIT_COLUMNS.iter()).copied().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        columns.join(", "),
        placeholders.join(", ")
    );
    let mut stmt = tx.prepare(&sql)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .from_path(&file.path)?;

    let mut loaded = 0;
    for record in reader.records() {
        let record = record?;
        let values = record.iter().map(|v| if v.is_empty() { None } else { Some(v) });
        stmt.execute(params_from_iter(values))?;
        loaded += 1;
    }
    Ok(loaded)
}

fn rebuild_expression(tx: &Transaction<'_>, assay_key: i64) -> Result<usize> {
    tx.execute("DELETE FROM gxd_expression WHERE assay_key = ?1", params![assay_key])?;
    let insitu = tx.execute(REBUILD_INSITU, params![assay_key, ABSENT])?;
    let gel = tx.execute(REBUILD_GEL, params![assay_key, ABSENT])?;
    Ok(insitu + gel)
}

fn upsert_accession_max(conn: &Connection, prefix: &str, max: i64) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO acc_accession_max (prefix_part, max_numeric_part) VALUES (?1, ?2)
        ON CONFLICT(prefix_part) DO UPDATE
        SET max_numeric_part = MAX(max_numeric_part, excluded.max_numeric_part)
        "#,
        params![prefix, max],
    )?;
    Ok(())
}

impl TermSource for SqliteStore {
    fn load_terms(&self, vocabulary: Vocabulary) -> Result<HashMap<String, i64>> {
        let mut terms = HashMap::new();

        match vocabulary.origin() {
            TermOrigin::Controlled(name) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT term, term_key FROM voc_term WHERE vocabulary = ?1")?;
                let rows = stmt.query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?;
                for row in rows {
                    let (term, key): (String, i64) = row?;
                    terms.insert(term, key);
                }
            },
            TermOrigin::Accession(mgi_type) => {
                let mut stmt = self.conn.prepare(
                    "SELECT acc_id, object_key FROM acc_accession WHERE mgi_type_key = ?1 AND preferred = 1",
                )?;
                let rows = stmt.query_map(params![mgi_type], |row| Ok((row.get(0)?, row.get(1)?)))?;
                for row in rows {
                    let (acc_id, key): (String, i64) = row?;
                    terms.insert(acc_id, key);
                }
            },
            TermOrigin::User => {
                let mut stmt = self.conn.prepare("SELECT login, user_key FROM mgi_user")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                for row in rows {
                    let (login, key): (String, i64) = row?;
                    terms.insert(login, key);
                }
            },
            TermOrigin::Structure => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT name, stage, structure_key FROM gxd_structure")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
                for row in rows {
                    let (name, stage, key): (String, u8, i64) = row?;
                    terms.insert(structure_term(&name, stage), key);
                }
            },
        }

        Ok(terms)
    }
}

impl KeySource for SqliteStore {
    fn max_key(&self, table: Table) -> Result<i64> {
        let Some(column) = table.key_column() else {
            return Ok(0);
        };
        let max = self.conn.query_row(
            &format!("SELECT COALESCE(MAX({}), 0) FROM {}", column, table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn max_accession(&self, prefix: &str) -> Result<i64> {
        let registered: Option<i64> = self
            .conn
            .query_row(
                "SELECT max_numeric_part FROM acc_accession_max WHERE prefix_part = ?1",
                params![prefix],
                |row| row.get(0),
            )
            .optional()?;

        match registered {
            Some(max) => Ok(max),
            None => {
                let max = self.conn.query_row(
                    "SELECT COALESCE(MAX(numeric_part), 0) FROM acc_accession WHERE prefix_part = ?1",
                    params![prefix],
                    |row| row.get(0),
                )?;
                Ok(max)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::vocab::ReferenceValidator;
    use tempfile::TempDir;

    #[test]
    fn test_split_acc_id() {
        assert_eq!(split_acc_id("MGI:1234"), ("MGI:".to_string(), Some(1234)));
        assert_eq!(split_acc_id("J:1"), ("J:".to_string(), Some(1)));
        assert_eq!(split_acc_id("user1"), ("user".to_string(), Some(1)));
        assert_eq!(split_acc_id("MGI:"), ("MGI:".to_string(), None));
    }

    #[test]
    fn test_terms_come_from_each_origin() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_term(Vocabulary::Strength, "Present", 1).unwrap();
        store.add_term(Vocabulary::Marker, "MGI:200", 20).unwrap();
        store.add_term(Vocabulary::User, "user1", 1400).unwrap();
        store.add_structure("heart", 15, 900).unwrap();

        let mut vocab = ReferenceValidator::new(&store);
        assert_eq!(vocab.validate(Vocabulary::Strength, "Present").unwrap(), (1, true));
        assert_eq!(vocab.validate(Vocabulary::Marker, "MGI:200").unwrap(), (20, true));
        assert_eq!(vocab.validate(Vocabulary::Probe, "MGI:200").unwrap(), (0, false));
        assert_eq!(vocab.validate(Vocabulary::User, "user1").unwrap(), (1400, true));
        assert_eq!(vocab.validate(Vocabulary::Structure, "TS15:heart").unwrap(), (900, true));
    }

    #[test]
    fn test_structures_need_add_structure() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.add_term(Vocabulary::Structure, "heart", 1).is_err());
    }

    #[test]
    fn test_key_and_accession_maxima() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.max_key(Table::Assay).unwrap(), 0);
        assert_eq!(store.max_key(Table::AssayNote).unwrap(), 0);

        store.add_term(Vocabulary::Marker, "MGI:200", 20).unwrap();
        assert_eq!(store.max_key(Table::Accession).unwrap(), 1);
        assert_eq!(store.max_accession("MGI:").unwrap(), 200);

        store.set_accession_max("MGI:", 5000).unwrap();
        store.set_accession_max("MGI:", 10).unwrap();
        assert_eq!(store.max_accession("MGI:").unwrap(), 5000);
        assert_eq!(store.max_accession("J:").unwrap(), 0);
    }

    #[test]
    fn test_preview_requires_existing_store() {
        let dir = TempDir::new().unwrap();
        let result = SqliteStore::open(&dir.path().join("missing.db"), RunMode::Preview);
        assert!(matches!(result, Err(LoadError::Resource { .. })));
    }

    #[test]
    fn test_preview_store_is_read_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gxd.db");
        SqliteStore::open(&path, RunMode::Load).unwrap();

        let store = SqliteStore::open(&path, RunMode::Preview).unwrap();
        assert_eq!(store.mode(), RunMode::Preview);
        assert!(store.add_term(Vocabulary::Sex, "Male", 1).is_err());
    }
}
