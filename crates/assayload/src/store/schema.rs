//! SQLite schema of the expression store

use rusqlite::Connection;

use crate::error::Result;

/// Lookup relations the loaders validate against
const LOOKUP_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS voc_term (
        term_key INTEGER PRIMARY KEY,
        vocabulary TEXT NOT NULL,
        term TEXT NOT NULL,
        UNIQUE(vocabulary, term)
    );

    CREATE TABLE IF NOT EXISTS mgi_user (
        user_key INTEGER PRIMARY KEY,
        login TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS gxd_structure (
        structure_key INTEGER PRIMARY KEY,
        stage INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(stage, name)
    );

    CREATE TABLE IF NOT EXISTS acc_accession (
        accession_key INTEGER PRIMARY KEY,
        acc_id TEXT NOT NULL,
        prefix_part TEXT NOT NULL,
        numeric_part INTEGER,
        logical_db_key INTEGER NOT NULL,
        object_key INTEGER NOT NULL,
        mgi_type_key INTEGER NOT NULL,
        private INTEGER NOT NULL DEFAULT 0,
        preferred INTEGER NOT NULL DEFAULT 1,
        created_by_key INTEGER,
        creation_date TEXT,
        modification_date TEXT
    );

    CREATE TABLE IF NOT EXISTS acc_accession_max (
        prefix_part TEXT PRIMARY KEY,
        max_numeric_part INTEGER NOT NULL
    );
"#;

/// Relations written by the loaders
const ASSAY_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS gxd_probe_prep (
        probe_prep_key INTEGER PRIMARY KEY,
        probe_key INTEGER NOT NULL,
        sense_key INTEGER NOT NULL,
        label_key INTEGER NOT NULL,
        visualization_key INTEGER NOT NULL,
        prep_type TEXT NOT NULL,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT
    );

    CREATE TABLE IF NOT EXISTS gxd_antibody_prep (
        antibody_prep_key INTEGER PRIMARY KEY,
        antibody_key INTEGER NOT NULL,
        secondary_key INTEGER NOT NULL,
        label_key INTEGER NOT NULL,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT
    );

    CREATE TABLE IF NOT EXISTS gxd_assay (
        assay_key INTEGER PRIMARY KEY,
        assay_type_key INTEGER NOT NULL,
        refs_key INTEGER NOT NULL,
        marker_key INTEGER NOT NULL,
        probe_prep_key INTEGER REFERENCES gxd_probe_prep(probe_prep_key),
        antibody_prep_key INTEGER REFERENCES gxd_antibody_prep(antibody_prep_key),
        reporter_gene_key INTEGER,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT
    );

    CREATE TABLE IF NOT EXISTS gxd_assay_note (
        assay_key INTEGER NOT NULL REFERENCES gxd_assay(assay_key),
        sequence_num INTEGER NOT NULL,
        assay_note TEXT NOT NULL,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        PRIMARY KEY(assay_key, sequence_num)
    );

    CREATE TABLE IF NOT EXISTS gxd_specimen (
        specimen_key INTEGER PRIMARY KEY,
        assay_key INTEGER NOT NULL REFERENCES gxd_assay(assay_key),
        embedding_key INTEGER NOT NULL,
        fixation_key INTEGER NOT NULL,
        genotype_key INTEGER NOT NULL,
        sequence_num INTEGER NOT NULL,
        specimen_label TEXT,
        sex TEXT NOT NULL,
        age TEXT NOT NULL,
        age_min REAL NOT NULL,
        age_max REAL NOT NULL,
        age_note TEXT,
        hybridization TEXT NOT NULL,
        specimen_note TEXT,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        UNIQUE(assay_key, sequence_num)
    );

    CREATE TABLE IF NOT EXISTS gxd_insitu_result (
        result_key INTEGER PRIMARY KEY,
        specimen_key INTEGER NOT NULL REFERENCES gxd_specimen(specimen_key),
        strength_key INTEGER NOT NULL,
        pattern_key INTEGER NOT NULL,
        sequence_num INTEGER NOT NULL,
        result_note TEXT,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        UNIQUE(specimen_key, sequence_num)
    );

    CREATE TABLE IF NOT EXISTS gxd_isresult_structure (
        result_key INTEGER NOT NULL REFERENCES gxd_insitu_result(result_key),
        structure_key INTEGER NOT NULL,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        PRIMARY KEY(result_key, structure_key)
    );

    CREATE TABLE IF NOT EXISTS gxd_gel_lane (
        gel_lane_key INTEGER PRIMARY KEY,
        assay_key INTEGER NOT NULL REFERENCES gxd_assay(assay_key),
        genotype_key INTEGER NOT NULL,
        gel_rna_type_key INTEGER NOT NULL,
        gel_control_key INTEGER NOT NULL,
        sequence_num INTEGER NOT NULL,
        lane_label TEXT,
        sample_amount TEXT,
        sex TEXT NOT NULL,
        age TEXT NOT NULL,
        age_min REAL NOT NULL,
        age_max REAL NOT NULL,
        age_note TEXT,
        lane_note TEXT,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        UNIQUE(assay_key, sequence_num)
    );

    CREATE TABLE IF NOT EXISTS gxd_gel_lane_structure (
        gel_lane_key INTEGER NOT NULL REFERENCES gxd_gel_lane(gel_lane_key),
        structure_key INTEGER NOT NULL,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        PRIMARY KEY(gel_lane_key, structure_key)
    );

    CREATE TABLE IF NOT EXISTS gxd_gel_row (
        gel_row_key INTEGER PRIMARY KEY,
        assay_key INTEGER NOT NULL REFERENCES gxd_assay(assay_key),
        gel_units_key INTEGER NOT NULL,
        sequence_num INTEGER NOT NULL,
        size REAL,
        row_note TEXT,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT,
        UNIQUE(assay_key, sequence_num)
    );

    CREATE TABLE IF NOT EXISTS gxd_gel_band (
        gel_band_key INTEGER PRIMARY KEY,
        gel_lane_key INTEGER NOT NULL REFERENCES gxd_gel_lane(gel_lane_key),
        gel_row_key INTEGER NOT NULL REFERENCES gxd_gel_row(gel_row_key),
        strength_key INTEGER NOT NULL,
        band_note TEXT,
        created_by_key INTEGER, creation_date TEXT, modification_date TEXT
    );
"#;

/// Denormalized expression summary rebuilt per assay
const SUMMARY_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS gxd_expression (
        expression_key INTEGER PRIMARY KEY AUTOINCREMENT,
        assay_key INTEGER NOT NULL,
        refs_key INTEGER NOT NULL,
        marker_key INTEGER NOT NULL,
        assay_type_key INTEGER NOT NULL,
        genotype_key INTEGER NOT NULL,
        structure_key INTEGER NOT NULL,
        specimen_key INTEGER,
        gel_lane_key INTEGER,
        age TEXT NOT NULL,
        age_min REAL NOT NULL,
        age_max REAL NOT NULL,
        is_expressed INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_expression_assay ON gxd_expression(assay_key);
    CREATE INDEX IF NOT EXISTS idx_accession_object ON acc_accession(object_key, mgi_type_key);
    CREATE INDEX IF NOT EXISTS idx_accession_id ON acc_accession(acc_id);
"#;

/// Create every relation; safe to run against an initialized store
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(LOOKUP_TABLES)?;
    conn.execute_batch(ASSAY_TABLES)?;
    conn.execute_batch(SUMMARY_TABLES)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{Table, AUDIT_COLUMNS};

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table)).unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_staged_tables_match_catalog() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in Table::ALL {
            let expected: Vec<&str> = table.columns().iter().chain(AUDIT_COLUMNS.iter()).copied().collect();
            assert_eq!(column_names(&conn, table.name()), expected, "{}", table);
        }
    }
}
