//! Shared fixtures for load run tests
//!
//! A seeded store plus a data directory of tab-delimited input files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assayload::vocab::Vocabulary;
use assayload::{LoadConfig, LoaderKind, SqliteStore};
use assayload_common::{LoadDate, RunMode};
use tempfile::TempDir;

pub const CREATED_BY: &str = "user1";
pub const LOAD_DATE: &str = "2026-03-09";

/// Key of `user1` in the seeded store
pub const USER_KEY: i64 = 1001;

pub const PREP_ROW: &[&str] = &["A1", "MGI:100", "RNA", "Antisense", "Digoxigenin", "Alkaline phosphatase"];
pub const ASSAY_ROW: &[&str] = &["A1", "MGI:200", "J:1", "RNA In Situ", "", "", CREATED_BY];
pub const SPECIMEN_ROW: &[&str] = &[
    "A1",
    "1",
    "Label1",
    "MGI:300",
    "E9.5",
    "",
    "Not Specified",
    "4% PFA",
    "Not Applicable",
    "whole mount",
    "",
];

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("data")).expect("data dir");
        Self { dir }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Create and seed a store file named `name`
    pub fn seed_store(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let store = SqliteStore::open(&path, RunMode::Load).expect("open store");
        seed(&store);
        path
    }

    /// Write one input file; each row is joined with tabs
    pub fn write_input(&self, file: &str, rows: &[&[&str]]) {
        write_rows(&self.data_dir().join(file), rows);
    }

    /// The in situ scenario: one prep, one assay, one specimen
    pub fn write_insitu_batch(&self) {
        self.write_input("In_Situ_probeprep.txt", &[PREP_ROW]);
        self.write_input("In_Situ_assay.txt", &[ASSAY_ROW]);
        self.write_input("In_Situ_specimen.txt", &[SPECIMEN_ROW]);
        self.write_input("In_Situ_results.txt", &[]);
    }

    /// Config with a fixed load date, writing into `output`
    pub fn config(&self, loader: LoaderKind, mode: RunMode, store: &Path, output: &str) -> LoadConfig {
        let mut config = LoadConfig::new(loader, self.data_dir());
        config.mode = mode;
        config.store_path = store.to_path_buf();
        config.output_dir = self.dir.path().join(output);
        config.created_by = CREATED_BY.to_string();
        config.load_date = LOAD_DATE.parse::<LoadDate>().expect("load date");
        config
    }
}

pub fn write_rows(path: &Path, rows: &[&[&str]]) {
    let mut body = String::new();
    for row in rows {
        body.push_str(&row.join("\t"));
        body.push('\n');
    }
    std::fs::write(path, body).expect("write input");
}

/// Lookup data every loader test relies on
pub fn seed(store: &SqliteStore) {
    let terms: &[(Vocabulary, &str, i64)] = &[
        (Vocabulary::Probe, "MGI:100", 10),
        (Vocabulary::Marker, "MGI:200", 20),
        (Vocabulary::Genotype, "MGI:300", 30),
        (Vocabulary::Antibody, "MGI:400", 40),
        (Vocabulary::Reference, "J:1", 50),
        (Vocabulary::User, CREATED_BY, USER_KEY),
        (Vocabulary::PrepType, "RNA", 101),
        (Vocabulary::PrepSense, "Antisense", 102),
        (Vocabulary::PrepLabel, "Digoxigenin", 103),
        (Vocabulary::PrepVisualization, "Alkaline phosphatase", 104),
        (Vocabulary::PrepSecondary, "Not Specified", 105),
        (Vocabulary::AssayType, "RNA In Situ", 111),
        (Vocabulary::AssayType, "Immunohistochemistry", 112),
        (Vocabulary::AssayType, "RT-PCR", 113),
        (Vocabulary::Sex, "Not Specified", 121),
        (Vocabulary::Sex, "Female", 122),
        (Vocabulary::Fixation, "4% PFA", 131),
        (Vocabulary::Embedding, "Not Applicable", 141),
        (Vocabulary::Hybridization, "whole mount", 151),
        (Vocabulary::Strength, "Present", 161),
        (Vocabulary::Strength, "Absent", 162),
        (Vocabulary::Pattern, "Regionally restricted", 171),
        (Vocabulary::GelRnaType, "total", 181),
        (Vocabulary::GelControl, "No", 191),
        (Vocabulary::GelControl, "Loading", 192),
        (Vocabulary::GelUnits, "bp", 201),
        (Vocabulary::GelStrength, "Present", 211),
    ];
    for (vocabulary, term, key) in terms {
        store.add_term(*vocabulary, term, *key).expect("seed term");
    }
    store.add_structure("heart", 15, 501).expect("seed structure");
    store.add_structure("brain", 15, 502).expect("seed structure");
}

/// Every staging file in `dir`, name and content, sorted by name
pub fn staging_contents(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = std::fs::read_dir(dir)
        .expect("read output dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "bcp"))
        .map(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let content = std::fs::read_to_string(&path).expect("read staging file");
            (name, content)
        })
        .collect();
    files.sort();
    files
}

/// Lines of a staging file, split into fields
pub fn staged_rows(dir: &Path, file: &str) -> Vec<Vec<String>> {
    std::fs::read_to_string(dir.join(file))
        .expect("read staging file")
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}
