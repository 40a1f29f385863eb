//! End-to-end tests for the gel loader

mod common;

use assayload::{BatchCommitter, LoaderKind, RunState, SqliteStore, Table};
use assayload_common::RunMode;
use common::*;

fn write_gel_batch(fixture: &Fixture, bands: &[&[&str]]) {
    fixture.write_input(
        "RT_PCR_probeprep.txt",
        &[&["G1", "MGI:100", "RNA", "Antisense", "Digoxigenin", "Alkaline phosphatase"]],
    );
    fixture.write_input("RT_PCR_assay.txt", &[&["G1", "MGI:200", "J:1", "RT-PCR", "", "", CREATED_BY]]);
    fixture.write_input(
        "RT_PCR_gellane.txt",
        &[
            &["G1", "1", "lane 1", "MGI:300", "total", "No", "10", "Female", "E9.5", "", "", "heart", "15"],
            &["G1", "1", "lane 1", "MGI:300", "total", "No", "10", "Female", "E9.5", "", "", "brain", "15"],
            &["G1", "2", "ladder", "MGI:300", "total", "Loading", "", "Female", "Not Applicable", "", "", "", ""],
        ],
    );
    fixture.write_input("RT_PCR_gelband.txt", bands);
}

#[test]
fn test_gel_batch_loads_lanes_rows_and_bands() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    write_gel_batch(
        &fixture,
        &[
            &["G1", "1", "1", "100", "bp", "Present", "", ""],
            &["G1", "2", "1", "100", "bp", "Present", "", ""],
            &["G1", "1", "2", "250.5", "bp", "Present", "", ""],
        ],
    );

    let config = fixture.config(LoaderKind::Gel, RunMode::Load, &store_path, "out");
    let summary = BatchCommitter::new(config).run().unwrap();

    assert_eq!(summary.state, RunState::Committed);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.accessions.len(), 1);

    let store = SqliteStore::open(&store_path, RunMode::Preview).unwrap();
    assert_eq!(store.row_count(Table::GelLane).unwrap(), 2);
    assert_eq!(store.row_count(Table::GelLaneStructure).unwrap(), 2);
    assert_eq!(store.row_count(Table::GelRow).unwrap(), 2);
    assert_eq!(store.row_count(Table::GelBand).unwrap(), 3);

    // only the sample lane has structures to summarize
    let expression: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM gxd_expression", [], |row| row.get(0))
        .unwrap();
    assert_eq!(expression, 2);
}

#[test]
fn test_gel_rows_are_numbered_per_assay() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    write_gel_batch(
        &fixture,
        &[
            &["G1", "1", "1", "100", "bp", "Present", "first", ""],
            &["G1", "1", "2", "250.5", "bp", "Present", "second", ""],
        ],
    );

    let config = fixture.config(LoaderKind::Gel, RunMode::Preview, &store_path, "out");
    BatchCommitter::new(config).run().unwrap();

    let rows = staged_rows(&fixture.dir.path().join("out"), "gxd_gel_row.bcp");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][3], "1");
    assert_eq!(rows[0][4], "100");
    assert_eq!(rows[1][3], "2");
    assert_eq!(rows[1][4], "250.5");
    assert_eq!(rows[1][5], "second");

    let lanes = staged_rows(&fixture.dir.path().join("out"), "gxd_gel_lane.bcp");
    // unresolved age on the control lane
    assert_eq!(lanes[1][9], "Not Applicable");
    assert_eq!(lanes[1][10], "-1");
}

#[test]
fn test_bad_band_is_rejected() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    write_gel_batch(
        &fixture,
        &[
            &["G1", "1", "1", "100", "bp", "Present", "", ""],
            &["G1", "2", "1", "-5", "kb", "Present", "", ""],
        ],
    );

    let config = fixture.config(LoaderKind::Gel, RunMode::Preview, &store_path, "out");
    let error_file = config.error_file();
    let summary = BatchCommitter::new(config).run().unwrap();
    assert_eq!(summary.rejected, 1);

    let errors = std::fs::read_to_string(error_file).unwrap();
    assert_eq!(
        errors.lines().collect::<Vec<_>>(),
        vec!["2\tgel_band\tInvalid Band Size: '-5'; Invalid Gel Units: 'kb'"]
    );
    assert_eq!(staged_rows(&fixture.dir.path().join("out"), "gxd_gel_band.bcp").len(), 1);
}

#[test]
fn test_lane_continuations_are_fully_checked() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    fixture.write_input(
        "RT_PCR_probeprep.txt",
        &[&["G1", "MGI:100", "RNA", "Antisense", "Digoxigenin", "Alkaline phosphatase"]],
    );
    fixture.write_input("RT_PCR_assay.txt", &[&["G1", "MGI:200", "J:1", "RT-PCR", "", "", CREATED_BY]]);
    fixture.write_input(
        "RT_PCR_gellane.txt",
        &[
            &["G1", "1", "lane 1", "MGI:300", "total", "No", "10", "Female", "E9.5", "", "", "heart", "15"],
            &["G1", "1", "lane 1", "MGI:BAD", "total", "No", "10", "Female", "E9.5", "", "", "brain", "15"],
            &["G1", "1", "lane 1", "MGI:300", "total", "No", "10", "BADSEX", "garbage age", "", "", "brain", "15"],
            &["G1", "2", "ladder", "MGI:300", "total", "Loading", "", "Female", "Not Applicable", "", "", "", ""],
            &["G1", "2", "ladder", "MGI:300", "total", "Bogus", "", "Female", "Not Applicable", "", "", "", ""],
        ],
    );
    fixture.write_input("RT_PCR_gelband.txt", &[&["G1", "1", "1", "100", "bp", "Present", "", ""]]);

    let config = fixture.config(LoaderKind::Gel, RunMode::Preview, &store_path, "out");
    let error_file = config.error_file();
    let summary = BatchCommitter::new(config).run().unwrap();
    assert_eq!(summary.rejected, 3);

    let errors = std::fs::read_to_string(error_file).unwrap();
    assert_eq!(
        errors.lines().collect::<Vec<_>>(),
        vec![
            "2\tgel_lane\tInvalid Genotype: 'MGI:BAD'",
            "3\tgel_lane\tInvalid Sex: 'BADSEX'; Invalid Age: 'garbage age'",
            "5\tgel_lane\tInvalid Gel Control: 'Bogus'",
        ]
    );

    // both lanes exist from their first rows; the bad continuation adds no structure
    let out = fixture.dir.path().join("out");
    assert_eq!(staged_rows(&out, "gxd_gel_lane.bcp").len(), 2);
    assert_eq!(staged_rows(&out, "gxd_gel_lane_structure.bcp").len(), 1);
    assert_eq!(staged_rows(&out, "gxd_gel_band.bcp").len(), 1);
}
