//! Conditions that abort a run

mod common;

use assayload::model::EntityKind;
use assayload::{BatchCommitter, LoadError, LoadPlan, LoaderKind, SqliteStore, StreamSpec, Table};
use assayload_common::RunMode;
use common::*;

#[test]
fn test_child_stream_before_parent_is_fatal() {
    let plan = LoadPlan::new(vec![
        StreamSpec::new(EntityKind::Specimen, "In_Situ_specimen.txt"),
        StreamSpec::new(EntityKind::Assay, "In_Situ_assay.txt"),
    ]);

    assert!(matches!(
        plan.validate(),
        Err(LoadError::DependencyOrder {
            parent: EntityKind::Assay,
            child: EntityKind::Specimen,
        })
    ));
}

#[test]
fn test_specimen_without_assay_row_is_missing_parent() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    fixture.write_input("In_Situ_probeprep.txt", &[]);
    fixture.write_input("In_Situ_assay.txt", &[]);
    fixture.write_input("In_Situ_specimen.txt", &[SPECIMEN_ROW]);
    fixture.write_input("In_Situ_results.txt", &[]);

    let config = fixture.config(LoaderKind::InSitu, RunMode::Load, &store_path, "out");
    let error_file = config.error_file();
    let err = BatchCommitter::new(config).run().unwrap_err();

    match err {
        LoadError::MissingParent { parent, child, key, line } => {
            assert_eq!(parent, EntityKind::Assay);
            assert_eq!(child, EntityKind::Specimen);
            assert_eq!(key, "A1");
            assert_eq!(line, 1);
        },
        other => panic!("expected MissingParent, got {:?}", other),
    }

    let errors = std::fs::read_to_string(error_file).unwrap();
    assert!(errors.starts_with("FATAL\t"));

    let store = SqliteStore::open(&store_path, RunMode::Preview).unwrap();
    assert_eq!(store.row_count(Table::Specimen).unwrap(), 0);
}

#[test]
fn test_fatal_error_leaves_store_untouched() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    fixture.write_input("In_Situ_probeprep.txt", &[PREP_ROW]);
    fixture.write_input("In_Situ_assay.txt", &[ASSAY_ROW]);
    fixture.write_input("In_Situ_specimen.txt", &[SPECIMEN_ROW]);
    fixture.write_input("In_Situ_results.txt", &[&["A1", "9", "1", "Present"]]);

    let config = fixture.config(LoaderKind::InSitu, RunMode::Load, &store_path, "out");
    let err = BatchCommitter::new(config).run().unwrap_err();
    assert!(matches!(
        err,
        LoadError::InvalidLine {
            stream: EntityKind::Result,
            line: 1,
            ..
        }
    ));

    let store = SqliteStore::open(&store_path, RunMode::Preview).unwrap();
    assert_eq!(store.row_count(Table::ProbePrep).unwrap(), 0);
    assert_eq!(store.row_count(Table::Assay).unwrap(), 0);
}

#[test]
fn test_missing_input_file_is_fatal() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    fixture.write_input("In_Situ_probeprep.txt", &[PREP_ROW]);

    let config = fixture.config(LoaderKind::InSitu, RunMode::Preview, &store_path, "out");
    let err = BatchCommitter::new(config).run().unwrap_err();
    assert!(matches!(err, LoadError::Resource { .. }));
}

#[test]
fn test_unknown_created_by_is_fatal() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    fixture.write_insitu_batch();

    let mut config = fixture.config(LoaderKind::InSitu, RunMode::Preview, &store_path, "out");
    config.created_by = "nobody".to_string();
    let err = BatchCommitter::new(config).run().unwrap_err();
    assert!(matches!(err, LoadError::UnknownIdentity(ref login) if login == "nobody"));
}

#[test]
fn test_preview_needs_existing_store() {
    let fixture = Fixture::new();
    fixture.write_insitu_batch();

    let missing = fixture.dir.path().join("missing.db");
    let config = fixture.config(LoaderKind::InSitu, RunMode::Preview, &missing, "out");
    assert!(BatchCommitter::new(config).run().is_err());
    assert!(!missing.exists());
}

#[test]
fn test_fatal_run_keeps_previous_staging_files() {
    let fixture = Fixture::new();
    let store_path = fixture.seed_store("gxd.db");
    fixture.write_insitu_batch();

    let config = fixture.config(LoaderKind::InSitu, RunMode::Preview, &store_path, "out");
    BatchCommitter::new(config).run().unwrap();
    let out = fixture.dir.path().join("out");
    let before = staging_contents(&out);
    assert_eq!(staged_rows(&out, "gxd_assay.bcp").len(), 1);

    // same output directory, now without the assay the specimen needs
    fixture.write_input("In_Situ_assay.txt", &[]);
    let config = fixture.config(LoaderKind::InSitu, RunMode::Preview, &store_path, "out");
    let err = BatchCommitter::new(config).run().unwrap_err();
    assert!(matches!(err, LoadError::MissingParent { .. }));

    assert_eq!(staging_contents(&out), before);
    let leftovers: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}
