mod common;

use common::{TestWorkspace, created_at, fixture_path};
use csv_reconcile::{
    cache::digest_bytes,
    config::ComparisonConfig,
    data::Value,
    differ::Descriptor,
    reconcile::NewRowPolicy,
    report,
    session::{InputFormat, Session},
};

fn profile() -> ComparisonConfig {
    ComparisonConfig::load(&fixture_path("profile.yml")).expect("profile")
}

#[test]
fn fixture_profile_reports_changed_missing_and_new_rows() {
    let mut session = Session::new();
    let output = session
        .compare_files(
            &fixture_path("previous.csv"),
            &fixture_path("current.csv"),
            InputFormat::default(),
            &profile(),
            created_at(),
        )
        .expect("compare");

    let table = &output.reconciliation.table;
    assert_eq!(
        table.columns(),
        &["region", "id", "product", "amount", "in_stock"]
    );
    let kinds = table
        .records()
        .iter()
        .map(|record| match &record.descriptor {
            Descriptor::Modified(changes) => format!("modified:{}", changes.len()),
            Descriptor::Missing => "missing".to_string(),
            Descriptor::New => "new".to_string(),
        })
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["modified:1", "missing", "new"]);
    assert_eq!(table.value(&table.records()[0], "amount"), Some(&Value::Float(7.25)));

    let summary = &output.summary;
    assert_eq!(summary.previous_rows, 5);
    assert_eq!(summary.current_rows, 5);
    assert!((summary.percentage_change - 60.0).abs() < 1e-9);
    assert_eq!(summary.column_breakdown.len(), 3);
}

#[test]
fn unmapped_columns_stay_in_report_but_are_not_compared() {
    let workspace = TestWorkspace::new();
    let previous = workspace.write("previous.csv", "id,note,val\n1,old,a\n");
    let current = workspace.write("current.csv", "id,val\n1,a\n");
    let mut config = ComparisonConfig {
        key_columns: vec!["id".to_string()],
        ..ComparisonConfig::default()
    };
    config.column_mapping.unmap("note");

    let mut session = Session::new();
    let output = session
        .compare_files(&previous, &current, InputFormat::default(), &config, created_at())
        .expect("compare");
    assert!(output.reconciliation.table.is_empty());
    assert_eq!(
        output.reconciliation.table.columns(),
        &["id", "note", "val"]
    );
}

#[test]
fn session_cache_tracks_inputs_and_settings() {
    let workspace = TestWorkspace::new();
    let previous = workspace.write("previous.csv", "id,val\n1,a\n2,b\n");
    let current = workspace.write("current.csv", "id,val\n1,a\n1,z\n3,c\n");
    let key_set = ComparisonConfig {
        key_columns: vec!["id".to_string()],
        ..ComparisonConfig::default()
    };
    let full_row = ComparisonConfig {
        new_rows: NewRowPolicy::FullRow,
        ..key_set.clone()
    };

    let mut session = Session::new();
    let by_key = session
        .compare_files(&previous, &current, InputFormat::default(), &key_set, created_at())
        .expect("key-set")
        .reconciliation
        .table
        .len();
    let by_row = session
        .compare_files(&previous, &current, InputFormat::default(), &full_row, created_at())
        .expect("full-row")
        .reconciliation
        .table
        .len();
    assert_eq!(by_key, 2);
    assert_eq!(by_row, 3);
    assert_eq!(session.cache().len(), 2);
    assert_eq!(session.cache().misses(), 2);

    let digest = digest_bytes(&std::fs::read(&current).expect("read current"));
    assert_eq!(session.cache_mut().invalidate_input(&digest), 2);
    assert!(session.cache().is_empty());
}

#[test]
fn report_written_from_session_output() {
    let workspace = TestWorkspace::new();
    let mut session = Session::new();
    let output = session
        .compare_files(
            &fixture_path("previous.csv"),
            &fixture_path("current.csv"),
            InputFormat::default(),
            &profile(),
            created_at(),
        )
        .expect("compare");

    let path = report::default_report_path(workspace.path(), created_at());
    report::write_report(&path, b',', &output.reconciliation.table).expect("write report");
    let contents = workspace.read("Rows_Not_Matching_20240315_102030.csv");
    assert!(contents.contains("EU,2,Gadget,7.25,false,amount: 7.25 != 7.95,03/15/2024"));
}
