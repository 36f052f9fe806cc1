#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv_reconcile::{data::Value, dataset::Dataset};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Fixed run timestamp so reports are reproducible.
pub fn created_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .expect("date")
        .and_hms_opt(10, 20, 30)
        .expect("time")
}

/// Builds a typed dataset, inferring each column's type from its values.
pub fn dataset(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
    Dataset::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
        .expect("dataset")
}

pub fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}
