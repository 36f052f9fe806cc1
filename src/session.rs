use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    cache::{CacheKey, ReconcileCache},
    config::ComparisonConfig,
    dataset::Dataset,
    io_utils,
    reconcile::{Reconciliation, reconcile},
    summary::{Summary, summarize},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutput {
    pub reconciliation: Reconciliation,
    pub summary: Summary,
}

/// How both input files are parsed.
#[derive(Debug, Clone, Copy)]
pub struct InputFormat {
    /// `None` picks the delimiter from each file's extension.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// Prepares both datasets under `config`, reconciles them and summarizes the
/// result.
pub fn run_comparison(
    previous: Dataset,
    current: Dataset,
    config: &ComparisonConfig,
    created_at: NaiveDateTime,
) -> Result<ComparisonOutput> {
    let prepared = config.prepare(previous, current, created_at)?;
    let reconciliation = reconcile(&prepared.previous, &prepared.current, &prepared.options)
        .context("Reconciling datasets")?;
    let summary = summarize(
        &prepared.previous,
        &prepared.current,
        &reconciliation.table,
        &prepared.options.key_columns,
    )
    .context("Summarizing discrepancies")?;
    info!(
        "Found {} discrepancy row(s): {} missing, {} new",
        reconciliation.table.len(),
        reconciliation.missing_count,
        reconciliation.new_count
    );
    Ok(ComparisonOutput {
        reconciliation,
        summary,
    })
}

/// Repeated comparisons that share a result cache.
#[derive(Debug, Default)]
pub struct Session {
    cache: ReconcileCache,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ReconcileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ReconcileCache {
        &mut self.cache
    }

    pub fn compare_files(
        &mut self,
        previous: &Path,
        current: &Path,
        format: InputFormat,
        config: &ComparisonConfig,
        created_at: NaiveDateTime,
    ) -> Result<&ComparisonOutput> {
        let previous_bytes = io_utils::read_input_bytes(previous)?;
        let current_bytes = io_utils::read_input_bytes(current)?;
        let previous_delimiter = io_utils::resolve_input_delimiter(previous, format.delimiter);
        let current_delimiter = io_utils::resolve_input_delimiter(current, format.delimiter);

        let key = CacheKey::new(&previous_bytes, &current_bytes, config).with_format(format!(
            "{}:{}:{}",
            previous_delimiter,
            current_delimiter,
            format.encoding.name()
        ));
        debug!(
            "Input digests: previous {} current {}",
            key.previous_digest, key.current_digest
        );
        let output = self.cache.get_or_compute(key, || {
            let previous_data =
                Dataset::parse_csv(&previous_bytes, previous_delimiter, format.encoding)
                    .with_context(|| format!("Loading previous dataset {previous:?}"))?;
            let current_data =
                Dataset::parse_csv(&current_bytes, current_delimiter, format.encoding)
                    .with_context(|| format!("Loading current dataset {current:?}"))?;
            info!(
                "Loaded {} previous and {} current row(s)",
                previous_data.len(),
                current_data.len()
            );
            run_comparison(previous_data, current_data, config, created_at)
        })?;
        // Cached outputs carry the run time of the comparison that produced them.
        output.reconciliation.table.restamp(created_at);
        Ok(&*output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn created_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    fn config() -> ComparisonConfig {
        ComparisonConfig {
            key_columns: vec!["id".to_string()],
            ..ComparisonConfig::default()
        }
    }

    #[test]
    fn compare_files_caches_until_an_input_changes() {
        let dir = tempdir().expect("temp dir");
        let previous = dir.path().join("previous.csv");
        let current = dir.path().join("current.csv");
        fs::write(&previous, "id,val\n1,a\n2,b\n").expect("write previous");
        fs::write(&current, "id,val\n1,a\n2,c\n").expect("write current");

        let mut session = Session::new();
        let first = session
            .compare_files(&previous, &current, InputFormat::default(), &config(), created_at())
            .expect("first run");
        assert_eq!(first.summary.total_discrepancies, 1);
        session
            .compare_files(&previous, &current, InputFormat::default(), &config(), created_at())
            .expect("second run");
        assert_eq!(session.cache().hits(), 1);

        fs::write(&current, "id,val\n1,a\n2,b\n").expect("rewrite current");
        let third = session
            .compare_files(&previous, &current, InputFormat::default(), &config(), created_at())
            .expect("third run");
        assert!(third.reconciliation.table.is_empty());
        assert_eq!(session.cache().misses(), 2);
    }

    #[test]
    fn cache_hit_carries_the_later_run_time() {
        let dir = tempdir().expect("temp dir");
        let previous = dir.path().join("previous.csv");
        let current = dir.path().join("current.csv");
        fs::write(&previous, "id,val\n1,a\n").expect("write previous");
        fs::write(&current, "id,val\n1,b\n").expect("write current");
        let later = created_at() + chrono::Duration::days(1);

        let mut session = Session::new();
        session
            .compare_files(&previous, &current, InputFormat::default(), &config(), created_at())
            .expect("first run");
        let second = session
            .compare_files(&previous, &current, InputFormat::default(), &config(), later)
            .expect("second run");
        assert_eq!(second.reconciliation.table.records()[0].created_at, later);
        assert_eq!(session.cache().hits(), 1);
    }

    #[test]
    fn tsv_inputs_use_tab_delimiter() {
        let dir = tempdir().expect("temp dir");
        let previous = dir.path().join("previous.tsv");
        let current = dir.path().join("current.tsv");
        fs::write(&previous, "id\tval\n1\ta\n").expect("write previous");
        fs::write(&current, "id\tval\n1\tb\n").expect("write current");

        let mut session = Session::new();
        let output = session
            .compare_files(&previous, &current, InputFormat::default(), &config(), created_at())
            .expect("run");
        let table = &output.reconciliation.table;
        assert_eq!(table.columns(), &["id", "val"]);
        assert_eq!(table.descriptor_text(&table.records()[0]), "val: a != b");
    }

    #[test]
    fn missing_input_reports_path() {
        let dir = tempdir().expect("temp dir");
        let mut session = Session::new();
        let err = session
            .compare_files(
                &dir.path().join("nope.csv"),
                &dir.path().join("also-nope.csv"),
                InputFormat::default(),
                &config(),
                created_at(),
            )
            .expect_err("missing file");
        assert!(format!("{err:#}").contains("nope.csv"));
    }
}
