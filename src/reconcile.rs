//! Set reconciliation of a previous and a current dataset.
//!
//! Two views are combined:
//!
//! - the **full-row mismatch view** keeps every previous row that has no
//!   identical current row over the compared columns, explaining each one as
//!   missing or as a field-level change;
//! - the **new-row view** picks current rows that have no previous
//!   counterpart, by key ([`NewRowPolicy::KeySet`]) or by whole row
//!   ([`NewRowPolicy::FullRow`]).
//!
//! The row key is the de-duplication token between the two: a key already
//! reported by the mismatch view is never reported again as new.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDateTime;
use clap::ValueEnum;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    dataset::Dataset,
    differ::{Descriptor, DiffPlan, RowMatcher},
    error::{ReconcileError, Side},
    key::{KeySpec, RowKey},
};

/// How current-side rows are selected as new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum NewRowPolicy {
    /// Current rows whose key does not exist in the previous dataset.
    #[default]
    KeySet,
    /// Current rows with no identical previous row over the compared columns.
    FullRow,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub key_columns: Vec<String>,
    /// Columns left out of row matching and field diffs. They still appear in
    /// the discrepancy table.
    pub ignored_columns: BTreeSet<String>,
    pub new_rows: NewRowPolicy,
    /// Descriptor text for a mismatched row whose diff came out empty.
    pub empty_diff_label: String,
    pub created_at: NaiveDateTime,
}

impl ReconcileOptions {
    pub fn new(key_columns: Vec<String>, created_at: NaiveDateTime) -> Self {
        Self {
            key_columns,
            ignored_columns: BTreeSet::new(),
            new_rows: NewRowPolicy::default(),
            empty_diff_label: String::new(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscrepancyRecord {
    pub key: RowKey,
    /// One value per table column.
    pub values: Vec<Value>,
    pub descriptor: Descriptor,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscrepancyTable {
    columns: Vec<String>,
    records: Vec<DiscrepancyRecord>,
    empty_diff_label: String,
}

impl DiscrepancyTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[DiscrepancyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn descriptor_text(&self, record: &DiscrepancyRecord) -> String {
        record.descriptor.render(&self.empty_diff_label)
    }

    pub fn value<'a>(&self, record: &'a DiscrepancyRecord, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| record.values.get(idx))
    }

    /// Stamps every record with the run time of the current comparison.
    pub fn restamp(&mut self, created_at: NaiveDateTime) {
        for record in &mut self.records {
            record.created_at = created_at;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub table: DiscrepancyTable,
    pub missing_count: usize,
    pub new_count: usize,
}

pub fn reconcile(
    previous: &Dataset,
    current: &Dataset,
    options: &ReconcileOptions,
) -> Result<Reconciliation, ReconcileError> {
    validate_keys(previous, current, options)?;
    let previous_key = KeySpec::resolve(previous, &options.key_columns, Side::Previous)?;
    let current_key = KeySpec::resolve(current, &options.key_columns, Side::Current)?;

    let compared = compared_columns(previous, current, &options.ignored_columns);
    let previous_keys = previous_key.keys(previous);
    let current_keys = current_key.keys(current);
    warn_on_duplicate_keys(&previous_keys, Side::Previous);

    let layout = TableLayout::new(previous, current);
    let matcher = RowMatcher::new(current, &current_key);
    let plan = DiffPlan::new(previous, current, &previous_key, &options.ignored_columns);

    let current_projections: HashSet<Vec<&Value>> = current
        .rows()
        .iter()
        .map(|row| project(row, compared.iter().map(|(_, idx)| *idx)))
        .collect();

    let mut records = Vec::new();
    let mut mismatch_keys: HashSet<&RowKey> = HashSet::new();
    let mut missing_count = 0usize;
    for (row, row_key) in previous.rows().iter().zip(&previous_keys) {
        let projection = project(row, compared.iter().map(|(idx, _)| *idx));
        if current_projections.contains(&projection) {
            continue;
        }
        let descriptor = matcher.diff(row, row_key, &plan);
        if descriptor.is_missing() {
            missing_count += 1;
        }
        mismatch_keys.insert(row_key);
        records.push(DiscrepancyRecord {
            key: row_key.clone(),
            values: layout.previous_values(row),
            descriptor,
            created_at: options.created_at,
        });
    }
    debug!(
        "{} previous row(s) have no identical current row",
        records.len()
    );

    let new_candidates: Vec<usize> = match options.new_rows {
        NewRowPolicy::KeySet => {
            let known: HashSet<&RowKey> = previous_keys.iter().collect();
            current_keys
                .iter()
                .enumerate()
                .filter(|(_, key)| !known.contains(key))
                .map(|(idx, _)| idx)
                .collect()
        }
        NewRowPolicy::FullRow => {
            let previous_projections: HashSet<Vec<&Value>> = previous
                .rows()
                .iter()
                .map(|row| project(row, compared.iter().map(|(idx, _)| *idx)))
                .collect();
            current
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| {
                    let projection = project(row, compared.iter().map(|(_, idx)| *idx));
                    !previous_projections.contains(&projection)
                })
                .map(|(idx, _)| idx)
                .collect()
        }
    };

    let mut new_count = 0usize;
    for idx in new_candidates {
        let row_key = &current_keys[idx];
        if mismatch_keys.contains(row_key) {
            continue;
        }
        records.push(DiscrepancyRecord {
            key: row_key.clone(),
            values: layout.current_values(&current.rows()[idx]),
            descriptor: Descriptor::New,
            created_at: options.created_at,
        });
        new_count += 1;
    }

    Ok(Reconciliation {
        table: DiscrepancyTable {
            columns: layout.columns,
            records,
            empty_diff_label: options.empty_diff_label.clone(),
        },
        missing_count,
        new_count,
    })
}

/// Fails fast on key selection problems before any row is compared.
pub fn validate_keys(
    previous: &Dataset,
    current: &Dataset,
    options: &ReconcileOptions,
) -> Result<(), ReconcileError> {
    if options.key_columns.is_empty() {
        return Err(ReconcileError::configuration(
            "select at least one key column",
        ));
    }
    let mut seen = HashSet::new();
    for column in &options.key_columns {
        if !seen.insert(column.as_str()) {
            return Err(ReconcileError::configuration(format!(
                "key column '{column}' is selected more than once"
            )));
        }
        if options.ignored_columns.contains(column) {
            return Err(ReconcileError::configuration(format!(
                "key column '{column}' cannot also be ignored"
            )));
        }
        let previous_type = previous.column_type(column).ok_or_else(|| {
            ReconcileError::configuration(format!(
                "key column '{column}' is not present in the previous dataset"
            ))
        })?;
        let current_type = current.column_type(column).ok_or_else(|| {
            ReconcileError::configuration(format!(
                "key column '{column}' is not present in the current dataset"
            ))
        })?;
        if previous_type != current_type {
            return Err(ReconcileError::TypeMismatch {
                column: column.clone(),
                previous: previous_type,
                current: current_type,
            });
        }
    }
    Ok(())
}

/// Previous columns that also exist on the current side, minus ignored ones,
/// as `(previous index, current index)` pairs in previous order.
fn compared_columns(
    previous: &Dataset,
    current: &Dataset,
    ignored: &BTreeSet<String>,
) -> Vec<(usize, usize)> {
    previous
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !ignored.contains(*name))
        .filter_map(|(idx, name)| current.column_index(name).map(|cur| (idx, cur)))
        .collect()
}

fn project(row: &[Value], indices: impl Iterator<Item = usize>) -> Vec<&Value> {
    indices.filter_map(|idx| row.get(idx)).collect()
}

fn warn_on_duplicate_keys(keys: &[RowKey], side: Side) {
    let mut seen = HashSet::with_capacity(keys.len());
    let duplicates = keys.iter().filter(|key| !seen.insert(*key)).count();
    if duplicates > 0 {
        warn!(
            "{side} dataset has {duplicates} row(s) with a repeated key; key uniqueness is assumed"
        );
    }
}

/// Column layout of the discrepancy table: previous columns first, then the
/// columns only the current side has.
struct TableLayout {
    columns: Vec<String>,
    previous_width: usize,
    current_sources: Vec<Option<usize>>,
}

impl TableLayout {
    fn new(previous: &Dataset, current: &Dataset) -> Self {
        let mut columns = previous.columns().to_vec();
        columns.extend(
            current
                .columns()
                .iter()
                .filter(|name| previous.column_index(name).is_none())
                .cloned(),
        );
        let current_sources = columns
            .iter()
            .map(|name| current.column_index(name))
            .collect();
        Self {
            columns,
            previous_width: previous.columns().len(),
            current_sources,
        }
    }

    fn previous_values(&self, row: &[Value]) -> Vec<Value> {
        let mut values = row.to_vec();
        values.resize(self.previous_width, Value::Null);
        values.resize(self.columns.len(), Value::Null);
        values
    }

    fn current_values(&self, row: &[Value]) -> Vec<Value> {
        self.current_sources
            .iter()
            .map(|source| {
                source
                    .and_then(|idx| row.get(idx))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }
}
