//! Row matching and field-level differences.
//!
//! For a previous-side row the matcher finds the first current-side row with
//! the same key and lists every non-key column whose values disagree. Key
//! columns are only the match criterion; they never show up in a diff since a
//! key match already means they agree.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    data::Value,
    dataset::{Dataset, Row},
    error::{ReconcileError, Side},
    key::{KeySpec, RowKey, build_key},
};

pub const MISSING_ROW_LABEL: &str = "Row is missing from latest upload";
pub const NEW_ROW_LABEL: &str = "New row in current upload";
pub const MISSING_ROW_COLUMN: &str = "MISSING_ROW";
pub const NEW_ROW_COLUMN: &str = "NEW_ROW";

const NULL: &Value = &Value::Null;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnChange {
    pub column: String,
    pub previous: Value,
    pub current: Value,
}

impl fmt::Display for ColumnChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} != {}", self.column, self.previous, self.current)
    }
}

/// Why a row ended up in the discrepancy table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Descriptor {
    Modified(Vec<ColumnChange>),
    Missing,
    New,
}

impl Descriptor {
    /// Text form; an empty change list renders as `empty_label`.
    pub fn render(&self, empty_label: &str) -> String {
        match self {
            Descriptor::Modified(changes) if changes.is_empty() => empty_label.to_string(),
            Descriptor::Modified(changes) => changes.iter().join(", "),
            Descriptor::Missing => MISSING_ROW_LABEL.to_string(),
            Descriptor::New => NEW_ROW_LABEL.to_string(),
        }
    }

    /// Column names this descriptor mentions, with pseudo-columns for the
    /// missing and new sentinels.
    pub fn mentioned_columns(&self) -> Vec<&str> {
        match self {
            Descriptor::Modified(changes) => {
                changes.iter().map(|c| c.column.as_str()).collect()
            }
            Descriptor::Missing => vec![MISSING_ROW_COLUMN],
            Descriptor::New => vec![NEW_ROW_COLUMN],
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Descriptor::Missing)
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Descriptor::New)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(""))
    }
}

/// Single-row form of the matcher: scans `current` in order for the first row
/// whose key columns all equal `prev_row`'s.
pub fn diff_row(
    prev_row: &Row<'_>,
    current: &Dataset,
    key_columns: &[String],
) -> Result<Descriptor, ReconcileError> {
    let prev_key = build_key(prev_row, key_columns, Side::Previous)?;
    let current_key = KeySpec::resolve(current, key_columns, Side::Current)?;
    let matched = current
        .rows()
        .iter()
        .find(|row| current_key.key_for(row) == prev_key);
    let Some(matched) = matched else {
        return Ok(Descriptor::Missing);
    };
    let changes = prev_row
        .columns()
        .iter()
        .zip(prev_row.values())
        .filter(|(name, _)| !key_columns.contains(*name))
        .filter_map(|(name, previous)| {
            let current_value = current
                .column_index(name)
                .and_then(|idx| matched.get(idx))
                .unwrap_or(NULL);
            column_change(name, previous, current_value)
        })
        .collect();
    Ok(Descriptor::Modified(changes))
}

fn column_change(name: &str, previous: &Value, current: &Value) -> Option<ColumnChange> {
    if previous == current {
        None
    } else {
        Some(ColumnChange {
            column: name.to_string(),
            previous: previous.clone(),
            current: current.clone(),
        })
    }
}

#[derive(Debug, Clone)]
struct PlannedColumn {
    name: String,
    previous: usize,
    current: Option<usize>,
}

/// Which previous columns get diffed and where they live on the current side.
#[derive(Debug, Clone)]
pub struct DiffPlan {
    columns: Vec<PlannedColumn>,
}

impl DiffPlan {
    pub fn new(
        previous: &Dataset,
        current: &Dataset,
        previous_key: &KeySpec,
        ignored: &BTreeSet<String>,
    ) -> Self {
        let columns = previous
            .columns()
            .iter()
            .enumerate()
            .filter(|(idx, name)| !previous_key.contains_index(*idx) && !ignored.contains(*name))
            .map(|(idx, name)| PlannedColumn {
                name: name.clone(),
                previous: idx,
                current: current.column_index(name),
            })
            .collect();
        Self { columns }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Key index over the current dataset keeping the first row per key.
#[derive(Debug)]
pub struct RowMatcher<'a> {
    current: &'a Dataset,
    first_by_key: HashMap<RowKey, usize>,
}

impl<'a> RowMatcher<'a> {
    pub fn new(current: &'a Dataset, key: &KeySpec) -> Self {
        let mut first_by_key = HashMap::with_capacity(current.len());
        let mut duplicates = 0usize;
        for (idx, row) in current.rows().iter().enumerate() {
            let row_key = key.key_for(row);
            if first_by_key.contains_key(&row_key) {
                duplicates += 1;
                continue;
            }
            first_by_key.insert(row_key, idx);
        }
        if duplicates > 0 {
            warn!(
                "Current dataset has {duplicates} row(s) with a repeated key; only the first row per key is matched"
            );
        }
        debug!("Indexed {} distinct current key(s)", first_by_key.len());
        Self {
            current,
            first_by_key,
        }
    }

    pub fn first_match(&self, key: &RowKey) -> Option<&'a [Value]> {
        self.first_by_key
            .get(key)
            .and_then(|idx| self.current.rows().get(*idx))
            .map(|row| row.as_slice())
    }

    pub fn diff(&self, prev_row: &[Value], prev_key: &RowKey, plan: &DiffPlan) -> Descriptor {
        let Some(matched) = self.first_match(prev_key) else {
            return Descriptor::Missing;
        };
        let changes = plan
            .columns
            .iter()
            .filter_map(|column| {
                let previous = prev_row.get(column.previous).unwrap_or(NULL);
                let current = column
                    .current
                    .and_then(|idx| matched.get(idx))
                    .unwrap_or(NULL);
                column_change(&column.name, previous, current)
            })
            .collect();
        Descriptor::Modified(changes)
    }
}
