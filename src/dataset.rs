//! In-memory tables handed to the reconciliation core.
//!
//! A [`Dataset`] is loaded once per comparison and only changes before the
//! comparison starts: type application, column renaming and column dropping.
//! Each column records the [`ColumnType`] its values currently hold.

use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result, anyhow, ensure};
use encoding_rs::Encoding;
use log::debug;
use regex::Regex;

use crate::{
    data::Value,
    io_utils,
    normalize::{infer_type, normalize},
    schema::{ColumnType, TypeAssignment},
};

/// Cell texts read as null, matching what common dataframe tooling treats as
/// missing on import.
pub const PLACEHOLDER_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row together with its column names.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn new(columns: &'a [String], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl Dataset {
    /// Builds a dataset from raw cell text. Values stay untyped strings until
    /// [`Dataset::apply_types`] runs.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        let columns = headers
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        validate_columns(&columns)?;
        let mut rows = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            ensure!(
                record.len() == columns.len(),
                "Row {} has {} field(s) but the header declares {}",
                idx + 1,
                record.len(),
                columns.len()
            );
            rows.push(record.into_iter().map(raw_cell).collect());
        }
        let types = vec![ColumnType::String; columns.len()];
        Ok(Self {
            columns,
            types,
            rows,
        })
    }

    /// Builds a dataset from already-typed values, inferring each column's type.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        validate_columns(&columns)?;
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == columns.len(),
                "Row {} has {} value(s) but the dataset declares {} column(s)",
                idx + 1,
                row.len(),
                columns.len()
            );
        }
        let mut dataset = Self {
            types: vec![ColumnType::String; columns.len()],
            columns,
            rows,
        };
        for idx in 0..dataset.columns.len() {
            let values = dataset.column_values(idx);
            let ty = infer_type(&values);
            dataset.replace_column(idx, ty, normalize(&values, ty).values);
        }
        Ok(dataset)
    }

    pub fn load_csv(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let bytes = io_utils::read_input_bytes(path)?;
        let dataset = Self::parse_csv(&bytes, delimiter, encoding)
            .with_context(|| format!("Building dataset from {path:?}"))?;
        debug!("Loaded {} row(s) from {:?}", dataset.len(), path);
        Ok(dataset)
    }

    /// Parses delimited text with a header row.
    pub fn parse_csv(bytes: &[u8], delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(bytes, delimiter, true);
        let headers = io_utils::reader_headers(&mut reader, encoding).context("Reading headers")?;
        let mut records = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            records.push(io_utils::decode_record(&record, encoding)?);
        }
        Self::from_records(headers, records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|idx| self.types[idx])
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row::new(&self.columns, values))
    }

    pub fn column_values(&self, idx: usize) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or_default())
            .collect()
    }

    /// Casts every column to its declared type, inferring one where the
    /// assignment is silent. Declared columns absent from the dataset are
    /// ignored.
    pub fn apply_types(&mut self, assignment: &TypeAssignment) {
        for idx in 0..self.columns.len() {
            let values = self.column_values(idx);
            let declared = assignment.get(&self.columns[idx]);
            let ty = declared.unwrap_or_else(|| infer_type(&values));
            let normalized = normalize(&values, ty);
            if normalized.coerced > 0 {
                debug!(
                    "Column '{}': {} value(s) could not be read as {} and became null",
                    self.columns[idx], normalized.coerced, ty
                );
            }
            debug!(
                "Column '{}' normalized as {} ({})",
                self.columns[idx],
                ty,
                if declared.is_some() { "declared" } else { "inferred" }
            );
            self.replace_column(idx, ty, normalized.values);
        }
    }

    /// Renames columns using an `old -> new` map. Unknown source names are
    /// ignored; a rename onto an existing different column is rejected.
    pub fn rename_columns(&mut self, renames: &BTreeMap<String, String>) -> Result<()> {
        let mut renamed = self.columns.clone();
        for (from, to) in renames {
            if let Some(idx) = self.column_index(from) {
                renamed[idx] = to.clone();
            }
        }
        validate_columns(&renamed).context("Applying column mapping")?;
        self.columns = renamed;
        Ok(())
    }

    pub fn drop_columns(&mut self, names: &[String]) {
        let drop: HashSet<usize> = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        if drop.is_empty() {
            return;
        }
        let keep = |idx: &usize| !drop.contains(idx);
        self.columns = retain_indices(std::mem::take(&mut self.columns), keep);
        self.types = retain_indices(std::mem::take(&mut self.types), keep);
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| retain_indices(row, keep))
            .collect();
    }

    /// Drops every column whose name matches `pattern`, returning their names.
    pub fn drop_columns_matching(&mut self, pattern: &Regex) -> Vec<String> {
        let matched = self
            .columns
            .iter()
            .filter(|name| pattern.is_match(name))
            .cloned()
            .collect::<Vec<_>>();
        self.drop_columns(&matched);
        matched
    }

    fn replace_column(&mut self, idx: usize, ty: ColumnType, values: Vec<Value>) {
        self.types[idx] = ty;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }
}

fn raw_cell(text: String) -> Value {
    if text.is_empty() || PLACEHOLDER_TOKENS.contains(&text.as_str()) {
        Value::Null
    } else {
        Value::String(text)
    }
}

fn validate_columns(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for name in columns {
        if name.is_empty() {
            return Err(anyhow!("Column names cannot be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(anyhow!("Duplicate column name '{name}'"));
        }
    }
    Ok(())
}

fn retain_indices<T>(items: Vec<T>, keep: impl Fn(&usize) -> bool) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep(idx))
        .map(|(_, item)| item)
        .collect()
}
