//! Composite row identity.
//!
//! A [`RowKey`] is the tuple of a row's key-column values in the user's key
//! order. Keys compare and hash structurally, so values containing the
//! separator cannot collide; [`RowKey::to_key_string`] escapes values for the
//! same reason when a flat string is needed.

use std::fmt;

use crate::{
    data::Value,
    dataset::{Dataset, Row},
    error::{ReconcileError, Side},
};

pub const KEY_SEPARATOR: &str = "||";
pub const NULL_KEY_TOKEN: &str = "\\N";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(Vec<Value>);

impl RowKey {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    /// Separator-joined form. Backslashes and pipes inside values are escaped
    /// and nulls use a token no escaped value can produce.
    pub fn to_key_string(&self) -> String {
        self.0
            .iter()
            .map(|part| match part {
                Value::Null => NULL_KEY_TOKEN.to_string(),
                other => escape_part(&other.as_display()),
            })
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

fn escape_part(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '|') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Builds the key of a single row by column name.
pub fn build_key(
    row: &Row<'_>,
    key_columns: &[String],
    side: Side,
) -> Result<RowKey, ReconcileError> {
    key_columns
        .iter()
        .map(|column| {
            row.get(column).cloned().ok_or_else(|| ReconcileError::Schema {
                column: column.clone(),
                side,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(RowKey)
}

/// Key columns resolved against one dataset's layout.
#[derive(Debug, Clone)]
pub struct KeySpec {
    indices: Vec<usize>,
}

impl KeySpec {
    pub fn resolve(
        dataset: &Dataset,
        key_columns: &[String],
        side: Side,
    ) -> Result<Self, ReconcileError> {
        let indices = key_columns
            .iter()
            .map(|name| {
                dataset.column_index(name).ok_or_else(|| ReconcileError::Schema {
                    column: name.clone(),
                    side,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { indices })
    }

    pub fn contains_index(&self, idx: usize) -> bool {
        self.indices.contains(&idx)
    }

    pub fn key_for(&self, row: &[Value]) -> RowKey {
        RowKey(
            self.indices
                .iter()
                .map(|idx| row.get(*idx).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Keys of every row, in dataset order.
    pub fn keys(&self, dataset: &Dataset) -> Vec<RowKey> {
        dataset.rows().iter().map(|row| self.key_for(row)).collect()
    }
}
