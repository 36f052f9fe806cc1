//! Comparison profiles.
//!
//! A [`ComparisonConfig`] gathers everything that shapes one comparison:
//! key columns, column mapping, per-side type assignments, ignore rules and
//! policies. Profiles are YAML files; CLI flags are layered on top of them.
//!
//! ```yaml
//! key_columns: [region, id]
//! column_mapping:
//!   amount: total_amount   # previous name -> current name
//!   legacy_code: null      # unmapped: carried in the report, never compared
//! previous_types:
//!   id: integer
//! current_types:
//!   id: integer
//! ignore_columns_matching: "(?i)(timestamp|_at)$"
//! new_rows: key-set
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    reconcile::{NewRowPolicy, ReconcileOptions},
    schema::TypeAssignment,
};

/// Previous column name → current column name, or `None` when the previous
/// column has no counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: BTreeMap<String, Option<String>>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, previous: impl Into<String>, current: impl Into<String>) {
        self.entries.insert(previous.into(), Some(current.into()));
    }

    pub fn unmap(&mut self, previous: impl Into<String>) {
        self.entries.insert(previous.into(), None);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses `previous=current` directives.
    pub fn parse_directives(directives: &[String]) -> Result<Self> {
        let mut mapping = ColumnMapping::new();
        for directive in directives {
            let (previous, current) = directive
                .split_once('=')
                .map(|(p, c)| (p.trim(), c.trim()))
                .ok_or_else(|| {
                    anyhow!("Column mapping '{directive}' must be previous=current")
                })?;
            if previous.is_empty() || current.is_empty() {
                return Err(anyhow!(
                    "Column mapping '{directive}' needs both a previous and a current name"
                ));
            }
            mapping.map(previous, current);
        }
        Ok(mapping)
    }

    pub fn merge(&mut self, other: &ColumnMapping) {
        for (previous, current) in &other.entries {
            self.entries.insert(previous.clone(), current.clone());
        }
    }

    /// Renames to apply to the current dataset (current name → previous name).
    pub fn current_renames(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(previous, current)| {
                current
                    .as_ref()
                    .filter(|current| *current != previous)
                    .map(|current| (current.clone(), previous.clone()))
            })
            .collect()
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, current)| current.is_none())
            .map(|(previous, _)| previous.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub key_columns: Vec<String>,
    pub column_mapping: ColumnMapping,
    pub previous_types: TypeAssignment,
    pub current_types: TypeAssignment,
    pub ignore_columns: BTreeSet<String>,
    /// Columns whose names match are dropped from both sides before
    /// comparison, e.g. load timestamps that change on every export.
    pub ignore_columns_matching: Option<String>,
    pub new_rows: NewRowPolicy,
    pub empty_diff_label: String,
}

/// Datasets ready for the core, plus the options to run it with.
#[derive(Debug, Clone)]
pub struct PreparedComparison {
    pub previous: Dataset,
    pub current: Dataset,
    pub options: ReconcileOptions,
}

impl ComparisonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening profile {path:?}"))?;
        let reader = BufReader::new(file);
        let config: ComparisonConfig =
            serde_yaml::from_reader(reader).context("Parsing comparison profile YAML")?;
        config.ignore_pattern()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating profile {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing comparison profile YAML")
    }

    pub fn ignore_pattern(&self) -> Result<Option<Regex>> {
        self.ignore_columns_matching
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("Compiling ignore pattern '{pattern}'"))
            })
            .transpose()
    }

    /// Columns left out of matching: explicit ignores plus unmapped columns.
    pub fn ignored_columns(&self) -> BTreeSet<String> {
        let mut ignored = self.ignore_columns.clone();
        ignored.extend(self.column_mapping.unmapped().map(str::to_string));
        ignored
    }

    /// Applies types, mapping and the ignore pattern, in that order. Types are
    /// declared in each side's own column names, so they go first.
    pub fn prepare(
        &self,
        mut previous: Dataset,
        mut current: Dataset,
        created_at: NaiveDateTime,
    ) -> Result<PreparedComparison> {
        previous.apply_types(&self.previous_types);
        current.apply_types(&self.current_types);

        let renames = self.column_mapping.current_renames();
        if !renames.is_empty() {
            debug!("Renaming {} current column(s) to previous names", renames.len());
            current
                .rename_columns(&renames)
                .context("Aligning current columns with previous names")?;
        }

        if let Some(pattern) = self.ignore_pattern()? {
            for (side, dataset) in [("previous", &mut previous), ("current", &mut current)] {
                let candidates = dataset
                    .columns()
                    .iter()
                    .filter(|name| pattern.is_match(name) && !self.key_columns.contains(name))
                    .cloned()
                    .collect::<Vec<_>>();
                if !candidates.is_empty() {
                    info!(
                        "Dropping {} {side} column(s) matching '{}': {}",
                        candidates.len(),
                        pattern.as_str(),
                        candidates.join(", ")
                    );
                    dataset.drop_columns(&candidates);
                }
            }
        }

        let mut options = ReconcileOptions::new(self.key_columns.clone(), created_at);
        options.ignored_columns = self.ignored_columns();
        options.new_rows = self.new_rows;
        options.empty_diff_label = self.empty_diff_label.clone();
        Ok(PreparedComparison {
            previous,
            current,
            options,
        })
    }
}
