//! Column types and per-side type assignments.
//!
//! A [`TypeAssignment`] declares the semantic [`ColumnType`] of each column of
//! one dataset. Previous and current datasets each carry their own assignment,
//! expressed in that side's column names, since the two exports may disagree
//! until they are reconciled. Assignments persist as YAML maps of
//! `column: type`, which is also what `probe` writes.

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    DateTime,
    Boolean,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::DateTime => "datetime",
            ColumnType::Boolean => "boolean",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "integer", "float", "datetime", "boolean"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "str" | "text" => Ok(ColumnType::String),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" | "number" => Ok(ColumnType::Float),
            "datetime" | "date-time" | "timestamp" | "date" => Ok(ColumnType::DateTime),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// Declared column types for one side of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeAssignment {
    columns: BTreeMap<String, ColumnType>,
}

impl TypeAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    pub fn set(&mut self, column: impl Into<String>, ty: ColumnType) {
        self.columns.insert(column.into(), ty);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Overlays `other` on top of `self`; entries in `other` win.
    pub fn merge(&mut self, other: &TypeAssignment) {
        for (name, ty) in other.iter() {
            self.set(name, ty);
        }
    }

    /// Snapshot of the types a dataset currently holds.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut assignment = TypeAssignment::new();
        for (name, ty) in dataset.columns().iter().zip(dataset.types()) {
            assignment.set(name.clone(), *ty);
        }
        assignment
    }

    /// Parses `column=type` directives such as `amount=float`.
    pub fn parse_directives(directives: &[String]) -> Result<Self> {
        let mut assignment = TypeAssignment::new();
        for directive in directives {
            let (column, ty) = directive
                .split_once('=')
                .ok_or_else(|| anyhow!("Type directive '{directive}' must be column=type"))?;
            let column = column.trim();
            if column.is_empty() {
                return Err(anyhow!("Type directive '{directive}' is missing a column name"));
            }
            let ty = ColumnType::from_str(ty)
                .with_context(|| format!("Parsing type directive '{directive}'"))?;
            assignment.set(column, ty);
        }
        Ok(assignment)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening type file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing type assignment YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating type file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing type assignment YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing type assignment to YAML string")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_parses_aliases() {
        assert_eq!(ColumnType::from_str("INT").unwrap(), ColumnType::Integer);
        assert_eq!(ColumnType::from_str(" double ").unwrap(), ColumnType::Float);
        assert_eq!(
            ColumnType::from_str("timestamp").unwrap(),
            ColumnType::DateTime
        );
        assert!(ColumnType::from_str("decimal").is_err());
    }

    #[test]
    fn type_assignment_round_trips_through_yaml() {
        let mut assignment = TypeAssignment::new();
        assignment.set("id", ColumnType::Integer);
        assignment.set("seen_at", ColumnType::DateTime);
        let yaml = assignment.to_yaml_string().expect("yaml");
        assert!(yaml.contains("id: integer"));
        let parsed: TypeAssignment = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(parsed, assignment);
    }

    #[test]
    fn parse_directives_rejects_malformed_entries() {
        let parsed =
            TypeAssignment::parse_directives(&["amount=float".to_string()]).expect("directive");
        assert_eq!(parsed.get("amount"), Some(ColumnType::Float));

        let err = TypeAssignment::parse_directives(&["amount".to_string()])
            .expect_err("missing '=' should fail");
        assert!(err.to_string().contains("column=type"));

        let err = TypeAssignment::parse_directives(&["amount=money".to_string()])
            .expect_err("unknown type should fail");
        assert!(err.chain().any(|cause| cause.to_string().contains("money")));
    }

    #[test]
    fn merge_prefers_overlay_entries() {
        let mut base = TypeAssignment::new();
        base.set("id", ColumnType::String);
        base.set("qty", ColumnType::Integer);
        let mut overlay = TypeAssignment::new();
        overlay.set("id", ColumnType::Integer);
        base.merge(&overlay);
        assert_eq!(base.get("id"), Some(ColumnType::Integer));
        assert_eq!(base.get("qty"), Some(ColumnType::Integer));
        assert_eq!(base.len(), 2);
    }
}
