use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::{ReconcileError, Side},
    key::{KeySpec, RowKey},
    reconcile::DiscrepancyTable,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnFrequency {
    pub column: String,
    pub count: usize,
    /// Share of all discrepancy records mentioning this column.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub previous_rows: usize,
    pub current_rows: usize,
    /// Distinct previous keys with no current counterpart.
    pub dropped: usize,
    /// Distinct current keys with no previous counterpart.
    pub added: usize,
    pub missing_records: usize,
    pub new_records: usize,
    pub total_discrepancies: usize,
    pub percentage_change: f64,
    pub column_breakdown: Vec<ColumnFrequency>,
}

pub fn summarize(
    previous: &Dataset,
    current: &Dataset,
    table: &DiscrepancyTable,
    key_columns: &[String],
) -> Result<Summary, ReconcileError> {
    let previous_keys = distinct_keys(previous, key_columns, Side::Previous)?;
    let current_keys = distinct_keys(current, key_columns, Side::Current)?;
    let dropped = previous_keys.difference(&current_keys).count();
    let added = current_keys.difference(&previous_keys).count();

    let total = table.len();
    let percentage_change = if previous.is_empty() {
        0.0
    } else {
        total as f64 / previous.len() as f64 * 100.0
    };

    let mut missing_records = 0usize;
    let mut new_records = 0usize;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in table.records() {
        if record.descriptor.is_missing() {
            missing_records += 1;
        } else if record.descriptor.is_new() {
            new_records += 1;
        }
        for column in record.descriptor.mentioned_columns() {
            *counts.entry(column).or_insert(0) += 1;
        }
    }

    Ok(Summary {
        previous_rows: previous.len(),
        current_rows: current.len(),
        dropped,
        added,
        missing_records,
        new_records,
        total_discrepancies: total,
        percentage_change,
        column_breakdown: column_breakdown(counts, total),
    })
}

fn distinct_keys(
    dataset: &Dataset,
    key_columns: &[String],
    side: Side,
) -> Result<HashSet<RowKey>, ReconcileError> {
    let spec = KeySpec::resolve(dataset, key_columns, side)?;
    Ok(spec.keys(dataset).into_iter().collect())
}

fn column_breakdown(counts: BTreeMap<&str, usize>, total: usize) -> Vec<ColumnFrequency> {
    if total == 0 {
        return Vec::new();
    }
    let mut items = counts
        .into_iter()
        .map(|(column, count)| ColumnFrequency {
            column: column.to_string(),
            count,
            percent: count as f64 / total as f64 * 100.0,
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.column.cmp(&b.column)));
    items
}

impl Summary {
    /// Rows for the console summary table.
    pub fn overview_rows(&self) -> Vec<Vec<String>> {
        vec![
            vec!["previous rows".to_string(), self.previous_rows.to_string()],
            vec!["current rows".to_string(), self.current_rows.to_string()],
            vec!["keys dropped".to_string(), self.dropped.to_string()],
            vec!["keys added".to_string(), self.added.to_string()],
            vec!["missing records".to_string(), self.missing_records.to_string()],
            vec!["new records".to_string(), self.new_records.to_string()],
            vec![
                "total discrepancies".to_string(),
                self.total_discrepancies.to_string(),
            ],
            vec![
                "percentage change".to_string(),
                format!("{:.2}%", self.percentage_change),
            ],
        ]
    }

    pub fn breakdown_rows(&self) -> Vec<Vec<String>> {
        self.column_breakdown
            .iter()
            .map(|item| {
                vec![
                    item.column.clone(),
                    item.count.to_string(),
                    format!("{:.2}%", item.percent),
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        differ::{MISSING_ROW_COLUMN, NEW_ROW_COLUMN},
        reconcile::{ReconcileOptions, reconcile},
        schema::{ColumnType, TypeAssignment},
    };
    use chrono::NaiveDate;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        Dataset::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
            .expect("dataset")
    }

    fn run(prev: &Dataset, curr: &Dataset) -> Summary {
        let keys = vec!["id".to_string()];
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let result = reconcile(prev, curr, &ReconcileOptions::new(keys.clone(), created))
            .expect("reconcile");
        summarize(prev, curr, &result.table, &keys).expect("summary")
    }

    #[test]
    fn breakdown_counts_columns_and_sentinels() {
        let prev = table(
            &["id", "a", "b"],
            vec![
                vec![Value::Integer(1), "x".into(), "q".into()],
                vec![Value::Integer(2), "x".into(), "q".into()],
                vec![Value::Integer(3), "x".into(), "q".into()],
                vec![Value::Integer(4), "x".into(), "q".into()],
            ],
        );
        let curr = table(
            &["id", "a", "b"],
            vec![
                vec![Value::Integer(1), "x2".into(), "q2".into()],
                vec![Value::Integer(2), "x2".into(), "q".into()],
                vec![Value::Integer(4), "x".into(), "q".into()],
                vec![Value::Integer(5), "x".into(), "q".into()],
            ],
        );
        let summary = run(&prev, &curr);
        assert_eq!(summary.total_discrepancies, 4);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.missing_records, 1);
        assert_eq!(summary.new_records, 1);
        assert!((summary.percentage_change - 100.0).abs() < f64::EPSILON);

        let breakdown: Vec<(&str, usize)> = summary
            .column_breakdown
            .iter()
            .map(|c| (c.column.as_str(), c.count))
            .collect();
        assert_eq!(
            breakdown,
            vec![("a", 2), (MISSING_ROW_COLUMN, 1), (NEW_ROW_COLUMN, 1), ("b", 1)]
        );
        assert!((summary.column_breakdown[0].percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_previous_has_zero_percentage_change() {
        // An empty column infers as string, so the key type is declared.
        let mut prev = table(&["id", "v"], Vec::new());
        let mut types = TypeAssignment::new();
        types.set("id", ColumnType::Integer);
        prev.apply_types(&types);
        let curr = table(&["id", "v"], vec![vec![Value::Integer(5), "x".into()]]);

        let summary = run(&prev, &curr);
        assert_eq!(summary.percentage_change, 0.0);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.new_records, 1);
    }
}
