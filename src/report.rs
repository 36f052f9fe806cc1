//! Writing the discrepancy table and the summary.
//!
//! The discrepancy CSV carries every table column followed by
//! `Discrepancy_Columns` and `Created_Date`. Nulls become empty cells.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::{
    data::Value,
    io_utils,
    reconcile::DiscrepancyTable,
    summary::Summary,
};

pub const DISCREPANCY_COLUMN: &str = "Discrepancy_Columns";
pub const CREATED_DATE_COLUMN: &str = "Created_Date";
pub const CREATED_DATE_FORMAT: &str = "%m/%d/%Y";
const REPORT_NAME_FORMAT: &str = "Rows_Not_Matching_%Y%m%d_%H%M%S.csv";

/// Default report file name for a run started at `now`.
pub fn report_file_name(now: NaiveDateTime) -> String {
    now.format(REPORT_NAME_FORMAT).to_string()
}

pub fn default_report_path(dir: &Path, now: NaiveDateTime) -> PathBuf {
    dir.join(report_file_name(now))
}

pub fn report_headers(table: &DiscrepancyTable) -> Vec<String> {
    let mut headers = table.columns().to_vec();
    headers.push(DISCREPANCY_COLUMN.to_string());
    headers.push(CREATED_DATE_COLUMN.to_string());
    headers
}

/// Report rows as text, one per record and in table order.
pub fn report_rows(table: &DiscrepancyTable) -> Vec<Vec<String>> {
    table
        .records()
        .iter()
        .map(|record| {
            let mut row = record.values.iter().map(Value::as_display).collect::<Vec<_>>();
            row.push(table.descriptor_text(record));
            row.push(record.created_at.format(CREATED_DATE_FORMAT).to_string());
            row
        })
        .collect()
}

pub fn write_discrepancies<W: Write>(
    writer: &mut csv::Writer<W>,
    table: &DiscrepancyTable,
) -> Result<()> {
    writer
        .write_record(report_headers(table))
        .context("Writing report headers")?;
    for (idx, row) in report_rows(table).into_iter().enumerate() {
        writer
            .write_record(&row)
            .with_context(|| format!("Writing report row {}", idx + 1))?;
    }
    writer.flush().context("Flushing report")?;
    Ok(())
}

/// Writes the report to `path`, or to stdout when `path` is `-`.
pub fn write_report(path: &Path, delimiter: u8, table: &DiscrepancyTable) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(Some(path), delimiter)?;
    write_discrepancies(&mut writer, table).with_context(|| format!("Writing report {path:?}"))
}

pub fn write_summary_json(path: &Path, summary: &Summary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating summary file {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary).context("Serializing summary")?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .with_context(|| format!("Writing summary file {path:?}"))
}

/// The first `limit` report rows, for console preview.
pub fn preview_rows(table: &DiscrepancyTable, limit: usize) -> Vec<Vec<String>> {
    let mut rows = report_rows(table);
    rows.truncate(limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::Dataset,
        reconcile::{ReconcileOptions, reconcile},
        summary::summarize,
    };
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn created_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 4)
            .unwrap()
            .and_hms_opt(15, 4, 5)
            .unwrap()
    }

    fn datasets() -> (Dataset, Dataset) {
        let mut previous =
            Dataset::parse_csv(b"id,val,note\n1,a,\n2,b,x\n3,c,y\n", b',', encoding_rs::UTF_8)
                .expect("previous");
        let mut current = Dataset::parse_csv(
            b"id,val,note\n1,a,\n2,\"b, c\",x\n4,d,z\n",
            b',',
            encoding_rs::UTF_8,
        )
        .expect("current");
        previous.apply_types(&Default::default());
        current.apply_types(&Default::default());
        (previous, current)
    }

    fn table() -> DiscrepancyTable {
        let (previous, current) = datasets();
        let options = ReconcileOptions::new(vec!["id".to_string()], created_at());
        reconcile(&previous, &current, &options).expect("reconcile").table
    }

    #[test]
    fn report_name_uses_run_timestamp() {
        assert_eq!(
            report_file_name(created_at()),
            "Rows_Not_Matching_20240704_150405.csv"
        );
    }

    #[test]
    fn report_csv_appends_descriptor_and_date() {
        let mut writer = io_utils::csv_writer(Vec::new(), b',');
        write_discrepancies(&mut writer, &table()).expect("write");
        let bytes = writer.into_inner().expect("buffer");
        let text = String::from_utf8(bytes).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id,val,note,Discrepancy_Columns,Created_Date");
        assert_eq!(lines[1], "2,b,x,\"val: b != b, c\",07/04/2024");
        assert_eq!(lines[2], "3,c,y,Row is missing from latest upload,07/04/2024");
        assert_eq!(lines[3], "4,d,z,New row in current upload,07/04/2024");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn summary_json_round_trips_counts() {
        let (previous, current) = datasets();
        let table = table();
        let summary = summarize(&previous, &current, &table, &["id".to_string()]).expect("summary");
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("summary.json");
        write_summary_json(&path, &summary).expect("write summary");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(json["total_discrepancies"], 3);
        assert_eq!(json["dropped"], 1);
        assert_eq!(json["added"], 1);
        assert_eq!(json["column_breakdown"][0]["column"], "MISSING_ROW");
    }

    #[test]
    fn preview_is_limited() {
        assert_eq!(preview_rows(&table(), 2).len(), 2);
        assert_eq!(preview_rows(&table(), 10).len(), 3);
    }
}
