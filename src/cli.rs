use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::reconcile::NewRowPolicy;

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile two versions of a CSV dataset", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare a previous and a current CSV file and report rows that differ
    Compare(CompareArgs),
    /// Infer column types of a CSV file into a YAML type assignment
    Probe(ProbeArgs),
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Previous (baseline) CSV file; use '-' for stdin
    #[arg(short = 'p', long = "previous")]
    pub previous: PathBuf,
    /// Current (latest) CSV file
    #[arg(short = 'c', long = "current")]
    pub current: PathBuf,
    /// Key columns identifying a row, in order (repeatable or comma separated)
    #[arg(short = 'k', long = "key", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub key: Vec<String>,
    /// YAML comparison profile; command-line flags are layered on top
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Write the effective comparison profile to this YAML file
    #[arg(long = "save-config")]
    pub save_config: Option<PathBuf>,
    /// Column mapping `previous=current` for renamed columns (repeatable)
    #[arg(long = "map", action = clap::ArgAction::Append)]
    pub map: Vec<String>,
    /// Previous column with no current counterpart; reported but never compared
    #[arg(long = "unmapped", action = clap::ArgAction::Append)]
    pub unmapped: Vec<String>,
    /// YAML type assignment for the previous file
    #[arg(long = "previous-types")]
    pub previous_types: Option<PathBuf>,
    /// YAML type assignment for the current file
    #[arg(long = "current-types")]
    pub current_types: Option<PathBuf>,
    /// Type directive `column=type` applied to both files (repeatable)
    #[arg(long = "type", action = clap::ArgAction::Append)]
    pub types: Vec<String>,
    /// Column left out of the comparison (repeatable)
    #[arg(long = "ignore-column", action = clap::ArgAction::Append)]
    pub ignore_column: Vec<String>,
    /// Drop columns whose names match this regular expression before comparing
    #[arg(long = "ignore-columns-matching")]
    pub ignore_columns_matching: Option<String>,
    /// How current rows are selected as new
    #[arg(long = "new-rows", value_enum)]
    pub new_rows: Option<NewRowPolicy>,
    /// Descriptor for mismatched rows with no field-level difference
    #[arg(long = "empty-diff-label")]
    pub empty_diff_label: Option<String>,
    /// Report file path; use '-' for stdout
    #[arg(short = 'o', long = "output", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,
    /// Directory receiving a timestamped report (defaults to the working directory)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Write the summary as JSON to this file
    #[arg(long = "summary-json")]
    pub summary_json: Option<PathBuf>,
    /// Number of discrepancy rows to preview on the console
    #[arg(long, default_value_t = 10)]
    pub preview: usize,
    /// CSV delimiter character for both inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter for the report (defaults to the report extension, then ',')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of both inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Exit with status 2 when any discrepancy is found
    #[arg(long = "fail-on-discrepancy")]
    pub fail_on_discrepancy: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination YAML type assignment (printed to stdout when omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn compare_keys_accept_commas_and_repeats() {
        let cli = Cli::try_parse_from([
            "csv-reconcile",
            "compare",
            "-p",
            "a.csv",
            "-c",
            "b.csv",
            "-k",
            "region,id",
            "--key",
            "line",
            "--new-rows",
            "full-row",
        ])
        .expect("parse");
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.key, vec!["region", "id", "line"]);
        assert_eq!(args.new_rows, Some(NewRowPolicy::FullRow));
        assert_eq!(args.preview, 10);
    }

    #[test]
    fn output_and_output_dir_conflict() {
        let result = Cli::try_parse_from([
            "csv-reconcile",
            "compare",
            "-p",
            "a.csv",
            "-c",
            "b.csv",
            "-o",
            "r.csv",
            "--output-dir",
            "out",
        ]);
        assert!(result.is_err());
    }
}
