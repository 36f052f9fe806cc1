use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info};

use crate::{
    cli::CompareArgs,
    config::{ColumnMapping, ComparisonConfig},
    io_utils, report,
    schema::TypeAssignment,
    session::{ComparisonOutput, InputFormat, Session},
    table,
};

/// Exit status when `--fail-on-discrepancy` is set and rows differ.
pub const DISCREPANCY_EXIT_CODE: u8 = 2;

pub fn execute(args: &CompareArgs) -> Result<ExitCode> {
    let created_at = Local::now().naive_local();
    let config = build_config(args)?;
    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("Saving comparison profile to {path:?}"))?;
        info!("Comparison profile written to {path:?}");
    }
    info!(
        "Comparing {:?} against {:?} on key [{}]",
        args.previous,
        args.current,
        config.key_columns.join(", ")
    );

    let format = InputFormat {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    let mut session = Session::new();
    let output = session.compare_files(
        &args.previous,
        &args.current,
        format,
        &config,
        created_at,
    )?;

    let report_path = match &args.output {
        Some(path) => path.clone(),
        None => {
            let dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            fs::create_dir_all(&dir)
                .with_context(|| format!("Creating output directory {dir:?}"))?;
            report::default_report_path(&dir, created_at)
        }
    };
    let input_delimiter = io_utils::resolve_input_delimiter(&args.previous, args.delimiter);
    let output_delimiter = io_utils::resolve_output_delimiter(
        Some(&report_path),
        args.output_delimiter,
        input_delimiter,
    );
    report::write_report(&report_path, output_delimiter, &output.reconciliation.table)?;

    let to_stdout = io_utils::is_dash(&report_path);
    if to_stdout {
        debug!("Report written to stdout; console summary suppressed");
    } else {
        info!(
            "Wrote {} discrepancy row(s) to {:?}",
            output.reconciliation.table.len(),
            report_path
        );
        print_summary(output, args.preview);
    }

    if let Some(path) = &args.summary_json {
        report::write_summary_json(path, &output.summary)?;
        info!("Summary written to {path:?}");
    }

    if args.fail_on_discrepancy && !output.reconciliation.table.is_empty() {
        Ok(ExitCode::from(DISCREPANCY_EXIT_CODE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Loads the profile, if any, and layers the command-line flags over it.
pub fn build_config(args: &CompareArgs) -> Result<ComparisonConfig> {
    let mut config = match &args.config {
        Some(path) => ComparisonConfig::load(path)
            .with_context(|| format!("Loading comparison profile {path:?}"))?,
        None => ComparisonConfig::default(),
    };

    let keys = args
        .key
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if !keys.is_empty() {
        config.key_columns = keys;
    }

    config
        .column_mapping
        .merge(&ColumnMapping::parse_directives(&args.map)?);
    for column in &args.unmapped {
        config.column_mapping.unmap(column.trim());
    }

    if let Some(path) = &args.previous_types {
        config.previous_types.merge(&load_types(path)?);
    }
    if let Some(path) = &args.current_types {
        config.current_types.merge(&load_types(path)?);
    }
    let shared = TypeAssignment::parse_directives(&args.types)?;
    config.previous_types.merge(&shared);
    config.current_types.merge(&shared);

    config
        .ignore_columns
        .extend(args.ignore_column.iter().map(|c| c.trim().to_string()));
    if let Some(pattern) = &args.ignore_columns_matching {
        config.ignore_columns_matching = Some(pattern.clone());
    }
    config.ignore_pattern()?;
    if let Some(policy) = args.new_rows {
        config.new_rows = policy;
    }
    if let Some(label) = &args.empty_diff_label {
        config.empty_diff_label = label.clone();
    }
    debug!("Effective comparison profile: {config:?}");
    Ok(config)
}

fn load_types(path: &Path) -> Result<TypeAssignment> {
    TypeAssignment::load(path).with_context(|| format!("Loading type assignment {path:?}"))
}

fn print_summary(output: &ComparisonOutput, preview: usize) {
    let summary = &output.summary;
    table::print_table(
        &["metric".to_string(), "value".to_string()],
        &summary.overview_rows(),
    );
    if !summary.column_breakdown.is_empty() {
        println!();
        table::print_table(
            &[
                "column".to_string(),
                "count".to_string(),
                "percent".to_string(),
            ],
            &summary.breakdown_rows(),
        );
    }
    let discrepancies = &output.reconciliation.table;
    if preview > 0 && !discrepancies.is_empty() {
        println!();
        table::print_table(
            &report::report_headers(discrepancies),
            &report::preview_rows(discrepancies, preview),
        );
        if discrepancies.len() > preview {
            println!("... {} more row(s)", discrepancies.len() - preview);
        }
    }
}
