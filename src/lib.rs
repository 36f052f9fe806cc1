pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod dataset;
pub mod differ;
pub mod error;
pub mod io_utils;
pub mod key;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod session;
pub mod summary;
pub mod table;

use std::{env, process::ExitCode, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    dataset::Dataset,
    schema::TypeAssignment,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_reconcile", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compare(args) => compare::execute(&args),
        Commands::Probe(args) => handle_probe(&args).map(|_| ExitCode::SUCCESS),
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let mut dataset = Dataset::load_csv(&args.input, delimiter, encoding)?;
    dataset.apply_types(&TypeAssignment::new());
    let types = TypeAssignment::from_dataset(&dataset);
    match &args.output {
        Some(path) => {
            types
                .save(path)
                .with_context(|| format!("Writing type assignment to {path:?}"))?;
            info!(
                "Inferred types for {} column(s) written to {:?}",
                types.len(),
                path
            );
        }
        None => print!("{}", types.to_yaml_string()?),
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
