//! Tabula CLI - evaluate formulas and rollups over JSON tables

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tabula::prelude::*;
use tabula::tabula_formula::{builtin_names, DEFAULT_MAX_DEPTH};
use tabula::tabula_rollup::calculate;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about = "Formula and rollup evaluation for tabular data")]
struct Cli {
    /// Log engine activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Maximum expression nesting depth
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Disable the parsed-formula cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula against one row
    Eval {
        /// Formula text, e.g. 'prop("Price") * 2'
        formula: String,

        /// JSON file with the table's columns (default: no columns)
        #[arg(short, long)]
        columns: Option<PathBuf>,

        /// JSON file with the row (default: an empty row)
        #[arg(short, long)]
        row: Option<PathBuf>,
    },

    /// Check a formula's syntax without evaluating it
    Validate {
        /// Formula text
        formula: String,
    },

    /// Aggregate a column over a list of related rows
    Rollup {
        /// JSON file with the rollup configuration
        #[arg(long)]
        config: PathBuf,

        /// JSON file with the target column
        #[arg(long)]
        target: PathBuf,

        /// JSON file with the related rows
        #[arg(long)]
        rows: PathBuf,
    },

    /// List the built-in functions
    Functions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine = FormulaEngine::with_options(EngineOptions {
        max_depth: cli.max_depth,
        cache_enabled: !cli.no_cache,
    });

    match cli.command {
        Commands::Eval {
            formula,
            columns,
            row,
        } => eval(&engine, &formula, columns.as_deref(), row.as_deref()),
        Commands::Validate { formula } => validate(&engine, &formula),
        Commands::Rollup {
            config,
            target,
            rows,
        } => rollup(&config, &target, &rows),
        Commands::Functions => {
            for name in builtin_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn eval(
    engine: &FormulaEngine,
    formula: &str,
    columns: Option<&Path>,
    row: Option<&Path>,
) -> Result<()> {
    let columns: Vec<Column> = match columns {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let row = match row {
        Some(path) => read_json(path)?,
        None => Row::new("row"),
    };

    let value = engine
        .evaluate(formula, &row, &columns)
        .with_context(|| format!("Failed to evaluate '{formula}'"))?;
    print_json(&value)
}

fn validate(engine: &FormulaEngine, formula: &str) -> Result<()> {
    let validation = engine.validate(formula);
    print_json(&validation)?;
    if !validation.is_valid {
        bail!("Invalid formula");
    }
    Ok(())
}

fn rollup(config: &Path, target: &Path, rows: &Path) -> Result<()> {
    let config: RollupConfig = read_json(config)?;
    let target: Column = read_json(target)?;
    let rows: Vec<Row> = read_json(rows)?;

    if config.target_column_id != target.id {
        tracing::warn!(
            "Rollup targets column {} but the target file describes {}",
            config.target_column_id,
            target.id
        );
    }

    let result = calculate(&config, &rows, &target);
    print_json(&result)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}
