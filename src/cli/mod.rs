//! Command-line parsing for the budget calibration search.
//!
//! Argument parsing and command dispatch stay separate from the search and
//! math code: every flag here only overrides a field of `CalibConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Coupling, Shard, YearPolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "calib", version, about = "Guardrailed power-law budget calibration from binned data")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the variant grid search and print the selected calibration.
    Search(SearchArgs),
    /// Parse and print the bins of one category group (no fitting).
    Bins(BinsArgs),
}

/// Options for `calib search`.
#[derive(Debug, Args, Clone)]
pub struct SearchArgs {
    /// Category count CSV (`group,category,region,year,quarter,month,count`).
    #[arg(long, value_name = "CSV")]
    pub categories: PathBuf,

    /// Point price CSV (`price,year,status`).
    #[arg(long, value_name = "CSV")]
    pub prices: PathBuf,

    /// JSON config file; flags below override its fields.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Worker threads (1 = serial).
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub target_year: Option<i32>,

    /// Fit years, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub fit_years: Option<Vec<i32>>,

    /// Tail alphas to search, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub alphas: Option<Vec<f64>>,

    /// Couplings to search, comma separated.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub couplings: Option<Vec<Coupling>>,

    /// Year policies to search, comma separated.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub year_policies: Option<Vec<YearPolicy>>,

    /// Add an `Only(code)` status filter next to `All` (repeatable).
    #[arg(long = "status", value_name = "CODE")]
    pub status: Vec<String>,

    #[arg(long)]
    pub max_degradation: Option<f64>,

    /// Use this baseline best fit instead of the relaxed rerun.
    #[arg(long)]
    pub baseline_fit: Option<f64>,

    /// Evaluate one shard of the grid, as `INDEX/COUNT`.
    #[arg(long, value_parser = parse_shard, value_name = "INDEX/COUNT")]
    pub shard: Option<Shard>,

    /// Show the top-N ranked variants.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export every ranked variant to CSV.
    #[arg(long = "export-results", value_name = "CSV")]
    pub export_results: Option<PathBuf>,

    /// Export the selected variant to JSON.
    #[arg(long = "export-selection", value_name = "JSON")]
    pub export_selection: Option<PathBuf>,

    /// Suppress the progress line on stderr.
    #[arg(long)]
    pub quiet: bool,
}

/// Options for `calib bins`.
#[derive(Debug, Args, Clone)]
pub struct BinsArgs {
    #[arg(long, value_name = "CSV")]
    pub categories: PathBuf,

    #[arg(long)]
    pub group: String,

    #[arg(long)]
    pub year: i32,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long, conflicts_with = "month")]
    pub quarter: Option<u8>,

    #[arg(long)]
    pub month: Option<u8>,
}

/// Parse `INDEX/COUNT`.
pub fn parse_shard(s: &str) -> Result<Shard, String> {
    let (index, count) = s
        .split_once('/')
        .ok_or_else(|| format!("Invalid shard '{s}' (expected INDEX/COUNT)."))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid shard index in '{s}'."))?;
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid shard count in '{s}'."))?;
    if count == 0 || index >= count {
        return Err(format!("Invalid shard '{s}' (need INDEX < COUNT)."));
    }
    Ok(Shard { index, count })
}
