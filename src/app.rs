//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves the run configuration (JSON file + flag overrides)
//! - runs the search pipeline
//! - prints reports and writes optional exports

use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::bins::{aggregate_categories, build_bins, AggregateQuery};
use crate::cli::{BinsArgs, Cli, Command, SearchArgs};
use crate::domain::{CalibConfig, StatusFilter, SubPeriod};
use crate::error::AppError;
use crate::search::Progress;

pub mod pipeline;

/// Entry point for the `calib` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Search(args) => handle_search(args),
        Command::Bins(args) => handle_bins(args),
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A global subscriber may already be installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_search(args: SearchArgs) -> Result<(), AppError> {
    let config = config_from_args(&args)?;

    let quiet = args.quiet;
    let mut progress = |p: Progress| {
        if quiet {
            return;
        }
        let mut err = std::io::stderr();
        let _ = write!(err, "\rprogress {}/{}", p.processed, p.total);
        if p.processed == p.total {
            let _ = writeln!(err);
        }
    };

    let run = pipeline::run_calibration(&config, &args.categories, &args.prices, &mut progress)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.outcome, &config, &run.stats)
    );
    println!(
        "{}",
        crate::report::format_ranking_table(&run.outcome.ranked, args.top)
    );

    if let Some(path) = &args.export_results {
        crate::io::export::write_ranked_csv(path, &run.outcome.ranked)?;
    }
    if let Some(path) = &args.export_selection {
        crate::io::export::write_selection_json(path, &run.outcome, &config)?;
    }

    Ok(())
}

fn handle_bins(args: BinsArgs) -> Result<(), AppError> {
    let rows = crate::io::ingest::load_category_rows(&args.categories)?;

    let sub_period = match (args.quarter, args.month) {
        (Some(q), _) => Some(SubPeriod::Quarter(q)),
        (None, Some(m)) => Some(SubPeriod::Month(m)),
        (None, None) => None,
    };
    let query = AggregateQuery {
        group: args.group.clone(),
        year: args.year,
        sub_period,
        region: args.region.clone(),
    };

    let masses = aggregate_categories(&rows.rows, &query)?;
    let bins = build_bins(&masses)?;
    if bins.is_empty() {
        return Err(AppError::input(format!(
            "No parseable bins for group '{}' in {}.",
            args.group, args.year
        )));
    }

    println!("Group '{}' year {}:", args.group, args.year);
    println!("{}", crate::report::format_bins(&bins));
    Ok(())
}

/// Resolve the run configuration: optional JSON file, then flag overrides.
pub fn config_from_args(args: &SearchArgs) -> Result<CalibConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => crate::io::config::read_config_json(path)?,
        None => CalibConfig::default(),
    };

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(year) = args.target_year {
        config.target_year = year;
    }
    if let Some(years) = &args.fit_years {
        config.fit_years = years.clone();
    }
    if let Some(alphas) = &args.alphas {
        config.search.tail_alphas = alphas.clone();
    }
    if let Some(couplings) = &args.couplings {
        config.search.couplings = couplings.clone();
    }
    if let Some(policies) = &args.year_policies {
        config.search.year_policies = policies.clone();
    }
    if !args.status.is_empty() {
        let mut filters = vec![StatusFilter::All];
        filters.extend(args.status.iter().map(|s| StatusFilter::Only(s.trim().to_string())));
        config.search.status_filters = filters;
    }
    if let Some(d) = args.max_degradation {
        config.max_degradation = d;
    }
    if args.baseline_fit.is_some() {
        config.baseline_best_fit = args.baseline_fit;
    }
    if args.shard.is_some() {
        config.shard = args.shard;
    }

    config.validate()?;
    Ok(config)
}
