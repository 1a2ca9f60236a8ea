//! Variant search orchestration.
//!
//! Stages:
//!
//! 1. Setup: validate the grid, build the read-only `SearchCache`
//! 2. Baseline: evaluate the full grid with relaxed guardrails and keep the
//!    best worst-year fit distance (skipped if configured)
//! 3. Dispatch/Collect: evaluate the (optionally sharded) grid with strict
//!    guardrails on the worker pool
//! 4. Rank, gate on fit degradation, select

pub mod cache;
pub mod evaluate;
pub mod grid;
pub mod pool;
pub mod selection;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{CalibConfig, CategoryRow, PriceRow, SkippedVariant, VariantResult};
use crate::error::AppError;
use crate::fit::GuardrailMode;

pub use cache::{Marginals, PointSummary, SearchCache};
pub use evaluate::{evaluate_variant, EvalContext};
pub use grid::{apply_shard, build_grid, VariantTask};
pub use pool::{run_tasks, Progress};
pub use selection::{apply_degradation, describe_near_misses, fit_degradation, rank_results, select_eligible};

/// Result of a completed search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Every evaluated variant, best first, with degradation set.
    pub ranked: Vec<VariantResult>,
    pub selected: VariantResult,
    pub skipped: Vec<SkippedVariant>,
    pub baseline_best_fit: f64,
    /// Tasks dispatched in the strict pass (after sharding).
    pub total_tasks: usize,
}

/// Evaluate `tasks` and split successes from numerically degenerate variants.
fn evaluate_pass(
    tasks: &[VariantTask],
    ctx: &EvalContext<'_>,
    workers: usize,
    progress: &mut dyn FnMut(Progress),
) -> Result<(Vec<VariantResult>, Vec<SkippedVariant>), AppError> {
    let outcomes = run_tasks(tasks, workers, |task| evaluate_variant(ctx, &task.key), progress)?;

    let mut results = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for (task, outcome) in tasks.iter().zip(outcomes) {
        match outcome {
            Ok(r) => results.push(r),
            Err(err) if err.is_numerical() => skipped.push(SkippedVariant {
                key: task.key.clone(),
                reason: err.message().to_string(),
            }),
            Err(err) => return Err(err),
        }
    }

    if results.is_empty() {
        let first = skipped
            .first()
            .map(|s| format!(" First failure: {}", s.reason))
            .unwrap_or_default();
        return Err(AppError::numerical(format!(
            "All {} variants failed numerically.{first}",
            tasks.len()
        )));
    }
    Ok((results, skipped))
}

/// Run the full calibration search.
pub fn run_search(
    config: &CalibConfig,
    category_rows: &[CategoryRow],
    price_rows: &[PriceRow],
    progress: &mut dyn FnMut(Progress),
) -> Result<SearchOutcome, AppError> {
    config.validate()?;

    let grid = build_grid(&config.search)?;
    let grid_size = grid.len();
    let tasks = apply_shard(grid.clone(), config.shard)?;
    info!(grid = grid_size, tasks = tasks.len(), workers = config.workers, "search grid ready");

    let cache = SearchCache::build(config, category_rows, price_rows)?;

    let baseline_best_fit = match config.baseline_best_fit {
        Some(b) => {
            info!(baseline = b, "using configured baseline fit");
            b
        }
        None => {
            let ctx = EvalContext {
                config,
                cache: &cache,
                mode: GuardrailMode::Relaxed,
            };
            let (relaxed, _) = evaluate_pass(&grid, &ctx, config.workers, &mut |_| {})?;
            let b = selection::best_fit(&relaxed)
                .ok_or_else(|| AppError::numerical("Relaxed baseline produced no results."))?;
            info!(baseline = b, variants = relaxed.len(), "relaxed baseline computed");
            b
        }
    };

    let ctx = EvalContext {
        config,
        cache: &cache,
        mode: GuardrailMode::Strict,
    };
    let (mut ranked, skipped) = evaluate_pass(&tasks, &ctx, config.workers, progress)?;
    if !skipped.is_empty() {
        warn!(skipped = skipped.len(), "some variants were skipped");
    }

    rank_results(&mut ranked);
    apply_degradation(&mut ranked, baseline_best_fit);

    let passed = ranked.iter().filter(|r| r.guardrails.passed).count();
    info!(evaluated = ranked.len(), passed, "strict pass complete");

    let idx = select_eligible(&ranked, config.max_degradation, config.near_miss_count)?;
    let selected = ranked[idx].clone();
    info!(variant = %selected.key.label(), objective = selected.objective.total, "selected variant");

    Ok(SearchOutcome {
        ranked,
        selected,
        skipped,
        baseline_best_fit,
        total_tasks: tasks.len(),
    })
}
