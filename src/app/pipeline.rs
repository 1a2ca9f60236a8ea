//! Shared search pipeline: load rows → run the search.
//!
//! The CLI handlers only deal with presentation (printing, exports).

use std::path::Path;

use tracing::info;

use crate::domain::CalibConfig;
use crate::error::AppError;
use crate::io::ingest::{load_category_rows, load_price_rows};
use crate::report::InputStats;
use crate::search::{run_search, Progress, SearchOutcome};

/// All computed outputs of a single `calib search` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub outcome: SearchOutcome,
    pub stats: InputStats,
}

/// Load both CSV inputs and run the search.
pub fn run_calibration(
    config: &CalibConfig,
    categories: &Path,
    prices: &Path,
    progress: &mut dyn FnMut(Progress),
) -> Result<RunOutput, AppError> {
    let cats = load_category_rows(categories)?;
    let points = load_price_rows(prices)?;
    info!(
        category_rows = cats.rows.len(),
        price_rows = points.rows.len(),
        "inputs loaded"
    );

    let stats = InputStats {
        category_rows: cats.rows.len(),
        category_rejected: cats.row_errors.len(),
        price_rows: points.rows.len(),
        price_rejected: points.row_errors.len(),
    };

    let outcome = run_search(config, &cats.rows, &points.rows, progress)?;
    Ok(RunOutput { outcome, stats })
}
