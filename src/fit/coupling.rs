//! Quantile coupling of two independently binned marginals.
//!
//! Without joint data, a pairing rule stands in for the dependence structure.
//! Both quantile series are ascending by construction, so:
//!
//! - comonotonic pairs index-for-index
//! - countermonotonic pairs ascending x with descending y
//! - independent pairs x with y cyclically shifted by `M / 3`, a reproducible
//!   stand-in for independence that never touches an RNG

use crate::domain::{Coupling, PairedQuantileSeries, WeightedSample};
use crate::error::AppError;
use crate::math::weighted_quantiles;

/// Pair two equal-length ascending quantile series under `coupling`.
pub fn couple_series(x: &[f64], y: &[f64], coupling: Coupling) -> Result<PairedQuantileSeries, AppError> {
    if x.len() != y.len() {
        return Err(AppError::numerical(format!(
            "Quantile series length mismatch: {} vs {}.",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(AppError::numerical("Cannot couple empty quantile series."));
    }

    let m = y.len();
    let y_paired: Vec<f64> = match coupling {
        Coupling::Comonotonic => y.to_vec(),
        Coupling::Countermonotonic => y.iter().rev().copied().collect(),
        Coupling::Independent => {
            let shift = m / 3;
            (0..m).map(|i| y[(i + shift) % m]).collect()
        }
    };

    Ok(PairedQuantileSeries {
        x: x.to_vec(),
        y: y_paired,
    })
}

/// Build `m`-level quantile series of both samples and pair them.
pub fn couple_samples(
    x: &WeightedSample,
    y: &WeightedSample,
    m: usize,
    coupling: Coupling,
) -> Result<PairedQuantileSeries, AppError> {
    let xq = weighted_quantiles(x, m)?;
    let yq = weighted_quantiles(y, m)?;
    couple_series(&xq, &yq, coupling)
}
