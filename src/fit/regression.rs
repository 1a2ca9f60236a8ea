//! Anchored log-log regression.
//!
//! Fits `ln(y) = ln(scale) + exponent · ln(x)` on a paired quantile series by
//! weighted least squares. An optional anchor observation (typically the
//! observed mean log-price placed at the series' mean log-income) is appended
//! with its own weight to pull the line toward an independent reference.
//!
//! `sigma` is the unweighted root-mean-square residual over every regression
//! row, anchor included. `mu` is not estimated: the budget model fixes it at 0.

use crate::domain::{FitParams, PairedQuantileSeries};
use crate::error::AppError;
use crate::math::weighted_line_fit;

/// Variance threshold below which the x-series is considered constant.
const MIN_LOG_X_VARIANCE: f64 = 1e-18;

/// External observation appended to the regression, in log space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorObservation {
    pub log_x: f64,
    pub log_y: f64,
    pub weight: f64,
}

impl AnchorObservation {
    /// Anchor at the mean log-x of `series` with the given mean log-y.
    pub fn at_mean_log_x(series: &PairedQuantileSeries, log_y: f64, weight: f64) -> Result<Self, AppError> {
        let logs = to_logs(&series.x, "x")?;
        let log_x = logs.iter().sum::<f64>() / logs.len() as f64;
        Ok(Self { log_x, log_y, weight })
    }
}

/// Regression output with its residual diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFit {
    pub params: FitParams,
    pub intercept: f64,
    pub residuals: Vec<f64>,
}

fn to_logs(values: &[f64], name: &str) -> Result<Vec<f64>, AppError> {
    if values.is_empty() {
        return Err(AppError::numerical(format!("Empty {name}-series in regression.")));
    }
    values
        .iter()
        .map(|&v| {
            if v.is_finite() && v > 0.0 {
                Ok(v.ln())
            } else {
                Err(AppError::numerical(format!(
                    "Non-positive {name} value {v} cannot enter a log-log regression."
                )))
            }
        })
        .collect()
}

/// Fit the log-log line, optionally pulled toward `anchor`.
pub fn fit_anchored(
    series: &PairedQuantileSeries,
    anchor: Option<AnchorObservation>,
) -> Result<RegressionFit, AppError> {
    if series.x.len() != series.y.len() {
        return Err(AppError::numerical("Paired series have different lengths."));
    }
    let mut lx = to_logs(&series.x, "x")?;
    let mut ly = to_logs(&series.y, "y")?;

    let n = lx.len() as f64;
    let mean = lx.iter().sum::<f64>() / n;
    let var = lx.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    if var <= MIN_LOG_X_VARIANCE {
        return Err(AppError::numerical(
            "Degenerate regression: x-series has zero variance.",
        ));
    }

    let mut w = vec![1.0; lx.len()];
    if let Some(a) = anchor {
        if !(a.weight.is_finite() && a.weight >= 0.0) {
            return Err(AppError::config(format!("Invalid anchor weight {}.", a.weight)));
        }
        if !(a.log_x.is_finite() && a.log_y.is_finite()) {
            return Err(AppError::numerical("Anchor observation is not finite."));
        }
        if a.weight > 0.0 {
            lx.push(a.log_x);
            ly.push(a.log_y);
            w.push(a.weight);
        }
    }

    let (intercept, slope) = weighted_line_fit(&lx, &ly, &w)
        .ok_or_else(|| AppError::numerical("Weighted least squares failed to solve."))?;

    let residuals: Vec<f64> = lx
        .iter()
        .zip(ly.iter())
        .map(|(&x, &y)| y - (intercept + slope * x))
        .collect();
    let sigma = (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt();

    let params = FitParams {
        scale: intercept.exp(),
        exponent: slope,
        mu: 0.0,
        sigma,
    };
    if !(params.scale.is_finite() && params.exponent.is_finite() && params.sigma.is_finite()) {
        return Err(AppError::numerical("Regression produced non-finite parameters."));
    }

    Ok(RegressionFit {
        params,
        intercept,
        residuals,
    })
}
