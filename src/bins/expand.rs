//! Bin expansion: ordered bins → weighted point sample.
//!
//! - Closed bins are split into `N` equal-width sub-intervals; each midpoint
//!   carries `mass / N`.
//! - Zero-width bins emit one point at the shared bound with the full mass.
//! - The open-lower bin is expanded like a closed bin over `[floor, upper]`.
//! - The open-upper bin uses a deterministic inverse-Pareto transform:
//!
//! ```text
//! x_i = x_min / (1 - u_i)^(1/alpha),   u_i = ((i + 0.5) / N) · max_cdf
//! ```
//!
//!   where `x_min = max(bin lower bound, tail min_threshold)`. Capping `u` at
//!   `max_cdf < 1` keeps every draw finite. Smaller `alpha` means a heavier tail.

use crate::domain::{Bin, Interval, TailConfig, WeightedSample};
use crate::error::AppError;

/// Everything the expander needs for one marginal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpandSpec {
    pub points_per_bin: usize,
    pub open_lower_floor: f64,
    /// Pareto shape of the open-upper bin.
    pub alpha: f64,
    pub tail: TailConfig,
}

impl ExpandSpec {
    fn validate(&self) -> Result<(), AppError> {
        if self.points_per_bin == 0 {
            return Err(AppError::config("points_per_bin must be >= 1."));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(AppError::config(format!(
                "Pareto alpha must be finite and > 0 (got {}).",
                self.alpha
            )));
        }
        if !(self.open_lower_floor.is_finite()) {
            return Err(AppError::config("open_lower_floor must be finite."));
        }
        self.tail.validate("expansion")
    }
}

/// Deterministic Pareto tail points above `x_min`.
pub fn pareto_tail_points(x_min: f64, alpha: f64, max_cdf: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let u = ((i as f64 + 0.5) / n as f64) * max_cdf;
            x_min / (1.0 - u).powf(1.0 / alpha)
        })
        .collect()
}

fn push_uniform(out: &mut WeightedSample, lower: f64, upper: f64, mass: f64, n: usize) {
    let width = upper - lower;
    if width <= 0.0 {
        out.push(upper, mass);
        return;
    }
    let step = width / n as f64;
    let share = mass / n as f64;
    for i in 0..n {
        out.push(lower + (i as f64 + 0.5) * step, share);
    }
}

/// Expand an ordered bin set into a weighted sample.
pub fn expand_bins(bins: &[Bin], spec: &ExpandSpec) -> Result<WeightedSample, AppError> {
    spec.validate()?;
    if bins.is_empty() {
        return Err(AppError::input("No bins survived parsing; nothing to expand."));
    }

    let n = spec.points_per_bin;
    let mut out = WeightedSample::with_capacity(bins.len() * n);

    for bin in bins {
        match bin.interval {
            Interval::Closed { lower, upper } => {
                if lower > upper {
                    return Err(AppError::input(format!(
                        "Invalid bin '{}': lower bound {lower} exceeds upper bound {upper}.",
                        bin.label
                    )));
                }
                push_uniform(&mut out, lower, upper, bin.mass, n);
            }
            Interval::OpenLower { upper } => {
                let lower = spec.open_lower_floor.min(upper);
                push_uniform(&mut out, lower, upper, bin.mass, n);
            }
            Interval::OpenUpper { lower } => {
                let x_min = lower.max(spec.tail.min_threshold);
                if !(x_min.is_finite() && x_min > 0.0) {
                    return Err(AppError::input(format!(
                        "Tail bin '{}' has no positive scale (lower={lower}, threshold={}).",
                        bin.label, spec.tail.min_threshold
                    )));
                }
                let share = bin.mass / n as f64;
                for x in pareto_tail_points(x_min, spec.alpha, spec.tail.max_cdf, n) {
                    out.push(x, share);
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(alpha: f64) -> ExpandSpec {
        ExpandSpec {
            points_per_bin: 9,
            open_lower_floor: 0.0,
            alpha,
            tail: TailConfig {
                min_threshold: 100_000.0,
                max_cdf: 0.99,
            },
        }
    }

    fn bin(label: &str, interval: Interval, mass: f64) -> Bin {
        Bin {
            label: label.to_string(),
            interval,
            mass,
        }
    }

    #[test]
    fn closed_bin_midpoints_share_mass() {
        let bins = [bin(
            "0-90",
            Interval::Closed {
                lower: 0.0,
                upper: 90.0,
            },
            18.0,
        )];
        let s = expand_bins(&bins, &spec(2.0)).unwrap();
        assert_eq!(s.len(), 9);
        assert_eq!(s.values[0], 5.0);
        assert_eq!(s.values[8], 85.0);
        assert!(s.weights.iter().all(|&w| w == 2.0));
        assert!((s.total_weight() - 18.0).abs() < 1e-12);
    }

    #[test]
    fn zero_width_bin_is_single_point() {
        let bins = [bin(
            "42",
            Interval::Closed {
                lower: 42.0,
                upper: 42.0,
            },
            7.0,
        )];
        let s = expand_bins(&bins, &spec(2.0)).unwrap();
        assert_eq!(s.values, vec![42.0]);
        assert_eq!(s.weights, vec![7.0]);
    }

    #[test]
    fn tail_starts_at_larger_of_bound_and_threshold() {
        let bins = [bin("50K+", Interval::OpenUpper { lower: 50_000.0 }, 10.0)];
        let s = expand_bins(&bins, &spec(1.8)).unwrap();
        assert_eq!(s.len(), 9);
        assert!(s.values.iter().all(|&v| v > 100_000.0));
        assert!(s.values.windows(2).all(|w| w[0] < w[1]));
        assert!((s.total_weight() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn lower_alpha_reaches_further() {
        let heavy = pareto_tail_points(100_000.0, 1.2, 0.99, 9);
        let light = pareto_tail_points(100_000.0, 3.0, 0.99, 9);
        assert!(heavy[8] > light[8]);
    }

    #[test]
    fn open_lower_expands_from_floor() {
        let bins = [bin("< 10", Interval::OpenLower { upper: 10.0 }, 5.0)];
        let mut sp = spec(2.0);
        sp.points_per_bin = 5;
        let s = expand_bins(&bins, &sp).unwrap();
        assert_eq!(s.values, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn empty_bins_and_bad_alpha_fail() {
        assert!(expand_bins(&[], &spec(2.0)).is_err());
        let bins = [bin("100K+", Interval::OpenUpper { lower: 1.0 }, 1.0)];
        assert!(expand_bins(&bins, &spec(0.0)).is_err());
    }
}
