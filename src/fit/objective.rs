//! Multi-term objective.
//!
//! ```text
//! total = w_fit·fit + w_anchor·anchor + w_p95·p95 + w_sigma·sigma + w_curve·curve
//! ```
//!
//! - `fit`: worst fit-year distance between model-implied and observed
//!   log-price moments
//! - `anchor`: relative error of the median-income price vs the anchor price
//! - `p95`: mean excess of the p95 multiple over the profile's soft cap
//! - `sigma`: relative distance of sigma outside the warning band
//! - `curve`: mean excess of the median multiple over the target curve

use crate::domain::{CurvePoint, FitParams, GuardrailOutcome, ObjectiveComponents, ObjectiveProfile, YearFit};
use crate::error::AppError;

/// Model-implied mean and std of `ln(budget)` for an income marginal with the
/// given log-moments.
pub fn implied_log_moments(params: &FitParams, income_log_mean: f64, income_log_std: f64) -> (f64, f64) {
    let mean = params.scale.ln() + params.mu + params.exponent * income_log_mean;
    let var = params.exponent * params.exponent * income_log_std * income_log_std + params.sigma * params.sigma;
    (mean, var.max(0.0).sqrt())
}

/// Relative error with a floor-protected denominator.
fn relative_error(value: f64, reference: f64, floor: f64) -> f64 {
    (value - reference).abs() / reference.abs().max(floor)
}

/// Normalized distance between model and observed log-price moments.
pub fn moment_distance(model_mean: f64, model_std: f64, obs_mean: f64, obs_std: f64, floor: f64) -> f64 {
    relative_error(model_mean, obs_mean, floor) + relative_error(model_std, obs_std, floor)
}

/// Relative distance of `sigma` outside `[low, high]` (0 inside).
pub fn sigma_band_penalty(sigma: f64, low: f64, high: f64) -> f64 {
    let denom = |bound: f64| if bound > 0.0 { bound } else { 1.0 };
    if sigma < low {
        (low - sigma) / denom(low)
    } else if sigma > high {
        (sigma - high) / denom(high)
    } else {
        0.0
    }
}

/// Mean over the target curve of the relative excess of the median multiple.
pub fn median_curve_penalty(params: &FitParams, curve: &[CurvePoint]) -> f64 {
    if curve.is_empty() {
        return 0.0;
    }
    let sum: f64 = curve
        .iter()
        .map(|p| (params.median_multiple(p.income) - p.max_multiple).max(0.0) / p.max_multiple)
        .sum();
    sum / curve.len() as f64
}

/// Mean over checkpoints of the relative excess of the p95 multiple over `soft_cap`.
pub fn p95_penalty(p95_multiples: &[(f64, f64)], soft_cap: f64) -> f64 {
    if p95_multiples.is_empty() {
        return 0.0;
    }
    let sum: f64 = p95_multiples
        .iter()
        .map(|&(_, m)| (m - soft_cap).max(0.0) / soft_cap)
        .sum();
    sum / p95_multiples.len() as f64
}

/// Everything the scorer reads for one variant.
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveInputs<'a> {
    pub params: &'a FitParams,
    pub guardrails: &'a GuardrailOutcome,
    pub year_fits: &'a [YearFit],
    pub median_income: f64,
    pub anchor_price: f64,
    pub sigma_low: f64,
    pub sigma_high: f64,
    pub median_curve: &'a [CurvePoint],
}

/// Score one variant under `profile`.
pub fn score_objective(inputs: &ObjectiveInputs<'_>, profile: &ObjectiveProfile) -> Result<ObjectiveComponents, AppError> {
    if !(inputs.anchor_price.is_finite() && inputs.anchor_price > 0.0) {
        return Err(AppError::numerical(format!(
            "Anchor price must be positive (got {}).",
            inputs.anchor_price
        )));
    }
    if !(inputs.median_income.is_finite() && inputs.median_income > 0.0) {
        return Err(AppError::numerical("Median income must be positive."));
    }

    let fit = inputs
        .year_fits
        .iter()
        .map(|y| y.distance)
        .fold(0.0_f64, f64::max);

    let p = inputs.params;
    let implied_price = p.scale * inputs.median_income.powf(p.exponent) * p.mu.exp();
    let anchor = (implied_price - inputs.anchor_price).abs() / inputs.anchor_price;

    let p95 = p95_penalty(&inputs.guardrails.p95_multiples, profile.p95_soft_cap);
    let sigma = sigma_band_penalty(p.sigma, inputs.sigma_low, inputs.sigma_high);
    let median_curve = median_curve_penalty(p, inputs.median_curve);

    let total = profile.w_fit * fit
        + profile.w_anchor * anchor
        + profile.w_p95 * p95
        + profile.w_sigma * sigma
        + profile.w_curve * median_curve;

    if !total.is_finite() {
        return Err(AppError::numerical("Objective is not finite."));
    }

    Ok(ObjectiveComponents {
        total,
        fit,
        anchor,
        p95,
        sigma,
        median_curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FitParams {
        FitParams {
            scale: 4.0,
            exponent: 1.0,
            mu: 0.0,
            sigma: 0.4,
        }
    }

    #[test]
    fn sigma_penalty_is_zero_inside_band() {
        assert_eq!(sigma_band_penalty(0.4, 0.25, 0.65), 0.0);
        assert!((sigma_band_penalty(0.13, 0.26, 0.65) - 0.5).abs() < 1e-12);
        assert!((sigma_band_penalty(1.3, 0.25, 0.65) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn curve_penalty_counts_only_excess() {
        // exponent 1 → median multiple is 4 everywhere.
        let curve = [
            CurvePoint {
                income: 10_000.0,
                max_multiple: 5.0,
            },
            CurvePoint {
                income: 90_000.0,
                max_multiple: 2.0,
            },
        ];
        let pen = median_curve_penalty(&params(), &curve);
        assert!((pen - 0.5).abs() < 1e-12);
    }

    #[test]
    fn p95_penalty_is_mean_excess() {
        let m = [(1.0, 12.0), (2.0, 8.0)];
        assert!((p95_penalty(&m, 10.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn total_is_weighted_sum() {
        let p = params();
        let guard = GuardrailOutcome {
            passed: true,
            hard_failures: vec![],
            warnings: vec![],
            median_multiples: vec![(50_000.0, 4.0)],
            p95_multiples: vec![(50_000.0, 12.0)],
        };
        let year_fits = [
            YearFit {
                year: 2023,
                model_mean_log: 0.0,
                model_std_log: 0.0,
                observed_mean_log: 0.0,
                observed_std_log: 0.0,
                distance: 0.2,
            },
            YearFit {
                year: 2024,
                model_mean_log: 0.0,
                model_std_log: 0.0,
                observed_mean_log: 0.0,
                observed_std_log: 0.0,
                distance: 0.3,
            },
        ];
        let inputs = ObjectiveInputs {
            params: &p,
            guardrails: &guard,
            year_fits: &year_fits,
            median_income: 50_000.0,
            anchor_price: 100_000.0,
            sigma_low: 0.25,
            sigma_high: 0.65,
            median_curve: &[],
        };
        let profile = ObjectiveProfile::new("t", [2.0, 1.0, 1.0, 1.0, 1.0], 10.0);
        let c = score_objective(&inputs, &profile).unwrap();
        assert!((c.fit - 0.3).abs() < 1e-12);
        // implied price 200k vs anchor 100k.
        assert!((c.anchor - 1.0).abs() < 1e-12);
        assert!((c.p95 - 0.2).abs() < 1e-12);
        assert_eq!(c.sigma, 0.0);
        assert!((c.total - (0.6 + 1.0 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn implied_moments_add_sigma_in_quadrature() {
        let p = FitParams {
            scale: 1.0,
            exponent: 0.5,
            mu: 0.0,
            sigma: 0.3,
        };
        let (mean, std) = implied_log_moments(&p, 10.0, 0.8);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 0.5).abs() < 1e-12);
    }

    #[test]
    fn moment_distance_uses_floor() {
        let d = moment_distance(1.0, 0.5, 0.0, 0.5, 0.1);
        assert!((d - 10.0).abs() < 1e-12);
    }
}
