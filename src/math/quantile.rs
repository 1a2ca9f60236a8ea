//! Weighted quantiles and weighted log-moments.
//!
//! Quantiles use the "first value whose cumulative weight reaches the target"
//! rule on the value-sorted sample. No interpolation is performed, so every
//! returned quantile is an actual sample value.

use crate::domain::WeightedSample;
use crate::error::AppError;

/// Evenly spaced probability levels `(i + 0.5) / m` for `i in 0..m`.
pub fn probability_levels(m: usize) -> Vec<f64> {
    (0..m).map(|i| (i as f64 + 0.5) / m as f64).collect()
}

fn check_sample(sample: &WeightedSample) -> Result<(), AppError> {
    if sample.values.len() != sample.weights.len() {
        return Err(AppError::numerical("Weighted sample has mismatched value/weight lengths."));
    }
    if sample
        .weights
        .iter()
        .any(|w| !(w.is_finite() && *w >= 0.0))
    {
        return Err(AppError::numerical("Weighted sample has a negative or non-finite weight."));
    }
    if sample.values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numerical("Weighted sample has a non-finite value."));
    }
    Ok(())
}

/// Sort the sample by value and return `(values, cumulative weights, total)`.
fn sorted_cumulative(sample: &WeightedSample) -> Result<(Vec<f64>, Vec<f64>, f64), AppError> {
    check_sample(sample)?;

    let mut order: Vec<usize> = (0..sample.len()).collect();
    order.sort_by(|&a, &b| sample.values[a].total_cmp(&sample.values[b]));

    let mut values = Vec::with_capacity(order.len());
    let mut cumulative = Vec::with_capacity(order.len());
    let mut running = 0.0;
    for idx in order {
        running += sample.weights[idx];
        values.push(sample.values[idx]);
        cumulative.push(running);
    }

    if !(running.is_finite() && running > 0.0) {
        return Err(AppError::numerical(format!(
            "Non-positive total weight ({running}) in quantile computation."
        )));
    }
    Ok((values, cumulative, running))
}

/// Weighted quantiles at the given probability levels (each in `[0, 1]`).
pub fn weighted_quantiles_at(sample: &WeightedSample, probs: &[f64]) -> Result<Vec<f64>, AppError> {
    let (values, cumulative, total) = sorted_cumulative(sample)?;
    let last = values.len() - 1;

    let mut out = Vec::with_capacity(probs.len());
    for &p in probs {
        let target = p.clamp(0.0, 1.0) * total;
        // First index whose cumulative weight meets or exceeds the target.
        let idx = cumulative.partition_point(|&c| c < target).min(last);
        out.push(values[idx]);
    }
    Ok(out)
}

/// Weighted quantile series at `m` evenly spaced levels.
pub fn weighted_quantiles(sample: &WeightedSample, m: usize) -> Result<Vec<f64>, AppError> {
    if m == 0 {
        return Err(AppError::config("Quantile level count must be >= 1."));
    }
    weighted_quantiles_at(sample, &probability_levels(m))
}

/// Weighted median (the 0.5 quantile under the same rule).
pub fn weighted_median(sample: &WeightedSample) -> Result<f64, AppError> {
    Ok(weighted_quantiles_at(sample, &[0.5])?[0])
}

/// Weighted mean and population standard deviation of `ln(value)`.
pub fn weighted_log_moments(sample: &WeightedSample) -> Result<(f64, f64), AppError> {
    check_sample(sample)?;
    let mut sw = 0.0;
    let mut sx = 0.0;
    for (&v, &w) in sample.values.iter().zip(sample.weights.iter()) {
        if !(v.is_finite() && v > 0.0) {
            return Err(AppError::numerical(format!(
                "Cannot take log of non-positive sample value {v}."
            )));
        }
        sw += w;
        sx += w * v.ln();
    }
    if !(sw.is_finite() && sw > 0.0) {
        return Err(AppError::numerical("Non-positive total weight in log-moment computation."));
    }
    let mean = sx / sw;

    let mut ss = 0.0;
    for (&v, &w) in sample.values.iter().zip(sample.weights.iter()) {
        let d = v.ln() - mean;
        ss += w * d * d;
    }
    Ok((mean, (ss / sw).max(0.0).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(values: &[f64], weights: &[f64]) -> WeightedSample {
        WeightedSample {
            values: values.to_vec(),
            weights: weights.to_vec(),
        }
    }

    #[test]
    fn levels_are_midpoints() {
        let p = probability_levels(4);
        assert_eq!(p, vec![0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn quantiles_are_ascending_and_from_sample() {
        let s = sample(&[5.0, 1.0, 3.0, 2.0, 4.0], &[1.0; 5]);
        let q = weighted_quantiles(&s, 10).unwrap();
        assert!(q.windows(2).all(|w| w[0] <= w[1]));
        assert!(q.iter().all(|v| s.values.contains(v)));
        assert_eq!(q[0], 1.0);
        assert_eq!(q[9], 5.0);
    }

    #[test]
    fn weights_shift_quantiles() {
        // 90% of the mass sits on 10.0.
        let s = sample(&[1.0, 10.0], &[1.0, 9.0]);
        assert_eq!(weighted_median(&s).unwrap(), 10.0);
        let q = weighted_quantiles_at(&s, &[0.05, 0.1, 0.11]).unwrap();
        assert_eq!(q, vec![1.0, 1.0, 10.0]);
    }

    #[test]
    fn zero_total_weight_is_numerical_error() {
        let s = sample(&[1.0, 2.0], &[0.0, 0.0]);
        let err = weighted_quantiles(&s, 3).unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn log_moments_reject_mixed_sign_weights() {
        let s = sample(&[1.0, 10.0, 100.0], &[2.0, -1.0, 1.0]);
        let err = weighted_log_moments(&s).unwrap_err();
        assert!(err.is_numerical());

        let s = sample(&[1.0, 10.0], &[1.0, f64::NAN]);
        assert!(weighted_log_moments(&s).is_err());
    }

    #[test]
    fn log_moments_of_constant_sample() {
        let s = sample(&[std::f64::consts::E; 3], &[1.0, 2.0, 3.0]);
        let (mean, std) = weighted_log_moments(&s).unwrap();
        assert!((mean - 1.0).abs() < 1e-12);
        assert!(std.abs() < 1e-12);
    }
}
