//! Ranking, the degradation gate and final selection.
//!
//! Ranking order (ascending):
//! 1. guardrails passed before failed
//! 2. objective total
//! 3. worst-year fit distance
//! 4. variant label (deterministic tie-break)

use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::domain::VariantResult;
use crate::error::{AppError, ErrorKind};

/// Total order used to rank results.
pub fn compare_results(a: &VariantResult, b: &VariantResult) -> Ordering {
    b.guardrails
        .passed
        .cmp(&a.guardrails.passed)
        .then_with(|| a.objective.total.total_cmp(&b.objective.total))
        .then_with(|| a.worst_year_fit.total_cmp(&b.worst_year_fit))
        .then_with(|| a.key.label().cmp(&b.key.label()))
}

pub fn rank_results(results: &mut [VariantResult]) {
    results.sort_by(compare_results);
}

/// `(worst_year_fit − baseline) / baseline`, or 0 when the baseline is not positive.
pub fn fit_degradation(worst_year_fit: f64, baseline_best_fit: f64) -> f64 {
    if baseline_best_fit > 0.0 {
        (worst_year_fit - baseline_best_fit) / baseline_best_fit
    } else {
        0.0
    }
}

pub fn apply_degradation(results: &mut [VariantResult], baseline_best_fit: f64) {
    for r in results.iter_mut() {
        r.fit_degradation_vs_baseline = Some(fit_degradation(r.worst_year_fit, baseline_best_fit));
    }
}

/// Smallest worst-year fit distance among `results`.
pub fn best_fit(results: &[VariantResult]) -> Option<f64> {
    results.iter().map(|r| r.worst_year_fit).reduce(f64::min)
}

fn is_eligible(r: &VariantResult, max_degradation: f64) -> bool {
    r.guardrails.passed && r.fit_degradation_vs_baseline.is_some_and(|d| d <= max_degradation)
}

/// Render the first `limit` ranked results with their failures.
pub fn describe_near_misses(ranked: &[VariantResult], limit: usize) -> String {
    let mut out = String::new();
    for (i, r) in ranked.iter().take(limit).enumerate() {
        let degradation = r
            .fit_degradation_vs_baseline
            .map(|d| format!("{d:.4}"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "  {}. {} objective={:.6} worst_fit={:.6} degradation={degradation}",
            i + 1,
            r.key.label(),
            r.objective.total,
            r.worst_year_fit
        );
        for failure in &r.guardrails.hard_failures {
            let _ = writeln!(out, "       - {failure}");
        }
    }
    out
}

/// Index (into `ranked`) of the first eligible result.
///
/// `ranked` must already be sorted and carry degradations. When nothing is
/// eligible the error lists the best near-misses.
pub fn select_eligible(
    ranked: &[VariantResult],
    max_degradation: f64,
    near_miss_count: usize,
) -> Result<usize, AppError> {
    if let Some(idx) = ranked.iter().position(|r| is_eligible(r, max_degradation)) {
        return Ok(idx);
    }

    let passed = ranked.iter().filter(|r| r.guardrails.passed).count();
    let mut msg = format!(
        "No eligible variant: {passed} of {} passed guardrails, none within max degradation {max_degradation}.",
        ranked.len()
    );
    if !ranked.is_empty() && near_miss_count > 0 {
        msg.push_str("\nNearest misses:\n");
        msg.push_str(describe_near_misses(ranked, near_miss_count).trim_end());
    }
    Err(AppError::new(ErrorKind::NoEligible, msg))
}
