//! Formatted terminal output.
//!
//! Formatting lives here so the search code stays free of presentation
//! details and output changes stay localized.

use crate::domain::{Bin, CalibConfig, VariantResult};
use crate::search::SearchOutcome;

/// Row counts shown in the summary header.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputStats {
    pub category_rows: usize,
    pub category_rejected: usize,
    pub price_rows: usize,
    pub price_rejected: usize,
}

/// Format the run summary: inputs, search size, baseline, selected variant.
pub fn format_run_summary(outcome: &SearchOutcome, config: &CalibConfig, stats: &InputStats) -> String {
    let mut out = String::new();

    out.push_str("=== calib - budget calibration search ===\n");
    out.push_str(&format!(
        "Groups: income='{}' price='{}' | target year {} | fit years {:?}\n",
        config.income_group, config.price_group, config.target_year, config.fit_years
    ));
    out.push_str(&format!(
        "Rows: categories={} ({} rejected) | prices={} ({} rejected)\n",
        stats.category_rows, stats.category_rejected, stats.price_rows, stats.price_rejected
    ));
    out.push_str(&format!(
        "Variants: {} dispatched | {} evaluated | {} skipped | {} passed guardrails\n",
        outcome.total_tasks,
        outcome.ranked.len(),
        outcome.skipped.len(),
        outcome.ranked.iter().filter(|r| r.guardrails.passed).count()
    ));
    out.push_str(&format!(
        "Baseline best fit: {:.6} | max degradation {:.4}\n",
        outcome.baseline_best_fit, config.max_degradation
    ));

    let s = &outcome.selected;
    out.push_str("\nSelected variant:\n");
    out.push_str(&format!("- {}\n", s.key.label()));
    out.push_str(&format!(
        "- scale={:.6e} exponent={:.6} mu={} sigma={:.6}\n",
        s.fit.scale, s.fit.exponent, s.fit.mu, s.fit.sigma
    ));
    let o = &s.objective;
    out.push_str(&format!(
        "- objective={:.6} (fit={:.6} anchor={:.6} p95={:.6} sigma={:.6} curve={:.6})\n",
        o.total, o.fit, o.anchor, o.p95, o.sigma, o.median_curve
    ));
    if let Some(d) = s.fit_degradation_vs_baseline {
        out.push_str(&format!("- degradation vs baseline: {d:.4}\n"));
    }

    out.push_str("\nMultiples at checkpoints:\n");
    out.push_str(&format!("{:>12} {:>10} {:>10}\n", "income", "median", "p95"));
    for ((income, median), (_, p95)) in s.guardrails.median_multiples.iter().zip(&s.guardrails.p95_multiples) {
        out.push_str(&format!("{income:>12.0} {median:>10.3} {p95:>10.3}\n"));
    }

    out.push_str("\nFit by year:\n");
    out.push_str(&format!(
        "{:>6} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "year", "model_m", "obs_m", "model_s", "obs_s", "distance"
    ));
    for y in &s.year_fits {
        out.push_str(&format!(
            "{:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}\n",
            y.year, y.model_mean_log, y.observed_mean_log, y.model_std_log, y.observed_std_log, y.distance
        ));
    }

    for w in &s.guardrails.warnings {
        out.push_str(&format!("warning: {w}\n"));
    }
    out
}

/// Top-N table of ranked variants.
pub fn format_ranking_table(ranked: &[VariantResult], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>4} {:>4} {:>10} {:>10} {:>8} {:>8}  {}\n",
        "rank", "ok", "objective", "worst_fit", "degr", "exponent", "variant"
    ));
    for (i, r) in ranked.iter().take(top_n).enumerate() {
        let degr = r
            .fit_degradation_vs_baseline
            .map(|d| format!("{d:.4}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:>4} {:>4} {:>10.5} {:>10.5} {:>8} {:>8.4}  {}\n",
            i + 1,
            if r.guardrails.passed { "yes" } else { "no" },
            r.objective.total,
            r.worst_year_fit,
            degr,
            r.fit.exponent,
            r.key.label()
        ));
    }
    out
}

/// Parsed bins with their share of total mass.
pub fn format_bins(bins: &[Bin]) -> String {
    let total: f64 = bins.iter().map(|b| b.mass).sum();
    let mut out = String::new();
    out.push_str(&format!("{:<28} {:<28} {:>12} {:>8}\n", "label", "interval", "mass", "share"));
    for b in bins {
        let share = if total > 0.0 { b.mass / total } else { 0.0 };
        out.push_str(&format!(
            "{:<28} {:<28} {:>12.1} {:>7.2}%\n",
            b.label,
            b.interval.to_string(),
            b.mass,
            share * 100.0
        ));
    }
    out.push_str(&format!("{:<28} {:<28} {:>12.1}\n", "total", "", total));
    out
}
