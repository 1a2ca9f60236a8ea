//! Export ranked variants to CSV and the selected variant to JSON.
//!
//! The CSV is meant to be easy to consume in spreadsheets; the JSON carries
//! the full selected result plus the configuration that produced it.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CalibConfig, SkippedVariant, VariantResult};
use crate::error::AppError;
use crate::search::SearchOutcome;

/// Write one row per ranked variant.
pub fn write_ranked_csv(path: &Path, ranked: &[VariantResult]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_ranked(file, ranked)
}

pub fn write_ranked<W: Write>(out: W, ranked: &[VariantResult]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let write_err = |e: csv::Error| AppError::input(format!("Failed to write export CSV: {e}"));

    writer
        .write_record([
            "rank",
            "variant",
            "status_filter",
            "year_policy",
            "alpha",
            "coupling",
            "profile",
            "passed",
            "objective",
            "fit",
            "anchor",
            "p95",
            "sigma_penalty",
            "curve",
            "worst_year_fit",
            "degradation",
            "scale",
            "exponent",
            "mu",
            "sigma",
            "hard_failures",
            "warnings",
        ])
        .map_err(write_err)?;

    for (i, r) in ranked.iter().enumerate() {
        let o = &r.objective;
        writer
            .write_record([
                (i + 1).to_string(),
                r.key.label(),
                r.key.status_filter.label(),
                r.key.year_policy.name().to_string(),
                format!("{}", r.key.alpha),
                r.key.coupling.name().to_string(),
                r.key.profile_id.clone(),
                r.guardrails.passed.to_string(),
                format!("{:.10}", o.total),
                format!("{:.10}", o.fit),
                format!("{:.10}", o.anchor),
                format!("{:.10}", o.p95),
                format!("{:.10}", o.sigma),
                format!("{:.10}", o.median_curve),
                format!("{:.10}", r.worst_year_fit),
                r.fit_degradation_vs_baseline
                    .map(|d| format!("{d:.10}"))
                    .unwrap_or_default(),
                format!("{:.10e}", r.fit.scale),
                format!("{:.10}", r.fit.exponent),
                format!("{:.10}", r.fit.mu),
                format!("{:.10}", r.fit.sigma),
                r.guardrails.hard_failures.join("; "),
                r.guardrails.warnings.join("; "),
            ])
            .map_err(write_err)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// JSON document describing the selected variant.
#[derive(Debug, Serialize)]
pub struct SelectionFile<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub selected: &'a VariantResult,
    pub baseline_best_fit: f64,
    pub total_tasks: usize,
    pub evaluated: usize,
    pub skipped: &'a [SkippedVariant],
    pub config: &'a CalibConfig,
}

/// Write the selected variant, with run metadata, as pretty JSON.
pub fn write_selection_json(path: &Path, outcome: &SearchOutcome, config: &CalibConfig) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create selection JSON '{}': {e}", path.display())))?;

    let doc = SelectionFile {
        tool: "calib",
        generated_at: Utc::now(),
        selected: &outcome.selected,
        baseline_best_fit: outcome.baseline_best_fit,
        total_tasks: outcome.total_tasks,
        evaluated: outcome.ranked.len(),
        skipped: &outcome.skipped,
        config,
    };

    serde_json::to_writer_pretty(&mut file, &doc)
        .map_err(|e| AppError::input(format!("Failed to write selection JSON: {e}")))?;
    writeln!(file).map_err(|e| AppError::input(format!("Failed to write selection JSON: {e}")))?;
    Ok(())
}
