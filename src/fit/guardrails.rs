//! Hard realism guardrails for a fitted budget model.
//!
//! Every check runs independently and every failure is collected; nothing
//! short-circuits. Failure strings start with a stable upper-case code so
//! downstream reports can group them:
//!
//! | code              | condition                                                 |
//! |-------------------|-----------------------------------------------------------|
//! | `NON_FINITE`      | a parameter is NaN/inf                                    |
//! | `BUY_MU`          | `|mu| > 1e-12`                                            |
//! | `EXPONENT`        | `exponent > exponent_max`                                 |
//! | `MEDIAN_MULTIPLE` | median multiple at a checkpoint not in `(1, 10)`          |
//! | `P95_MULTIPLE`    | p95 multiple at a checkpoint `>= hard_p95_cap`            |
//! | `MEDIAN_MONOTONE` | median budget not strictly increasing across checkpoints  |
//!
//! `SIGMA_BAND` is a warning only.

use crate::domain::{FitParams, GuardrailConfig, GuardrailOutcome};

/// Standard normal 95th percentile.
pub const Z_95: f64 = 1.6448536269514722;

/// Absolute tolerance for the `mu == 0` convention.
pub const MU_TOLERANCE: f64 = 1e-12;

const MEDIAN_MULTIPLE_MIN: f64 = 1.0;
const MEDIAN_MULTIPLE_MAX: f64 = 10.0;

/// Strict evaluation for selection; relaxed only to build the baseline reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailMode {
    Strict,
    /// Hard failures are reported as warnings and `passed` is forced true.
    Relaxed,
}

/// P95 budget multiple at `income`.
pub fn p95_multiple(params: &FitParams, income: f64) -> f64 {
    params.median_multiple(income) * (Z_95 * params.sigma).exp()
}

/// Evaluate every guardrail for `params`.
pub fn evaluate_guardrails(params: &FitParams, config: &GuardrailConfig, mode: GuardrailMode) -> GuardrailOutcome {
    let mut failures = Vec::new();
    let mut warnings = Vec::new();

    let FitParams {
        scale,
        exponent,
        mu,
        sigma,
    } = *params;

    if !(scale.is_finite() && exponent.is_finite() && mu.is_finite() && sigma.is_finite()) {
        failures.push(format!(
            "NON_FINITE parameters: scale={scale}, exponent={exponent}, mu={mu}, sigma={sigma}"
        ));
    }

    if !(mu.abs() <= MU_TOLERANCE) {
        failures.push(format!("BUY_MU must be 0 (got {mu:e})"));
    }

    if !(exponent <= config.exponent_max) {
        failures.push(format!(
            "EXPONENT {exponent:.6} exceeds max {:.6}",
            config.exponent_max
        ));
    }

    let mut checkpoints = config.income_checkpoints.clone();
    checkpoints.sort_by(f64::total_cmp);

    let mut median_multiples = Vec::with_capacity(checkpoints.len());
    let mut p95_multiples = Vec::with_capacity(checkpoints.len());
    let mut prev_budget: Option<(f64, f64)> = None;

    for &income in &checkpoints {
        let median = params.median_multiple(income);
        let p95 = p95_multiple(params, income);
        median_multiples.push((income, median));
        p95_multiples.push((income, p95));

        if !(median > MEDIAN_MULTIPLE_MIN && median < MEDIAN_MULTIPLE_MAX) {
            failures.push(format!(
                "MEDIAN_MULTIPLE at income {income:.0} is {median:.4}, outside ({MEDIAN_MULTIPLE_MIN}, {MEDIAN_MULTIPLE_MAX})"
            ));
        }
        if !(p95 < config.hard_p95_cap) {
            failures.push(format!(
                "P95_MULTIPLE at income {income:.0} is {p95:.4}, not below hard cap {:.4}",
                config.hard_p95_cap
            ));
        }

        let budget = params.median_budget(income);
        if let Some((prev_income, prev)) = prev_budget {
            if !(budget > prev) {
                failures.push(format!(
                    "MEDIAN_MONOTONE median budget {budget:.2} at income {income:.0} does not exceed {prev:.2} at income {prev_income:.0}"
                ));
            }
        }
        prev_budget = Some((income, budget));
    }

    if !(sigma >= config.sigma_low && sigma <= config.sigma_high) {
        warnings.push(format!(
            "SIGMA_BAND sigma {sigma:.4} outside [{:.4}, {:.4}]",
            config.sigma_low, config.sigma_high
        ));
    }

    let passed = match mode {
        GuardrailMode::Strict => failures.is_empty(),
        GuardrailMode::Relaxed => {
            warnings.extend(failures.drain(..));
            true
        }
    };

    GuardrailOutcome {
        passed,
        hard_failures: failures,
        warnings,
        median_multiples,
        p95_multiples,
    }
}
