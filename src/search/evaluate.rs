//! Evaluation of one variant against the shared caches.

use crate::domain::{CalibConfig, ObjectiveProfile, VariantKey, VariantResult, YearFit};
use crate::error::AppError;
use crate::fit::{
    couple_series, evaluate_guardrails, fit_anchored, implied_log_moments, moment_distance, score_objective,
    AnchorObservation, GuardrailMode, ObjectiveInputs,
};
use crate::search::cache::SearchCache;

/// Shared, read-only inputs of every task in one pass.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub config: &'a CalibConfig,
    pub cache: &'a SearchCache,
    pub mode: GuardrailMode,
}

impl EvalContext<'_> {
    fn profile(&self, id: &str) -> Result<&ObjectiveProfile, AppError> {
        self.config
            .search
            .profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::config(format!("Unknown objective profile '{id}'.")))
    }
}

/// Couple, fit, check and score one variant.
///
/// Pure with respect to `ctx`: the same key always yields the same result.
pub fn evaluate_variant(ctx: &EvalContext<'_>, key: &VariantKey) -> Result<VariantResult, AppError> {
    let config = ctx.config;
    let profile = ctx.profile(&key.profile_id)?;
    let scope = key.year_policy.scope(config.target_year);
    let marginals = ctx.cache.marginals(key.alpha, scope)?;
    let points = ctx.cache.points(&key.status_filter)?;

    let series = couple_series(&marginals.income_quantiles, &marginals.price_quantiles, key.coupling)?;
    let anchor = if config.anchor.weight > 0.0 {
        Some(AnchorObservation::at_mean_log_x(
            &series,
            points.mean_log(scope)?,
            config.anchor.weight,
        )?)
    } else {
        None
    };
    let regression = fit_anchored(&series, anchor)?;
    let params = regression.params;

    let guardrails = evaluate_guardrails(&params, &config.guardrails, ctx.mode);

    let mut year_fits = Vec::with_capacity(config.fit_years.len());
    for &year in &config.fit_years {
        let (income_mean, income_std) = ctx.cache.income_moments(key.alpha, year)?;
        let (observed_mean_log, observed_std_log) = points.year_moments(year)?;
        let (model_mean_log, model_std_log) = implied_log_moments(&params, income_mean, income_std);
        let distance = moment_distance(
            model_mean_log,
            model_std_log,
            observed_mean_log,
            observed_std_log,
            config.objective.fit_floor,
        );
        if !distance.is_finite() {
            return Err(AppError::numerical(format!("Fit distance for year {year} is not finite.")));
        }
        year_fits.push(YearFit {
            year,
            model_mean_log,
            model_std_log,
            observed_mean_log,
            observed_std_log,
            distance,
        });
    }
    let worst_year_fit = year_fits.iter().map(|y| y.distance).fold(0.0_f64, f64::max);

    let anchor_price = match config.anchor.price {
        Some(price) => price,
        None => points.median(scope)?,
    };

    let objective = score_objective(
        &ObjectiveInputs {
            params: &params,
            guardrails: &guardrails,
            year_fits: &year_fits,
            median_income: marginals.median_income,
            anchor_price,
            sigma_low: config.guardrails.sigma_low,
            sigma_high: config.guardrails.sigma_high,
            median_curve: &config.objective.median_curve,
        },
        profile,
    )?;

    Ok(VariantResult {
        key: key.clone(),
        fit: params,
        guardrails,
        objective,
        year_fits,
        worst_year_fit,
        fit_degradation_vs_baseline: None,
    })
}
