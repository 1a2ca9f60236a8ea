//! Run configuration.
//!
//! `CalibConfig` is loaded from an optional JSON file (every field defaults) and
//! then overridden by CLI flags. `validate` must pass before any computation
//! starts; the individual sections expose their own `validate` so the
//! components that consume them can re-check in isolation.

use serde::{Deserialize, Serialize};

use crate::domain::{Coupling, StatusFilter, YearPolicy};
use crate::error::AppError;

/// Optional sub-period restriction for category aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubPeriod {
    Quarter(u8),
    Month(u8),
}

/// Tail extrapolation settings for one marginal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailConfig {
    /// Lower bound for the Pareto scale `x_min` (the bin's own lower bound wins if larger).
    pub min_threshold: f64,
    /// Upper cap on the cumulative probability reached by the deterministic draws.
    pub max_cdf: f64,
}

impl TailConfig {
    pub fn validate(&self, name: &str) -> Result<(), AppError> {
        if !(self.min_threshold.is_finite() && self.min_threshold >= 0.0) {
            return Err(AppError::config(format!(
                "Invalid {name} tail min_threshold: {} (must be finite and >= 0).",
                self.min_threshold
            )));
        }
        if !(self.max_cdf.is_finite() && self.max_cdf > 0.0 && self.max_cdf < 1.0) {
            return Err(AppError::config(format!(
                "Invalid {name} tail max_cdf: {} (must be in (0, 1)).",
                self.max_cdf
            )));
        }
        Ok(())
    }
}

/// Bin expansion settings shared by both marginals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub points_per_bin: usize,
    /// Lower edge used when expanding an open-lower bin.
    pub open_lower_floor: f64,
    pub income_tail: TailConfig,
    pub price_tail: TailConfig,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            points_per_bin: 9,
            open_lower_floor: 0.0,
            income_tail: TailConfig {
                min_threshold: 100_000.0,
                max_cdf: 0.99,
            },
            price_tail: TailConfig {
                min_threshold: 250_000.0,
                max_cdf: 0.99,
            },
        }
    }
}

impl ExpansionConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.points_per_bin == 0 {
            return Err(AppError::config("points_per_bin must be >= 1."));
        }
        if !(self.open_lower_floor.is_finite() && self.open_lower_floor >= 0.0) {
            return Err(AppError::config("open_lower_floor must be finite and >= 0."));
        }
        self.income_tail.validate("income")?;
        self.price_tail.validate("price")?;
        Ok(())
    }
}

/// Regression anchor settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Weight of the anchor observation in the regression (0 disables it).
    pub weight: f64,
    /// External anchor price for the objective; falls back to the observed median price.
    pub price: Option<f64>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            weight: 4.0,
            price: None,
        }
    }
}

/// Hard realism constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub hard_p95_cap: f64,
    pub exponent_max: f64,
    pub sigma_low: f64,
    pub sigma_high: f64,
    pub income_checkpoints: Vec<f64>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            hard_p95_cap: 15.0,
            exponent_max: 1.0,
            sigma_low: 0.25,
            sigma_high: 0.65,
            income_checkpoints: vec![25_000.0, 50_000.0, 75_000.0, 100_000.0, 150_000.0],
        }
    }
}

impl GuardrailConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.hard_p95_cap.is_finite() && self.hard_p95_cap > 1.0) {
            return Err(AppError::config(format!(
                "hard_p95_cap must be finite and > 1 (got {}).",
                self.hard_p95_cap
            )));
        }
        if !self.exponent_max.is_finite() {
            return Err(AppError::config("exponent_max must be finite."));
        }
        if !(self.sigma_low.is_finite()
            && self.sigma_high.is_finite()
            && self.sigma_low >= 0.0
            && self.sigma_low <= self.sigma_high)
        {
            return Err(AppError::config(format!(
                "Invalid sigma band [{}, {}].",
                self.sigma_low, self.sigma_high
            )));
        }
        if self.income_checkpoints.is_empty() {
            return Err(AppError::config("income_checkpoints must not be empty."));
        }
        if self
            .income_checkpoints
            .iter()
            .any(|c| !(c.is_finite() && *c > 0.0))
        {
            return Err(AppError::config("income_checkpoints must be finite and > 0."));
        }
        let mut sorted = self.income_checkpoints.clone();
        sorted.sort_by(f64::total_cmp);
        if let Some(pair) = sorted.windows(2).find(|w| w[0] >= w[1]) {
            return Err(AppError::config(format!(
                "income_checkpoints must be distinct (duplicate {}).",
                pair[1]
            )));
        }
        Ok(())
    }
}

/// One point of the median-multiple target curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub income: f64,
    pub max_multiple: f64,
}

/// Variant-independent objective settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveConfig {
    /// Floor for the relative-error denominators of the fit distance.
    pub fit_floor: f64,
    pub median_curve: Vec<CurvePoint>,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        let curve = [
            (25_000.0, 8.0),
            (50_000.0, 6.0),
            (100_000.0, 4.5),
            (150_000.0, 4.0),
        ];
        Self {
            fit_floor: 1e-3,
            median_curve: curve
                .iter()
                .map(|&(income, max_multiple)| CurvePoint {
                    income,
                    max_multiple,
                })
                .collect(),
        }
    }
}

impl ObjectiveConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.fit_floor.is_finite() && self.fit_floor > 0.0) {
            return Err(AppError::config("fit_floor must be finite and > 0."));
        }
        for p in &self.median_curve {
            if !(p.income.is_finite() && p.income > 0.0 && p.max_multiple.is_finite() && p.max_multiple > 0.0) {
                return Err(AppError::config(format!(
                    "Invalid median curve point ({}, {}).",
                    p.income, p.max_multiple
                )));
            }
        }
        Ok(())
    }
}

/// Objective weight profile (one axis of the search grid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveProfile {
    pub id: String,
    pub w_fit: f64,
    pub w_anchor: f64,
    pub w_p95: f64,
    pub w_sigma: f64,
    pub w_curve: f64,
    pub p95_soft_cap: f64,
}

impl ObjectiveProfile {
    pub fn new(id: &str, weights: [f64; 5], p95_soft_cap: f64) -> Self {
        Self {
            id: id.to_string(),
            w_fit: weights[0],
            w_anchor: weights[1],
            w_p95: weights[2],
            w_sigma: weights[3],
            w_curve: weights[4],
            p95_soft_cap,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::config("Objective profile id must not be empty."));
        }
        let weights = [self.w_fit, self.w_anchor, self.w_p95, self.w_sigma, self.w_curve];
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(AppError::config(format!(
                "Objective profile '{}' has a negative or non-finite weight.",
                self.id
            )));
        }
        if !(self.p95_soft_cap.is_finite() && self.p95_soft_cap > 0.0) {
            return Err(AppError::config(format!(
                "Objective profile '{}' p95_soft_cap must be finite and > 0.",
                self.id
            )));
        }
        Ok(())
    }
}

/// Axes of the variant grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub status_filters: Vec<StatusFilter>,
    pub year_policies: Vec<YearPolicy>,
    pub tail_alphas: Vec<f64>,
    pub couplings: Vec<Coupling>,
    pub profiles: Vec<ObjectiveProfile>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            status_filters: vec![StatusFilter::All],
            year_policies: vec![YearPolicy::TargetYear, YearPolicy::Pooled],
            tail_alphas: vec![1.6, 1.8, 2.2, 2.6],
            couplings: vec![Coupling::Comonotonic, Coupling::Independent, Coupling::Countermonotonic],
            profiles: vec![
                ObjectiveProfile::new("balanced", [1.0, 1.0, 1.0, 0.5, 1.0], 10.0),
                ObjectiveProfile::new("fit_first", [3.0, 0.5, 0.5, 0.25, 0.5], 10.0),
                ObjectiveProfile::new("realism", [0.5, 1.0, 2.0, 1.0, 2.0], 8.0),
            ],
        }
    }
}

/// Restrict the grid to tasks whose index satisfies `i % count == index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub index: usize,
    pub count: usize,
}

/// Full configuration of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibConfig {
    /// Category group holding the income bands.
    pub income_group: String,
    /// Category group holding the property-value bands.
    pub price_group: String,
    pub target_year: i32,
    /// Years the fit distance is evaluated on (and pooled over).
    pub fit_years: Vec<i32>,
    pub sub_period: Option<SubPeriod>,
    pub region: Option<String>,
    pub expansion: ExpansionConfig,
    /// Number of probability levels M in the quantile series.
    pub quantile_levels: usize,
    pub anchor: AnchorConfig,
    pub guardrails: GuardrailConfig,
    pub objective: ObjectiveConfig,
    pub search: SearchSpace,
    pub workers: usize,
    /// Maximum allowed relative fit degradation vs the relaxed baseline.
    pub max_degradation: f64,
    /// Skip the relaxed baseline search and use this value instead.
    pub baseline_best_fit: Option<f64>,
    pub shard: Option<Shard>,
    /// How many near-misses to report when nothing is eligible.
    pub near_miss_count: usize,
}

impl Default for CalibConfig {
    fn default() -> Self {
        Self {
            income_group: "income".to_string(),
            price_group: "price".to_string(),
            target_year: 2024,
            fit_years: vec![2022, 2023, 2024],
            sub_period: None,
            region: None,
            expansion: ExpansionConfig::default(),
            quantile_levels: 99,
            anchor: AnchorConfig::default(),
            guardrails: GuardrailConfig::default(),
            objective: ObjectiveConfig::default(),
            search: SearchSpace::default(),
            workers: 1,
            max_degradation: 0.25,
            baseline_best_fit: None,
            shard: None,
            near_miss_count: 5,
        }
    }
}

impl CalibConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.income_group.trim().is_empty() || self.price_group.trim().is_empty() {
            return Err(AppError::config("income_group and price_group must be set."));
        }
        if self.fit_years.is_empty() {
            return Err(AppError::config("fit_years must not be empty."));
        }
        if let Some(sub) = self.sub_period {
            let ok = match sub {
                SubPeriod::Quarter(q) => (1..=4).contains(&q),
                SubPeriod::Month(m) => (1..=12).contains(&m),
            };
            if !ok {
                return Err(AppError::config(format!("Invalid sub_period {sub:?}.")));
            }
        }
        self.expansion.validate()?;
        if self.quantile_levels < 2 {
            return Err(AppError::config("quantile_levels must be >= 2."));
        }
        if !(self.anchor.weight.is_finite() && self.anchor.weight >= 0.0) {
            return Err(AppError::config("anchor weight must be finite and >= 0."));
        }
        if let Some(price) = self.anchor.price {
            if !(price.is_finite() && price > 0.0) {
                return Err(AppError::config("anchor price must be finite and > 0."));
            }
        }
        self.guardrails.validate()?;
        self.objective.validate()?;
        for profile in &self.search.profiles {
            profile.validate()?;
        }
        if self.workers == 0 {
            return Err(AppError::config("workers must be >= 1."));
        }
        if !(self.max_degradation.is_finite() && self.max_degradation >= 0.0) {
            return Err(AppError::config("max_degradation must be finite and >= 0."));
        }
        if let Some(b) = self.baseline_best_fit {
            if !b.is_finite() {
                return Err(AppError::config("baseline_best_fit must be finite."));
            }
        }
        if let Some(shard) = self.shard {
            if shard.count == 0 || shard.index >= shard.count {
                return Err(AppError::config(format!(
                    "Invalid shard {}/{} (need index < count, count >= 1).",
                    shard.index, shard.count
                )));
            }
        }
        Ok(())
    }
}
