//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during calibration
//! - exported to JSON/CSV
//! - compared across runs for determinism checks

use std::fmt;

use serde::{Deserialize, Serialize};

/// Time period of a category row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: Option<u8>,
    pub month: Option<u8>,
}

impl Period {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            quarter: None,
            month: None,
        }
    }
}

/// One administrative count: "`count` records in `category` for `group`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub group: String,
    pub category: String,
    pub region: String,
    pub period: Period,
    pub count: f64,
}

/// One point-level transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub price: f64,
    pub year: Option<i32>,
    pub status_code: String,
}

/// Interval bounds of a bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interval {
    Closed { lower: f64, upper: f64 },
    OpenLower { upper: f64 },
    OpenUpper { lower: f64 },
}

impl Interval {
    /// Sort key: open-lower bins first, then by lower bound (ties by upper bound).
    pub fn sort_key(&self) -> (u8, f64, f64) {
        match *self {
            Interval::OpenLower { upper } => (0, f64::NEG_INFINITY, upper),
            Interval::Closed { lower, upper } => (1, lower, upper),
            Interval::OpenUpper { lower } => (1, lower, f64::INFINITY),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Closed { lower, upper } => write!(f, "[{lower}, {upper}]"),
            Interval::OpenLower { upper } => write!(f, "(-, {upper})"),
            Interval::OpenUpper { lower } => write!(f, "[{lower}, +)"),
        }
    }
}

/// A labeled interval with its observed mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub label: String,
    pub interval: Interval,
    pub mass: f64,
}

/// Weighted point sample produced by bin expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSample {
    pub values: Vec<f64>,
    pub weights: Vec<f64>,
}

impl WeightedSample {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
            weights: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, value: f64, weight: f64) {
        self.values.push(value);
        self.weights.push(weight);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }
}

/// Two equal-length quantile series at matching probability levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedQuantileSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl PairedQuantileSeries {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// How two quantile series are paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    /// Ascending x with ascending y.
    Comonotonic,
    /// Ascending x with descending y.
    Countermonotonic,
    /// Ascending x with y cyclically shifted by a third of the series.
    Independent,
}

impl Coupling {
    pub fn name(self) -> &'static str {
        match self {
            Coupling::Comonotonic => "comonotonic",
            Coupling::Countermonotonic => "countermonotonic",
            Coupling::Independent => "independent",
        }
    }
}

/// Parameters of `budget = scale · income^exponent · exp(mu + sigma·Z)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub scale: f64,
    pub exponent: f64,
    pub mu: f64,
    pub sigma: f64,
}

impl FitParams {
    /// Median budget divided by income at `income`.
    pub fn median_multiple(&self, income: f64) -> f64 {
        self.scale * income.powf(self.exponent - 1.0) * self.mu.exp()
    }

    /// Median budget at `income`.
    pub fn median_budget(&self, income: f64) -> f64 {
        self.scale * income.powf(self.exponent) * self.mu.exp()
    }
}

/// Guardrail verdict for one set of fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    pub passed: bool,
    pub hard_failures: Vec<String>,
    pub warnings: Vec<String>,
    /// `(income, median multiple)` in ascending income order.
    pub median_multiples: Vec<(f64, f64)>,
    /// `(income, p95 multiple)` in ascending income order.
    pub p95_multiples: Vec<(f64, f64)>,
}

/// Weighted objective and its unweighted parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveComponents {
    pub total: f64,
    pub fit: f64,
    pub anchor: f64,
    pub p95: f64,
    pub sigma: f64,
    pub median_curve: f64,
}

/// Point-price status filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    All,
    Only(String),
}

impl StatusFilter {
    pub fn accepts(&self, status_code: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(code) => code.eq_ignore_ascii_case(status_code.trim()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            StatusFilter::All => "all".to_string(),
            StatusFilter::Only(code) => format!("only:{code}"),
        }
    }
}

/// Which years feed the calibration marginals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum YearPolicy {
    /// Marginals and anchor from the target year only.
    TargetYear,
    /// Marginals and anchor pooled over every fit year.
    Pooled,
}

impl YearPolicy {
    pub fn name(self) -> &'static str {
        match self {
            YearPolicy::TargetYear => "target_year",
            YearPolicy::Pooled => "pooled",
        }
    }

    pub fn scope(self, target_year: i32) -> YearScope {
        match self {
            YearPolicy::TargetYear => YearScope::Year(target_year),
            YearPolicy::Pooled => YearScope::Pooled,
        }
    }
}

/// Resolved set of years a marginal or point summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum YearScope {
    Year(i32),
    Pooled,
}

impl fmt::Display for YearScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearScope::Year(y) => write!(f, "{y}"),
            YearScope::Pooled => write!(f, "pooled"),
        }
    }
}

/// Identity of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantKey {
    pub status_filter: StatusFilter,
    pub year_policy: YearPolicy,
    pub alpha: f64,
    pub coupling: Coupling,
    pub profile_id: String,
}

impl VariantKey {
    /// Deterministic textual identity, also the final ranking tie-break.
    pub fn label(&self) -> String {
        format!(
            "status={}|years={}|alpha={:.4}|coupling={}|profile={}",
            self.status_filter.label(),
            self.year_policy.name(),
            self.alpha,
            self.coupling.name(),
            self.profile_id
        )
    }
}

/// Model vs observed log-price moments for one fit year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearFit {
    pub year: i32,
    pub model_mean_log: f64,
    pub model_std_log: f64,
    pub observed_mean_log: f64,
    pub observed_std_log: f64,
    pub distance: f64,
}

/// Everything known about one evaluated variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub key: VariantKey,
    pub fit: FitParams,
    pub guardrails: GuardrailOutcome,
    pub objective: ObjectiveComponents,
    pub year_fits: Vec<YearFit>,
    pub worst_year_fit: f64,
    /// Set by the degradation gate once the baseline is known.
    pub fit_degradation_vs_baseline: Option<f64>,
}

/// A variant that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedVariant {
    pub key: VariantKey,
    pub reason: String,
}
