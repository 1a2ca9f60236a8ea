//! Read-only lookup tables built once before dispatch.
//!
//! Category aggregation and bin parsing depend only on the year scope, bin
//! expansion additionally on the tail alpha, and point-price summaries only on
//! the status filter. Workers borrow the finished cache immutably.
//!
//! A numerical failure while preparing one entry is stored in place of the
//! entry, so only the variants that depend on it are skipped. Input and data
//! errors abort the build.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::bins::{aggregate_categories, aggregate_years, build_bins, expand_bins, AggregateQuery, ExpandSpec};
use crate::domain::{Bin, CalibConfig, CategoryRow, PriceRow, StatusFilter, TailConfig, WeightedSample, YearScope};
use crate::error::AppError;
use crate::math::{weighted_log_moments, weighted_median, weighted_quantiles};

/// Quantile series and summary statistics of both marginals for one
/// `(alpha, scope)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Marginals {
    pub income_quantiles: Vec<f64>,
    pub price_quantiles: Vec<f64>,
    pub median_income: f64,
}

/// Observed point-price statistics for one status filter.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSummary {
    /// Fit year → (mean, std) of `ln(price)`.
    pub year_moments: BTreeMap<i32, (f64, f64)>,
    pub scope_mean_log: BTreeMap<YearScope, f64>,
    pub scope_median: BTreeMap<YearScope, f64>,
    pub rows_used: usize,
}

impl PointSummary {
    pub fn year_moments(&self, year: i32) -> Result<(f64, f64), AppError> {
        self.year_moments
            .get(&year)
            .copied()
            .ok_or_else(|| AppError::insufficient(format!("No observed price moments for year {year}.")))
    }

    pub fn mean_log(&self, scope: YearScope) -> Result<f64, AppError> {
        self.scope_mean_log
            .get(&scope)
            .copied()
            .ok_or_else(|| AppError::insufficient(format!("No observed prices for scope {scope}.")))
    }

    pub fn median(&self, scope: YearScope) -> Result<f64, AppError> {
        self.scope_median
            .get(&scope)
            .copied()
            .ok_or_else(|| AppError::insufficient(format!("No observed prices for scope {scope}.")))
    }
}

type Cached<T> = Result<T, AppError>;

/// Everything a variant evaluation reads.
#[derive(Debug, Clone)]
pub struct SearchCache {
    marginals: BTreeMap<(u64, YearScope), Cached<Marginals>>,
    income_moments: BTreeMap<(u64, i32), Cached<(f64, f64)>>,
    points: BTreeMap<String, PointSummary>,
}

/// Keep numerical failures as cache entries; propagate everything else.
fn soften<T>(result: Result<T, AppError>, what: impl FnOnce() -> String) -> Result<Cached<T>, AppError> {
    match result {
        Ok(v) => Ok(Ok(v)),
        Err(err) if err.is_numerical() => {
            warn!(entry = %what(), error = %err, "cache entry failed; dependent variants will be skipped");
            Ok(Err(err))
        }
        Err(err) => Err(err),
    }
}

fn expand(bins: &[Bin], config: &CalibConfig, alpha: f64, tail: TailConfig) -> Result<WeightedSample, AppError> {
    let spec = ExpandSpec {
        points_per_bin: config.expansion.points_per_bin,
        open_lower_floor: config.expansion.open_lower_floor,
        alpha,
        tail,
    };
    expand_bins(bins, &spec)
}

fn base_query(config: &CalibConfig, group: &str) -> AggregateQuery {
    AggregateQuery {
        group: group.to_string(),
        year: config.target_year,
        sub_period: config.sub_period,
        region: config.region.clone(),
    }
}

fn scope_bins(
    rows: &[CategoryRow],
    config: &CalibConfig,
    group: &str,
    scope: YearScope,
) -> Result<Vec<Bin>, AppError> {
    let base = base_query(config, group);
    let masses = match scope {
        YearScope::Year(year) => aggregate_categories(rows, &AggregateQuery { year, ..base })?,
        YearScope::Pooled => aggregate_years(rows, &base, &config.fit_years)?,
    };
    let bins = build_bins(&masses)?;
    if bins.is_empty() {
        return Err(AppError::input(format!(
            "Group '{group}' has no usable bins for scope {scope}."
        )));
    }
    debug!(group, %scope, bins = bins.len(), "parsed bins");
    Ok(bins)
}

fn build_marginals(
    income_bins: &[Bin],
    price_bins: &[Bin],
    config: &CalibConfig,
    alpha: f64,
) -> Result<Marginals, AppError> {
    let income = expand(income_bins, config, alpha, config.expansion.income_tail)?;
    let price = expand(price_bins, config, alpha, config.expansion.price_tail)?;
    Ok(Marginals {
        income_quantiles: weighted_quantiles(&income, config.quantile_levels)?,
        price_quantiles: weighted_quantiles(&price, config.quantile_levels)?,
        median_income: weighted_median(&income)?,
    })
}

fn unit_sample(prices: &[f64]) -> WeightedSample {
    let mut sample = WeightedSample::with_capacity(prices.len());
    for &p in prices {
        sample.push(p, 1.0);
    }
    sample
}

fn summarize_points(
    rows: &[PriceRow],
    filter: &StatusFilter,
    config: &CalibConfig,
    scopes: &BTreeSet<YearScope>,
) -> Result<PointSummary, AppError> {
    let usable: Vec<&PriceRow> = rows
        .iter()
        .filter(|r| r.price.is_finite() && r.price > 0.0 && filter.accepts(&r.status_code))
        .collect();
    if usable.is_empty() {
        return Err(AppError::insufficient(format!(
            "No usable price rows for status filter '{}'.",
            filter.label()
        )));
    }

    let prices_in = |years: &[i32]| -> Vec<f64> {
        usable
            .iter()
            .filter(|r| r.year.is_some_and(|y| years.contains(&y)))
            .map(|r| r.price)
            .collect()
    };

    let mut year_moments = BTreeMap::new();
    for &year in &config.fit_years {
        let prices = prices_in(&[year]);
        if prices.is_empty() {
            return Err(AppError::insufficient(format!(
                "No price rows for fit year {year} under status filter '{}'.",
                filter.label()
            )));
        }
        year_moments.insert(year, weighted_log_moments(&unit_sample(&prices))?);
    }

    let mut scope_mean_log = BTreeMap::new();
    let mut scope_median = BTreeMap::new();
    for &scope in scopes {
        let prices = match scope {
            YearScope::Year(y) => prices_in(&[y]),
            YearScope::Pooled => prices_in(&config.fit_years),
        };
        if prices.is_empty() {
            return Err(AppError::insufficient(format!(
                "No price rows for scope {scope} under status filter '{}'.",
                filter.label()
            )));
        }
        let sample = unit_sample(&prices);
        scope_mean_log.insert(scope, weighted_log_moments(&sample)?.0);
        scope_median.insert(scope, weighted_median(&sample)?);
    }

    Ok(PointSummary {
        year_moments,
        scope_mean_log,
        scope_median,
        rows_used: usable.len(),
    })
}

impl SearchCache {
    /// Populate every table the grid in `config.search` can ask for.
    pub fn build(config: &CalibConfig, category_rows: &[CategoryRow], price_rows: &[PriceRow]) -> Result<Self, AppError> {
        let scopes: BTreeSet<YearScope> = config
            .search
            .year_policies
            .iter()
            .map(|p| p.scope(config.target_year))
            .collect();

        let mut marginals = BTreeMap::new();
        for &scope in &scopes {
            let income_bins = scope_bins(category_rows, config, &config.income_group, scope)?;
            let price_bins = scope_bins(category_rows, config, &config.price_group, scope)?;
            for &alpha in &config.search.tail_alphas {
                let entry = soften(build_marginals(&income_bins, &price_bins, config, alpha), || {
                    format!("marginals alpha={alpha} scope={scope}")
                })?;
                marginals.insert((alpha.to_bits(), scope), entry);
            }
        }

        let mut income_moments = BTreeMap::new();
        for &year in &config.fit_years {
            let bins = scope_bins(category_rows, config, &config.income_group, YearScope::Year(year))?;
            for &alpha in &config.search.tail_alphas {
                let moments = expand(&bins, config, alpha, config.expansion.income_tail)
                    .and_then(|sample| weighted_log_moments(&sample));
                let entry = soften(moments, || format!("income moments alpha={alpha} year={year}"))?;
                income_moments.insert((alpha.to_bits(), year), entry);
            }
        }

        let mut points = BTreeMap::new();
        for filter in &config.search.status_filters {
            let summary = summarize_points(price_rows, filter, config, &scopes)?;
            debug!(filter = %filter.label(), rows = summary.rows_used, "summarized point prices");
            points.insert(filter.label(), summary);
        }

        Ok(Self {
            marginals,
            income_moments,
            points,
        })
    }

    pub fn marginals(&self, alpha: f64, scope: YearScope) -> Result<&Marginals, AppError> {
        match self.marginals.get(&(alpha.to_bits(), scope)) {
            Some(Ok(m)) => Ok(m),
            Some(Err(err)) => Err(err.clone()),
            None => Err(AppError::config(format!(
                "No cached marginals for alpha={alpha}, scope={scope}."
            ))),
        }
    }

    pub fn income_moments(&self, alpha: f64, year: i32) -> Result<(f64, f64), AppError> {
        match self.income_moments.get(&(alpha.to_bits(), year)) {
            Some(Ok(m)) => Ok(*m),
            Some(Err(err)) => Err(err.clone()),
            None => Err(AppError::config(format!(
                "No cached income moments for alpha={alpha}, year={year}."
            ))),
        }
    }

    pub fn points(&self, filter: &StatusFilter) -> Result<&PointSummary, AppError> {
        self.points.get(&filter.label()).ok_or_else(|| {
            AppError::config(format!("No cached point summary for '{}'.", filter.label()))
        })
    }
}
