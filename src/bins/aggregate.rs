//! Category aggregation.
//!
//! Sums the counts of flat administrative rows per category label for one
//! group and year (optionally one quarter/month and one region). A group/year
//! with no matching rows is an input error: zero mass is never inferred from
//! absence.

use std::collections::BTreeMap;

use crate::domain::{CategoryRow, SubPeriod};
use crate::error::AppError;

/// Which rows to aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub group: String,
    pub year: i32,
    pub sub_period: Option<SubPeriod>,
    pub region: Option<String>,
}

impl AggregateQuery {
    pub fn new(group: impl Into<String>, year: i32) -> Self {
        Self {
            group: group.into(),
            year,
            sub_period: None,
            region: None,
        }
    }

    fn matches(&self, row: &CategoryRow) -> bool {
        if row.group.trim() != self.group.trim() || row.period.year != self.year {
            return false;
        }
        match self.sub_period {
            Some(SubPeriod::Quarter(q)) if row.period.quarter != Some(q) => return false,
            Some(SubPeriod::Month(m)) if row.period.month != Some(m) => return false,
            _ => {}
        }
        match &self.region {
            Some(region) => row.region.trim().eq_ignore_ascii_case(region.trim()),
            None => true,
        }
    }
}

/// Category label → total count for the rows matching `query`.
pub fn aggregate_categories(
    rows: &[CategoryRow],
    query: &AggregateQuery,
) -> Result<BTreeMap<String, f64>, AppError> {
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    let mut matched = 0usize;

    for row in rows.iter().filter(|r| query.matches(r)) {
        matched += 1;
        if !row.count.is_finite() {
            continue;
        }
        *out.entry(row.category.trim().to_string()).or_insert(0.0) += row.count;
    }

    if matched == 0 {
        let mut msg = format!(
            "No category rows for group '{}' in year {}",
            query.group, query.year
        );
        if let Some(sub) = query.sub_period {
            msg.push_str(&format!(" ({sub:?})"));
        }
        if let Some(region) = &query.region {
            msg.push_str(&format!(" in region '{region}'"));
        }
        msg.push('.');
        return Err(AppError::input(msg));
    }

    Ok(out)
}

/// Sum the per-year aggregates over several years. Every year must be present.
pub fn aggregate_years(
    rows: &[CategoryRow],
    base: &AggregateQuery,
    years: &[i32],
) -> Result<BTreeMap<String, f64>, AppError> {
    if years.is_empty() {
        return Err(AppError::config("Cannot pool categories over an empty year list."));
    }
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for &year in years {
        let query = AggregateQuery {
            year,
            ..base.clone()
        };
        for (label, count) in aggregate_categories(rows, &query)? {
            *out.entry(label).or_insert(0.0) += count;
        }
    }
    Ok(out)
}
