//! Bin building: category labels → numeric intervals.
//!
//! Administrative band labels come in a handful of shapes:
//!
//! - `< 50K`, `Under £50,000`        → open-lower
//! - `100K+`, `> 100K`, `Over 100K`  → open-upper
//! - `50K - 100K`, `50 to 100K`       → closed
//!
//! Amounts may carry currency symbols, thousands separators, `K`/`M`
//! multipliers or a `%` suffix (kept in percentage points). Labels that are
//! totals, unknowns, or otherwise unparseable carry no interval semantics and
//! are dropped.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{Bin, Interval};
use crate::error::AppError;

const OPEN_LOWER_PREFIXES: [&str; 5] = ["<=", "<", "under ", "below ", "less than "];
const OPEN_UPPER_PREFIXES: [&str; 4] = [">=", ">", "over ", "more than "];
const OPEN_UPPER_SUFFIXES: [&str; 4] = ["+", " and over", " and above", " or more"];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Amount {
    value: f64,
    multiplier: Option<f64>,
}

impl Amount {
    fn absolute(self) -> f64 {
        self.value * self.multiplier.unwrap_or(1.0)
    }
}

/// Parse a single amount such as `£50,000`, `50k`, `1.5M` or `75%`.
fn parse_amount(raw: &str) -> Option<Amount> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',' | ' '))
        .collect();
    let cleaned = cleaned.strip_suffix('%').unwrap_or(&cleaned);

    let (number, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], Some(1e3)),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], Some(1e6)),
        _ => (cleaned, None),
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(Amount { value, multiplier })
}

fn split_range(text: &str) -> Option<(&str, &str)> {
    if let Some(idx) = text.find(" to ") {
        return Some((&text[..idx], &text[idx + 4..]));
    }
    let idx = text.find(['-', '–', '—'])?;
    let dash_len = text[idx..].chars().next()?.len_utf8();
    Some((&text[..idx], &text[idx + dash_len..]))
}

/// Parse a category label into an interval, or `None` if it has no interval meaning.
pub fn parse_label(label: &str) -> Option<Interval> {
    let text = label.trim().to_lowercase();
    if text.is_empty() || text.contains("total") || text.contains("unknown") {
        return None;
    }

    for prefix in OPEN_LOWER_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            let upper = parse_amount(rest)?.absolute();
            return Some(Interval::OpenLower { upper });
        }
    }
    for prefix in OPEN_UPPER_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            let lower = parse_amount(rest)?.absolute();
            return Some(Interval::OpenUpper { lower });
        }
    }
    for suffix in OPEN_UPPER_SUFFIXES {
        if let Some(rest) = text.strip_suffix(suffix) {
            let lower = parse_amount(rest)?.absolute();
            return Some(Interval::OpenUpper { lower });
        }
    }

    let (lo, hi) = split_range(&text)?;
    let mut lower = parse_amount(lo)?;
    let upper = parse_amount(hi)?;
    // "50-100K": the lower bound shares the upper bound's multiplier,
    // unless that would push it past the upper bound ("500-1M").
    if let (None, Some(m)) = (lower.multiplier, upper.multiplier) {
        if lower.value * m <= upper.absolute() {
            lower.multiplier = Some(m);
        }
    }
    Some(Interval::Closed {
        lower: lower.absolute(),
        upper: upper.absolute(),
    })
}

fn compare_bins(a: &Bin, b: &Bin) -> Ordering {
    let (ka, la, ua) = a.interval.sort_key();
    let (kb, lb, ub) = b.interval.sort_key();
    ka.cmp(&kb)
        .then(la.total_cmp(&lb))
        .then(ua.total_cmp(&ub))
        .then_with(|| a.label.cmp(&b.label))
}

/// Turn a category → mass mapping into an ordered bin set.
///
/// Unparseable labels and non-positive masses are dropped. A closed interval
/// with `lower > upper`, or more than one open-lower / open-upper bin, makes
/// the whole set invalid.
pub fn build_bins(masses: &BTreeMap<String, f64>) -> Result<Vec<Bin>, AppError> {
    let mut bins = Vec::with_capacity(masses.len());
    let mut open_lower = 0usize;
    let mut open_upper = 0usize;

    for (label, &mass) in masses {
        if !(mass.is_finite() && mass > 0.0) {
            debug!(label = %label, mass, "dropping bin with non-positive mass");
            continue;
        }
        let Some(interval) = parse_label(label) else {
            debug!(label = %label, "dropping label without interval semantics");
            continue;
        };

        match interval {
            Interval::Closed { lower, upper } if lower > upper => {
                return Err(AppError::input(format!(
                    "Invalid bin '{label}': lower bound {lower} exceeds upper bound {upper}."
                )));
            }
            Interval::OpenLower { .. } => open_lower += 1,
            Interval::OpenUpper { .. } => open_upper += 1,
            Interval::Closed { .. } => {}
        }

        bins.push(Bin {
            label: label.clone(),
            interval,
            mass,
        });
    }

    if open_lower > 1 {
        return Err(AppError::input(format!(
            "Invalid bin set: {open_lower} open-lower bins (at most one allowed)."
        )));
    }
    if open_upper > 1 {
        return Err(AppError::input(format!(
            "Invalid bin set: {open_upper} open-upper bins (at most one allowed)."
        )));
    }

    bins.sort_by(compare_bins);
    Ok(bins)
}
