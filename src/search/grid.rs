//! Variant grid generation.
//!
//! The grid is the cartesian product of five named axes, in this nesting order
//! (outermost first): status filter, year policy, tail alpha, coupling,
//! objective profile. Each axis is validated on its own before the product is
//! built, so a malformed axis fails before any evaluation work starts.

use std::collections::BTreeSet;

use crate::domain::{Coupling, ObjectiveProfile, SearchSpace, Shard, StatusFilter, VariantKey, YearPolicy};
use crate::error::AppError;

/// One unit of work: a grid index plus the variant it identifies.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTask {
    pub index: usize,
    pub key: VariantKey,
}

fn non_empty<T>(axis: &str, values: &[T]) -> Result<(), AppError> {
    if values.is_empty() {
        return Err(AppError::config(format!("Search axis '{axis}' must not be empty.")));
    }
    Ok(())
}

fn validate_status_filters(values: &[StatusFilter]) -> Result<(), AppError> {
    non_empty("status_filters", values)?;
    let mut seen = BTreeSet::new();
    for f in values {
        if let StatusFilter::Only(code) = f {
            if code.trim().is_empty() {
                return Err(AppError::config("Status filter code must not be empty."));
            }
        }
        if !seen.insert(f.label()) {
            return Err(AppError::config(format!("Duplicate status filter '{}'.", f.label())));
        }
    }
    Ok(())
}

fn validate_year_policies(values: &[YearPolicy]) -> Result<(), AppError> {
    non_empty("year_policies", values)?;
    let distinct: BTreeSet<&str> = values.iter().map(|p| p.name()).collect();
    if distinct.len() != values.len() {
        return Err(AppError::config("Duplicate year policy in search space."));
    }
    Ok(())
}

fn validate_alphas(values: &[f64]) -> Result<(), AppError> {
    non_empty("tail_alphas", values)?;
    for &a in values {
        if !(a.is_finite() && a > 0.0) {
            return Err(AppError::config(format!(
                "Tail alpha must be finite and > 0 (got {a})."
            )));
        }
    }
    let distinct: BTreeSet<u64> = values.iter().map(|a| a.to_bits()).collect();
    if distinct.len() != values.len() {
        return Err(AppError::config("Duplicate tail alpha in search space."));
    }
    Ok(())
}

fn validate_couplings(values: &[Coupling]) -> Result<(), AppError> {
    non_empty("couplings", values)?;
    let distinct: BTreeSet<&str> = values.iter().map(|c| c.name()).collect();
    if distinct.len() != values.len() {
        return Err(AppError::config("Duplicate coupling in search space."));
    }
    Ok(())
}

fn validate_profiles(values: &[ObjectiveProfile]) -> Result<(), AppError> {
    non_empty("profiles", values)?;
    let mut seen = BTreeSet::new();
    for p in values {
        p.validate()?;
        if !seen.insert(p.id.as_str()) {
            return Err(AppError::config(format!("Duplicate objective profile id '{}'.", p.id)));
        }
    }
    Ok(())
}

/// Validate every axis of `space`.
pub fn validate_space(space: &SearchSpace) -> Result<(), AppError> {
    validate_status_filters(&space.status_filters)?;
    validate_year_policies(&space.year_policies)?;
    validate_alphas(&space.tail_alphas)?;
    validate_couplings(&space.couplings)?;
    validate_profiles(&space.profiles)?;
    Ok(())
}

/// Full task list in deterministic grid order.
pub fn build_grid(space: &SearchSpace) -> Result<Vec<VariantTask>, AppError> {
    validate_space(space)?;

    let mut out = Vec::with_capacity(
        space.status_filters.len()
            * space.year_policies.len()
            * space.tail_alphas.len()
            * space.couplings.len()
            * space.profiles.len(),
    );
    for status in &space.status_filters {
        for &year_policy in &space.year_policies {
            for &alpha in &space.tail_alphas {
                for &coupling in &space.couplings {
                    for profile in &space.profiles {
                        out.push(VariantTask {
                            index: out.len(),
                            key: VariantKey {
                                status_filter: status.clone(),
                                year_policy,
                                alpha,
                                coupling,
                                profile_id: profile.id.clone(),
                            },
                        });
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Keep only the tasks of one shard. An empty subset is fatal.
pub fn apply_shard(tasks: Vec<VariantTask>, shard: Option<Shard>) -> Result<Vec<VariantTask>, AppError> {
    let Some(shard) = shard else {
        return Ok(tasks);
    };
    if shard.count == 0 || shard.index >= shard.count {
        return Err(AppError::config(format!(
            "Invalid shard {}/{}.",
            shard.index, shard.count
        )));
    }
    let total = tasks.len();
    let kept: Vec<VariantTask> = tasks
        .into_iter()
        .filter(|t| t.index % shard.count == shard.index)
        .collect();
    if kept.is_empty() {
        return Err(AppError::config(format!(
            "Shard {}/{} selects no tasks out of {total}.",
            shard.index, shard.count
        )));
    }
    Ok(kept)
}
