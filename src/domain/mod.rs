//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the two input row shapes (`CategoryRow`, `PriceRow`)
//! - bins, weighted samples and paired quantile series
//! - fit, guardrail, objective and variant outputs
//! - run configuration (`CalibConfig` and its sections)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
