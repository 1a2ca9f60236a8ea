//! Calibration of the budget model on one pair of marginals.
//!
//! Responsibilities:
//!
//! - couple two quantile series into a paired sample (`coupling`)
//! - fit the anchored log-log line (`regression`)
//! - check hard realism guardrails (`guardrails`)
//! - score the multi-term objective (`objective`)

pub mod coupling;
pub mod guardrails;
pub mod objective;
pub mod regression;

pub use coupling::*;
pub use guardrails::*;
pub use objective::*;
pub use regression::*;
