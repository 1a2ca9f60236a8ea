//! `budget-calib` library crate.
//!
//! Reconstructs income and property-value distributions from administrative
//! bin counts, fits a guardrailed power-law budget model between them, and
//! searches a grid of modeling variants for the best eligible calibration.
//!
//! The binary (`calib`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable from other front-ends

pub mod app;
pub mod bins;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod report;
pub mod search;
