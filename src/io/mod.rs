//! Input/output helpers.
//!
//! - CSV ingest of category and price rows (`ingest`)
//! - config JSON loading (`config`)
//! - ranked CSV / selection JSON exports (`export`)

pub mod config;
pub mod export;
pub mod ingest;

pub use config::*;
pub use export::*;
pub use ingest::*;
