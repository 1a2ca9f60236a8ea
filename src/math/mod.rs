//! Mathematical utilities: weighted least squares and weighted quantiles.

pub mod ols;
pub mod quantile;

pub use ols::*;
pub use quantile::*;
