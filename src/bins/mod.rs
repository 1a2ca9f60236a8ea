//! From administrative category counts to weighted point samples.
//!
//! - `aggregate`: sum flat rows per category for a group/year
//! - `parse`: turn category labels into ordered interval bins
//! - `expand`: expand bins into a weighted sample (with a Pareto tail)

pub mod aggregate;
pub mod expand;
pub mod parse;

pub use aggregate::*;
pub use expand::*;
pub use parse::*;
