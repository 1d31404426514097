//! Numeric utilities: the precision abstraction and physical unit conversion.

pub mod precision;
pub mod units;

pub use precision::*;
pub use units::*;
