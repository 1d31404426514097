//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - grid inputs (`MeasurementGrid`, `UserGrid`, `GridUnits`)
//! - function classification (`Category`, `ProvenanceKind`, `FunType`)
//! - parameter default records (`ParamInfo`, `FunctionInfo`)

pub mod types;

pub use types::*;
