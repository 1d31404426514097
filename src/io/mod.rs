//! Input/output helpers for the command-line surface.
//!
//! - grid CSV ingest (`ingest`)
//! - evaluation CSV and parameter-table JSON exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
