//! `fitfun` library crate.
//!
//! A registry of spectral fit functions plus the bridge that lets external
//! model routines (which expect one contiguous energy grid) be evaluated on
//! gapped measurement grids.
//!
//! The binary (`fitfun`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - hosts other than the command line (an interpreter, a fitting engine)
//!   drive the same [`session::Session`]

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod eval;
pub mod foreign;
pub mod grid;
pub mod io;
pub mod math;
pub mod register;
pub mod registry;
pub mod report;
pub mod session;
