//! Grid translation for external model routines.

pub mod translator;

pub use translator::*;
