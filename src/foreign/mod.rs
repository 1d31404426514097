//! Calling external spectral model routines.
//!
//! - `convention`: the four C signatures external routines come in
//! - `adapter`: grid translation + marshalling around one call
//! - `guard`: memory-fault containment while foreign code runs
//! - `handle`/`loader`: resolved routines and how to get them
//! - `builtin`: routines linked into this binary

pub mod adapter;
pub mod builtin;
pub mod convention;
pub mod guard;
pub mod handle;
pub mod loader;

pub use adapter::{RoutineCall, eval_on_grid, split_norm};
pub use builtin::{BUILTIN_ROUTINES, BuiltinParam, BuiltinRoutine, find_builtin};
pub use convention::{Convention, RoutineSymbol};
pub use guard::FaultGuard;
pub use handle::ForeignHandle;
pub use loader::load_symbol;
