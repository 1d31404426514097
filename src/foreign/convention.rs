//! Calling conventions of external spectral model routines.
//!
//! Every variant receives an ascending energy-edge array of length `ne + 1`,
//! the bin count `ne`, the parameter array, a flag word and an output array
//! of length `ne`. Variants differ in precision, in whether counts are passed
//! by reference (Fortran style), and in whether an error array and an
//! initialization string are passed.

use std::ffi::c_char;
use std::os::raw::c_int;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// `(ear, ne, param, ifl, photar, photer)`, single precision.
pub type SingleRoutine =
    unsafe extern "C" fn(*const f32, *const c_int, *const f32, *const c_int, *mut f32, *mut f32);

/// `(ear, ne, param, ifl, photar)`, single precision, no error array.
pub type SingleNoErrRoutine =
    unsafe extern "C" fn(*const f32, *const c_int, *const f32, *const c_int, *mut f32);

/// `(ear, ne, param, ifl, photar, photer)`, double precision.
pub type DoubleRoutine =
    unsafe extern "C" fn(*const f64, *const c_int, *const f64, *const c_int, *mut f64, *mut f64);

/// `(ear, ne, param, ifl, photar, photer, init)`, double precision, counts by value.
pub type CStyleRoutine =
    unsafe extern "C" fn(*const f64, c_int, *const f64, c_int, *mut f64, *mut f64, *const c_char);

/// Untyped symbol address as returned by the dynamic loader.
pub type RawSymbol = unsafe extern "C" fn();

/// Which of the four variants a routine follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Convention {
    #[value(name = "f")]
    #[serde(rename = "f")]
    Single,
    #[value(name = "fn")]
    #[serde(rename = "fn")]
    SingleNoErr,
    #[value(name = "F")]
    #[serde(rename = "F")]
    Double,
    #[value(name = "C")]
    #[serde(rename = "C")]
    CStyle,
}

impl Convention {
    pub fn label(self) -> &'static str {
        match self {
            Convention::Single => "f",
            Convention::SingleNoErr => "fn",
            Convention::Double => "F",
            Convention::CStyle => "C",
        }
    }

    /// Whether the routine receives the handle's initialization string.
    pub fn takes_init_string(self) -> bool {
        self == Convention::CStyle
    }
}

/// A resolved routine pointer tagged with its convention.
#[derive(Debug, Clone, Copy)]
pub enum RoutineSymbol {
    Single(SingleRoutine),
    SingleNoErr(SingleNoErrRoutine),
    Double(DoubleRoutine),
    CStyle(CStyleRoutine),
}

impl RoutineSymbol {
    /// Reinterpret an untyped symbol address as a routine of `convention`.
    ///
    /// # Safety
    /// `raw` must point to a function whose actual signature is the one
    /// `convention` describes. Calling it through the wrong type is undefined
    /// behaviour.
    pub unsafe fn from_raw(convention: Convention, raw: RawSymbol) -> Self {
        // SAFETY: all function pointers share one representation; the caller
        // vouches for the real signature.
        unsafe {
            match convention {
                Convention::Single => RoutineSymbol::Single(std::mem::transmute::<RawSymbol, SingleRoutine>(raw)),
                Convention::SingleNoErr => {
                    RoutineSymbol::SingleNoErr(std::mem::transmute::<RawSymbol, SingleNoErrRoutine>(raw))
                }
                Convention::Double => RoutineSymbol::Double(std::mem::transmute::<RawSymbol, DoubleRoutine>(raw)),
                Convention::CStyle => RoutineSymbol::CStyle(std::mem::transmute::<RawSymbol, CStyleRoutine>(raw)),
            }
        }
    }

    pub fn convention(&self) -> Convention {
        match self {
            RoutineSymbol::Single(_) => Convention::Single,
            RoutineSymbol::SingleNoErr(_) => Convention::SingleNoErr,
            RoutineSymbol::Double(_) => Convention::Double,
            RoutineSymbol::CStyle(_) => Convention::CStyle,
        }
    }
}
