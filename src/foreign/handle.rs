//! A resolved external routine plus whatever keeps it callable.

use std::ffi::{CStr, CString};
use std::sync::Arc;

use libloading::Library;
use tracing::warn;

use crate::domain::{Category, FunctionShape, MeasurementGrid};
use crate::error::AppError;
use crate::foreign::adapter::{RoutineCall, eval_on_grid, split_norm};
use crate::foreign::convention::{Convention, RoutineSymbol};
use crate::registry::BinnedRoutine;

/// One external spectral routine.
///
/// Routines loaded from a shared library hold an `Arc` to it so the symbol
/// stays mapped for as long as any handle (or descriptor) refers to it.
#[derive(Debug, Clone)]
pub struct ForeignHandle {
    name: String,
    symbol: RoutineSymbol,
    init_string: Option<CString>,
    library: Option<Arc<Library>>,
}

impl ForeignHandle {
    /// Handle for a routine linked into this binary.
    pub fn from_static(name: impl Into<String>, symbol: RoutineSymbol) -> Self {
        Self {
            name: name.into(),
            symbol,
            init_string: None,
            library: None,
        }
    }

    pub(crate) fn from_library(name: impl Into<String>, symbol: RoutineSymbol, library: Arc<Library>) -> Self {
        Self {
            name: name.into(),
            symbol,
            init_string: None,
            library: Some(library),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn convention(&self) -> Convention {
        self.symbol.convention()
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    pub fn init_string(&self) -> Option<&CStr> {
        self.init_string.as_deref()
    }

    /// Attach (or with `None`, detach) the string passed to `C` routines.
    pub fn set_init_string(&mut self, init: Option<&str>) -> Result<(), AppError> {
        self.init_string = init
            .map(|s| {
                CString::new(s).map_err(|_| {
                    AppError::config(format!("Init string for {} contains an interior NUL byte.", self.name))
                })
            })
            .transpose()?;
        if self.init_string.is_some() && !self.convention().takes_init_string() {
            warn!(
                routine = %self.name,
                convention = self.convention().label(),
                "init string attached to a routine that never receives it"
            );
        }
        Ok(())
    }

    /// Evaluate on the noticed bins of `grid`.
    ///
    /// For additive routines the parameter at `norm_index` is taken out of
    /// the vector and applied as a scale factor afterwards.
    pub fn evaluate(
        &self,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
        category: Category,
        norm_index: Option<usize>,
    ) -> Result<(), AppError> {
        let (params, norm) = match category {
            Category::Additive => split_norm(params, norm_index)?,
            _ => (params.to_vec(), 1.0),
        };

        match self.symbol {
            RoutineSymbol::Single(f) => eval_on_grid::<f32, _>(
                |call: &mut RoutineCall<'_, f32>| {
                    let ne = call.ne()?;
                    let ifl = call.flag;
                    // SAFETY: buffer lengths match `ne` as built by the adapter.
                    unsafe {
                        f(
                            call.edges.as_ptr(),
                            &ne,
                            call.params.as_ptr(),
                            &ifl,
                            call.output.as_mut_ptr(),
                            call.errors.as_mut_ptr(),
                        )
                    };
                    Ok(())
                },
                values,
                grid,
                &params,
                norm,
                category,
            ),
            RoutineSymbol::SingleNoErr(f) => eval_on_grid::<f32, _>(
                |call: &mut RoutineCall<'_, f32>| {
                    let ne = call.ne()?;
                    let ifl = call.flag;
                    // SAFETY: as above.
                    unsafe {
                        f(
                            call.edges.as_ptr(),
                            &ne,
                            call.params.as_ptr(),
                            &ifl,
                            call.output.as_mut_ptr(),
                        )
                    };
                    Ok(())
                },
                values,
                grid,
                &params,
                norm,
                category,
            ),
            RoutineSymbol::Double(f) => eval_on_grid::<f64, _>(
                |call: &mut RoutineCall<'_, f64>| {
                    let ne = call.ne()?;
                    let ifl = call.flag;
                    // SAFETY: as above.
                    unsafe {
                        f(
                            call.edges.as_ptr(),
                            &ne,
                            call.params.as_ptr(),
                            &ifl,
                            call.output.as_mut_ptr(),
                            call.errors.as_mut_ptr(),
                        )
                    };
                    Ok(())
                },
                values,
                grid,
                &params,
                norm,
                category,
            ),
            RoutineSymbol::CStyle(f) => {
                let init = self.init_string.as_deref().unwrap_or(c"");
                eval_on_grid::<f64, _>(
                    |call: &mut RoutineCall<'_, f64>| {
                        let ne = call.ne()?;
                        // SAFETY: as above; `init` outlives the call.
                        unsafe {
                            f(
                                call.edges.as_ptr(),
                                ne,
                                call.params.as_ptr(),
                                call.flag,
                                call.output.as_mut_ptr(),
                                call.errors.as_mut_ptr(),
                                init.as_ptr(),
                            )
                        };
                        Ok(())
                    },
                    values,
                    grid,
                    &params,
                    norm,
                    category,
                )
            }
        }
    }

    /// Evaluate on caller-supplied bins, every one of them noticed.
    ///
    /// `current` is required for convolution routines and must have one
    /// value per bin.
    pub fn evaluate_bins(
        &self,
        grid: &MeasurementGrid,
        params: &[f64],
        category: Category,
        norm_index: Option<usize>,
        current: Option<&[f64]>,
    ) -> Result<Vec<f64>, AppError> {
        let mut values = vec![0.0; grid.n_notice()];
        if category == Category::Convolution {
            let current = current.ok_or_else(|| {
                AppError::eval(format!("{} is a convolution routine and needs current values.", self.name))
            })?;
            if current.len() != values.len() {
                return Err(AppError::eval(format!(
                    "Inconsistent array size for operator argument: {} values for {} bins.",
                    current.len(),
                    values.len()
                )));
            }
            values.copy_from_slice(current);
        }
        self.evaluate(&mut values, grid, params, category, norm_index)?;
        Ok(values)
    }
}

impl BinnedRoutine for ForeignHandle {
    fn eval(
        &self,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
        shape: &FunctionShape,
    ) -> Result<(), AppError> {
        self.evaluate(values, grid, params, shape.category, shape.norm_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GridUnits;
    use std::ffi::c_char;
    use std::os::raw::c_int;

    /// Writes the init string's length into every bin.
    unsafe extern "C" fn init_length(
        _ear: *const f64,
        ne: c_int,
        _param: *const f64,
        _ifl: c_int,
        photar: *mut f64,
        _photer: *mut f64,
        init: *const c_char,
    ) {
        unsafe {
            let len = CStr::from_ptr(init).to_bytes().len() as f64;
            let out = std::slice::from_raw_parts_mut(photar, ne as usize);
            out.fill(len);
        }
    }

    /// Adds the first parameter to whatever is in the output buffer.
    unsafe extern "C" fn shift(
        _ear: *const f64,
        ne: *const c_int,
        param: *const f64,
        _ifl: *const c_int,
        photar: *mut f64,
        _photer: *mut f64,
    ) {
        unsafe {
            let out = std::slice::from_raw_parts_mut(photar, *ne as usize);
            for v in out {
                *v += *param;
            }
        }
    }

    fn grid() -> MeasurementGrid {
        MeasurementGrid::from_edges(&[1.0, 2.0, 3.0], GridUnits::Kev).unwrap()
    }

    #[test]
    fn c_style_routine_receives_the_init_string() {
        let mut handle = ForeignHandle::from_static("init_length", RoutineSymbol::CStyle(init_length));
        let out = handle
            .evaluate_bins(&grid(), &[], Category::Multiplicative, None, None)
            .unwrap();
        assert_eq!(out, vec![0.0, 0.0]);

        handle.set_init_string(Some("abcd")).unwrap();
        let out = handle
            .evaluate_bins(&grid(), &[], Category::Multiplicative, None, None)
            .unwrap();
        assert_eq!(out, vec![4.0, 4.0]);

        handle.set_init_string(None).unwrap();
        assert!(handle.init_string().is_none());
    }

    #[test]
    fn init_string_with_nul_is_rejected() {
        let mut handle = ForeignHandle::from_static("init_length", RoutineSymbol::CStyle(init_length));
        let err = handle.set_init_string(Some("a\0b")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn init_string_on_other_conventions_is_kept_but_unused() {
        let mut handle = ForeignHandle::from_static("shift", RoutineSymbol::Double(shift));
        handle.set_init_string(Some("ignored")).unwrap();
        assert_eq!(handle.init_string().unwrap().to_str().unwrap(), "ignored");
        let out = handle.evaluate_bins(&grid(), &[1.0], Category::Convolution, None, Some(&[1.0, 2.0])).unwrap();
        assert_eq!(out, vec![2.0, 3.0]);
    }

    #[test]
    fn convolution_requires_current_values() {
        let handle = ForeignHandle::from_static("shift", RoutineSymbol::Double(shift));
        assert!(
            handle
                .evaluate_bins(&grid(), &[1.0], Category::Convolution, None, None)
                .is_err()
        );
        assert!(
            handle
                .evaluate_bins(&grid(), &[1.0], Category::Convolution, None, Some(&[1.0]))
                .is_err()
        );
        let out = handle
            .evaluate_bins(&grid(), &[1.0], Category::Convolution, None, Some(&[2.0, 5.0]))
            .unwrap();
        assert_eq!(out, vec![3.0, 6.0]);
    }

    #[test]
    fn additive_norm_is_split_off_before_the_call() {
        let handle = ForeignHandle::from_static("shift", RoutineSymbol::Double(shift));
        // params = [norm, offset]; routine sees [offset] only.
        let out = handle
            .evaluate_bins(&grid(), &[3.0, 0.5], Category::Additive, Some(0), None)
            .unwrap();
        assert_eq!(out, vec![1.5, 1.5]);
    }
}
