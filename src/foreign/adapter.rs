//! Uniform invocation of an external spectral routine on a measurement grid.
//!
//! The adapter owns every step around the foreign call itself: translate the
//! grid, narrow the parameters, seed convolution input, run the routine under
//! a fault guard ([`guarded`]), then map kept synthetic bins back onto the noticed bins.
//! The caller supplies only the `invoke` closure that knows the routine's
//! calling convention.

use std::os::raw::c_int;

use tracing::trace;

use crate::domain::{Category, MeasurementGrid};
use crate::error::AppError;
use crate::foreign::guard::guarded;
use crate::grid::SyntheticGrid;
use crate::math::Precision;

/// Buffers handed to one foreign call, already in the routine's precision.
#[derive(Debug)]
pub struct RoutineCall<'a, T> {
    /// Ascending edges, `nbins + 1` of them.
    pub edges: &'a [T],
    pub nbins: usize,
    pub params: &'a [T],
    /// Spectrum number passed as `ifl`; always 0 here.
    pub flag: c_int,
    pub output: &'a mut [T],
    pub errors: &'a mut [T],
}

impl<T> RoutineCall<'_, T> {
    /// Bin count as the C `int` the routines expect.
    pub fn ne(&self) -> Result<c_int, AppError> {
        c_int::try_from(self.nbins)
            .map_err(|_| AppError::eval(format!("Too many bins for an external routine: {}.", self.nbins)))
    }
}

/// Split the normalization out of an additive routine's parameters.
///
/// Returns the parameters to pass on and the scalar to multiply the output
/// by. Without a norm index the parameters pass through unchanged with a
/// scalar of 1.
pub fn split_norm(params: &[f64], norm_index: Option<usize>) -> Result<(Vec<f64>, f64), AppError> {
    let Some(idx) = norm_index else {
        return Ok((params.to_vec(), 1.0));
    };
    let norm = *params.get(idx).ok_or_else(|| {
        AppError::eval(format!(
            "Norm parameter index {idx} is out of range ({} parameters).",
            params.len()
        ))
    })?;
    let rest = params
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| (i != idx).then_some(p))
        .collect();
    Ok((rest, norm))
}

/// Evaluate one external routine on the noticed bins of `grid`.
///
/// `values` has one slot per noticed bin. For convolution routines it holds
/// the currently accumulated spectrum on entry; for every category it holds
/// the routine's output times `norm` on return.
pub fn eval_on_grid<T, F>(
    invoke: F,
    values: &mut [f64],
    grid: &MeasurementGrid,
    params: &[f64],
    norm: f64,
    category: Category,
) -> Result<(), AppError>
where
    T: Precision,
    F: FnOnce(&mut RoutineCall<'_, T>) -> Result<(), AppError>,
{
    if values.len() != grid.n_notice() {
        return Err(AppError::eval(format!(
            "Output has {} slots but the grid has {} noticed bins.",
            values.len(),
            grid.n_notice()
        )));
    }

    let synth = SyntheticGrid::<T>::build(grid)?;
    let nbins = synth.nbins();
    let kept = synth.kept_in_notice_order();
    if kept.len() != values.len() {
        return Err(AppError::grid(format!(
            "Synthetic grid keeps {} bins, expected {}.",
            kept.len(),
            values.len()
        )));
    }

    let marshalled = T::marshal(params);
    let mut output = vec![T::zero(); nbins];
    let mut errors = vec![T::zero(); nbins];

    if category == Category::Convolution {
        for (&slot, &current) in kept.iter().zip(values.iter()) {
            output[slot] = T::narrow(current);
        }
    }

    trace!(
        precision = T::LABEL,
        nbins,
        kept = kept.len(),
        reversed = synth.is_reversed(),
        "calling external routine"
    );

    {
        let mut call = RoutineCall {
            edges: synth.edges(),
            nbins,
            params: &marshalled,
            flag: 0,
            output: &mut output,
            errors: &mut errors,
        };
        guarded(|| invoke(&mut call))?;
    }

    // `kept` has exactly one slot per noticed bin, checked above.
    for (slot_value, &slot) in values.iter_mut().zip(kept.iter()) {
        *slot_value = output[slot].widen() * norm;
    }
    Ok(())
}
