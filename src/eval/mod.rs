//! Evaluation dispatch.
//!
//! Stateless: look the function up, check the inputs against its shape, run
//! the right strategy, check the output.

use tracing::debug;

use crate::domain::{Category, FunType, MeasurementGrid, UserGrid};
use crate::error::AppError;
use crate::registry::{FunctionDescriptor, Registry};

fn find(registry: &Registry, fun_type: FunType) -> Result<&FunctionDescriptor, AppError> {
    registry
        .lookup(fun_type)
        .ok_or_else(|| AppError::registry(format!("Unknown fit-function type {fun_type}.")))
}

fn check_params(d: &FunctionDescriptor, params: &[f64]) -> Result<(), AppError> {
    if params.len() != d.nparams() {
        return Err(AppError::eval(format!(
            "{} takes {} parameters, got {}.",
            d.name(),
            d.nparams(),
            params.len()
        )));
    }
    Ok(())
}

/// One value per noticed bin of `grid`.
///
/// Convolution functions need `current`: the spectrum accumulated so far,
/// one value per noticed bin. Other categories ignore it.
pub fn eval_binned(
    registry: &Registry,
    fun_type: FunType,
    grid: &MeasurementGrid,
    params: &[f64],
    current: Option<&[f64]>,
) -> Result<Vec<f64>, AppError> {
    let d = find(registry, fun_type)?;
    check_params(d, params)?;

    let n = grid.n_notice();
    let mut values = vec![0.0; n];
    if d.category() == Category::Convolution {
        let current = current
            .ok_or_else(|| AppError::eval(format!("{} is a convolution and needs the current spectrum.", d.name())))?;
        if current.len() != n {
            return Err(AppError::eval(format!(
                "Inconsistent array size for operator argument: {} values for {n} noticed bins.",
                current.len()
            )));
        }
        values.copy_from_slice(current);
    }

    debug!(name = d.name(), fun_type, nbins = n, "binned evaluation");
    d.bin_eval(&mut values, grid, params)?;
    Ok(values)
}

/// One value per point of `grid`.
pub fn eval_unbinned(
    registry: &Registry,
    fun_type: FunType,
    grid: &UserGrid,
    params: &[f64],
) -> Result<Vec<f64>, AppError> {
    let d = find(registry, fun_type)?;
    check_params(d, params)?;

    debug!(name = d.name(), fun_type, npts = grid.npts(), "unbinned evaluation");
    let values = d.diff_eval(grid, params)?;
    if values.len() != grid.npts() {
        return Err(AppError::eval(format!(
            "{} produced {} values for {} points.",
            d.name(),
            values.len(),
            grid.npts()
        )));
    }
    Ok(values)
}
