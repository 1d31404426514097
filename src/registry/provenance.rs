//! Where a fit function's behaviour comes from, and the one interface every
//! origin implements.

use crate::domain::{FunctionShape, MeasurementGrid, ParamInfo, ProvenanceKind, UserGrid};
use crate::error::AppError;
use crate::register::{KernelFunction, NativeFunction, ScriptFunction};

/// Fills one value per noticed bin.
///
/// For convolution functions `values` holds the currently accumulated
/// spectrum on entry.
pub trait BinnedRoutine {
    fn eval(
        &self,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
        shape: &FunctionShape,
    ) -> Result<(), AppError>;
}

impl<F> BinnedRoutine for F
where
    F: Fn(&mut [f64], &MeasurementGrid, &[f64], &FunctionShape) -> Result<(), AppError>,
{
    fn eval(
        &self,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
        shape: &FunctionShape,
    ) -> Result<(), AppError> {
        self(values, grid, params, shape)
    }
}

/// Unbinned evaluation: one value per point.
pub type UnbinnedRoutine = Box<dyn Fn(&UserGrid, &[f64]) -> Result<Vec<f64>, AppError>>;

/// Parameter defaults, binned and unbinned evaluation, teardown.
pub trait EvalStrategy {
    fn param_default(&self, info: &mut ParamInfo) -> Result<(), AppError>;

    fn bin_eval(
        &self,
        shape: &FunctionShape,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
    ) -> Result<(), AppError>;

    fn diff_eval(&self, shape: &FunctionShape, _grid: &UserGrid, _params: &[f64]) -> Result<Vec<f64>, AppError> {
        Err(unsupported(shape))
    }

    /// Release whatever the function holds. Called exactly once.
    fn teardown(&mut self) {}
}

pub fn unsupported(shape: &FunctionShape) -> AppError {
    AppError::eval(format!("{} does not support this evaluation method", shape.name))
}

/// Per-parameter default arrays. A missing array leaves that field alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefaultTable {
    pub value: Option<Vec<f64>>,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
    pub freeze: Option<Vec<bool>>,
}

impl DefaultTable {
    /// Every supplied array must cover all `nparams` parameters.
    pub fn check_len(&self, name: &str, nparams: usize) -> Result<(), AppError> {
        let lens = [
            ("value", self.value.as_ref().map(Vec::len)),
            ("min", self.min.as_ref().map(Vec::len)),
            ("max", self.max.as_ref().map(Vec::len)),
            ("freeze", self.freeze.as_ref().map(Vec::len)),
        ];
        for (field, len) in lens {
            let Some(len) = len else { continue };
            if len < nparams {
                return Err(AppError::config(format!(
                    "{name} definition: default {field} table has {len} entries for {nparams} parameters"
                )));
            }
        }
        Ok(())
    }

    pub fn apply(&self, info: &mut ParamInfo) -> Result<(), AppError> {
        let i = info.fun_par;
        let name = info.param_name.clone();
        let missing = || AppError::registry(format!("No default for parameter {i} ({name})."));

        if let Some(min) = &self.min {
            info.min = *min.get(i).ok_or_else(missing)?;
        }
        if let Some(max) = &self.max {
            info.max = *max.get(i).ok_or_else(missing)?;
        }
        if let Some(freeze) = &self.freeze {
            info.freeze = *freeze.get(i).ok_or_else(missing)?;
        }
        if let Some(value) = &self.value {
            info.value = *value.get(i).ok_or_else(missing)?;
        }
        if self.min.is_some() || self.max.is_some() {
            info.set_minmax = true;
        }
        Ok(())
    }
}

/// The origin of a registered function.
pub enum Provenance {
    Native(NativeFunction),
    Script(ScriptFunction),
    Kernel(KernelFunction),
}

impl Provenance {
    pub fn kind(&self) -> ProvenanceKind {
        match self {
            Provenance::Native(_) => ProvenanceKind::Native,
            Provenance::Script(_) => ProvenanceKind::Script,
            Provenance::Kernel(_) => ProvenanceKind::Kernel,
        }
    }

    pub fn strategy(&self) -> &dyn EvalStrategy {
        match self {
            Provenance::Native(f) => f,
            Provenance::Script(f) => f,
            Provenance::Kernel(f) => f,
        }
    }

    pub fn strategy_mut(&mut self) -> &mut dyn EvalStrategy {
        match self {
            Provenance::Native(f) => f,
            Provenance::Script(f) => f,
            Provenance::Kernel(f) => f,
        }
    }
}

impl std::fmt::Debug for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Provenance").field(&self.kind()).finish()
    }
}
