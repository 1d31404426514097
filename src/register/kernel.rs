//! Fit functions derived from built-in evaluation kernels.
//!
//! A kernel computes the whole model itself (for example a line-profile
//! convolution inside the fitting engine), so its fit function only has to
//! exist in the registry with the right parameter table. Binned evaluation
//! returns 1.0 for every noticed bin.

use crate::domain::{Category, FunType, FunctionShape, MeasurementGrid, ParamInfo};
use crate::error::AppError;
use crate::register::{norms, validate};
use crate::registry::{DefaultTable, EvalStrategy, FunctionDescriptor, Provenance};

/// Kernel definition owned by the fitting engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelDef {
    pub kernel_name: String,
    pub param_names: Vec<String>,
    pub param_units: Vec<String>,
    pub defaults: DefaultTable,
    /// Filled in once the kernel's fit function is registered.
    pub fun_type: Option<FunType>,
}

pub struct KernelFunction {
    defaults: DefaultTable,
}

impl KernelFunction {
    pub fn build(def: &KernelDef) -> Result<FunctionDescriptor, AppError> {
        let name = def.kernel_name.as_str();
        let checked = validate::check_new_function(name, &def.param_names, &def.param_units)?;
        def.defaults.check_len(name, checked.params.len())?;
        let norms = norms::detect_norms(name, &checked.params, None)?;
        Ok(FunctionDescriptor::new(
            name,
            checked.params,
            checked.units,
            Category::Additive,
            norms,
            Provenance::Kernel(KernelFunction {
                defaults: def.defaults.clone(),
            }),
        ))
    }
}

impl EvalStrategy for KernelFunction {
    fn param_default(&self, info: &mut ParamInfo) -> Result<(), AppError> {
        self.defaults.apply(info)
    }

    fn bin_eval(
        &self,
        _shape: &FunctionShape,
        values: &mut [f64],
        _grid: &MeasurementGrid,
        _params: &[f64],
    ) -> Result<(), AppError> {
        values.fill(1.0);
        Ok(())
    }
}
