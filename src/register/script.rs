//! Script-defined functions.
//!
//! The host's interpreter hands over callables. The binned callable sees the
//! noticed bins as separate lower/upper edge arrays plus the parameters, and
//! for convolution functions also the current spectrum.

use crate::domain::{Category, FunctionShape, MeasurementGrid, ParamInfo, UserGrid};
use crate::error::AppError;
use crate::register::{norms, validate};
use crate::registry::{EvalStrategy, FunctionDescriptor, Provenance, unsupported};

/// `(lo, hi, params, current) -> values`
pub type ScriptBinned = Box<dyn Fn(&[f64], &[f64], &[f64], Option<&[f64]>) -> Result<Vec<f64>, AppError>>;

/// `(x, params) -> values`
pub type ScriptUnbinned = Box<dyn Fn(&[f64], &[f64]) -> Result<Vec<f64>, AppError>>;

/// `parameter index -> default`
pub type ScriptDefaults = Box<dyn Fn(usize) -> Result<ScriptDefault, AppError>>;

/// What a script default callable returns for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScriptDefault {
    pub value: f64,
    pub freeze: bool,
    /// `None` leaves the lower limit unset.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub struct ScriptDefinition {
    pub name: String,
    pub param_names: Vec<String>,
    pub units: Vec<String>,
    pub norm_indexes: Option<Vec<usize>>,
    pub category: Category,
    pub binned: ScriptBinned,
    pub unbinned: Option<ScriptUnbinned>,
    pub defaults: Option<ScriptDefaults>,
}

impl ScriptDefinition {
    pub fn new(
        name: impl Into<String>,
        param_names: &[&str],
        binned: impl Fn(&[f64], &[f64], &[f64], Option<&[f64]>) -> Result<Vec<f64>, AppError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            param_names: param_names.iter().map(|s| s.to_string()).collect(),
            units: Vec::new(),
            norm_indexes: None,
            category: Category::Additive,
            binned: Box::new(binned),
            unbinned: None,
            defaults: None,
        }
    }

    pub fn units(mut self, units: &[&str]) -> Self {
        self.units = units.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn norms(mut self, indexes: Vec<usize>) -> Self {
        self.norm_indexes = Some(indexes);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn unbinned(mut self, f: impl Fn(&[f64], &[f64]) -> Result<Vec<f64>, AppError> + 'static) -> Self {
        self.unbinned = Some(Box::new(f));
        self
    }

    pub fn defaults(mut self, f: impl Fn(usize) -> Result<ScriptDefault, AppError> + 'static) -> Self {
        self.defaults = Some(Box::new(f));
        self
    }
}

pub struct ScriptFunction {
    binned: ScriptBinned,
    unbinned: Option<ScriptUnbinned>,
    defaults: Option<ScriptDefaults>,
}

impl ScriptFunction {
    pub fn build(def: ScriptDefinition) -> Result<FunctionDescriptor, AppError> {
        let checked = validate::check_new_function(&def.name, &def.param_names, &def.units)?;
        let norms = norms::detect_norms(&def.name, &checked.params, def.norm_indexes.as_deref())?;
        let function = ScriptFunction {
            binned: def.binned,
            unbinned: def.unbinned,
            defaults: def.defaults,
        };
        Ok(FunctionDescriptor::new(
            def.name,
            checked.params,
            checked.units,
            def.category,
            norms,
            Provenance::Script(function),
        ))
    }
}

impl EvalStrategy for ScriptFunction {
    fn param_default(&self, info: &mut ParamInfo) -> Result<(), AppError> {
        // No callable: keep whatever the caller started with.
        let Some(defaults) = &self.defaults else {
            return Ok(());
        };
        let d = defaults(info.fun_par)?;

        info.value = d.value;
        info.freeze = d.freeze;
        if let Some(min) = d.min {
            info.min = min;
        }
        if let Some(max) = d.max {
            info.max = max;
        }
        if d.min.is_some() || d.max.is_some() {
            info.set_minmax = true;
        }
        if d.min.is_some() && d.max.is_some() && info.min > info.max {
            std::mem::swap(&mut info.min, &mut info.max);
        }
        Ok(())
    }

    fn bin_eval(
        &self,
        shape: &FunctionShape,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
    ) -> Result<(), AppError> {
        let lo = grid.noticed_lo();
        let hi = grid.noticed_hi();
        let current = (shape.category == Category::Convolution).then_some(&*values);
        let out = (self.binned)(&lo, &hi, params, current)?;

        if out.len() != values.len() {
            return Err(AppError::eval(format!(
                "{} returned {} values for {} noticed bins.",
                shape.name,
                out.len(),
                values.len()
            )));
        }
        values.copy_from_slice(&out);
        Ok(())
    }

    fn diff_eval(&self, shape: &FunctionShape, grid: &UserGrid, params: &[f64]) -> Result<Vec<f64>, AppError> {
        let f = self.unbinned.as_ref().ok_or_else(|| unsupported(shape))?;
        let out = f(&grid.x, params)?;
        if out.len() != grid.npts() {
            return Err(AppError::eval(format!(
                "{} returned {} values for {} points.",
                shape.name,
                out.len(),
                grid.npts()
            )));
        }
        Ok(out)
    }
}
