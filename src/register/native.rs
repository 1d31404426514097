//! Native functions: Rust code that describes itself on request.
//!
//! A [`SourceInit`] plays the part of a model library's init hook. Asked
//! (optionally with an option string) to describe itself, it returns a
//! [`UserSource`] carrying the binned routine, the parameter table and the
//! optional extras.

use crate::domain::{Category, FunctionShape, MeasurementGrid, ParamInfo, UserGrid};
use crate::error::AppError;
use crate::register::{norms, validate};
use crate::registry::{BinnedRoutine, DefaultTable, EvalStrategy, FunctionDescriptor, Provenance, UnbinnedRoutine};

/// Everything a native function tells the registry about itself.
pub struct UserSource {
    pub binned: Box<dyn BinnedRoutine>,
    pub unbinned: Option<UnbinnedRoutine>,
    pub parameter_names: Vec<String>,
    pub parameter_units: Vec<String>,
    /// `None`: count names up to the first empty one.
    pub num_parameters: Option<usize>,
    pub defaults: DefaultTable,
    pub category: Category,
    pub norm_indexes: Option<Vec<usize>>,
    /// Runs once when the function is torn down.
    pub function_exit: Option<Box<dyn FnOnce()>>,
}

impl UserSource {
    pub fn new(binned: impl BinnedRoutine + 'static) -> Self {
        Self {
            binned: Box::new(binned),
            unbinned: None,
            parameter_names: Vec::new(),
            parameter_units: Vec::new(),
            num_parameters: None,
            defaults: DefaultTable::default(),
            category: Category::Additive,
            norm_indexes: None,
            function_exit: None,
        }
    }

    pub fn params(mut self, names: &[&str]) -> Self {
        self.parameter_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn units(mut self, units: &[&str]) -> Self {
        self.parameter_units = units.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn num_parameters(mut self, n: usize) -> Self {
        self.num_parameters = Some(n);
        self
    }

    pub fn defaults(mut self, defaults: DefaultTable) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn norms(mut self, indexes: Vec<usize>) -> Self {
        self.norm_indexes = Some(indexes);
        self
    }

    pub fn unbinned(mut self, f: impl Fn(&UserGrid, &[f64]) -> Result<Vec<f64>, AppError> + 'static) -> Self {
        self.unbinned = Some(Box::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl FnOnce() + 'static) -> Self {
        self.function_exit = Some(Box::new(f));
        self
    }
}

/// Produces a [`UserSource`] on demand.
pub trait SourceInit {
    fn describe(&self, options: Option<&str>) -> Result<UserSource, AppError>;
}

impl<F> SourceInit for F
where
    F: Fn(Option<&str>) -> Result<UserSource, AppError>,
{
    fn describe(&self, options: Option<&str>) -> Result<UserSource, AppError> {
        self(options)
    }
}

pub struct NativeFunction {
    binned: Box<dyn BinnedRoutine>,
    unbinned: Option<UnbinnedRoutine>,
    defaults: DefaultTable,
    function_exit: Option<Box<dyn FnOnce()>>,
}

impl NativeFunction {
    /// Validate `source` and wrap it in a descriptor named `name`.
    ///
    /// On failure the source's exit hook still runs.
    pub fn build(name: &str, source: UserSource) -> Result<FunctionDescriptor, AppError> {
        let UserSource {
            binned,
            unbinned,
            mut parameter_names,
            parameter_units,
            num_parameters,
            defaults,
            category,
            norm_indexes,
            function_exit,
        } = source;

        let mut native = NativeFunction {
            binned,
            unbinned,
            defaults,
            function_exit,
        };

        let checked = (|| -> Result<(validate::CheckedNames, Vec<usize>), AppError> {
            let nparams = num_parameters.unwrap_or_else(|| parameter_names.iter().take_while(|n| !n.is_empty()).count());
            if nparams > parameter_names.len() {
                return Err(AppError::config(format!(
                    "{name} definition:  {nparams} parameters declared but {} names given",
                    parameter_names.len()
                )));
            }
            parameter_names.truncate(nparams);
            let units: Vec<String> = parameter_units.into_iter().take(nparams).collect();

            let checked = validate::check_new_function(name, &parameter_names, &units)?;
            native.defaults.check_len(name, checked.params.len())?;
            let norms = norms::detect_norms(name, &checked.params, norm_indexes.as_deref())?;
            Ok((checked, norms))
        })();

        match checked {
            Ok((checked, norms)) => Ok(FunctionDescriptor::new(
                name,
                checked.params,
                checked.units,
                category,
                norms,
                Provenance::Native(native),
            )),
            Err(err) => {
                native.teardown();
                Err(err)
            }
        }
    }

    /// Ask `init` to describe itself, then [`build`](Self::build).
    pub fn from_init(name: &str, init: &dyn SourceInit, options: Option<&str>) -> Result<FunctionDescriptor, AppError> {
        let source = init.describe(options)?;
        Self::build(name, source)
    }
}

impl EvalStrategy for NativeFunction {
    fn param_default(&self, info: &mut ParamInfo) -> Result<(), AppError> {
        self.defaults.apply(info)
    }

    fn bin_eval(
        &self,
        shape: &FunctionShape,
        values: &mut [f64],
        grid: &MeasurementGrid,
        params: &[f64],
    ) -> Result<(), AppError> {
        self.binned.eval(values, grid, params, shape)
    }

    fn diff_eval(&self, shape: &FunctionShape, grid: &UserGrid, params: &[f64]) -> Result<Vec<f64>, AppError> {
        match &self.unbinned {
            Some(f) => f(grid, params),
            None => Err(crate::registry::unsupported(shape)),
        }
    }

    fn teardown(&mut self) {
        if let Some(exit) = self.function_exit.take() {
            exit();
        }
    }
}
