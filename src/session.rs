//! One owned bundle of everything a host talks to.
//!
//! The registry, the model-library settings and the host bindings live
//! together here. Hosts (an interpreter, the `fitfun` binary, tests) drive the
//! crate through this type rather than through the pieces.

use std::path::Path;

use tracing::debug;

use crate::config::ModelLibrarySettings;
use crate::domain::{Category, FunType, FunctionInfo, MeasurementGrid, ParamInfo, UserGrid};
use crate::error::AppError;
use crate::eval;
use crate::foreign::{self, Convention, ForeignHandle};
use crate::register::{self, HostBindings, KernelDef, NativeFunction, NoHost, ScriptDefinition, SourceInit, UserSource};
use crate::registry::{DefaultTable, FunctionDescriptor, Registry};

/// How to register an external routine as a fit function.
#[derive(Debug, Clone)]
pub struct RoutineSpec<'a> {
    pub name: &'a str,
    pub category: Category,
    pub param_names: &'a [&'a str],
    pub units: &'a [&'a str],
    pub norm_indexes: Option<Vec<usize>>,
    pub defaults: DefaultTable,
}

pub struct Session {
    registry: Registry,
    settings: ModelLibrarySettings,
    host: Box<dyn HostBindings>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Box::new(NoHost))
    }
}

impl Session {
    pub fn new(host: Box<dyn HostBindings>) -> Self {
        Self {
            registry: Registry::new(),
            settings: ModelLibrarySettings::default(),
            host,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &ModelLibrarySettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ModelLibrarySettings {
        &mut self.settings
    }

    // ---- routine handles ----

    pub fn load_symbol(&self, library: &Path, symbol: &str, convention: Convention) -> Result<ForeignHandle, AppError> {
        foreign::load_symbol(library, symbol, convention)
    }

    /// Handle and host hook name of a statically linked routine.
    pub fn find_builtin(&self, name: &str) -> Result<(ForeignHandle, String), AppError> {
        let routine = foreign::find_builtin(name)
            .ok_or_else(|| AppError::registry(format!("No built-in model routine named {name}.")))?;
        Ok((routine.handle(), routine.hook_name()))
    }

    // ---- registration ----

    /// Register `handle` as a fit function.
    pub fn add_routine(&mut self, handle: ForeignHandle, spec: RoutineSpec<'_>) -> Result<FunType, AppError> {
        let mut source = UserSource::new(handle)
            .params(spec.param_names)
            .units(spec.units)
            .category(spec.category)
            .defaults(spec.defaults);
        if let Some(norms) = spec.norm_indexes {
            source = source.norms(norms);
        }
        let descriptor = NativeFunction::build(spec.name, source)?;
        register::install(&mut self.registry, self.host.as_mut(), descriptor)
    }

    /// Register a built-in routine under its own name with its default table.
    pub fn add_builtin(&mut self, name: &str) -> Result<FunType, AppError> {
        let routine = foreign::find_builtin(name)
            .ok_or_else(|| AppError::registry(format!("No built-in model routine named {name}.")))?;
        let names = routine.param_names();
        let units = routine.units();
        self.add_routine(
            routine.handle(),
            RoutineSpec {
                name: routine.name,
                category: routine.category,
                param_names: &names,
                units: &units,
                norm_indexes: None,
                defaults: routine.defaults(),
            },
        )
    }

    pub fn add_native(&mut self, name: &str, init: &dyn SourceInit, options: Option<&str>) -> Result<FunType, AppError> {
        register::add_native(&mut self.registry, self.host.as_mut(), name, init, options)
    }

    pub fn add_script(&mut self, def: ScriptDefinition) -> Result<FunType, AppError> {
        register::add_script(&mut self.registry, self.host.as_mut(), def)
    }

    pub fn add_kernel(&mut self, def: &mut KernelDef) -> Result<FunType, AppError> {
        register::add_kernel(&mut self.registry, self.host.as_mut(), def)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.registry.remove(name)
    }

    pub fn set_category(&mut self, name: &str, category: Category) -> Result<(), AppError> {
        if self.registry.set_category(name, category) {
            Ok(())
        } else {
            Err(AppError::registry(format!("Fit-function {name} is not defined.")))
        }
    }

    // ---- queries ----

    pub fn list(&self) -> Vec<&FunctionDescriptor> {
        self.registry.iter().collect()
    }

    pub fn type_id_of(&self, name: &str) -> Result<FunType, AppError> {
        self.registry
            .type_id_of(name)
            .ok_or_else(|| AppError::registry(format!("Fit-function {name} is not defined.")))
    }

    pub fn info(&self, name: &str) -> Result<FunctionInfo, AppError> {
        self.registry.function_info(name)
    }

    /// Defaults for parameter `par_name` of `name`.
    pub fn param_default(&self, name: &str, par_name: &str) -> Result<ParamInfo, AppError> {
        let d = self
            .registry
            .lookup_name(name)
            .ok_or_else(|| AppError::registry(format!("Fit-function {name} is not defined.")))?;
        let index = d
            .param_index(par_name)
            .ok_or_else(|| AppError::registry(format!("{name} has no parameter {par_name}.")))?;
        let mut info = ParamInfo::new(d.fun_type(), d.version(), index, par_name);
        d.param_default(&mut info)?;
        Ok(info)
    }

    // ---- evaluation ----

    pub fn eval_binned(
        &self,
        name: &str,
        grid: &MeasurementGrid,
        params: &[f64],
        current: Option<&[f64]>,
    ) -> Result<Vec<f64>, AppError> {
        let fun_type = self.type_id_of(name)?;
        debug!(name, fun_type, "session binned evaluation");
        eval::eval_binned(&self.registry, fun_type, grid, params, current)
    }

    pub fn eval_unbinned(&self, name: &str, grid: &UserGrid, params: &[f64]) -> Result<Vec<f64>, AppError> {
        let fun_type = self.type_id_of(name)?;
        eval::eval_unbinned(&self.registry, fun_type, grid, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GridUnits;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;

    fn kev(edges: &[f64]) -> MeasurementGrid {
        MeasurementGrid::from_edges(edges, GridUnits::Kev).unwrap()
    }

    #[test]
    fn builtin_lookup_returns_hook_name() {
        let s = Session::default();
        let (handle, hook) = s.find_builtin("gaussian").unwrap();
        assert_eq!(handle.convention(), Convention::Double);
        assert_eq!(hook, "_model_add_F_hook");
        assert_eq!(s.find_builtin("nothing").unwrap_err().kind(), ErrorKind::Registry);
    }

    #[test]
    fn builtins_register_with_their_defaults() {
        let mut s = Session::default();
        let pl = s.add_builtin("powerlaw").unwrap();
        let ga = s.add_builtin("gaussian").unwrap();
        assert_eq!((pl, ga), (0, 1));

        let d = s.registry().lookup(ga).unwrap();
        assert_eq!(d.norm_indexes(), &[0]);
        assert_eq!(d.units()[1], "keV");

        let p = s.param_default("gaussian", "LineE").unwrap();
        assert_eq!((p.value, p.min, p.max), (6.5, 0.0, 1.0e6));
        assert!(p.set_minmax);
        assert_eq!(s.info("powerlaw").unwrap().name, vec!["norm", "PhoIndex"]);
    }

    #[test]
    fn every_builtin_evaluates_through_the_session() {
        let mut s = Session::default();
        for r in foreign::BUILTIN_ROUTINES {
            s.add_builtin(r.name).unwrap();
        }
        let grid = kev(&[1.0, 2.0, 4.0]);

        let pl = s.eval_binned("powerlaw", &grid, &[1.0, 2.0], None).unwrap();
        assert_relative_eq!(pl[0], 0.5, max_relative = 1e-6);

        let c = s.eval_binned("constant", &grid, &[0.5], None).unwrap();
        assert_relative_eq!(c[1], 0.5, max_relative = 1e-6);

        let sc = s.eval_binned("scale", &grid, &[3.0], Some(&[1.0, 2.0])).unwrap();
        assert_relative_eq!(sc[1], 6.0, max_relative = 1e-12);
    }

    #[test]
    fn routine_spec_overrides_norm_detection() {
        let mut s = Session::default();
        let (handle, _) = s.find_builtin("gaussian").unwrap();
        let id = s
            .add_routine(
                handle,
                RoutineSpec {
                    name: "line",
                    category: Category::Additive,
                    param_names: &["amp", "center", "width"],
                    units: &["", "keV", "keV"],
                    norm_indexes: Some(vec![0]),
                    defaults: DefaultTable::default(),
                },
            )
            .unwrap();
        assert_eq!(s.registry().lookup(id).unwrap().norm_indexes(), &[0]);
        let out = s.eval_binned("line", &kev(&[6.0, 6.5, 7.0]), &[2.0, 6.5, 0.1], None).unwrap();
        assert_relative_eq!(out[0] + out[1], 2.0, max_relative = 1e-5);
    }

    #[test]
    fn remove_and_category_change() {
        let mut s = Session::default();
        s.add_builtin("constant").unwrap();
        s.set_category("constant", Category::Additive).unwrap();
        assert_eq!(s.list()[0].category(), Category::Additive);
        assert!(s.set_category("ghost", Category::Additive).is_err());
        assert!(s.remove("constant"));
        assert!(s.list().is_empty());
        assert!(s.eval_binned("constant", &kev(&[1.0, 2.0]), &[1.0], None).is_err());
    }
}
