//! Registration pipeline: validate, construct, install, then tell the host.
//!
//! Every path builds a complete [`FunctionDescriptor`] first. Nothing touches
//! the registry until construction has succeeded, so a rejected definition
//! leaves the registry exactly as it was.

use tracing::warn;

use crate::domain::FunType;
use crate::error::AppError;
use crate::registry::{FunctionDescriptor, Registry};

pub mod kernel;
pub mod native;
pub mod norms;
pub mod script;
pub mod validate;

pub use kernel::{KernelDef, KernelFunction};
pub use native::{NativeFunction, SourceInit, UserSource};
pub use script::{ScriptDefault, ScriptDefinition, ScriptFunction};

/// The interactive host's side of registration.
pub trait HostBindings {
    /// Make `name` callable from the host language, dispatching on `fun_type`.
    fn define_wrapper(&mut self, name: &str, fun_type: FunType) -> Result<(), AppError>;
}

/// A host that needs no wrappers (library use, the command-line tool).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl HostBindings for NoHost {
    fn define_wrapper(&mut self, _name: &str, _fun_type: FunType) -> Result<(), AppError> {
        Ok(())
    }
}

/// Append or replace `descriptor`, then ask the host for its wrapper.
///
/// If the host refuses, the function is removed again.
pub fn install(
    registry: &mut Registry,
    host: &mut dyn HostBindings,
    descriptor: FunctionDescriptor,
) -> Result<FunType, AppError> {
    let name = descriptor.name().to_string();
    let fun_type = registry.append_or_replace(descriptor)?;

    if let Err(err) = host.define_wrapper(&name, fun_type) {
        warn!(name = %name, error = %err, "host wrapper failed; removing fit-function");
        registry.remove(&name);
        return Err(AppError::registry(format!("initializing fit-function {name}: {err}")));
    }
    Ok(fun_type)
}

pub fn add_native(
    registry: &mut Registry,
    host: &mut dyn HostBindings,
    name: &str,
    init: &dyn SourceInit,
    options: Option<&str>,
) -> Result<FunType, AppError> {
    let descriptor = NativeFunction::from_init(name, init, options)?;
    install(registry, host, descriptor)
}

pub fn add_script(
    registry: &mut Registry,
    host: &mut dyn HostBindings,
    def: ScriptDefinition,
) -> Result<FunType, AppError> {
    let descriptor = ScriptFunction::build(def)?;
    install(registry, host, descriptor)
}

/// Register a kernel's fit function and record its type id in `def`.
pub fn add_kernel(registry: &mut Registry, host: &mut dyn HostBindings, def: &mut KernelDef) -> Result<FunType, AppError> {
    let descriptor = KernelFunction::build(def)?;
    let fun_type = install(registry, host, descriptor)?;
    def.fun_type = Some(fun_type);
    Ok(fun_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, GridUnits, MeasurementGrid};
    use crate::eval::eval_binned;
    use crate::registry::DefaultTable;
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    struct RefusingHost;

    impl HostBindings for RefusingHost {
        fn define_wrapper(&mut self, _: &str, _: FunType) -> Result<(), AppError> {
            Err(AppError::registry("interpreter said no"))
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        defined: Vec<(String, FunType)>,
    }

    impl HostBindings for RecordingHost {
        fn define_wrapper(&mut self, name: &str, fun_type: FunType) -> Result<(), AppError> {
            self.defined.push((name.to_string(), fun_type));
            Ok(())
        }
    }

    fn gauss() -> ScriptDefinition {
        ScriptDefinition::new("gauss", &["center", "width", "Norm"], |lo: &[f64], _: &[f64], _: &[f64], _: Option<&[f64]>| {
            Ok(vec![1.0; lo.len()])
        })
    }

    #[test]
    fn gauss_scenario() {
        let mut registry = Registry::new();
        let mut host = RecordingHost::default();
        let id = add_script(&mut registry, &mut host, gauss()).unwrap();

        let d = registry.lookup(id).unwrap();
        assert_eq!(d.category(), Category::Additive);
        assert_eq!(d.norm_indexes(), &[2]);
        assert_eq!(host.defined, vec![("gauss".to_string(), id)]);

        let grid = MeasurementGrid::from_edges(&[1.0, 2.0, 3.0], GridUnits::Kev).unwrap();
        let values = eval_binned(&registry, id, &grid, &[1.5, 0.2, 5.0], None).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn gauss_backed_by_an_external_routine_scales_by_norm() {
        let gaussian = crate::foreign::find_builtin("gaussian").unwrap().handle();
        let init = move |_: Option<&str>| -> Result<UserSource, AppError> {
            Ok(UserSource::new(gaussian.clone()).params(&["center", "width", "Norm"]))
        };
        let mut registry = Registry::new();
        let id = add_native(&mut registry, &mut NoHost, "gauss", &init, None).unwrap();
        assert_eq!(registry.lookup(id).unwrap().norm_indexes(), &[2]);

        let grid = MeasurementGrid::from_edges(&[1.0, 2.0, 3.0], GridUnits::Kev).unwrap();
        let scaled = eval_binned(&registry, id, &grid, &[1.5, 0.2, 5.0], None).unwrap();
        let unit = eval_binned(&registry, id, &grid, &[1.5, 0.2, 1.0], None).unwrap();
        assert_eq!(scaled.len(), 2);
        for (s, u) in scaled.iter().zip(&unit) {
            assert_relative_eq!(*s, 5.0 * u, max_relative = 1e-12);
        }
        assert!(unit[0] > unit[1]);
    }

    #[test]
    fn registering_twice_bumps_the_version() {
        let mut registry = Registry::new();
        let first = add_script(&mut registry, &mut NoHost, gauss()).unwrap();
        let second = add_script(&mut registry, &mut NoHost, gauss()).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.lookup(first).unwrap().version(), 2);
    }

    #[test]
    fn redefinition_tears_down_the_old_native_once() {
        let torn = Rc::new(Cell::new(0u32));
        let mut registry = Registry::new();

        let make = |params: &'static [&'static str], torn: Rc<Cell<u32>>| {
            move |_: Option<&str>| -> Result<UserSource, AppError> {
                let torn = Rc::clone(&torn);
                Ok(UserSource::new(
                    |v: &mut [f64], _: &MeasurementGrid, _: &[f64], _: &crate::domain::FunctionShape| -> Result<(), AppError> {
                        v.fill(0.0);
                        Ok(())
                    },
                )
                .params(params)
                .on_exit(move || torn.set(torn.get() + 1)))
            }
        };

        let id = add_native(&mut registry, &mut NoHost, "poly", &make(&["a", "b", "c"], Rc::clone(&torn)), None).unwrap();
        let again = add_native(&mut registry, &mut NoHost, "poly", &make(&["a", "b", "c", "d"], Rc::clone(&torn)), None).unwrap();

        assert_eq!(id, again);
        let d = registry.lookup(id).unwrap();
        assert_eq!(d.version(), 2);
        assert_eq!(d.nparams(), 4);
        assert_eq!(torn.get(), 1);
    }

    #[test]
    fn host_failure_rolls_back_the_install() {
        let mut registry = Registry::new();
        let err = add_script(&mut registry, &mut RefusingHost, gauss()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Registry);
        assert!(registry.type_id_of("gauss").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_names_leave_the_registry_untouched() {
        let mut registry = Registry::new();
        add_script(&mut registry, &mut NoHost, gauss()).unwrap();

        let bad = ScriptDefinition::new("bad name", &["x"], |lo: &[f64], _: &[f64], _: &[f64], _: Option<&[f64]>| {
            Ok(vec![0.0; lo.len()])
        });
        let err = add_script(&mut registry, &mut NoHost, bad).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert_eq!(registry.list_names(), vec!["gauss"]);
        assert_eq!(registry.lookup_name("gauss").unwrap().version(), 1);
    }

    #[test]
    fn kernel_type_id_is_written_back() {
        let mut registry = Registry::new();
        add_script(&mut registry, &mut NoHost, gauss()).unwrap();

        let mut def = KernelDef {
            kernel_name: "pileup".into(),
            param_names: vec!["alpha".into()],
            defaults: DefaultTable {
                value: Some(vec![0.5]),
                ..DefaultTable::default()
            },
            ..KernelDef::default()
        };
        let id = add_kernel(&mut registry, &mut NoHost, &mut def).unwrap();
        assert_eq!(def.fun_type, Some(id));
        assert_eq!(registry.type_id_of("pileup"), Some(id));
    }
}
