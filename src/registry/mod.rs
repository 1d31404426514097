//! The fit-function registry.
//!
//! Functions are kept in an ordered map keyed by type id, plus a name index.
//! Type ids grow monotonically, so map order is registration order, and a
//! redefinition keeps its id and therefore its position.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::domain::{Category, FunType, FunctionInfo, ParamInfo, RESERVED_FUN_TYPE};
use crate::error::AppError;

pub mod descriptor;
pub mod provenance;

pub use descriptor::FunctionDescriptor;
pub use provenance::{BinnedRoutine, DefaultTable, EvalStrategy, Provenance, UnbinnedRoutine, unsupported};

#[derive(Debug, Default)]
pub struct Registry {
    functions: BTreeMap<FunType, FunctionDescriptor>,
    by_name: HashMap<String, FunType>,
    /// Next id to hand out. Never decreases, so ids are never reused.
    next_type: FunType,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn lookup(&self, fun_type: FunType) -> Option<&FunctionDescriptor> {
        self.functions.get(&fun_type)
    }

    pub fn lookup_name(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.type_id_of(name).and_then(|id| self.functions.get(&id))
    }

    pub fn type_id_of(&self, name: &str) -> Option<FunType> {
        self.by_name.get(name).copied()
    }

    /// Install `descriptor`, replacing any function of the same name.
    ///
    /// A replacement inherits the old type id and position with the version
    /// bumped; the old descriptor is torn down. A new name gets a fresh id at
    /// the tail.
    pub fn append_or_replace(&mut self, mut descriptor: FunctionDescriptor) -> Result<FunType, AppError> {
        let name = descriptor.name().to_string();

        if let Some(&fun_type) = self.by_name.get(&name) {
            let version = self
                .functions
                .get(&fun_type)
                .map(|old| old.version() + 1)
                .ok_or_else(|| AppError::registry(format!("Registry index is stale for {name}.")))?;
            descriptor.assign_identity(fun_type, version);
            // The previous descriptor drops here, running its teardown.
            let _old = self.functions.insert(fun_type, descriptor);
            info!(name = %name, fun_type, version, "redefined fit-function");
            return Ok(fun_type);
        }

        let fun_type = self.next_type;
        if fun_type == RESERVED_FUN_TYPE {
            return Err(AppError::registry("Fit-function table is full."));
        }
        self.next_type += 1;

        descriptor.assign_identity(fun_type, 1);
        self.functions.insert(fun_type, descriptor);
        self.by_name.insert(name.clone(), fun_type);
        info!(name = %name, fun_type, "added fit-function");
        Ok(fun_type)
    }

    /// Tear down and forget `name`. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(fun_type) = self.by_name.remove(name) else {
            return false;
        };
        let removed = self.functions.remove(&fun_type).is_some();
        debug!(name, fun_type, "removed fit-function");
        removed
    }

    /// Registered names in registration order.
    pub fn list_names(&self) -> Vec<&str> {
        self.functions.values().map(FunctionDescriptor::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values()
    }

    /// Change the category of `name`. Unknown names are ignored.
    pub fn set_category(&mut self, name: &str, category: Category) -> bool {
        let Some(fun_type) = self.type_id_of(name) else {
            return false;
        };
        match self.functions.get_mut(&fun_type) {
            Some(d) => {
                d.set_category(category);
                debug!(name, category = category.display_name(), "set category");
                true
            }
            None => false,
        }
    }

    pub fn param_index(&self, fun_type: FunType, par_name: &str) -> Option<usize> {
        self.lookup(fun_type).and_then(|d| d.param_index(par_name))
    }

    /// Fill `info` from the default strategy of the function it refers to.
    pub fn param_default(&self, info: &mut ParamInfo) -> Result<(), AppError> {
        let d = self
            .lookup(info.fun_type)
            .ok_or_else(|| AppError::registry(format!("Unknown fit-function type {}.", info.fun_type)))?;
        d.param_default(info)
    }

    /// Default table for every parameter of `name`.
    pub fn function_info(&self, name: &str) -> Result<FunctionInfo, AppError> {
        let d = self
            .lookup_name(name)
            .ok_or_else(|| AppError::registry(format!("Fit-function {name} is not defined.")))?;

        let mut out = FunctionInfo::default();
        for (i, (par_name, unit)) in d.param_names().iter().zip(d.units()).enumerate() {
            let mut p = ParamInfo::new(d.fun_type(), d.version(), i, par_name.clone());
            d.param_default(&mut p)?;
            out.name.push(p.param_name);
            out.unit.push(unit.clone());
            out.value.push(p.value);
            out.min.push(p.min);
            out.max.push(p.max);
            out.freeze.push(p.freeze);
        }
        Ok(out)
    }
}
