//! A registered fit function.

use tracing::trace;

use crate::domain::{Category, FunType, FunctionShape, MeasurementGrid, ParamInfo, ProvenanceKind, RESERVED_FUN_TYPE, UserGrid};
use crate::error::AppError;
use crate::registry::provenance::Provenance;

/// Name, parameter table, identity and behaviour of one fit function.
///
/// A descriptor is built complete and only then handed to the registry,
/// which assigns its type id and version. Dropping it runs the provenance's
/// teardown, so each descriptor is torn down exactly once.
#[derive(Debug)]
pub struct FunctionDescriptor {
    shape: FunctionShape,
    param_names: Vec<String>,
    units: Vec<String>,
    fun_type: FunType,
    version: u32,
    provenance: Provenance,
}

impl FunctionDescriptor {
    /// Names are expected to be validated already (see `register::validate`).
    pub fn new(
        name: impl Into<String>,
        param_names: Vec<String>,
        units: Vec<String>,
        category: Category,
        norm_indexes: Vec<usize>,
        provenance: Provenance,
    ) -> Self {
        let shape = FunctionShape {
            name: name.into(),
            nparams: param_names.len(),
            category,
            norm_indexes,
        };
        Self {
            shape,
            param_names,
            units,
            fun_type: RESERVED_FUN_TYPE,
            version: 1,
            provenance,
        }
    }

    pub fn name(&self) -> &str {
        &self.shape.name
    }

    pub fn shape(&self) -> &FunctionShape {
        &self.shape
    }

    pub fn nparams(&self) -> usize {
        self.shape.nparams
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn fun_type(&self) -> FunType {
        self.fun_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn category(&self) -> Category {
        self.shape.category
    }

    pub fn norm_indexes(&self) -> &[usize] {
        &self.shape.norm_indexes
    }

    pub fn provenance_kind(&self) -> ProvenanceKind {
        self.provenance.kind()
    }

    pub(crate) fn assign_identity(&mut self, fun_type: FunType, version: u32) {
        self.fun_type = fun_type;
        self.version = version;
    }

    pub(crate) fn set_category(&mut self, category: Category) {
        self.shape.category = category;
    }

    /// Index of the parameter called `par_name`, if any.
    pub fn param_index(&self, par_name: &str) -> Option<usize> {
        self.param_names.iter().position(|p| p == par_name)
    }

    pub fn param_default(&self, info: &mut ParamInfo) -> Result<(), AppError> {
        self.provenance.strategy().param_default(info)
    }

    pub fn bin_eval(&self, values: &mut [f64], grid: &MeasurementGrid, params: &[f64]) -> Result<(), AppError> {
        self.provenance.strategy().bin_eval(&self.shape, values, grid, params)
    }

    pub fn diff_eval(&self, grid: &UserGrid, params: &[f64]) -> Result<Vec<f64>, AppError> {
        self.provenance.strategy().diff_eval(&self.shape, grid, params)
    }
}

impl Drop for FunctionDescriptor {
    fn drop(&mut self) {
        trace!(name = %self.shape.name, fun_type = self.fun_type, version = self.version, "tearing down");
        self.provenance.strategy_mut().teardown();
    }
}
