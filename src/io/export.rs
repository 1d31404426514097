//! Export evaluation results (CSV) and parameter tables (JSON).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, FunType, FunctionInfo, MeasurementGrid, ProvenanceKind};
use crate::error::AppError;
use crate::registry::FunctionDescriptor;

/// JSON document written by `fitfun info --json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfoFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub name: String,
    pub fun_type: FunType,
    pub version: u32,
    pub category: Category,
    pub provenance: ProvenanceKind,
    pub norm_indexes: Vec<usize>,
    pub params: FunctionInfo,
}

impl FunctionInfoFile {
    pub fn new(descriptor: &FunctionDescriptor, params: FunctionInfo) -> Self {
        Self {
            tool: "fitfun".to_string(),
            generated: Utc::now(),
            name: descriptor.name().to_string(),
            fun_type: descriptor.fun_type(),
            version: descriptor.version(),
            category: descriptor.category(),
            provenance: descriptor.provenance_kind(),
            norm_indexes: descriptor.norm_indexes().to_vec(),
            params,
        }
    }
}

pub fn to_json(file: &FunctionInfoFile) -> Result<String, AppError> {
    serde_json::to_string_pretty(file).map_err(|e| AppError::io(format!("Failed to encode JSON: {e}")))
}

pub fn write_function_info_json(path: &Path, file: &FunctionInfoFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create info JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file).map_err(|e| AppError::io(format!("Failed to write info JSON: {e}")))
}

pub fn read_function_info_json(path: &Path) -> Result<FunctionInfoFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open info JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::io(format!("Invalid info JSON: {e}")))
}

/// One row per noticed bin: grid index, edges, value.
pub fn write_eval_csv(path: &Path, name: &str, grid: &MeasurementGrid, values: &[f64]) -> Result<(), AppError> {
    if values.len() != grid.n_notice() {
        return Err(AppError::eval(format!(
            "{} values for {} noticed bins.",
            values.len(),
            grid.n_notice()
        )));
    }

    let mut file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "function,bin,bin_lo,bin_hi,value")
        .map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;

    for (&bin, value) in grid.notice_list().iter().zip(values) {
        writeln!(
            file,
            "{name},{bin},{:.10},{:.10},{:.10e}",
            grid.bin_lo()[bin],
            grid.bin_hi()[bin],
            value
        )
        .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}
