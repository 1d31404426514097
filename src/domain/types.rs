//! Shared domain types.
//!
//! These are deliberately plain data so they can be:
//!
//! - built by the host (or the CSV ingest) and handed to the core read-only
//! - printed by the report layer
//! - exported to JSON

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Stable integer identifying a registered function across redefinitions.
pub type FunType = u32;

/// Never handed out by the registry.
pub const RESERVED_FUN_TYPE: FunType = u32::MAX;

/// Evaluation semantics of a fit function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Produces an independent spectrum (usually scaled by a norm parameter).
    Additive,
    /// Scales an existing spectrum.
    Multiplicative,
    /// Transforms an existing spectrum; needs the currently accumulated values.
    Convolution,
}

impl Category {
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Additive => "add",
            Category::Multiplicative => "mul",
            Category::Convolution => "con",
        }
    }
}

/// Unit system of a measurement grid's bin edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GridUnits {
    /// Wavelength in Angstrom (ascending wavelength = descending energy).
    #[default]
    Angstrom,
    /// Energy in keV, already in the external routines' convention.
    Kev,
}

/// Where a descriptor's behaviour comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceKind {
    Native,
    Script,
    Kernel,
}

/// The parts of a descriptor an evaluation strategy may need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionShape {
    pub name: String,
    pub nparams: usize,
    pub category: Category,
    /// Parameter indices that act as normalizations (additive functions only).
    pub norm_indexes: Vec<usize>,
}

impl FunctionShape {
    /// The parameter whose value scales an external additive routine's output.
    pub fn norm_index(&self) -> Option<usize> {
        match self.category {
            Category::Additive => self.norm_indexes.first().copied(),
            _ => None,
        }
    }
}

/// A binned measurement grid as owned by the fitting engine.
///
/// Invariants (checked by [`MeasurementGrid::new`]):
/// - `bin_lo.len() == bin_hi.len()`
/// - `notice_list` is strictly increasing and every entry indexes a bin
/// - `bin_lo[i] <= bin_hi[i]` for every bin
/// - for adjacent noticed bins `n0, n1`: `bin_hi[n0] <= bin_lo[n1]`
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementGrid {
    bin_lo: Vec<f64>,
    bin_hi: Vec<f64>,
    notice_list: Vec<usize>,
    units: GridUnits,
}

impl MeasurementGrid {
    pub fn new(
        bin_lo: Vec<f64>,
        bin_hi: Vec<f64>,
        notice_list: Vec<usize>,
        units: GridUnits,
    ) -> Result<Self, AppError> {
        if bin_lo.len() != bin_hi.len() {
            return Err(AppError::grid(format!(
                "Inconsistent array sizes: {} lower edges vs {} upper edges.",
                bin_lo.len(),
                bin_hi.len()
            )));
        }
        let nbins = bin_lo.len();
        for (pos, &idx) in notice_list.iter().enumerate() {
            if idx >= nbins {
                return Err(AppError::grid(format!(
                    "Noticed bin {idx} is out of range (grid has {nbins} bins)."
                )));
            }
            if pos > 0 && notice_list[pos - 1] >= idx {
                return Err(AppError::grid("Noticed bin list must be strictly increasing."));
            }
        }
        for (i, (lo, hi)) in bin_lo.iter().zip(&bin_hi).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(AppError::grid(format!("Bin {i} has lower edge {lo} above upper edge {hi}.")));
            }
        }
        for pair in notice_list.windows(2) {
            let (n0, n1) = (pair[0], pair[1]);
            if bin_lo[n1] < bin_hi[n0] {
                return Err(AppError::grid(format!(
                    "Noticed bins {n0} and {n1} overlap or are out of order: {} < {}.",
                    bin_lo[n1], bin_hi[n0]
                )));
            }
        }
        Ok(Self {
            bin_lo,
            bin_hi,
            notice_list,
            units,
        })
    }

    /// Grid with every bin noticed.
    pub fn all_noticed(bin_lo: Vec<f64>, bin_hi: Vec<f64>, units: GridUnits) -> Result<Self, AppError> {
        let notice_list = (0..bin_lo.len()).collect();
        Self::new(bin_lo, bin_hi, notice_list, units)
    }

    /// Grid whose noticed bins are given by a boolean mask.
    pub fn from_mask(
        bin_lo: Vec<f64>,
        bin_hi: Vec<f64>,
        notice: &[bool],
        units: GridUnits,
    ) -> Result<Self, AppError> {
        if notice.len() != bin_lo.len() {
            return Err(AppError::grid(format!(
                "Notice mask has {} entries but the grid has {} bins.",
                notice.len(),
                bin_lo.len()
            )));
        }
        let notice_list = notice
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
            .collect();
        Self::new(bin_lo, bin_hi, notice_list, units)
    }

    /// Contiguous grid from `n + 1` edges, every bin noticed.
    pub fn from_edges(edges: &[f64], units: GridUnits) -> Result<Self, AppError> {
        if edges.len() < 2 {
            return Err(AppError::grid("At least two edges are needed to form a bin."));
        }
        let lo = edges[..edges.len() - 1].to_vec();
        let hi = edges[1..].to_vec();
        Self::all_noticed(lo, hi, units)
    }

    pub fn nbins(&self) -> usize {
        self.bin_lo.len()
    }

    pub fn n_notice(&self) -> usize {
        self.notice_list.len()
    }

    pub fn bin_lo(&self) -> &[f64] {
        &self.bin_lo
    }

    pub fn bin_hi(&self) -> &[f64] {
        &self.bin_hi
    }

    pub fn notice_list(&self) -> &[usize] {
        &self.notice_list
    }

    pub fn units(&self) -> GridUnits {
        self.units
    }

    /// Lower edges of the noticed bins, in notice order.
    pub fn noticed_lo(&self) -> Vec<f64> {
        self.notice_list.iter().map(|&i| self.bin_lo[i]).collect()
    }

    /// Upper edges of the noticed bins, in notice order.
    pub fn noticed_hi(&self) -> Vec<f64> {
        self.notice_list.iter().map(|&i| self.bin_hi[i]).collect()
    }
}

/// Points for unbinned (differential) evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserGrid {
    pub x: Vec<f64>,
}

impl UserGrid {
    pub fn new(x: Vec<f64>) -> Self {
        Self { x }
    }

    pub fn npts(&self) -> usize {
        self.x.len()
    }
}

/// Default settings for one parameter of one function.
///
/// The registry fills this through the descriptor's default strategy; the
/// fitting engine owns it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub fun_type: FunType,
    pub fun_version: u32,
    /// Index of the parameter within its function.
    pub fun_par: usize,
    pub param_name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub freeze: bool,
    /// True once a default strategy supplied a min and/or max.
    pub set_minmax: bool,
}

impl ParamInfo {
    pub fn new(fun_type: FunType, fun_version: u32, fun_par: usize, param_name: impl Into<String>) -> Self {
        Self {
            fun_type,
            fun_version,
            fun_par,
            param_name: param_name.into(),
            value: 0.0,
            min: 0.0,
            max: 0.0,
            freeze: false,
            set_minmax: false,
        }
    }
}

/// Parameter table of one registered function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: Vec<String>,
    pub unit: Vec<String>,
    pub value: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub freeze: Vec<bool>,
}

impl FunctionInfo {
    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_edge_arrays() {
        let err = MeasurementGrid::all_noticed(vec![1.0, 2.0], vec![2.0], GridUnits::Angstrom).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Grid);
    }

    #[test]
    fn rejects_unsorted_notice_list() {
        let lo = vec![1.0, 2.0, 3.0];
        let hi = vec![2.0, 3.0, 4.0];
        assert!(MeasurementGrid::new(lo.clone(), hi.clone(), vec![2, 1], GridUnits::Angstrom).is_err());
        assert!(MeasurementGrid::new(lo.clone(), hi.clone(), vec![1, 1], GridUnits::Angstrom).is_err());
        assert!(MeasurementGrid::new(lo, hi, vec![0, 3], GridUnits::Angstrom).is_err());
    }

    #[test]
    fn rejects_inverted_bin() {
        let err = MeasurementGrid::new(vec![2.0], vec![1.0], vec![0], GridUnits::Kev).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Grid);
        assert!(MeasurementGrid::new(vec![f64::NAN], vec![1.0], vec![0], GridUnits::Kev).is_err());
        assert!(MeasurementGrid::new(vec![1.0], vec![1.0], vec![0], GridUnits::Kev).is_ok());
    }

    #[test]
    fn rejects_noticed_bins_in_descending_order() {
        let err = MeasurementGrid::all_noticed(vec![3.0, 2.0, 1.0], vec![4.0, 3.0, 2.0], GridUnits::Kev).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Grid);
        assert!(MeasurementGrid::all_noticed(vec![1.0, 1.5], vec![2.0, 3.0], GridUnits::Kev).is_err());
        // An ignored bin between them does not count.
        assert!(MeasurementGrid::new(vec![1.0, 0.0, 3.0], vec![2.0, 0.5, 4.0], vec![0, 2], GridUnits::Kev).is_ok());
    }

    #[test]
    fn mask_selects_noticed_bins() {
        let g = MeasurementGrid::from_mask(
            vec![1.0, 2.0, 3.0],
            vec![2.0, 3.0, 4.0],
            &[true, false, true],
            GridUnits::Angstrom,
        )
        .unwrap();
        assert_eq!(g.notice_list(), &[0, 2]);
        assert_eq!(g.noticed_lo(), vec![1.0, 3.0]);
        assert_eq!(g.noticed_hi(), vec![2.0, 4.0]);
    }

    #[test]
    fn edges_build_contiguous_bins() {
        let g = MeasurementGrid::from_edges(&[1.0, 2.0, 3.0], GridUnits::Kev).unwrap();
        assert_eq!(g.nbins(), 2);
        assert_eq!(g.n_notice(), 2);
        assert_eq!(g.bin_hi(), &[2.0, 3.0]);
    }
}
