//! Reporting utilities: evaluation summaries.

use crate::domain::MeasurementGrid;
use crate::error::AppError;

pub mod format;

/// Headline numbers of one binned evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSummary {
    pub n_notice: usize,
    pub total: f64,
    /// Grid index and value of the largest bin.
    pub peak: (usize, f64),
}

/// Summarize `values` (one per noticed bin of `grid`).
pub fn summarize(grid: &MeasurementGrid, values: &[f64]) -> Result<EvalSummary, AppError> {
    if values.len() != grid.n_notice() {
        return Err(AppError::eval(format!(
            "{} values for {} noticed bins.",
            values.len(),
            grid.n_notice()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::eval("Non-finite model value in evaluation result."));
    }

    let peak = grid
        .notice_list()
        .iter()
        .zip(values)
        .map(|(&bin, &v)| (bin, v))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| AppError::grid("No noticed bins."))?;

    Ok(EvalSummary {
        n_notice: values.len(),
        total: values.iter().sum(),
        peak,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GridUnits;

    #[test]
    fn peak_is_reported_by_grid_index() {
        let grid = MeasurementGrid::new(vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0], vec![1, 2], GridUnits::Kev).unwrap();
        let s = summarize(&grid, &[0.25, 0.75]).unwrap();
        assert_eq!(s.peak, (2, 0.75));
        assert_eq!(s.total, 1.0);
    }

    #[test]
    fn rejects_non_finite_and_mismatched_values() {
        let grid = MeasurementGrid::from_edges(&[1.0, 2.0, 3.0], GridUnits::Kev).unwrap();
        assert!(summarize(&grid, &[1.0, f64::NAN]).is_err());
        assert!(summarize(&grid, &[1.0]).is_err());
    }
}
