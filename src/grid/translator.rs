//! Gapped measurement grid -> contiguous external grid.
//!
//! A measurement grid may have holes in it (ignored bins, bins outside the
//! noticed range), but external model routines need one contiguous ascending
//! edge array in keV. We therefore build a hole-free grid spanning the full
//! noticed range and remember which synthetic bins correspond to real noticed
//! bins (the keep mask). Gaps become extra synthetic bins that are evaluated
//! and then thrown away.
//!
//! Wavelength grids are ascending in Angstrom, i.e. descending in energy, so
//! the synthetic grid is written back to front.

use crate::domain::{GridUnits, MeasurementGrid};
use crate::error::AppError;
use crate::math::{Precision, angstrom_to_kev};

/// Relative tolerance for deciding whether two neighbouring bins touch.
///
/// This is `10 * FLT_MIN` for both precisions; see DESIGN.md.
pub const EDGE_TOLERANCE: f64 = 10.0 * (f32::MIN_POSITIVE as f64);

/// Contiguous edge array plus keep mask, in the external unit system.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticGrid<T> {
    edges: Vec<T>,
    keep: Vec<bool>,
    reversed: bool,
}

/// True when the upper edge of one bin and the lower edge of the next match
/// within [`EDGE_TOLERANCE`].
pub fn edges_touch(hi_prev: f64, lo_next: f64) -> bool {
    let diff = (lo_next - hi_prev).abs();
    let avg = 0.5 * (lo_next + hi_prev).abs();
    diff < EDGE_TOLERANCE * avg
}

/// Number of synthetic bins needed for `grid`: one for the first noticed bin,
/// plus one (touching) or two (gap) per adjacent noticed pair.
pub fn count_synthetic_bins(grid: &MeasurementGrid) -> Result<usize, AppError> {
    if grid.nbins() == 0 {
        return Err(AppError::grid("Measurement grid is empty."));
    }
    if grid.n_notice() == 0 {
        return Err(AppError::grid("No noticed bins."));
    }

    let lo = grid.bin_lo();
    let hi = grid.bin_hi();
    let nbins = grid
        .notice_list()
        .windows(2)
        .map(|pair| if edges_touch(hi[pair[0]], lo[pair[1]]) { 1 } else { 2 })
        .sum::<usize>()
        + 1;
    Ok(nbins)
}

fn to_external(value: f64, units: GridUnits) -> f64 {
    match units {
        GridUnits::Angstrom => angstrom_to_kev(value),
        GridUnits::Kev => value,
    }
}

impl<T: Precision> SyntheticGrid<T> {
    /// Translate the noticed part of `grid`.
    pub fn build(grid: &MeasurementGrid) -> Result<Self, AppError> {
        let nbins = count_synthetic_bins(grid)?;
        let units = grid.units();
        let lo = grid.bin_lo();
        let hi = grid.bin_hi();
        let notice = grid.notice_list();

        let mut out = Self {
            edges: vec![T::zero(); nbins + 1],
            keep: vec![false; nbins],
            reversed: units == GridUnits::Angstrom,
        };

        // `pos` walks the edges in input order; `put_*` maps it onto the
        // (possibly reversed) output slot.
        let mut pos = 0;
        out.put_edge(pos, to_external(lo[notice[0]], units))?;

        for pair in notice.windows(2) {
            let (n0, n1) = (pair[0], pair[1]);

            pos += 1;
            out.put_edge(pos, to_external(hi[n0], units))?;
            out.put_keep(pos - 1, true)?;

            if !edges_touch(hi[n0], lo[n1]) {
                pos += 1;
                out.put_edge(pos, to_external(lo[n1], units))?;
                out.put_keep(pos - 1, false)?;
            }
        }

        pos += 1;
        if pos != nbins {
            return Err(AppError::grid(format!(
                "Invalid synthetic grid: filled {pos} bins, expected {nbins}."
            )));
        }
        let last = notice[notice.len() - 1];
        out.put_edge(pos, to_external(hi[last], units))?;
        out.put_keep(pos - 1, true)?;

        Ok(out)
    }

    fn put_edge(&mut self, pos: usize, value: f64) -> Result<(), AppError> {
        let nbins = self.keep.len();
        let slot = if self.reversed { nbins.checked_sub(pos) } else { Some(pos) };
        let cell = slot
            .and_then(|s| self.edges.get_mut(s))
            .ok_or_else(|| AppError::grid("Invalid synthetic grid: edge index out of range."))?;
        *cell = T::narrow(value);
        Ok(())
    }

    fn put_keep(&mut self, pos: usize, keep: bool) -> Result<(), AppError> {
        let nbins = self.keep.len();
        let slot = if self.reversed {
            nbins.checked_sub(1).and_then(|last| last.checked_sub(pos))
        } else {
            Some(pos)
        };
        let cell = slot
            .and_then(|s| self.keep.get_mut(s))
            .ok_or_else(|| AppError::grid("Invalid synthetic grid: bin index out of range."))?;
        *cell = keep;
        Ok(())
    }

    /// Number of synthetic bins (`edges().len() - 1`).
    pub fn nbins(&self) -> usize {
        self.keep.len()
    }

    /// Ascending bin edges, length `nbins() + 1`.
    pub fn edges(&self) -> &[T] {
        &self.edges
    }

    pub fn keep(&self) -> &[bool] {
        &self.keep
    }

    pub fn n_keep(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// True when the grid was written back to front relative to the input.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Synthetic bin indices of the kept bins, ordered like the noticed bins
    /// they came from.
    pub fn kept_in_notice_order(&self) -> Vec<usize> {
        let mut kept: Vec<usize> = (0..self.nbins()).filter(|&i| self.keep[i]).collect();
        if self.reversed {
            kept.reverse();
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::KEV_ANGSTROM;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn angstrom_grid(lo: Vec<f64>, hi: Vec<f64>, notice: Vec<usize>) -> MeasurementGrid {
        MeasurementGrid::new(lo, hi, notice, GridUnits::Angstrom).unwrap()
    }

    #[test]
    fn contiguous_grid_has_n_plus_one_edges_all_kept() {
        let g = MeasurementGrid::from_edges(&[10.0, 11.0, 12.0, 13.0], GridUnits::Angstrom).unwrap();
        let x = SyntheticGrid::<f64>::build(&g).unwrap();
        assert_eq!(x.nbins(), 3);
        assert_eq!(x.edges().len(), 4);
        assert!(x.keep().iter().all(|&k| k));
    }

    #[test]
    fn wavelength_edges_are_reversed_and_converted() {
        let g = MeasurementGrid::from_edges(&[10.0, 11.0, 12.0], GridUnits::Angstrom).unwrap();
        let x = SyntheticGrid::<f64>::build(&g).unwrap();
        let e = x.edges();
        assert_relative_eq!(e[0], KEV_ANGSTROM / 12.0);
        assert_relative_eq!(e[1], KEV_ANGSTROM / 11.0);
        assert_relative_eq!(e[2], KEV_ANGSTROM / 10.0);
        assert!(e.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(x.kept_in_notice_order(), vec![1, 0]);
    }

    #[test]
    fn gap_adds_one_unkept_bin() {
        // Bins [1,2] and [3,4] with a hole in between (bin [2,3] ignored).
        let g = angstrom_grid(vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0], vec![0, 2]);
        let x = SyntheticGrid::<f32>::build(&g).unwrap();
        assert_eq!(x.nbins(), 3);
        assert_eq!(x.edges().len(), 4);
        assert_eq!(x.keep(), &[true, false, true]);
        assert_eq!(x.n_keep(), 2);
    }

    #[test]
    fn kev_grid_keeps_input_order() {
        let g = MeasurementGrid::new(
            vec![0.5, 1.0, 3.0],
            vec![1.0, 2.0, 4.0],
            vec![0, 1, 2],
            GridUnits::Kev,
        )
        .unwrap();
        let x = SyntheticGrid::<f64>::build(&g).unwrap();
        assert_eq!(x.edges(), &[0.5, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(x.keep(), &[true, true, false, true]);
        assert_eq!(x.kept_in_notice_order(), vec![0, 1, 3]);
    }

    #[test]
    fn single_bin_grid() {
        let g = angstrom_grid(vec![5.0], vec![6.0], vec![0]);
        let x = SyntheticGrid::<f64>::build(&g).unwrap();
        assert_eq!(x.nbins(), 1);
        assert_eq!(x.keep(), &[true]);
    }

    #[test]
    fn no_noticed_bins_is_a_grid_error() {
        let g = angstrom_grid(vec![1.0, 2.0], vec![2.0, 3.0], vec![]);
        let err = SyntheticGrid::<f64>::build(&g).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Grid);
    }

    #[test]
    fn empty_grid_is_a_grid_error() {
        let g = angstrom_grid(vec![], vec![], vec![]);
        assert!(count_synthetic_bins(&g).is_err());
    }

    proptest! {
        #[test]
        fn prop_bin_count_matches_gap_count(
            widths in proptest::collection::vec(0.1f64..2.0, 1..40),
            gaps in proptest::collection::vec(prop_oneof![Just(0.0f64), 0.05f64..1.0], 40),
        ) {
            let mut lo = Vec::with_capacity(widths.len());
            let mut hi = Vec::with_capacity(widths.len());
            let mut edge = 1.0;
            let mut n_gaps = 0;
            for (i, w) in widths.iter().enumerate() {
                if i > 0 && gaps[i] > 0.0 {
                    edge += gaps[i];
                    n_gaps += 1;
                }
                lo.push(edge);
                edge += w;
                hi.push(edge);
            }
            let n = lo.len();
            let g = MeasurementGrid::all_noticed(lo, hi, GridUnits::Angstrom).unwrap();
            let x = SyntheticGrid::<f64>::build(&g).unwrap();

            prop_assert_eq!(x.nbins(), n + n_gaps);
            prop_assert_eq!(x.edges().len(), n + n_gaps + 1);
            prop_assert_eq!(x.n_keep(), n);
            prop_assert!(x.edges().windows(2).all(|w| w[0] < w[1]));
        }
    }
}
