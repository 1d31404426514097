//! Statically linked external routines.
//!
//! These follow the same C calling conventions as routines loaded from a
//! model library, so they go through exactly the same adapter path. One
//! routine per convention.

use std::ffi::c_char;
use std::os::raw::c_int;

use crate::domain::Category;
use crate::foreign::convention::{Convention, RoutineSymbol};
use crate::foreign::handle::ForeignHandle;
use crate::registry::DefaultTable;

/// Default value, lower limit, upper limit and freeze flag of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuiltinParam {
    pub name: &'static str,
    pub unit: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub freeze: bool,
}

const fn param(name: &'static str, unit: &'static str, value: f64, min: f64, max: f64) -> BuiltinParam {
    BuiltinParam {
        name,
        unit,
        value,
        min,
        max,
        freeze: false,
    }
}

/// One entry of the built-in routine table.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRoutine {
    pub name: &'static str,
    pub category: Category,
    pub symbol: RoutineSymbol,
    pub params: &'static [BuiltinParam],
}

impl BuiltinRoutine {
    pub fn convention(&self) -> Convention {
        self.symbol.convention()
    }

    /// Name of the host-side hook that evaluates this routine directly.
    pub fn hook_name(&self) -> String {
        format!("_model_{}_{}_hook", self.category.display_name(), self.convention().label())
    }

    pub fn handle(&self) -> ForeignHandle {
        ForeignHandle::from_static(self.name, self.symbol)
    }

    pub fn param_names(&self) -> Vec<&'static str> {
        self.params.iter().map(|p| p.name).collect()
    }

    pub fn units(&self) -> Vec<&'static str> {
        self.params.iter().map(|p| p.unit).collect()
    }

    pub fn defaults(&self) -> DefaultTable {
        DefaultTable {
            value: Some(self.params.iter().map(|p| p.value).collect()),
            min: Some(self.params.iter().map(|p| p.min).collect()),
            max: Some(self.params.iter().map(|p| p.max).collect()),
            freeze: Some(self.params.iter().map(|p| p.freeze).collect()),
        }
    }
}

pub static BUILTIN_ROUTINES: &[BuiltinRoutine] = &[
    BuiltinRoutine {
        name: "powerlaw",
        category: Category::Additive,
        symbol: RoutineSymbol::Single(fitfun_powerlaw),
        params: &[
            param("norm", "", 1.0, 0.0, 1.0e10),
            param("PhoIndex", "", 1.0, -2.0, 9.0),
        ],
    },
    BuiltinRoutine {
        name: "gaussian",
        category: Category::Additive,
        symbol: RoutineSymbol::Double(fitfun_gaussian),
        params: &[
            param("norm", "", 1.0, 0.0, 1.0e10),
            param("LineE", "keV", 6.5, 0.0, 1.0e6),
            param("Sigma", "keV", 0.1, 0.0, 10.0),
        ],
    },
    BuiltinRoutine {
        name: "constant",
        category: Category::Multiplicative,
        symbol: RoutineSymbol::SingleNoErr(fitfun_constant),
        params: &[param("factor", "", 1.0, 0.0, 1.0e10)],
    },
    BuiltinRoutine {
        name: "scale",
        category: Category::Convolution,
        symbol: RoutineSymbol::CStyle(fitfun_scale),
        params: &[param("factor", "", 1.0, 0.0, 1.0e10)],
    },
];

/// Look up a built-in routine by name.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinRoutine> {
    BUILTIN_ROUTINES.iter().find(|r| r.name == name)
}

/// Photon flux of `E^-index` integrated over each bin.
///
/// # Safety
/// `ear` must hold `*ne + 1` values, `param` one, `photar` and `photer` `*ne`.
pub unsafe extern "C" fn fitfun_powerlaw(
    ear: *const f32,
    ne: *const c_int,
    param: *const f32,
    _ifl: *const c_int,
    photar: *mut f32,
    photer: *mut f32,
) {
    // SAFETY: per the function contract.
    let (ear, index, photar, photer) = unsafe {
        let n = usize::try_from(*ne).unwrap_or(0);
        (
            std::slice::from_raw_parts(ear, n + 1),
            *param,
            std::slice::from_raw_parts_mut(photar, n),
            std::slice::from_raw_parts_mut(photer, n),
        )
    };
    let slope = 1.0 - index;
    let flat = slope.abs() < 1.0e-6;
    for (i, out) in photar.iter_mut().enumerate() {
        let (lo, hi) = (ear[i], ear[i + 1]);
        *out = if flat {
            (hi / lo).ln()
        } else {
            (hi.powf(slope) - lo.powf(slope)) / slope
        };
    }
    photer.fill(0.0);
}

/// Gaussian line of unit area.
///
/// # Safety
/// `ear` must hold `*ne + 1` values, `param` two, `photar` and `photer` `*ne`.
pub unsafe extern "C" fn fitfun_gaussian(
    ear: *const f64,
    ne: *const c_int,
    param: *const f64,
    _ifl: *const c_int,
    photar: *mut f64,
    photer: *mut f64,
) {
    // SAFETY: per the function contract.
    let (ear, center, sigma, photar, photer) = unsafe {
        let n = usize::try_from(*ne).unwrap_or(0);
        (
            std::slice::from_raw_parts(ear, n + 1),
            *param,
            *param.add(1),
            std::slice::from_raw_parts_mut(photar, n),
            std::slice::from_raw_parts_mut(photer, n),
        )
    };
    photer.fill(0.0);

    if sigma <= 0.0 {
        for (i, out) in photar.iter_mut().enumerate() {
            *out = if ear[i] <= center && center < ear[i + 1] { 1.0 } else { 0.0 };
        }
        return;
    }

    let scale = 1.0 / (std::f64::consts::SQRT_2 * sigma);
    let cdf = |e: f64| 0.5 * erf((e - center) * scale);
    for (i, out) in photar.iter_mut().enumerate() {
        *out = cdf(ear[i + 1]) - cdf(ear[i]);
    }
}

/// Constant multiplicative factor.
///
/// # Safety
/// `param` must hold one value and `photar` `*ne`.
pub unsafe extern "C" fn fitfun_constant(
    _ear: *const f32,
    ne: *const c_int,
    param: *const f32,
    _ifl: *const c_int,
    photar: *mut f32,
) {
    // SAFETY: per the function contract.
    unsafe {
        let n = usize::try_from(*ne).unwrap_or(0);
        std::slice::from_raw_parts_mut(photar, n).fill(*param);
    }
}

/// Scales the spectrum it is handed.
///
/// # Safety
/// `param` must hold one value and `photar` `ne` (already seeded).
pub unsafe extern "C" fn fitfun_scale(
    _ear: *const f64,
    ne: c_int,
    param: *const f64,
    _ifl: c_int,
    photar: *mut f64,
    _photer: *mut f64,
    _init: *const c_char,
) {
    // SAFETY: per the function contract.
    unsafe {
        let n = usize::try_from(ne).unwrap_or(0);
        let factor = *param;
        for v in std::slice::from_raw_parts_mut(photar, n) {
            *v *= factor;
        }
    }
}

/// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    const P: f64 = 0.327_591_1;
    const A: [f64; 5] = [0.254_829_592, -0.284_496_736, 1.421_413_741, -1.453_152_027, 1.061_405_429];

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, &a| acc * t + a) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GridUnits, MeasurementGrid};
    use approx::assert_relative_eq;

    fn kev(edges: &[f64]) -> MeasurementGrid {
        MeasurementGrid::from_edges(edges, GridUnits::Kev).unwrap()
    }

    #[test]
    fn table_covers_every_convention() {
        for c in [Convention::Single, Convention::SingleNoErr, Convention::Double, Convention::CStyle] {
            assert!(BUILTIN_ROUTINES.iter().any(|r| r.convention() == c), "{c:?}");
        }
        assert_eq!(find_builtin("powerlaw").unwrap().hook_name(), "_model_add_f_hook");
        assert_eq!(find_builtin("scale").unwrap().hook_name(), "_model_con_C_hook");
        assert!(find_builtin("nope").is_none());
    }

    #[test]
    fn powerlaw_integrates_the_photon_spectrum() {
        let r = find_builtin("powerlaw").unwrap();
        let out = r
            .handle()
            .evaluate_bins(&kev(&[1.0, 2.0, 4.0]), &[2.0, 2.0], r.category, Some(0), None)
            .unwrap();
        // norm * (1/lo - 1/hi)
        assert_relative_eq!(out[0], 2.0 * 0.5, max_relative = 1e-6);
        assert_relative_eq!(out[1], 2.0 * 0.25, max_relative = 1e-6);
    }

    #[test]
    fn powerlaw_index_one_is_logarithmic() {
        let r = find_builtin("powerlaw").unwrap();
        let out = r
            .handle()
            .evaluate_bins(&kev(&[1.0, std::f64::consts::E]), &[1.0, 1.0], r.category, Some(0), None)
            .unwrap();
        assert_relative_eq!(out[0], 1.0, max_relative = 1e-6);
    }

    #[test]
    fn gaussian_line_has_unit_area() {
        let edges: Vec<f64> = (0..=200).map(|i| 5.0 + 0.01 * i as f64).collect();
        let r = find_builtin("gaussian").unwrap();
        let out = r
            .handle()
            .evaluate_bins(&kev(&edges), &[3.0, 6.0, 0.05], r.category, Some(0), None)
            .unwrap();
        assert_relative_eq!(out.iter().sum::<f64>(), 3.0, max_relative = 1e-5);
    }

    #[test]
    fn zero_width_gaussian_is_a_delta() {
        let r = find_builtin("gaussian").unwrap();
        let out = r
            .handle()
            .evaluate_bins(&kev(&[1.0, 2.0, 3.0]), &[1.0, 2.5, 0.0], r.category, Some(0), None)
            .unwrap();
        assert_eq!(out, vec![0.0, 1.0]);
    }

    #[test]
    fn constant_and_scale() {
        let g = kev(&[1.0, 2.0, 3.0]);
        let c = find_builtin("constant").unwrap();
        assert_eq!(
            c.handle().evaluate_bins(&g, &[0.5], c.category, None, None).unwrap(),
            vec![0.5, 0.5]
        );
        let s = find_builtin("scale").unwrap();
        assert_eq!(
            s.handle()
                .evaluate_bins(&g, &[3.0], s.category, None, Some(&[1.0, 2.0]))
                .unwrap(),
            vec![3.0, 6.0]
        );
    }

    #[test]
    fn erf_matches_known_values() {
        assert_relative_eq!(erf(0.0), 0.0, epsilon = 1e-7);
        assert_relative_eq!(erf(1.0), 0.842_700_79, epsilon = 2e-7);
        assert_relative_eq!(erf(-1.0), -0.842_700_79, epsilon = 2e-7);
        assert_relative_eq!(erf(3.0), 0.999_977_91, epsilon = 2e-7);
    }
}
