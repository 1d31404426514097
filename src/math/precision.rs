//! Working precision of external model routines.
//!
//! External routines come in single- and double-precision flavours. The grid
//! translator and the foreign call adapter are written once against
//! [`Precision`] and instantiated for `f32` and `f64`.

use std::fmt::Debug;

use num_traits::Float;

/// A floating-point type an external routine can be called with.
pub trait Precision: Float + Default + Debug + 'static {
    /// Short label for diagnostics.
    const LABEL: &'static str;

    /// Convert from the host's double precision (narrowing for `f32`).
    fn narrow(value: f64) -> Self;

    /// Convert back to the host's double precision.
    fn widen(self) -> f64;

    /// Copy-and-convert a host parameter vector.
    fn marshal(values: &[f64]) -> Vec<Self> {
        values.iter().map(|&v| Self::narrow(v)).collect()
    }
}

impl Precision for f32 {
    const LABEL: &'static str = "single";

    fn narrow(value: f64) -> Self {
        value as f32
    }

    fn widen(self) -> f64 {
        f64::from(self)
    }
}

impl Precision for f64 {
    const LABEL: &'static str = "double";

    fn narrow(value: f64) -> Self {
        value
    }

    fn widen(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_precision_marshal_narrows() {
        let p = f32::marshal(&[1.0, 0.1, 1e300]);
        assert_eq!(p[0], 1.0f32);
        assert_eq!(p[1], 0.1f32);
        assert!(p[2].is_infinite());
    }

    #[test]
    fn double_precision_marshal_is_exact() {
        let src = [1.0, 0.1, 1e300];
        assert_eq!(f64::marshal(&src), src.to_vec());
    }
}
