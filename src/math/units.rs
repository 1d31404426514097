//! Physical constants and the wavelength/energy conversion.
//!
//! NIST 1998 CODATA recommended values, in CGS units.

/// Planck's constant (erg s).
pub const PLANCK: f64 = 6.62606876e-27;

/// Speed of light (cm/s).
pub const CLIGHT: f64 = 2.99792458e10;

pub const ERG_PER_EV: f64 = 1.602176462e-12;

/// `E[keV] * lambda[Angstrom]`.
pub const KEV_ANGSTROM: f64 = ((PLANCK * CLIGHT) / (ERG_PER_EV * 1.0e3)) * 1.0e8;

/// Convert a wavelength in Angstrom to an energy in keV (and vice versa; the
/// relation is its own inverse).
pub fn angstrom_to_kev(lambda: f64) -> f64 {
    KEV_ANGSTROM / lambda
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kev_angstrom_matches_reference_value() {
        assert_relative_eq!(KEV_ANGSTROM, 12.398_419, max_relative = 1e-6);
    }

    #[test]
    fn conversion_is_an_involution() {
        let lambda = 17.5;
        assert_relative_eq!(angstrom_to_kev(angstrom_to_kev(lambda)), lambda, max_relative = 1e-14);
    }
}
