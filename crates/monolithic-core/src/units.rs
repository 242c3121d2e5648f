//! Unit conversions shared across the library.

use std::f64::consts::LN_2;

/// `2 * sqrt(2 * ln 2)`, the FWHM of a unit-sigma Gaussian.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// Convert the full width at half maximum of a Gaussian to its sigma.
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * LN_2).sqrt())
}

/// Convert the sigma of a Gaussian to its full width at half maximum.
pub fn sigma_to_fwhm(sigma: f64) -> f64 {
    2.0 * (2.0 * LN_2).sqrt() * sigma
}

/// Metres per unit for the length-unit names used in instrument metadata.
///
/// Accepts both `MilliMeters` and the `MiliMeters` spelling some
/// instruments emit. Returns `None` for unknown names.
pub fn metres_per_unit(unit: &str) -> Option<f64> {
    match unit.to_ascii_lowercase().as_str() {
        "meters" | "metres" | "m" => Some(1.0),
        "millimeters" | "milimeters" | "mm" => Some(1e-3),
        "micrometers" | "um" | "µm" => Some(1e-6),
        "nanometers" | "nm" => Some(1e-9),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fwhm_to_sigma() {
        let sigma = fwhm_to_sigma(5.0);
        assert!((sigma - 2.12).abs() < 0.005);
    }

    #[test]
    fn test_sigma_to_fwhm() {
        let fwhm = sigma_to_fwhm(2.12);
        assert!((fwhm.round() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_constant_matches_formula() {
        assert!((sigma_to_fwhm(1.0) - FWHM_PER_SIGMA).abs() < 1e-12);
        assert!((fwhm_to_sigma(sigma_to_fwhm(3.7)) - 3.7).abs() < 1e-12);
    }

    #[test]
    fn test_metres_per_unit() {
        assert_eq!(metres_per_unit("MiliMeters"), Some(1e-3));
        assert_eq!(metres_per_unit("MilliMeters"), Some(1e-3));
        assert_eq!(metres_per_unit("MicroMeters"), Some(1e-6));
        assert_eq!(metres_per_unit("NanoMeters"), Some(1e-9));
        assert_eq!(metres_per_unit("Furlongs"), None);
    }
}
