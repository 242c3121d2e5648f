//! Least-squares removal of piston, tilt, power and low-order polynomial
//! form from a surface height map.
//!
//! Only finite entries of `z` take part in the fit. The fitted surface is
//! evaluated everywhere; missing entries stay missing in the residual.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::linalg::lstsq;

/// A fitted 2-D polynomial `Σ cᵢⱼ uⁱ vʲ` with `i + j <= order`.
///
/// `u = (x - x0) / sx` and `v = (y - y0) / sy` are the fit coordinates.
/// For plane fits (`remove_surface`) and sphere fits the coordinates are
/// used as is (`x0 = y0 = 0`, `sx = sy = 1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialSurface {
    order: usize,
    terms: Vec<(u32, u32)>,
    coefficients: Vec<f64>,
    center: (f64, f64),
    scale: (f64, f64),
    /// Extra `c · (u² + v²)` term used by sphere fits.
    radial: Option<f64>,
}

impl PolynomialSurface {
    pub fn order(&self) -> usize {
        self.order
    }

    /// Exponents `(i, j)` of each term, in coefficient order.
    pub fn terms(&self) -> &[(u32, u32)] {
        &self.terms
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Coefficient of the `(u² + v²)` power term, for sphere fits.
    pub fn power(&self) -> Option<f64> {
        self.radial
    }

    /// Evaluate the fit at one point.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let u = (x - self.center.0) / self.scale.0;
        let v = (y - self.center.1) / self.scale.1;
        let poly: f64 = self
            .terms
            .iter()
            .zip(&self.coefficients)
            .map(|(&(i, j), c)| c * u.powi(i as i32) * v.powi(j as i32))
            .sum();
        poly + self.radial.map_or(0.0, |c| c * (u * u + v * v))
    }

    /// Evaluate the fit on coordinate grids.
    pub fn evaluate_grid(&self, x: &Grid, y: &Grid) -> Result<Grid> {
        x.zip_map(y, |&xi, &yi| self.evaluate(xi, yi))
    }
}

/// Result of a form removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFit {
    /// `z - fitted`, `NaN` where `z` is missing.
    pub residual: Grid,
    /// The removed form.
    pub fitted: Grid,
    pub model: PolynomialSurface,
}

/// Result of a sphere (power) removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereFit {
    pub residual: Grid,
    pub fitted: Grid,
    pub model: PolynomialSurface,
    /// Paraxial radius of curvature `1 / (2 c)`, `None` for a flat fit.
    pub radius: Option<f64>,
}

/// Number of `xⁱ yʲ` terms with `i + j <= order`, `None` on overflow.
fn term_count(order: usize) -> Option<usize> {
    let a = order.checked_add(1)?;
    let b = order.checked_add(2)?;
    Some(a.checked_mul(b)? / 2)
}

/// Exponents of every `xⁱ yʲ` with `i + j <= order`, by increasing degree.
fn polynomial_terms(order: u32) -> Vec<(u32, u32)> {
    let mut terms = Vec::new();
    for degree in 0..=order {
        for j in 0..=degree {
            terms.push((degree - j, j));
        }
    }
    terms
}

fn check_shapes(x: &Grid, y: &Grid, z: &Grid) -> Result<()> {
    if x.shape() != z.shape() {
        return Err(Error::shape(z.shape(), x.shape()));
    }
    if y.shape() != z.shape() {
        return Err(Error::shape(z.shape(), y.shape()));
    }
    Ok(())
}

/// Samples `(u, v, z)` where `x`, `y` and `z` are all finite.
fn valid_samples(
    x: &Grid,
    y: &Grid,
    z: &Grid,
    center: (f64, f64),
    scale: (f64, f64),
) -> Vec<(f64, f64, f64)> {
    x.iter()
        .zip(y.iter())
        .zip(z.iter())
        .filter(|((xi, yi), zi)| xi.is_finite() && yi.is_finite() && zi.is_finite())
        .map(|((xi, yi), zi)| ((xi - center.0) / scale.0, (yi - center.1) / scale.1, *zi))
        .collect()
}

/// Centre and half-range of the finite coordinates, mapping them to `[-1, 1]`.
fn normalisation(x: &Grid, y: &Grid, z: &Grid) -> ((f64, f64), (f64, f64)) {
    let mut bounds = [f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY];
    for ((xi, yi), zi) in x.iter().zip(y.iter()).zip(z.iter()) {
        if xi.is_finite() && yi.is_finite() && zi.is_finite() {
            bounds[0] = bounds[0].min(*xi);
            bounds[1] = bounds[1].max(*xi);
            bounds[2] = bounds[2].min(*yi);
            bounds[3] = bounds[3].max(*yi);
        }
    }
    let axis = |lo: f64, hi: f64| {
        if lo.is_finite() && hi > lo {
            ((lo + hi) * 0.5, (hi - lo) * 0.5)
        } else {
            (if lo.is_finite() { lo } else { 0.0 }, 1.0)
        }
    };
    let (cx, sx) = axis(bounds[0], bounds[1]);
    let (cy, sy) = axis(bounds[2], bounds[3]);
    ((cx, cy), (sx, sy))
}

fn fit(
    x: &Grid,
    y: &Grid,
    z: &Grid,
    order: usize,
    radial: bool,
    normalise: bool,
) -> Result<(Grid, Grid, PolynomialSurface)> {
    check_shapes(x, y, z)?;
    let (center, scale) = if normalise {
        normalisation(x, y, z)
    } else {
        ((0.0, 0.0), (1.0, 1.0))
    };
    let samples = valid_samples(x, y, z, center, scale);
    let n_terms = term_count(order).and_then(|n| n.checked_add(usize::from(radial)));
    let degree = match (n_terms, u32::try_from(order)) {
        (Some(n), Ok(degree)) if samples.len() >= n => degree,
        _ => {
            return Err(Error::Singular(format!(
                "{} valid samples cannot determine the coefficients of an order {} polynomial",
                samples.len(),
                order
            )));
        }
    };
    let terms = polynomial_terms(degree);
    let n_terms = terms.len() + usize::from(radial);

    let design = Grid::from_fn(samples.len(), n_terms, |r, c| {
        let (u, v, _) = samples[r];
        match terms.get(c) {
            Some(&(i, j)) => u.powi(i as i32) * v.powi(j as i32),
            None => u * u + v * v,
        }
    });
    let rhs: Vec<f64> = samples.iter().map(|s| s.2).collect();
    let mut coefficients = lstsq(&design, &rhs)?;
    let radial = radial.then(|| coefficients.pop()).flatten();

    let model = PolynomialSurface {
        order,
        terms,
        coefficients,
        center,
        scale,
        radial,
    };
    let fitted = model.evaluate_grid(x, y)?;
    let residual = z.zip_map(&fitted, |zi, fi| zi - fi)?;
    log::debug!(
        "removed order-{} form from {} samples ({} missing)",
        order,
        samples.len(),
        z.len() - samples.len()
    );
    Ok((residual, fitted, model))
}

/// Fit and remove a plane `c0 + c1 x + c2 y` (piston and tilt).
pub fn remove_surface(x: &Grid, y: &Grid, z: &Grid) -> Result<SurfaceFit> {
    let (residual, fitted, model) = fit(x, y, z, 1, false, false)?;
    Ok(SurfaceFit {
        residual,
        fitted,
        model,
    })
}

/// Fit and remove every `xⁱ yʲ` term with `i + j <= order`.
///
/// Coordinates are normalised to `[-1, 1]` before fitting, so the model's
/// coefficients refer to the normalised coordinates.
pub fn remove_polynomials(x: &Grid, y: &Grid, z: &Grid, order: usize) -> Result<SurfaceFit> {
    let (residual, fitted, model) = fit(x, y, z, order, false, true)?;
    Ok(SurfaceFit {
        residual,
        fitted,
        model,
    })
}

/// Fit and remove piston, tilt and power `c0 + c1 x + c2 y + c3 (x² + y²)`.
pub fn remove_sphere(x: &Grid, y: &Grid, z: &Grid) -> Result<SphereFit> {
    let (residual, fitted, model) = fit(x, y, z, 1, true, false)?;
    let radius = model
        .radial
        .filter(|c| *c != 0.0)
        .map(|c| 1.0 / (2.0 * c));
    Ok(SphereFit {
        residual,
        fitted,
        model,
        radius,
    })
}
