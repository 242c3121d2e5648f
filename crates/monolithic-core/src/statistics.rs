//! NaN-aware statistics of surface data (PV, RMS error, mean).
//!
//! Non-finite samples are treated as missing and ignored.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean of the finite samples, or `None` when there are none.
pub fn nan_mean<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// RMS error (population standard deviation) of the finite samples.
pub fn rmse(values: &[f64]) -> Result<f64> {
    let mean = nan_mean(values).ok_or(Error::NoValidData("rmse input"))?;
    let (sq, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + (v - mean).powi(2), n + 1));
    Ok((sq / n as f64).sqrt())
}

/// Peak-to-valley: `max - min` of the finite samples.
pub fn pv(values: &[f64]) -> Result<f64> {
    let (min, max) = min_max(values).ok_or(Error::NoValidData("pv input"))?;
    Ok(max - min)
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Summary statistics of a height map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceStats {
    pub pv: f64,
    pub rms: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Number of finite samples.
    pub valid: usize,
    /// Total number of samples including missing ones.
    pub total: usize,
}

impl SurfaceStats {
    pub fn compute(values: &[f64]) -> Result<Self> {
        let (min, max) = min_max(values).ok_or(Error::NoValidData("surface"))?;
        let mean = nan_mean(values).ok_or(Error::NoValidData("surface"))?;
        let valid = values.iter().filter(|v| v.is_finite()).count();
        Ok(Self {
            pv: max - min,
            rms: rmse(values)?,
            mean,
            min,
            max,
            valid,
            total: values.len(),
        })
    }

    /// Fraction of samples that are valid, in `[0, 1]`.
    pub fn fill_factor(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64
        }
    }

    /// Rescale the height-valued fields (e.g. metres to nanometres).
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            pv: self.pv * factor,
            rms: self.rms * factor,
            mean: self.mean * factor,
            min: self.min * factor,
            max: self.max * factor,
            ..self
        }
    }
}
