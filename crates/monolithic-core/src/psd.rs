//! Power spectral density (PSD) of surface height data.
//!
//! `psd_1d` averages the one-sided 1-D PSD of every line profile along an
//! axis. `psd_2d` computes the full 2-D PSD and its radial average.
//!
//! Spatial frequencies are reported as `q = 1/λ` (inverse length, no 2π).
//! Both estimators are normalised so the PSD integrates to the mean square
//! of the (windowed, mean-removed) heights.
//!
//! References:
//! - Jacobs, Junge & Pastewka (2017), *Surface Topography: Metrology and
//!   Properties* 5(1), 013001.
//! - Kanafi (2022), 1-D and radially averaged surface roughness power spectra.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fft::{fftshift, fftshift_2d, fftfreq, to_complex, FftEngine};
use crate::grid::Grid;
use crate::statistics::nan_mean;

/// Taper applied to each profile before transforming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    None,
    Hann,
    #[default]
    Welch,
}

impl WindowKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hann => "hann",
            Self::Welch => "welch",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "hann" => Ok(Self::Hann),
            "welch" => Ok(Self::Welch),
            _ => Err(Error::InvalidWindow(s.to_string())),
        }
    }
}

/// Direction of the line profiles in a height map.
///
/// `X` takes each row (`z[r, ..]`), `Y` takes each column (`z[.., c]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            _ => Err(Error::invalid("axis", format!("expected 'x' or 'y', got '{s}'"))),
        }
    }
}

/// Window function with `n` samples over `[0, n - 1]`.
pub fn window_function(n: usize, kind: WindowKind) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    let half = (n as f64 - 1.0) * 0.5;
    (0..n)
        .map(|j| {
            let j = j as f64;
            match kind {
                WindowKind::None => 1.0,
                WindowKind::Hann => 0.5 - 0.5 * (PI * j / half).cos(),
                WindowKind::Welch => 1.0 - ((j - half) / half).powi(2),
            }
        })
        .collect()
}

/// Window scaled to unit mean square so tapering preserves the RMS.
fn normalised_window(n: usize, kind: WindowKind) -> Vec<f64> {
    let mut w = window_function(n, kind);
    let ms = w.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if ms > 0.0 {
        let scale = ms.sqrt().recip();
        w.iter_mut().for_each(|v| *v *= scale);
    }
    w
}

/// Averaged one-sided 1-D PSD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psd1d {
    /// Spatial frequencies `k / (n a)`, `k = 0..=n/2`.
    pub q: Vec<f64>,
    /// PSD in `length³` (e.g. m³).
    pub c: Vec<f64>,
    /// Cumulative RMS `sqrt(Σ c Δq)` up to each frequency.
    pub int_c: Vec<f64>,
    /// Number of profiles that contributed to the average.
    pub profiles: usize,
}

impl Psd1d {
    /// RMS height recovered from the full spectrum.
    pub fn rms(&self) -> f64 {
        self.int_c.last().copied().unwrap_or(0.0)
    }
}

fn check_pixel_size(pixel_size: f64) -> Result<()> {
    if pixel_size.is_finite() && pixel_size > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(
            "pixel_size",
            format!("must be positive and finite, got {pixel_size}"),
        ))
    }
}

/// Averaged 1-D PSD of every line profile of `z` along `axis`.
///
/// Profiles with missing samples are skipped.
pub fn psd_1d(z: &Grid, pixel_size: f64, axis: Axis, window: WindowKind) -> Result<Psd1d> {
    check_pixel_size(pixel_size)?;
    let profiles = match axis {
        Axis::X => z.clone(),
        Axis::Y => z.transpose(),
    };
    let (m, n) = profiles.shape();
    if n == 0 || m == 0 {
        return Err(Error::EmptyInput("psd_1d height map"));
    }

    let win = normalised_window(n, window);
    let n_q = n / 2 + 1;
    let mut c = vec![0.0; n_q];
    let mut used = 0usize;
    let mut engine = FftEngine::new();

    for r in 0..m {
        let Some(profile) = profiles.row(r) else {
            continue;
        };
        if profile.iter().any(|v| !v.is_finite()) {
            log::debug!("psd_1d: skipping profile {r} with missing samples");
            continue;
        }
        let mean = nan_mean(profile).unwrap_or(0.0);
        let tapered: Vec<f64> = profile
            .iter()
            .zip(&win)
            .map(|(v, w)| (v - mean) * w)
            .collect();
        let spectrum = engine.fft_1d(&to_complex(&tapered), None)?;
        for (k, acc) in c.iter_mut().enumerate() {
            let mut power = pixel_size / n as f64 * spectrum[k].norm_sqr();
            // fold the negative frequencies onto the positive ones
            if k > 0 && 2 * k < n {
                power *= 2.0;
            }
            *acc += power;
        }
        used += 1;
    }

    if used == 0 {
        return Err(Error::NoValidData("psd_1d profiles"));
    }
    log::debug!("psd_1d: averaged {used} of {m} profiles of length {n}");

    c.iter_mut().for_each(|v| *v /= used as f64);
    let dq = 1.0 / (n as f64 * pixel_size);
    let q: Vec<f64> = (0..n_q).map(|k| k as f64 * dq).collect();
    let int_c = c
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v * dq;
            Some(acc.sqrt())
        })
        .collect();

    Ok(Psd1d {
        q,
        c,
        int_c,
        profiles: used,
    })
}

/// 2-D PSD and its radial average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psd2d {
    /// Centre of each radial bin.
    pub q: Vec<f64>,
    /// Radially averaged PSD in `length⁴`.
    pub c: Vec<f64>,
    /// Shifted frequency axes of `c_2d` (zero in the middle).
    pub qx: Vec<f64>,
    pub qy: Vec<f64>,
    /// Shifted 2-D PSD, `rows x cols` like the input.
    pub c_2d: Grid,
}

impl Psd2d {
    /// Mean square height recovered by integrating the 2-D PSD.
    pub fn mean_square(&self) -> f64 {
        let dqx = self.qx.get(1).zip(self.qx.first()).map_or(0.0, |(b, a)| b - a);
        let dqy = self.qy.get(1).zip(self.qy.first()).map_or(0.0, |(b, a)| b - a);
        self.c_2d.iter().sum::<f64>() * dqx.abs() * dqy.abs()
    }
}

/// 2-D PSD of a complete height map, radially averaged.
///
/// The 2-D estimator needs every sample, so missing data is an error.
pub fn psd_2d(z: &Grid, pixel_size: f64, window: WindowKind) -> Result<Psd2d> {
    check_pixel_size(pixel_size)?;
    let (rows, cols) = z.shape();
    if rows < 2 || cols < 2 {
        return Err(Error::EmptyInput("psd_2d needs at least 2x2 samples"));
    }
    if z.iter().any(|v| !v.is_finite()) {
        return Err(Error::NoValidData("psd_2d (height map has missing samples)"));
    }

    let mean = nan_mean(z.iter()).unwrap_or(0.0);
    let wy = normalised_window(rows, window);
    let wx = normalised_window(cols, window);
    let tapered = Grid::from_fn(rows, cols, |r, c| {
        Complex64::new((z.as_slice()[r * cols + c] - mean) * wy[r] * wx[c], 0.0)
    });

    let spectrum = FftEngine::new().fft_2d(&tapered, None)?;
    let scale = pixel_size * pixel_size / (rows * cols) as f64;
    let c_2d = fftshift_2d(&spectrum.map(|h| scale * h.norm_sqr()));
    let qx = fftshift(&fftfreq(cols, pixel_size));
    let qy = fftshift(&fftfreq(rows, pixel_size));

    let dq = 1.0 / (pixel_size * rows.max(cols) as f64);
    let q_max = qx
        .iter()
        .chain(qy.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let n_bins = (q_max / dq).floor() as usize + 1;
    let mut sums = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];
    for (r, fy) in qy.iter().enumerate() {
        for (c, fx) in qx.iter().enumerate() {
            let bin = ((fx * fx + fy * fy).sqrt() / dq).round() as usize;
            if bin < n_bins {
                sums[bin] += c_2d.as_slice()[r * cols + c];
                counts[bin] += 1;
            }
        }
    }

    let mut q = Vec::with_capacity(n_bins);
    let mut c = Vec::with_capacity(n_bins);
    for (bin, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
        if count > 0 {
            q.push(bin as f64 * dq);
            c.push(sum / count as f64);
        }
    }

    Ok(Psd2d { q, c, qx, qy, c_2d })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-7, "{x} != {y}");
        }
    }

    /// Deterministic, non-periodic test surface.
    fn rough(rows: usize, cols: usize) -> Grid {
        Grid::from_fn(rows, cols, |r, c| {
            let (r, c) = (r as f64, c as f64);
            1e-9 * ((0.37 * c).sin() + (0.91 * r + 0.2 * c).cos() + 0.05 * (r * c).sqrt())
        })
    }

    #[test]
    fn test_window_function() {
        assert_close(&window_function(5, WindowKind::Welch), &[0.0, 0.75, 1.0, 0.75, 0.0]);
        assert_close(&window_function(5, WindowKind::Hann), &[0.0, 0.5, 1.0, 0.5, 0.0]);
        assert_close(&window_function(5, WindowKind::None), &[1.0; 5]);
        assert_eq!(window_function(1, WindowKind::Welch), vec![1.0]);
        assert!(window_function(0, WindowKind::Hann).is_empty());
    }

    #[test]
    fn test_window_kind_parse() {
        assert_eq!("Welch".parse::<WindowKind>().unwrap(), WindowKind::Welch);
        assert_eq!("HANN".parse::<WindowKind>().unwrap(), WindowKind::Hann);
        assert!(matches!(
            "hamming".parse::<WindowKind>(),
            Err(Error::InvalidWindow(_))
        ));
        assert_eq!(WindowKind::default().to_string(), "welch");
    }

    #[test]
    fn test_psd_1d_shape() {
        let z = rough(8, 16);
        let psd = psd_1d(&z, 1e-6, Axis::X, WindowKind::Welch).unwrap();
        assert_eq!(psd.q.len(), 9);
        assert_eq!(psd.c.len(), 9);
        assert_eq!(psd.profiles, 8);
        assert!((psd.q[1] - 1.0 / 16e-6).abs() < 1e-3);
        assert!(psd.int_c.windows(2).all(|w| w[1] >= w[0]));

        let psd_y = psd_1d(&z, 1e-6, Axis::Y, WindowKind::Welch).unwrap();
        assert_eq!(psd_y.q.len(), 5);
        assert_eq!(psd_y.profiles, 16);
    }

    #[test]
    fn test_psd_1d_parseval() {
        // odd length: no Nyquist bin, so the one-sided sum is exact
        let z = rough(4, 31);
        let psd = psd_1d(&z, 2e-6, Axis::X, WindowKind::None).unwrap();

        let mean_variance: f64 = (0..4)
            .map(|r| {
                let row = z.row(r).unwrap();
                let m = row.iter().sum::<f64>() / row.len() as f64;
                row.iter().map(|v| (v - m).powi(2)).sum::<f64>() / row.len() as f64
            })
            .sum::<f64>()
            / 4.0;
        let recovered = psd.rms().powi(2);
        assert!((recovered - mean_variance).abs() < 1e-9 * mean_variance);
    }

    #[test]
    fn test_psd_1d_skips_missing_profiles() {
        let mut z = rough(3, 10);
        *z.get_mut(1, 4).unwrap() = f64::NAN;
        let psd = psd_1d(&z, 1.0, Axis::X, WindowKind::Hann).unwrap();
        assert_eq!(psd.profiles, 2);

        let all_nan = Grid::filled(2, 4, f64::NAN);
        assert!(matches!(
            psd_1d(&all_nan, 1.0, Axis::X, WindowKind::Hann),
            Err(Error::NoValidData(_))
        ));
    }

    #[test]
    fn test_psd_rejects_bad_pixel_size() {
        let z = rough(4, 4);
        assert!(psd_1d(&z, 0.0, Axis::X, WindowKind::None).is_err());
        assert!(psd_2d(&z, f64::NAN, WindowKind::None).is_err());
    }

    #[test]
    fn test_psd_2d_parseval() {
        let z = rough(12, 17);
        let psd = psd_2d(&z, 1e-6, WindowKind::None).unwrap();
        assert_eq!(psd.c_2d.shape(), (12, 17));

        let mean = z.iter().sum::<f64>() / z.len() as f64;
        let variance = z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / z.len() as f64;
        assert!((psd.mean_square() - variance).abs() < 1e-9 * variance);
    }

    #[test]
    fn test_psd_2d_radial_average() {
        let z = rough(16, 16);
        let psd = psd_2d(&z, 1e-6, WindowKind::Welch).unwrap();
        assert_eq!(psd.q.len(), psd.c.len());
        assert!(psd.q[0].abs() < f64::EPSILON);
        assert!(psd.q.windows(2).all(|w| w[1] > w[0]));
        assert!(psd.c.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_psd_2d_rejects_missing_samples() {
        let mut z = rough(4, 4);
        *z.get_mut(0, 0).unwrap() = f64::NAN;
        assert!(matches!(
            psd_2d(&z, 1.0, WindowKind::None),
            Err(Error::NoValidData(_))
        ));
    }

    proptest! {
        #[test]
        fn test_windows_are_symmetric(n in 2usize..200) {
            for kind in [WindowKind::Hann, WindowKind::Welch] {
                let w = window_function(n, kind);
                for j in 0..n {
                    prop_assert!((w[j] - w[n - 1 - j]).abs() < 1e-12);
                    prop_assert!(w[j] >= -1e-12 && w[j] <= 1.0 + 1e-12);
                }
            }
        }
    }
}
