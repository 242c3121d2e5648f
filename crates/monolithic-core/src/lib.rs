//! Core surface-metrology math for monolithic.
//!
//! This crate holds the numerical side of the library: a small row-major
//! [`Grid`] type for height maps, NaN-aware statistics, FFT wrappers,
//! power spectral density estimation, and least-squares removal of
//! piston, tilt, power and low-order polynomial form.
//!
//! Heights and coordinates are in SI units (metres) throughout. Missing
//! samples are represented by `NaN`.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod fft;
pub mod grid;
pub mod linalg;
pub mod psd;
pub mod removes;
pub mod statistics;
pub mod summary;
pub mod units;

pub use error::{Error, Result};
pub use grid::{meshgrid, Grid};
pub use psd::{psd_1d, psd_2d, window_function, Axis, Psd1d, Psd2d, WindowKind};
pub use removes::{remove_polynomials, remove_sphere, remove_surface, SphereFit, SurfaceFit};
pub use rustfft::num_complex::Complex64;
pub use statistics::{pv, rmse, SurfaceStats};
pub use summary::{DisplayUnits, SurfaceSummary};
pub use units::{fwhm_to_sigma, sigma_to_fwhm};
