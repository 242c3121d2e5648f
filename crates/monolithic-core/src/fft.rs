//! Discrete Fourier transforms backed by `rustfft`.
//!
//! Forward transforms are unnormalised and inverse transforms are scaled by
//! `1/n`, so `ifft(fft(a)) == a`. An optional output length (or shape in
//! 2-D) zero-pads or truncates the input before transforming.

use std::fmt;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::{Error, Result};
use crate::grid::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

/// Planner wrapper that caches FFT plans across calls.
///
/// Reuse one engine when transforming many profiles of the same length.
pub struct FftEngine {
    planner: FftPlanner<f64>,
}

impl fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftEngine").finish_non_exhaustive()
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FftEngine {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Transform `buffer` in place. Inverse transforms are normalised.
    fn process(&mut self, buffer: &mut [Complex64], direction: Direction) {
        let n = buffer.len();
        if n == 0 {
            return;
        }
        let plan = match direction {
            Direction::Forward => self.planner.plan_fft_forward(n),
            Direction::Inverse => self.planner.plan_fft_inverse(n),
        };
        plan.process(buffer);
        if direction == Direction::Inverse {
            let scale = 1.0 / n as f64;
            for v in buffer.iter_mut() {
                *v *= scale;
            }
        }
    }

    pub fn fft_1d(&mut self, a: &[Complex64], n: Option<usize>) -> Result<Vec<Complex64>> {
        self.transform_1d(a, n, Direction::Forward)
    }

    pub fn ifft_1d(&mut self, a: &[Complex64], n: Option<usize>) -> Result<Vec<Complex64>> {
        self.transform_1d(a, n, Direction::Inverse)
    }

    pub fn fft_2d(&mut self, a: &Grid<Complex64>, shape: Option<(usize, usize)>) -> Result<Grid<Complex64>> {
        self.transform_2d(a, shape, Direction::Forward)
    }

    pub fn ifft_2d(&mut self, a: &Grid<Complex64>, shape: Option<(usize, usize)>) -> Result<Grid<Complex64>> {
        self.transform_2d(a, shape, Direction::Inverse)
    }

    fn transform_1d(&mut self, a: &[Complex64], n: Option<usize>, direction: Direction) -> Result<Vec<Complex64>> {
        let n = n.unwrap_or(a.len());
        if n == 0 {
            return Err(Error::EmptyInput("1-D transform length"));
        }
        let mut buffer = resize(a, n);
        self.process(&mut buffer, direction);
        Ok(buffer)
    }

    fn transform_2d(
        &mut self,
        a: &Grid<Complex64>,
        shape: Option<(usize, usize)>,
        direction: Direction,
    ) -> Result<Grid<Complex64>> {
        let (rows, cols) = shape.unwrap_or(a.shape());
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyInput("2-D transform shape"));
        }
        let zero = Complex64::new(0.0, 0.0);
        let mut out = Grid::from_fn(rows, cols, |r, c| a.get(r, c).copied().unwrap_or(zero));

        // along each row
        for chunk in out.as_mut_slice().chunks_exact_mut(cols) {
            self.process(chunk, direction);
        }

        // along each column
        let mut column = vec![zero; rows];
        for c in 0..cols {
            for (r, v) in column.iter_mut().enumerate() {
                *v = out.as_slice()[r * cols + c];
            }
            self.process(&mut column, direction);
            for (r, v) in column.iter().enumerate() {
                out.as_mut_slice()[r * cols + c] = *v;
            }
        }
        Ok(out)
    }
}

fn resize(a: &[Complex64], n: usize) -> Vec<Complex64> {
    let mut buffer: Vec<Complex64> = a.iter().take(n).copied().collect();
    buffer.resize(n, Complex64::new(0.0, 0.0));
    buffer
}

/// Promote real samples to complex.
pub fn to_complex(values: &[f64]) -> Vec<Complex64> {
    values.iter().map(|&v| Complex64::new(v, 0.0)).collect()
}

/// Forward 1-D DFT. `n` zero-pads or truncates the input.
pub fn fft_1d(a: &[Complex64], n: Option<usize>) -> Result<Vec<Complex64>> {
    FftEngine::new().fft_1d(a, n)
}

/// Inverse 1-D DFT, normalised by `1/n`.
pub fn ifft_1d(a: &[Complex64], n: Option<usize>) -> Result<Vec<Complex64>> {
    FftEngine::new().ifft_1d(a, n)
}

/// Forward 2-D DFT over both axes. `shape` zero-pads or truncates.
pub fn fft_2d(a: &Grid<Complex64>, shape: Option<(usize, usize)>) -> Result<Grid<Complex64>> {
    FftEngine::new().fft_2d(a, shape)
}

/// Inverse 2-D DFT over both axes, normalised by `1/(rows * cols)`.
pub fn ifft_2d(a: &Grid<Complex64>, shape: Option<(usize, usize)>) -> Result<Grid<Complex64>> {
    FftEngine::new().ifft_2d(a, shape)
}

pub fn fft_1d_real(a: &[f64], n: Option<usize>) -> Result<Vec<Complex64>> {
    fft_1d(&to_complex(a), n)
}

pub fn fft_2d_real(a: &Grid, shape: Option<(usize, usize)>) -> Result<Grid<Complex64>> {
    fft_2d(&a.map(|&v| Complex64::new(v, 0.0)), shape)
}

/// Sample frequencies for an `n`-point transform with spacing `d`, in
/// transform order (`0, 1, ..., -1` over `n*d`).
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let span = n as f64 * d;
    (0..n)
        .map(|k| {
            let k = if k < n.div_ceil(2) { k as f64 } else { k as f64 - n as f64 };
            k / span
        })
        .collect()
}

/// Rotate a sequence so the zero-frequency term sits in the middle.
pub fn fftshift<T: Clone>(values: &[T]) -> Vec<T> {
    let mut out = values.to_vec();
    out.rotate_right(values.len() / 2);
    out
}

/// [`fftshift`] over both axes of a grid.
pub fn fftshift_2d<T: Clone>(grid: &Grid<T>) -> Grid<T> {
    let (rows, cols) = grid.shape();
    let dr = rows / 2;
    let dc = cols / 2;
    Grid::from_fn(rows, cols, |r, c| {
        let src_r = (r + rows - dr) % rows;
        let src_c = (c + cols - dc) % cols;
        grid.as_slice()[src_r * cols + src_c].clone()
    })
}
