//! Row-major 2-D arrays for height maps and coordinate grids.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A dense, row-major 2-D array.
///
/// `Grid<f64>` is used for heights and coordinates, with `NaN` marking
/// missing samples. `Grid<Complex64>` carries spectra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T = f64> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Grid<T> {
    /// Wrap a row-major buffer.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::ShapeMismatch {
                expected: format!("{} elements ({}x{})", rows * cols, rows, cols),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a grid by evaluating `f(row, col)` at every position.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Build a grid from nested rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::ShapeMismatch {
                    expected: format!("{n_cols} columns"),
                    actual: format!("{} columns in row {i}", row.len()),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row < self.rows && col < self.cols {
            self.data.get_mut(row * self.cols + col)
        } else {
            None
        }
    }

    /// Borrow one row as a slice.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Apply `f` to every element, producing a new grid of the same shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Combine two grids of identical shape element by element.
    pub fn zip_map<U, V>(&self, other: &Grid<U>, mut f: impl FnMut(&T, &U) -> V) -> Result<Grid<V>> {
        if self.shape() != other.shape() {
            return Err(Error::shape(self.shape(), other.shape()));
        }
        Ok(Grid {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        })
    }
}

impl<T: Clone> Grid<T> {
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Copy one column out of the grid.
    pub fn column(&self, col: usize) -> Option<Vec<T>> {
        (col < self.cols).then(|| {
            (0..self.rows)
                .map(|r| self.data[r * self.cols + col].clone())
                .collect()
        })
    }

    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |r, c| {
            self.data[c * self.cols + r].clone()
        })
    }

    /// Copy the block `rows x cols` out of the grid.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if either range exceeds the grid.
    pub fn subgrid(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Self> {
        if rows.start > rows.end || rows.end > self.rows || cols.start > cols.end || cols.end > self.cols {
            return Err(Error::OutOfBounds(format!(
                "block [{:?}, {:?}] of a {}x{} grid",
                rows, cols, self.rows, self.cols
            )));
        }
        let n_cols = cols.len();
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for r in rows.clone() {
            let start = r * self.cols;
            data.extend_from_slice(&self.data[start + cols.start..start + cols.end]);
        }
        Ok(Self {
            rows: rows.len(),
            cols: n_cols,
            data,
        })
    }
}

impl Grid<f64> {
    /// Number of finite samples.
    pub fn count_finite(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Bounding box `(rows, cols)` of the finite samples, or `None` if
    /// every sample is missing.
    pub fn finite_bounds(&self) -> Option<(Range<usize>, Range<usize>)> {
        let mut row_min = usize::MAX;
        let mut row_max = 0;
        let mut col_min = usize::MAX;
        let mut col_max = 0;
        for r in 0..self.rows {
            for c in 0..self.cols {
                if self.data[r * self.cols + c].is_finite() {
                    row_min = row_min.min(r);
                    row_max = row_max.max(r);
                    col_min = col_min.min(c);
                    col_max = col_max.max(c);
                }
            }
        }
        (row_min != usize::MAX).then(|| (row_min..row_max + 1, col_min..col_max + 1))
    }
}

/// Build coordinate grids from axis vectors: `X[r][c] = x[c]`, `Y[r][c] = y[r]`.
pub fn meshgrid(x: &[f64], y: &[f64]) -> (Grid, Grid) {
    let xx = Grid::from_fn(y.len(), x.len(), |_, c| x[c]);
    let yy = Grid::from_fn(y.len(), x.len(), |r, _| y[r]);
    (xx, yy)
}
