//! Square grids and the dense multiply used as CPU load.

use crate::Error;

/// Row-major flattening of a product grid.
pub type FlatVector = Vec<f64>;

/// A square grid of `f64` values.
///
/// Grids are built once, used as a multiplication operand and dropped.
/// The only constructors are [`Grid::generate`], which fills the grid from
/// `i*j + sqrt(i+j)`, and [`Grid::from_rows`], which checks squareness.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<f64>>,
}

impl Grid {
    /// Builds a `size`×`size` grid where cell (i, j) holds `i*j + sqrt(i+j)`.
    ///
    /// Deterministic: two calls with the same size produce identical grids.
    pub fn generate(size: usize) -> Self {
        let mut rows = vec![vec![0.0; size]; size];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (i * j) as f64 + ((i + j) as f64).sqrt();
            }
        }
        Self { rows }
    }

    /// Wraps explicit rows, rejecting anything that is not N×N.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, Error> {
        let n = rows.len();
        if let Some((row, len)) = rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != n)
        {
            return Err(Error::NotSquare { rows: n, row, len });
        }
        Ok(Self { rows })
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.rows.get(i)?.get(j).copied()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Standard triple-loop product `self × other`.
    ///
    /// Both grids must have the same size; otherwise
    /// [`Error::SizeMismatch`] is returned and nothing is computed.
    pub fn multiply(&self, other: &Grid) -> Result<Grid, Error> {
        let size = self.size();
        if other.size() != size {
            return Err(Error::SizeMismatch {
                left: size,
                right: other.size(),
            });
        }

        let mut result = vec![vec![0.0; size]; size];
        for i in 0..size {
            for j in 0..size {
                let mut sum = 0.0;
                for k in 0..size {
                    sum += self.rows[i][k] * other.rows[k][j];
                }
                result[i][j] = sum;
            }
        }

        Ok(Grid { rows: result })
    }

    /// Flattens the grid in row-major order, mapping every value through `f`.
    pub fn flatten_with(self, mut f: impl FnMut(f64) -> f64) -> FlatVector {
        let mut data = Vec::with_capacity(self.size() * self.size());
        for row in self.rows {
            data.extend(row.into_iter().map(&mut f));
        }
        data
    }

    /// Flattens the grid in row-major order.
    pub fn flatten(self) -> FlatVector {
        self.flatten_with(|v| v)
    }

    /// Applies `f` to every cell in place.
    pub fn map_in_place(&mut self, mut f: impl FnMut(f64) -> f64) {
        for row in &mut self.rows {
            for cell in row {
                *cell = f(*cell);
            }
        }
    }
}

/// Builds a `size`×`size` grid from `i*j + sqrt(i+j)`.
pub fn generate(size: usize) -> Grid {
    Grid::generate(size)
}

/// Multiplies two equally sized grids.
pub fn multiply(a: &Grid, b: &Grid) -> Result<Grid, Error> {
    a.multiply(b)
}
