// src/matrix.rs

use crate::error::{EmptyOverlap, NipalsError};
use crate::missing::pairwise_sum_of_squares;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

/// An R×C matrix of observations (rows) by variables (columns) in which every
/// cell is either a real number or explicitly missing (`None`).
///
/// The shape is fixed at construction and must be at least 1×1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataMatrix {
    cells: Array2<Option<f64>>,
}

impl DataMatrix {
    /// Wraps an array of optional cells.
    ///
    /// # Errors
    /// Returns [`NipalsError::EmptyMatrix`] if either dimension is zero.
    pub fn new(cells: Array2<Option<f64>>) -> Result<Self, NipalsError> {
        let (rows, cols) = cells.dim();
        if rows == 0 || cols == 0 {
            return Err(NipalsError::EmptyMatrix { rows, cols });
        }
        Ok(Self { cells })
    }

    /// Builds a matrix with no missing cells.
    pub fn from_dense(values: &Array2<f64>) -> Result<Self, NipalsError> {
        Self::new(values.mapv(Some))
    }

    /// Builds a matrix from a float array that uses NaN to mark missing cells.
    /// This is the only place NaN is interpreted; inside the crate missingness
    /// is carried by `Option`.
    pub fn from_nan_encoded(values: &Array2<f64>) -> Result<Self, NipalsError> {
        Self::new(values.mapv(|v| if v.is_nan() { None } else { Some(v) }))
    }

    /// Builds a matrix from row vectors, all of which must have the same length.
    pub fn from_rows(rows: Vec<Vec<Option<f64>>>) -> Result<Self, NipalsError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(n_rows * n_cols);
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(NipalsError::RaggedRows {
                    row: row_idx,
                    expected: n_cols,
                    found: row.len(),
                });
            }
            flat.extend(row);
        }
        let cells = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| NipalsError::InvalidConfig(format!("could not shape row data: {}", e)))?;
        Self::new(cells)
    }

    pub fn nrows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.cells.ncols()
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, Option<f64>> {
        self.cells.view()
    }

    pub(crate) fn view_mut(&mut self) -> ArrayViewMut2<'_, Option<f64>> {
        self.cells.view_mut()
    }

    pub fn column(&self, j: usize) -> ArrayView1<'_, Option<f64>> {
        self.cells.column(j)
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, Option<f64>> {
        self.cells.row(i)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get((row, col)).copied().flatten()
    }

    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        matches!(self.cells.get((row, col)), Some(None))
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Returns the cells as a float array with NaN where a cell is missing.
    pub fn to_nan_encoded(&self) -> Array2<f64> {
        self.cells.mapv(|c| c.unwrap_or(f64::NAN))
    }

    /// Swaps the roles of observations and variables.
    pub fn transposed(&self) -> Self {
        Self {
            cells: self.cells.t().to_owned(),
        }
    }

    /// Σ x² over every observed cell.
    pub fn sum_of_squares(&self) -> Result<f64, EmptyOverlap> {
        let mut total = 0.0;
        let mut observed = 0usize;
        for x in self.cells.iter().flatten() {
            total += x * x;
            observed += 1;
        }
        if observed == 0 {
            return Err(EmptyOverlap);
        }
        Ok(total)
    }

    /// Pairwise-complete sum of squares per column, paired with the column
    /// index of the first column that has no observed cell, if any.
    pub fn column_sums_of_squares(&self) -> Result<Array1<f64>, (usize, EmptyOverlap)> {
        self.sums_of_squares_along(Axis(1))
    }

    /// Pairwise-complete sum of squares per row.
    pub fn row_sums_of_squares(&self) -> Result<Array1<f64>, (usize, EmptyOverlap)> {
        self.sums_of_squares_along(Axis(0))
    }

    fn sums_of_squares_along(&self, lane_axis: Axis) -> Result<Array1<f64>, (usize, EmptyOverlap)> {
        let lanes = if lane_axis == Axis(1) {
            self.cells.columns()
        } else {
            self.cells.rows()
        };
        lanes
            .into_iter()
            .enumerate()
            .map(|(idx, lane)| pairwise_sum_of_squares(lane).map_err(|e| (idx, e)))
            .collect::<Result<Vec<f64>, _>>()
            .map(Array1::from)
    }
}
