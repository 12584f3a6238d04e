// src/deflation.rs

use crate::matrix::DataMatrix;
use ndarray::{ArrayView1, Zip};

/// Removes the rank-1 reconstruction `outer(scores, loadings)` from `working`
/// in place.
///
/// Only observed cells are updated. A missing cell stays missing, so the set
/// of missing positions is the same before and after every deflation and a
/// cell that was never observed cannot enter a later reduction.
pub fn deflate(working: &mut DataMatrix, scores: ArrayView1<'_, f64>, loadings: ArrayView1<'_, f64>) {
    debug_assert_eq!(working.nrows(), scores.len());
    debug_assert_eq!(working.ncols(), loadings.len());
    Zip::from(working.view_mut().rows_mut())
        .and(&scores)
        .par_for_each(|mut row, &z| {
            Zip::from(&mut row).and(&loadings).for_each(|cell, &p| {
                if let Some(x) = cell.as_mut() {
                    *x -= z * p;
                }
            });
        });
}
