// src/correlation.rs

use crate::error::{NipalsError, Site, Stage};
use crate::matrix::DataMatrix;
use crate::missing::centered_pairwise_sums;
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;

/// Pearson correlation between every variable column and a score vector.
///
/// For each column only the rows where the cell is observed take part: the
/// column mean and the score mean are both computed over that subset, and the
/// centred cross product is divided by the product of the two root sums of
/// squares. A column (or score subset) without spread is
/// [`NipalsError::Degenerate`].
///
/// `data` is the matrix the component was extracted from, i.e. the working
/// matrix before deflation.
pub fn correlation_loadings(
    data: &DataMatrix,
    scores: ArrayView1<'_, f64>,
    component: usize,
) -> Result<Array1<f64>, NipalsError> {
    let stage = Stage::Component(component);
    let r = (0..data.ncols())
        .into_par_iter()
        .map(|m| {
            let sums = centered_pairwise_sums(data.column(m), scores)
                .map_err(NipalsError::empty_overlap(stage, Site::Column(m)))?;
            if sums.left_squares == 0.0 {
                return Err(NipalsError::Degenerate {
                    stage,
                    site: Site::Column(m),
                });
            }
            if sums.right_squares == 0.0 {
                return Err(NipalsError::Degenerate {
                    stage,
                    site: Site::ScoreVector,
                });
            }
            Ok(sums.cross / (sums.left_squares.sqrt() * sums.right_squares.sqrt()))
        })
        .collect::<Result<Vec<f64>, NipalsError>>()?;
    Ok(Array1::from(r))
}
