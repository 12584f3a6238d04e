// src/preprocessing.rs

//! Column centering, scaling and boosting applied before a NIPALS run.

use crate::error::{NipalsError, Site, Stage};
use crate::matrix::DataMatrix;
use crate::missing::mean_excluding_missing;
use log::{debug, info};
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

/// Factor applied to boosted variables.
pub const DEFAULT_BOOST_FACTOR: f64 = 1000.0;

/// Which column transforms to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preprocessing {
    /// Leave the data untouched.
    None,
    /// Subtract the missing-aware column mean.
    MeanCenter,
    /// Mean-center, then divide by the missing-aware sample standard deviation.
    Standardize,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Preprocessing::Standardize
    }
}

/// The per-column statistics a [`Preprocessing`] step used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingSummary {
    /// Column means, if the data was centred.
    pub means: Option<Array1<f64>>,
    /// Column scale factors, if the data was scaled. Always positive; columns
    /// with fewer than two observations or no spread keep 1.0.
    pub scales: Option<Array1<f64>>,
}

impl Preprocessing {
    /// Applies the transform to `data` in place. Missing cells stay missing.
    pub fn apply(self, data: &mut DataMatrix) -> Result<PreprocessingSummary, NipalsError> {
        let mut summary = PreprocessingSummary {
            means: None,
            scales: None,
        };
        if self == Preprocessing::None {
            return Ok(summary);
        }

        let means = column_means(data)?;
        let mut cells = data.view_mut();
        for (mut column, &mean) in cells.axis_iter_mut(Axis(1)).zip(means.iter()) {
            column.iter_mut().flatten().for_each(|x| *x -= mean);
        }
        debug!("Mean-centred {} columns.", means.len());
        summary.means = Some(means);

        if self == Preprocessing::Standardize {
            let scales = column_scales(data);
            let mut cells = data.view_mut();
            for (mut column, &scale) in cells.axis_iter_mut(Axis(1)).zip(scales.iter()) {
                column.iter_mut().flatten().for_each(|x| *x /= scale);
            }
            debug!("Scaled {} columns to unit sample standard deviation.", scales.len());
            summary.scales = Some(scales);
        }
        info!("Applied {:?} preprocessing to a {:?} matrix.", self, data.dim());
        Ok(summary)
    }
}

fn column_means(data: &DataMatrix) -> Result<Array1<f64>, NipalsError> {
    (0..data.ncols())
        .map(|j| {
            mean_excluding_missing(data.column(j))
                .map_err(NipalsError::empty_overlap(Stage::Preprocessing, Site::Column(j)))
        })
        .collect::<Result<Vec<f64>, _>>()
        .map(Array1::from)
}

/// Sample standard deviation (ddof = 1) of each already-centred column.
fn column_scales(data: &DataMatrix) -> Array1<f64> {
    Array1::from_shape_fn(data.ncols(), |j| {
        let column = data.column(j);
        let observed: Array1<f64> = column.iter().flatten().copied().collect();
        if observed.len() < 2 {
            return 1.0;
        }
        let std_dev = observed.std(1.0);
        if std_dev.is_finite() && std_dev > 1e-12 {
            std_dev
        } else {
            1.0
        }
    })
}

/// Multiplies the given 0-based variable columns by `factor`, pulling their
/// influence into the leading components.
pub fn boost_variables(data: &mut DataMatrix, variables: &[usize], factor: f64) -> Result<(), NipalsError> {
    let n_cols = data.ncols();
    if let Some(&index) = variables.iter().find(|&&j| j >= n_cols) {
        return Err(NipalsError::VariableOutOfRange {
            index,
            variables: n_cols,
        });
    }
    let mut cells = data.view_mut();
    for &j in variables {
        cells.column_mut(j).iter_mut().flatten().for_each(|x| *x *= factor);
    }
    debug!("Boosted variables {:?} by a factor of {}.", variables, factor);
    Ok(())
}
