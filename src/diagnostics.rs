// src/diagnostics.rs

//! Explained variance, squared prediction error and Hotelling's T² per component.

use crate::error::{NipalsError, Site, Stage};
use crate::matrix::DataMatrix;
use log::debug;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Sums of squares of the unmutated input, computed once per run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarianceBaseline {
    /// Σ original² over all observed cells.
    pub total: f64,
    /// Σ original[:, j]² per column.
    pub per_column: Array1<f64>,
}

impl VarianceBaseline {
    pub fn from_original(original: &DataMatrix) -> Result<Self, NipalsError> {
        let stage = Stage::Baseline;
        let per_column = original
            .column_sums_of_squares()
            .map_err(|(j, e)| NipalsError::empty_overlap(stage, Site::Column(j))(e))?;
        if let Some(j) = per_column.iter().position(|&ss| ss == 0.0) {
            return Err(NipalsError::Degenerate {
                stage,
                site: Site::Column(j),
            });
        }
        let total = per_column.sum();
        Ok(Self { total, per_column })
    }
}

/// Statistics recorded after one component has been deflated out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDiagnostics {
    /// Cumulative R² after this component.
    pub explained_variance: f64,
    /// R²_k per variable, length C.
    pub explained_variance_per_variable: Array1<f64>,
    /// L2 norm of each residual row, length R.
    pub squared_prediction_error: Array1<f64>,
    /// Cumulative Hotelling's T², length R.
    pub hotelling_t2: Array1<f64>,
}

/// R² = 1 − Σ residual² / Σ original².
pub fn explained_variance(
    residual: &DataMatrix,
    baseline: &VarianceBaseline,
    component: usize,
) -> Result<f64, NipalsError> {
    let remaining = residual
        .sum_of_squares()
        .map_err(NipalsError::empty_overlap(Stage::Component(component), Site::Matrix))?;
    Ok(1.0 - remaining / baseline.total)
}

/// R²_k[j] = 1 − Σ residual[:, j]² / Σ original[:, j]².
pub fn explained_variance_per_variable(
    residual: &DataMatrix,
    baseline: &VarianceBaseline,
    component: usize,
) -> Result<Array1<f64>, NipalsError> {
    let remaining = residual
        .column_sums_of_squares()
        .map_err(|(j, e)| NipalsError::empty_overlap(Stage::Component(component), Site::Column(j))(e))?;
    Ok(Array1::from_shape_fn(remaining.len(), |j| {
        1.0 - remaining[j] / baseline.per_column[j]
    }))
}

/// SPE[i] = sqrt(Σ_j residual[i, j]²) over the observed cells of row i.
pub fn squared_prediction_error(residual: &DataMatrix, component: usize) -> Result<Array1<f64>, NipalsError> {
    let row_ss = residual
        .row_sums_of_squares()
        .map_err(|(i, e)| NipalsError::empty_overlap(Stage::Component(component), Site::Row(i))(e))?;
    Ok(row_ss.mapv(f64::sqrt))
}

/// Adds (z_i / std(z))² to the previous cumulative T², or starts the sum when
/// `previous` is `None`.
pub fn hotelling_t2(
    scores: ArrayView1<'_, f64>,
    previous: Option<ArrayView1<'_, f64>>,
    ddof: f64,
    component: usize,
) -> Result<Array1<f64>, NipalsError> {
    let degenerate = NipalsError::Degenerate {
        stage: Stage::Component(component),
        site: Site::ScoreVector,
    };
    if (scores.len() as f64) <= ddof {
        return Err(degenerate);
    }
    let std_dev = scores.std(ddof);
    if !(std_dev > 0.0) {
        return Err(degenerate);
    }
    let mut t2 = scores.mapv(|z| (z / std_dev).powi(2));
    if let Some(previous) = previous {
        t2 += &previous;
    }
    Ok(t2)
}

/// Accumulates per-component diagnostics. Holds the baseline of the original
/// matrix and the most recent cumulative T².
#[derive(Clone, Debug)]
pub struct DiagnosticsEngine {
    baseline: VarianceBaseline,
    hotelling_ddof: f64,
    last_t2: Option<Array1<f64>>,
}

impl DiagnosticsEngine {
    pub fn new(original: &DataMatrix, hotelling_ddof: f64) -> Result<Self, NipalsError> {
        let baseline = VarianceBaseline::from_original(original)?;
        debug!(
            "Baseline sum of squares {:.6e} over {} columns.",
            baseline.total,
            baseline.per_column.len()
        );
        Ok(Self {
            baseline,
            hotelling_ddof,
            last_t2: None,
        })
    }

    pub fn baseline(&self) -> &VarianceBaseline {
        &self.baseline
    }

    /// Computes the statistics for `component` from the residual left after it
    /// was deflated out and its score vector.
    pub fn record(
        &mut self,
        component: usize,
        residual: &DataMatrix,
        scores: ArrayView1<'_, f64>,
    ) -> Result<ComponentDiagnostics, NipalsError> {
        let t2 = hotelling_t2(
            scores,
            self.last_t2.as_ref().map(|t| t.view()),
            self.hotelling_ddof,
            component,
        )?;
        let diagnostics = ComponentDiagnostics {
            explained_variance: explained_variance(residual, &self.baseline, component)?,
            explained_variance_per_variable: explained_variance_per_variable(residual, &self.baseline, component)?,
            squared_prediction_error: squared_prediction_error(residual, component)?,
            hotelling_t2: t2.clone(),
        };
        self.last_t2 = Some(t2);
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn baseline_rejects_zero_column() {
        let m = DataMatrix::from_dense(&array![[1.0, 0.0], [2.0, 0.0]]).unwrap();
        assert!(matches!(
            VarianceBaseline::from_original(&m),
            Err(NipalsError::Degenerate { stage: Stage::Baseline, site: Site::Column(1) })
        ));
    }

    #[test]
    fn explained_variance_uses_original_baseline() {
        let original = DataMatrix::from_dense(&array![[3.0, 0.0], [0.0, 4.0]]).unwrap();
        let baseline = VarianceBaseline::from_original(&original).unwrap();
        assert_abs_diff_eq!(baseline.total, 25.0);
        let residual = DataMatrix::from_dense(&array![[1.0, 0.0], [0.0, 2.0]]).unwrap();
        assert_abs_diff_eq!(explained_variance(&residual, &baseline, 1).unwrap(), 0.8);
        let per_var = explained_variance_per_variable(&residual, &baseline, 1).unwrap();
        assert_abs_diff_eq!(per_var[0], 1.0 - 1.0 / 9.0);
        assert_abs_diff_eq!(per_var[1], 0.75);
    }

    #[test]
    fn spe_is_row_norm_over_observed_cells() {
        let residual = DataMatrix::new(array![[Some(3.0), Some(4.0)], [None, Some(-2.0)]]).unwrap();
        let spe = squared_prediction_error(&residual, 1).unwrap();
        assert_abs_diff_eq!(spe[0], 5.0);
        assert_abs_diff_eq!(spe[1], 2.0);
    }

    #[test]
    fn t2_uses_requested_ddof_and_accumulates() {
        let z = array![1.0, -1.0, 1.0, -1.0];
        // Population std is 1, sample std is sqrt(4/3).
        let population = hotelling_t2(z.view(), None, 0.0, 1).unwrap();
        assert_abs_diff_eq!(population[0], 1.0, epsilon = 1e-12);
        let sample = hotelling_t2(z.view(), None, 1.0, 1).unwrap();
        assert_abs_diff_eq!(sample[0], 0.75, epsilon = 1e-12);

        let second = hotelling_t2(array![2.0, 0.0, -2.0, 0.0].view(), Some(sample.view()), 1.0, 2).unwrap();
        for (later, earlier) in second.iter().zip(sample.iter()) {
            assert!(later >= earlier);
        }
        // std(ddof=1) of [2, 0, -2, 0] is sqrt(8/3); (2 / sqrt(8/3))² = 1.5
        assert_abs_diff_eq!(second[0], 0.75 + 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(second[1], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn constant_scores_are_degenerate() {
        let z = array![0.0, 0.0, 0.0];
        assert!(matches!(
            hotelling_t2(z.view(), None, 1.0, 4),
            Err(NipalsError::Degenerate { stage: Stage::Component(4), site: Site::ScoreVector })
        ));
    }

    #[test]
    fn engine_chains_t2_from_previous_component() {
        let original = DataMatrix::from_dense(&array![[1.0, 2.0], [-1.0, 0.5], [0.5, -1.0]]).unwrap();
        let mut engine = DiagnosticsEngine::new(&original, 1.0).unwrap();
        let first = engine.record(1, &original, array![1.0, -1.0, 0.0].view()).unwrap();
        let second = engine.record(2, &original, array![0.5, 0.5, -1.0].view()).unwrap();
        for i in 0..3 {
            assert!(second.hotelling_t2[i] >= first.hotelling_t2[i]);
        }
        assert_abs_diff_eq!(first.explained_variance, 0.0, epsilon = 1e-12);
    }
}
