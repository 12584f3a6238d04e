// src/nipals.rs

//! Single-component NIPALS power iteration on a matrix with missing cells.

use crate::error::{NipalsError, Site, Stage};
use crate::matrix::DataMatrix;
use crate::missing::{pairwise_sums, MaybeObserved};
use log::{debug, trace, warn};
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Convergence threshold on |Σz_old² − Σz_new²|.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;
/// Iteration at which the slow-convergence event fires.
pub const DEFAULT_WARNING_ITERATION: usize = 300;
/// Hard iteration ceiling for one component.
pub const DEFAULT_MAX_ITERATIONS: usize = 600;
/// Degrees of freedom used for the score standard deviation in Hotelling's T².
pub const DEFAULT_HOTELLING_DDOF: f64 = 1.0;

/// Tunable constants of the NIPALS loop and of the derived statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NipalsConfig {
    /// Stop once the squared length of the score vector changes by less than this.
    pub tolerance: f64,
    /// Iteration at which [`IterationMonitor::on_slow_convergence`] is called.
    /// Must lie in `1..=max_iterations`.
    pub warning_iteration: usize,
    /// Iteration after which a component is returned regardless of convergence.
    pub max_iterations: usize,
    /// `ddof` for the score standard deviation in Hotelling's T².
    /// `1.0` is the sample standard deviation, `0.0` the population one.
    pub hotelling_ddof: f64,
}

impl Default for NipalsConfig {
    fn default() -> Self {
        NipalsConfig {
            tolerance: DEFAULT_TOLERANCE,
            warning_iteration: DEFAULT_WARNING_ITERATION,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            hotelling_ddof: DEFAULT_HOTELLING_DDOF,
        }
    }
}

impl NipalsConfig {
    pub fn validate(&self) -> Result<(), NipalsError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(NipalsError::InvalidConfig(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(NipalsError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if self.warning_iteration == 0 {
            return Err(NipalsError::InvalidConfig(
                "warning_iteration must be at least 1; iterations are counted from 1".into(),
            ));
        }
        if self.warning_iteration > self.max_iterations {
            return Err(NipalsError::InvalidConfig(format!(
                "warning_iteration ({}) exceeds max_iterations ({})",
                self.warning_iteration, self.max_iterations
            )));
        }
        if !(self.hotelling_ddof.is_finite() && self.hotelling_ddof >= 0.0) {
            return Err(NipalsError::InvalidConfig(format!(
                "hotelling_ddof must be non-negative, got {}",
                self.hotelling_ddof
            )));
        }
        Ok(())
    }
}

/// How the iteration loop of one component ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    Converged,
    /// The ceiling was hit first; the last score/loading pair is still returned.
    IterationLimitReached,
}

/// Hooks into the convergence loop of every component.
pub trait IterationMonitor {
    /// Called once per component when the iteration count reaches
    /// [`NipalsConfig::warning_iteration`]. `scores` is the current score vector,
    /// which is the place to look for outlying observations that slow convergence.
    fn on_slow_convergence(&mut self, component: usize, iteration: usize, scores: ArrayView1<'_, f64>) {
        let mut extremes: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
        extremes.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
        extremes.truncate(3);
        warn!(
            "Component {} has not converged after {} iterations. Check the data for extreme outliers; largest |score| rows: {:?}",
            component, iteration, extremes
        );
    }

    /// Polled after every iteration. Returning `true` aborts the run.
    fn should_cancel(&mut self, _component: usize, _iteration: usize) -> bool {
        false
    }
}

/// Monitor that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingMonitor;

impl IterationMonitor for LoggingMonitor {}

/// One extracted component before correlation loadings are attached.
#[derive(Clone, Debug)]
pub struct ExtractedComponent {
    /// Score vector Z, length R.
    pub scores: Array1<f64>,
    /// Loading vector P, length C.
    pub loadings: Array1<f64>,
    /// Σz² at the final iteration.
    pub eigenvalue: f64,
    pub iterations: usize,
    pub status: ConvergenceStatus,
    /// Whether the slow-convergence event fired for this component.
    pub slow_convergence_signalled: bool,
}

/// Picks the column with the largest pairwise-complete sum of squares as the
/// starting score vector. Ties resolve to the lowest column index.
pub fn initial_scores(
    working: &DataMatrix,
    component: usize,
) -> Result<(usize, Array1<Option<f64>>), NipalsError> {
    let stage = Stage::Component(component);
    let column_ss = working
        .column_sums_of_squares()
        .map_err(|(j, e)| NipalsError::empty_overlap(stage, Site::Column(j))(e))?;

    let mut best = 0usize;
    for (j, &ss) in column_ss.iter().enumerate() {
        if ss > column_ss[best] {
            best = j;
        }
    }
    debug!(
        "Component {}: seeding scores from column {} (sum of squares {:.6e}).",
        component, best, column_ss[best]
    );
    Ok((best, working.column(best).to_owned()))
}

/// p_m = Σ z_i·x_im / Σ z_i² for every column m, both sums over rows where
/// x_im and z_i are observed.
pub fn update_loadings<Z: MaybeObserved>(
    working: &DataMatrix,
    scores: ArrayView1<'_, Z>,
    component: usize,
) -> Result<Array1<f64>, NipalsError> {
    let stage = Stage::Component(component);
    let loadings = (0..working.ncols())
        .into_par_iter()
        .map(|m| {
            let sums = pairwise_sums(working.column(m), scores)
                .map_err(NipalsError::empty_overlap(stage, Site::Column(m)))?;
            if sums.right_squares == 0.0 {
                return Err(NipalsError::Degenerate {
                    stage,
                    site: Site::Column(m),
                });
            }
            Ok(sums.cross / sums.right_squares)
        })
        .collect::<Result<Vec<f64>, NipalsError>>()?;
    Ok(Array1::from(loadings))
}

/// z_n = Σ p_m·x_nm / Σ p_m² for every row n, both sums over columns where
/// x_nm is observed.
pub fn update_scores(
    working: &DataMatrix,
    loadings: ArrayView1<'_, f64>,
    component: usize,
) -> Result<Array1<f64>, NipalsError> {
    let stage = Stage::Component(component);
    let scores = (0..working.nrows())
        .into_par_iter()
        .map(|n| {
            let sums = pairwise_sums(working.row(n), loadings)
                .map_err(NipalsError::empty_overlap(stage, Site::Row(n)))?;
            if sums.right_squares == 0.0 {
                return Err(NipalsError::Degenerate {
                    stage,
                    site: Site::Row(n),
                });
            }
            Ok(sums.cross / sums.right_squares)
        })
        .collect::<Result<Vec<f64>, NipalsError>>()?;
    Ok(Array1::from(scores))
}

fn squared_length<Z: MaybeObserved>(scores: ArrayView1<'_, Z>) -> f64 {
    scores.iter().filter_map(|z| z.observed()).map(|z| z * z).sum()
}

/// Runs the NIPALS loop for one component on `working`.
///
/// The loop starts from [`initial_scores`], alternates [`update_loadings`] and
/// [`update_scores`], and stops when |Σz_old² − Σz_new²| < `tolerance`. Loadings
/// are not renormalised between iterations. At `warning_iteration` the monitor
/// is notified; at `max_iterations` the last pair is returned with
/// [`ConvergenceStatus::IterationLimitReached`].
pub fn extract_component(
    working: &DataMatrix,
    component: usize,
    config: &NipalsConfig,
    monitor: &mut dyn IterationMonitor,
) -> Result<ExtractedComponent, NipalsError> {
    let (_, seed) = initial_scores(working, component)?;
    let mut previous_length = squared_length(seed.view());

    // The seed may hold missing cells; every later score vector is fully observed.
    let mut loadings = update_loadings(working, seed.view(), component)?;
    let mut scores = update_scores(working, loadings.view(), component)?;
    let mut iteration = 1usize;
    let mut slow_convergence_signalled = false;

    loop {
        let length = squared_length(scores.view());
        let delta = (previous_length - length).abs();
        trace!(
            "Component {} iteration {}: sum z^2 = {:.12e}, delta = {:.3e}",
            component, iteration, length, delta
        );
        previous_length = length;

        if iteration == config.warning_iteration {
            slow_convergence_signalled = true;
            monitor.on_slow_convergence(component, iteration, scores.view());
        }

        if delta < config.tolerance {
            return Ok(ExtractedComponent {
                scores,
                loadings,
                eigenvalue: length,
                iterations: iteration,
                status: ConvergenceStatus::Converged,
                slow_convergence_signalled,
            });
        }

        if iteration >= config.max_iterations {
            warn!(
                "Component {} stopped at the iteration ceiling ({}) with delta {:.3e}; returning the last estimate.",
                component, iteration, delta
            );
            return Ok(ExtractedComponent {
                scores,
                loadings,
                eigenvalue: length,
                iterations: iteration,
                status: ConvergenceStatus::IterationLimitReached,
                slow_convergence_signalled,
            });
        }

        if monitor.should_cancel(component, iteration) {
            return Err(NipalsError::Cancelled { component, iteration });
        }

        iteration += 1;
        loadings = update_loadings(working, scores.view(), component)?;
        scores = update_scores(working, loadings.view(), component)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn rank_one() -> DataMatrix {
        DataMatrix::from_dense(&array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]).unwrap()
    }

    #[test]
    fn default_config_matches_documented_constants() {
        let config = NipalsConfig::default();
        assert_eq!(config.tolerance, 1e-9);
        assert_eq!(config.warning_iteration, 300);
        assert_eq!(config.max_iterations, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad = [
            NipalsConfig { tolerance: 0.0, ..NipalsConfig::default() },
            NipalsConfig { max_iterations: 0, warning_iteration: 0, ..NipalsConfig::default() },
            NipalsConfig { warning_iteration: 700, ..NipalsConfig::default() },
            NipalsConfig { warning_iteration: 0, ..NipalsConfig::default() },
            NipalsConfig { hotelling_ddof: -1.0, ..NipalsConfig::default() },
        ];
        for config in bad.iter() {
            assert!(matches!(config.validate(), Err(NipalsError::InvalidConfig(_))), "{:?}", config);
        }
    }

    #[test]
    fn seed_is_column_with_largest_sum_of_squares() {
        let m = DataMatrix::new(array![
            [Some(1.0), Some(0.5), None],
            [Some(1.0), None, Some(4.0)],
            [Some(1.0), Some(0.5), Some(-1.0)]
        ])
        .unwrap();
        let (column, seed) = initial_scores(&m, 1).unwrap();
        assert_eq!(column, 2);
        assert_eq!(seed, array![None, Some(4.0), Some(-1.0)]);
    }

    #[test]
    fn rank_one_matrix_converges_on_first_iteration() {
        let component = extract_component(&rank_one(), 1, &NipalsConfig::default(), &mut LoggingMonitor).unwrap();
        assert_eq!(component.status, ConvergenceStatus::Converged);
        assert_eq!(component.iterations, 1);
        // Seeded from the second column, so the loading is exactly [0.5, 1].
        assert_abs_diff_eq!(component.loadings[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(component.loadings[1], 1.0, epsilon = 1e-12);
        for (z, expected) in component.scores.iter().zip([2.0, 4.0, 6.0]) {
            assert_abs_diff_eq!(*z, expected, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(component.eigenvalue, 56.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_cell_matches_deleted_row_for_its_column() {
        let full = array![[1.0, 2.0, 0.5], [2.0, 3.5, -1.0], [3.0, 6.5, 2.0], [-1.0, -2.5, 0.0]];
        let mut with_missing = full.mapv(Some);
        with_missing[[0, 1]] = None;
        let with_missing = DataMatrix::new(with_missing).unwrap();
        let without_row = DataMatrix::from_dense(&full.slice(ndarray::s![1.., ..]).to_owned()).unwrap();

        let scores = array![0.7, 1.3, -2.0, 0.4];
        let p_missing = update_loadings(&with_missing, scores.view(), 1).unwrap();
        let p_deleted = update_loadings(&without_row, scores.slice(ndarray::s![1..]), 1).unwrap();
        assert_abs_diff_eq!(p_missing[1], p_deleted[1], epsilon = 1e-14);
    }

    #[test]
    fn zero_column_is_degenerate() {
        let m = DataMatrix::from_dense(&Array2::zeros((3, 2))).unwrap();
        let err = extract_component(&m, 2, &NipalsConfig::default(), &mut LoggingMonitor).unwrap_err();
        assert!(matches!(
            err,
            NipalsError::Degenerate { stage: Stage::Component(2), site: Site::Column(0) }
        ));
    }

    #[test]
    fn fully_missing_row_has_empty_overlap() {
        let m = DataMatrix::new(array![[Some(1.0), Some(2.0)], [None, None], [Some(3.0), Some(1.0)]]).unwrap();
        let loadings = array![1.0, 1.0];
        let err = update_scores(&m, loadings.view(), 1).unwrap_err();
        assert!(matches!(err, NipalsError::EmptyOverlap { site: Site::Row(1), .. }));
    }

    struct CancelAt(usize);

    impl IterationMonitor for CancelAt {
        fn should_cancel(&mut self, _component: usize, iteration: usize) -> bool {
            iteration >= self.0
        }
    }

    #[test]
    fn monitor_can_cancel_between_iterations() {
        let m = DataMatrix::from_dense(&array![[1.0, 0.9], [0.8, -1.1], [-0.3, 0.4], [0.2, 0.25]]).unwrap();
        let config = NipalsConfig { tolerance: 1e-300, ..NipalsConfig::default() };
        let err = extract_component(&m, 1, &config, &mut CancelAt(2)).unwrap_err();
        assert!(matches!(err, NipalsError::Cancelled { component: 1, iteration: 2 }));
    }
}
