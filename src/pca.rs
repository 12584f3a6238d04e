// src/pca.rs

use crate::correlation::correlation_loadings;
use crate::deflation::deflate;
use crate::diagnostics::DiagnosticsEngine;
use crate::error::NipalsError;
use crate::matrix::DataMatrix;
use crate::nipals::{extract_component, ConvergenceStatus, IterationMonitor, LoggingMonitor, NipalsConfig};
use log::info;
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Per-component bookkeeping of the convergence loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    /// Σz² at the final iteration.
    pub eigenvalue: f64,
    pub iterations: usize,
    pub status: ConvergenceStatus,
    /// Whether the slow-convergence event fired.
    pub slow_convergence_signalled: bool,
}

/// Result of a NIPALS PCA run with K components on an R×C matrix.
///
/// All matrices are component-major: row `k - 1` belongs to component `k`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NipalsOutput {
    /// Score vectors. Shape: `(K, R)`
    pub scores: Array2<f64>,
    /// Loading vectors. Shape: `(K, C)`
    pub loadings: Array2<f64>,
    /// Correlation loadings. Shape: `(K, C)`
    pub correlation_loadings: Array2<f64>,
    /// Cumulative R². Length `K + 1`, starting with 0 for zero components.
    pub explained_variance: Array1<f64>,
    /// R² per variable after each component. Shape: `(K, C)`
    pub explained_variance_per_variable: Array2<f64>,
    /// Squared prediction error per observation. Shape: `(K, R)`
    pub squared_prediction_error: Array2<f64>,
    /// Cumulative Hotelling's T² per observation. Shape: `(K, R)`
    pub hotelling_t2: Array2<f64>,
    /// One entry per component, in extraction order.
    pub components: Vec<ComponentSummary>,
    /// Working matrix left after the last deflation.
    pub residual: DataMatrix,
}

impl NipalsOutput {
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Eigenvalues (Σz²) of all components.
    pub fn eigenvalues(&self) -> Array1<f64> {
        self.components.iter().map(|c| c.eigenvalue).collect()
    }

    /// Whether every component met the convergence tolerance.
    pub fn all_converged(&self) -> bool {
        self.components
            .iter()
            .all(|c| c.status == ConvergenceStatus::Converged)
    }

    /// Σ_{c ≤ k} outer(Z_c, P_c) as a dense R×C array.
    pub fn reconstruct(&self, k: usize) -> Result<Array2<f64>, NipalsError> {
        if k == 0 || k > self.n_components() {
            return Err(NipalsError::InvalidComponentCount {
                requested: k,
                variables: self.n_components(),
            });
        }
        let z = self.scores.slice(s![..k, ..]);
        let p = self.loadings.slice(s![..k, ..]);
        Ok(z.t().dot(&p))
    }

    /// Saves the output to a file using bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NipalsError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| NipalsError::Serialization(format!("Failed to serialize NIPALS output: {}", e)))?;
        Ok(())
    }

    /// Loads an output previously written with [`NipalsOutput::save`] and checks
    /// that its shapes agree with each other.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NipalsError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let output: NipalsOutput =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| NipalsError::Serialization(format!("Failed to deserialize NIPALS output: {}", e)))?;
        output.check_shapes()?;
        Ok(output)
    }

    fn check_shapes(&self) -> Result<(), NipalsError> {
        let k = self.components.len();
        let (r, c) = self.residual.dim();
        let expected = [
            ("scores", self.scores.dim(), (k, r)),
            ("loadings", self.loadings.dim(), (k, c)),
            ("correlation_loadings", self.correlation_loadings.dim(), (k, c)),
            ("explained_variance_per_variable", self.explained_variance_per_variable.dim(), (k, c)),
            ("squared_prediction_error", self.squared_prediction_error.dim(), (k, r)),
            ("hotelling_t2", self.hotelling_t2.dim(), (k, r)),
        ];
        for (name, found, wanted) in expected.iter() {
            if found != wanted {
                return Err(NipalsError::Serialization(format!(
                    "Loaded NIPALS output has inconsistent {} shape {:?}, expected {:?}.",
                    name, found, wanted
                )));
            }
        }
        if self.explained_variance.len() != k + 1 {
            return Err(NipalsError::Serialization(format!(
                "Loaded NIPALS output has {} explained variance entries for {} components.",
                self.explained_variance.len(),
                k
            )));
        }
        Ok(())
    }
}

/// Principal component analysis by sequential NIPALS extraction.
///
/// Each round extracts one component from the working matrix, computes its
/// correlation loadings, deflates it out, and records diagnostics against the
/// unmutated input. Rounds are strictly sequential; any fatal error aborts the
/// whole run since later components depend on earlier deflations.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use nipals_pca::{DataMatrix, NipalsPCA};
///
/// let data = DataMatrix::from_dense(&array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]).unwrap();
/// let output = NipalsPCA::default().fit(&data, 1).unwrap();
/// assert!((output.explained_variance[1] - 1.0).abs() < 1e-6);
/// ```
#[derive(Clone, Debug, Default)]
pub struct NipalsPCA {
    config: NipalsConfig,
}

impl NipalsPCA {
    pub fn new(config: NipalsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NipalsConfig {
        &self.config
    }

    /// Runs `n_components` rounds on `data`, logging slow convergence.
    ///
    /// `data` must already be preprocessed; it serves both as the initial
    /// working matrix and as the variance baseline.
    ///
    /// # Errors
    /// - [`NipalsError::InvalidComponentCount`] unless `1 <= n_components <= C`,
    ///   checked before any computation.
    /// - [`NipalsError::EmptyOverlap`] / [`NipalsError::Degenerate`] naming the
    ///   component and column/row where a reduction broke down.
    pub fn fit(&self, data: &DataMatrix, n_components: usize) -> Result<NipalsOutput, NipalsError> {
        self.fit_with_monitor(data, n_components, &mut LoggingMonitor)
    }

    /// Same as [`NipalsPCA::fit`] with a caller-supplied monitor for the
    /// slow-convergence event and cancellation.
    pub fn fit_with_monitor(
        &self,
        data: &DataMatrix,
        n_components: usize,
        monitor: &mut dyn IterationMonitor,
    ) -> Result<NipalsOutput, NipalsError> {
        self.config.validate()?;
        let (n_rows, n_cols) = data.dim();
        if n_components == 0 || n_components > n_cols {
            return Err(NipalsError::InvalidComponentCount {
                requested: n_components,
                variables: n_cols,
            });
        }

        info!(
            "Starting NIPALS PCA. Components={}, Observations={}, Variables={}, Missing cells={}",
            n_components,
            n_rows,
            n_cols,
            data.missing_count()
        );
        let start_time = std::time::Instant::now();

        let mut diagnostics = DiagnosticsEngine::new(data, self.config.hotelling_ddof)?;
        let mut working = data.clone();

        let mut scores = Array2::<f64>::zeros((n_components, n_rows));
        let mut loadings = Array2::<f64>::zeros((n_components, n_cols));
        let mut correlation = Array2::<f64>::zeros((n_components, n_cols));
        let mut explained_variance = Array1::<f64>::zeros(n_components + 1);
        let mut per_variable = Array2::<f64>::zeros((n_components, n_cols));
        let mut spe = Array2::<f64>::zeros((n_components, n_rows));
        let mut t2 = Array2::<f64>::zeros((n_components, n_rows));
        let mut components = Vec::with_capacity(n_components);

        for k in 1..=n_components {
            let extracted = extract_component(&working, k, &self.config, monitor)?;
            let r = correlation_loadings(&working, extracted.scores.view(), k)?;
            deflate(&mut working, extracted.scores.view(), extracted.loadings.view());
            let stats = diagnostics.record(k, &working, extracted.scores.view())?;

            info!(
                "Component {}: eigenvalue {:.6e}, {} iterations ({:?}), cumulative R^2 {:.6}",
                k, extracted.eigenvalue, extracted.iterations, extracted.status, stats.explained_variance
            );

            let row = k - 1;
            scores.row_mut(row).assign(&extracted.scores);
            loadings.row_mut(row).assign(&extracted.loadings);
            correlation.row_mut(row).assign(&r);
            explained_variance[k] = stats.explained_variance;
            per_variable.row_mut(row).assign(&stats.explained_variance_per_variable);
            spe.row_mut(row).assign(&stats.squared_prediction_error);
            t2.row_mut(row).assign(&stats.hotelling_t2);
            components.push(ComponentSummary {
                eigenvalue: extracted.eigenvalue,
                iterations: extracted.iterations,
                status: extracted.status,
                slow_convergence_signalled: extracted.slow_convergence_signalled,
            });
        }

        info!("NIPALS PCA finished in {:?}", start_time.elapsed());

        Ok(NipalsOutput {
            scores,
            loadings,
            correlation_loadings: correlation,
            explained_variance,
            explained_variance_per_variable: per_variable,
            squared_prediction_error: spe,
            hotelling_t2: t2,
            components,
            residual: working,
        })
    }
}
