// src/error.rs

use std::fmt;
use thiserror::Error;

/// The phase of a run in which a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Centering, scaling, or boosting before the analysis.
    Preprocessing,
    /// Baseline variances of the unmutated input.
    Baseline,
    /// Extraction of the given component (1-based).
    Component(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Preprocessing => write!(f, "preprocessing"),
            Stage::Baseline => write!(f, "baseline variance"),
            Stage::Component(k) => write!(f, "component {}", k),
        }
    }
}

/// Where in the data a failing reduction was evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Site {
    /// A variable column (0-based).
    Column(usize),
    /// An observation row (0-based).
    Row(usize),
    /// The whole matrix.
    Matrix,
    /// The score vector of the current component.
    ScoreVector,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Column(j) => write!(f, "variable column {}", j),
            Site::Row(i) => write!(f, "observation row {}", i),
            Site::Matrix => write!(f, "the full matrix"),
            Site::ScoreVector => write!(f, "the score vector"),
        }
    }
}

/// Returned by the low-level reductions in [`crate::missing`] when no position
/// is observed in every operand. Callers attach a [`Stage`] and [`Site`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("no jointly observed positions")]
pub struct EmptyOverlap;

/// Every failure a NIPALS run, or one of its collaborators, can produce.
#[derive(Debug, Error)]
pub enum NipalsError {
    #[error("{stage}: no jointly observed entries in {site}.")]
    EmptyOverlap { stage: Stage, site: Site },

    #[error("{stage}: zero denominator in {site}; the vector carries no usable variance.")]
    Degenerate { stage: Stage, site: Site },

    #[error("Requested {requested} components, but the matrix has {variables} variables (need 1 <= K <= C).")]
    InvalidComponentCount { requested: usize, variables: usize },

    #[error("Input matrix must have at least one row and one column, got {rows}x{cols}.")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error("Row {row} has {found} values, expected {expected}.")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Variable index {index} is out of range for a matrix with {variables} variables.")]
    VariableOutOfRange { index: usize, variables: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Run cancelled during component {component} at iteration {iteration}.")]
    Cancelled { component: usize, iteration: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error while reading delimited data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NipalsError {
    pub(crate) fn empty_overlap(stage: Stage, site: Site) -> impl FnOnce(EmptyOverlap) -> Self {
        move |_| NipalsError::EmptyOverlap { stage, site }
    }
}
