// Principal component analysis via NIPALS on data with missing values

#![doc = include_str!("../README.md")]

pub mod correlation;
pub mod deflation;
pub mod diagnostics;
pub mod error;
pub mod io;
pub mod matrix;
pub mod missing;
pub mod nipals;
pub mod pca;
pub mod preprocessing;


pub use error::{NipalsError, Site, Stage};
pub use matrix::DataMatrix;
pub use nipals::{ConvergenceStatus, IterationMonitor, LoggingMonitor, NipalsConfig};
pub use pca::{ComponentSummary, NipalsOutput, NipalsPCA};
pub use preprocessing::{boost_variables, Preprocessing, PreprocessingSummary};
