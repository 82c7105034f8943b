//! Multinomial logistic (softmax) regression.
//!
//! The model scores class `c` as `w_c · x̃`, where `x̃` is the point with a
//! trailing `1` when an intercept is fitted, and predicts the class with the
//! highest score. Training minimises the mean negative log-likelihood plus an
//! L2 penalty `(λ/2)·‖W‖²` over *all* weights, intercept included, with
//! L-BFGS.

use annsoft_helpers::{ErrorKind, PointSetError};
use thiserror::Error;

mod config;
pub mod lbfgs;
mod model;
mod objective;

pub use config::SoftmaxConfig;
pub use lbfgs::{DifferentiableFunction, Lbfgs, LbfgsConfig, OptimizationReport, Termination};
pub use model::{SoftmaxModel, SoftmaxRegression};

/// Errors raised while training or applying a softmax model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoftmaxError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Points do not have the dimensionality the model was trained on.
    #[error("dimension mismatch: model expects {expected} dimensions, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("{labels} labels given for {points} points")]
    LabelCountMismatch { points: usize, labels: usize },
    #[error("label {label} is outside [0, {num_classes})")]
    LabelOutOfRange { label: usize, num_classes: usize },
    #[error("at least two classes are required, got {0}")]
    TooFewClasses(usize),
    /// The objective evaluated to NaN or infinity at the starting point.
    #[error("objective is not finite at the initial weights")]
    NonFiniteObjective,
    /// No step decreased the objective, not even along steepest descent.
    #[error("line search could not decrease the objective after {iterations} iterations")]
    LineSearchFailed { iterations: usize },
    #[error(transparent)]
    PointSet(#[from] PointSetError),
}

impl SoftmaxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SoftmaxError::InvalidConfig(_) => ErrorKind::Configuration,
            SoftmaxError::NonFiniteObjective | SoftmaxError::LineSearchFailed { .. } => ErrorKind::Numeric,
            SoftmaxError::PointSet(e) => e.kind(),
            SoftmaxError::DimensionMismatch { .. }
            | SoftmaxError::LabelCountMismatch { .. }
            | SoftmaxError::LabelOutOfRange { .. }
            | SoftmaxError::TooFewClasses(_) => ErrorKind::Data,
        }
    }
}
