use annsoft_helpers::{ErrorKind, PointSetError};
use lsh::LshError;
use softmax_regression::SoftmaxError;
use thiserror::Error;

/// Errors surfaced by the program layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Conflicting or missing program options.
    #[error("invalid options: {0}")]
    Configuration(String),
    #[error(transparent)]
    Lsh(#[from] LshError),
    #[error(transparent)]
    Softmax(#[from] SoftmaxError),
    #[error(transparent)]
    PointSet(#[from] PointSetError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Lsh(e) => e.kind(),
            Error::Softmax(e) => e.kind(),
            Error::PointSet(e) => e.kind(),
        }
    }
}
