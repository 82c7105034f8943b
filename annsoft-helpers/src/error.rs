use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
///
/// Callers that only care about *why* a call was rejected (bad options, bad
/// data, or a numerical breakdown) can match on this instead of on the
/// algorithm-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Mutually exclusive, missing, or out-of-range options.
    Configuration,
    /// Empty inputs, dimensionality mismatches, out-of-range labels.
    Data,
    /// Degenerate numerics discovered during computation.
    Numeric,
}

/// Errors raised while ingesting a point matrix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PointSetError {
    #[error("point set contains no points")]
    Empty,
    #[error("points have zero dimensions")]
    ZeroDimension,
    #[error("non-finite coordinate at point {point}, dimension {dim}")]
    NonFinite { point: usize, dim: usize },
}

impl PointSetError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Data
    }
}
