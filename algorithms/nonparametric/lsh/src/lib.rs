//! Locality-sensitive hashing for approximate k-nearest-neighbour search in
//! Euclidean space.
//!
//! Each of `T` tables hashes a point with `K` p-stable (Gaussian) projections,
//! `h_j(x) = floor((a_j · x + b_j) / w)`, and folds the `K` integers into one
//! bucket id with a second-level hash modulo `second_hash_size`. A query
//! gathers the union of its buckets over all tables (optionally probing nearby
//! buckets as well) and ranks the candidates by true distance.
//!
//! # References
//!
//! - Datar, Immorlica, Indyk & Mirrokni (2004): "Locality-sensitive hashing
//!   scheme based on p-stable distributions"
//! - Lv, Josephson, Wang, Charikar & Li (2007): "Multi-probe LSH: efficient
//!   indexing for high-dimensional similarity search"

use annsoft_helpers::{ErrorKind, PointSetError};
use thiserror::Error;

mod config;
pub mod exact;
mod hash;
mod index;
mod neighbors;
mod probe;
mod table;

pub use config::{BucketPolicy, LshConfig};
pub use index::LshIndex;
pub use neighbors::{NO_NEIGHBOR, Neighbors};
pub use table::HashTable;

/// Errors raised while building or querying an LSH index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LshError {
    /// An option is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A query point does not have the dimensionality of the reference set.
    #[error("dimension mismatch: index has {expected} dimensions, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// The estimated (or supplied) hash width cannot partition space.
    #[error("degenerate hash width {0}; the sampled reference points may all coincide")]
    DegenerateHashWidth(f64),
    /// Ground-truth neighbours do not match the shape of the result.
    #[error("true neighbours have shape {found:?}, expected {expected:?}")]
    TruthShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error(transparent)]
    PointSet(#[from] PointSetError),
}

impl LshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LshError::InvalidConfig(_) => ErrorKind::Configuration,
            LshError::DimensionMismatch { .. } | LshError::TruthShape { .. } => ErrorKind::Data,
            LshError::DegenerateHashWidth(_) => ErrorKind::Numeric,
            LshError::PointSet(e) => e.kind(),
        }
    }
}
