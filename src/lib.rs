//! Approximate nearest-neighbour search with locality-sensitive hashing and
//! softmax regression, plus the program layer that drives both.
//!
//! The engines live in their own crates and are re-exported here:
//!
//! - [`lsh`]: index construction, (multiprobe) k-NN queries and recall.
//! - [`softmax_regression`]: L-BFGS training, prediction and accuracy.
//!
//! [`programs`] validates whole option sets the way a command-line front end
//! would and runs the corresponding pipeline.

mod error;
pub mod programs;

pub use error::Error;

pub use annsoft_helpers::{
    Distance, ErrorKind, Float, L2Dist, Orientation, PointSet, PointSetError,
};
pub use lsh::{BucketPolicy, LshConfig, LshError, LshIndex, NO_NEIGHBOR, Neighbors};
pub use softmax_regression::{
    LbfgsConfig, SoftmaxConfig, SoftmaxError, SoftmaxModel, SoftmaxRegression,
};

pub use lsh;
pub use softmax_regression;
