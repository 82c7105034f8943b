use ndarray::{NdFloat, ScalarOperand};

use num_traits::{AsPrimitive, FromPrimitive, NumCast};
use rand::distr::uniform::SampleUniform;

use std::iter::Sum;

mod distance;
mod error;
mod points;
mod rng;

pub use distance::{Distance, L2Dist};
pub use error::{ErrorKind, PointSetError};
pub use points::{Orientation, PointSet};
pub use rng::{resolve_seed, seeded_rng};

pub trait Float:
    NdFloat
    + FromPrimitive
    + Default
    + Sum
    + AsPrimitive<usize>
    + SampleUniform
    + ScalarOperand
    + std::marker::Unpin
{
    fn cast<T: NumCast>(x: T) -> Option<Self> {
        NumCast::from(x)
    }

    /// Converts an `f64` constant, rounding to the nearest representable value.
    fn from_f64_lossy(x: f64) -> Self;

    fn to_f64_lossy(self) -> f64;
}

impl Float for f32 {
    fn from_f64_lossy(x: f64) -> Self {
        x as f32
    }

    fn to_f64_lossy(self) -> f64 {
        self as f64
    }
}

impl Float for f64 {
    fn from_f64_lossy(x: f64) -> Self {
        x
    }

    fn to_f64_lossy(self) -> f64 {
        self
    }
}
