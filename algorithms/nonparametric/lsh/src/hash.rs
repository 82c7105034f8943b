use annsoft_helpers::{Distance, Float, L2Dist, PointSet};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;

/// Number of random point pairs averaged when estimating the bucket width.
pub(crate) const HASH_WIDTH_SAMPLES: usize = 25;

/// Mean Euclidean distance between `HASH_WIDTH_SAMPLES` point pairs drawn
/// uniformly with replacement. A pair may pick the same point twice.
pub(crate) fn estimate_hash_width<F: Float, R: Rng>(points: &PointSet<F>, rng: &mut R) -> F {
    let n = points.len();
    let total: F = (0..HASH_WIDTH_SAMPLES)
        .map(|_| {
            let i = rng.random_range(0..n);
            let j = rng.random_range(0..n);
            L2Dist.distance(points.point(i), points.point(j))
        })
        .sum();
    total / F::from_f64_lossy(HASH_WIDTH_SAMPLES as f64)
}

/// The `T × K` p-stable hash functions of an index plus the second-level
/// hash shared by all tables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub(crate) struct HashFamily<F: Float> {
    /// One `K × D` matrix of standard-normal components per table.
    projections: Vec<Array2<F>>,
    /// One offset vector in `[0, w)` per table.
    offsets: Vec<Array1<F>>,
    second_hash_weights: Array1<i64>,
    hash_width: F,
    second_hash_size: usize,
}

impl<F: Float> HashFamily<F> {
    /// Draws every random parameter from `rng`. The second-level weights are
    /// drawn first and tables one after another, so a family with more tables
    /// shares its first tables with a smaller family drawn from the same seed.
    pub(crate) fn draw<R: Rng>(
        rng: &mut R,
        tables: usize,
        projections: usize,
        dim: usize,
        hash_width: F,
        second_hash_size: usize,
    ) -> Self {
        let second_hash_weights =
            Array1::from_shape_simple_fn(projections, || rng.random_range(0..second_hash_size) as i64);

        let width = hash_width.to_f64_lossy();
        let mut family_projections = Vec::with_capacity(tables);
        let mut family_offsets = Vec::with_capacity(tables);
        for _ in 0..tables {
            let matrix = Array2::from_shape_simple_fn((projections, dim), || {
                F::from_f64_lossy(rng.sample::<f64, _>(StandardNormal))
            });
            let offsets =
                Array1::from_shape_simple_fn(projections, || F::from_f64_lossy(rng.random_range(0.0..width)));
            family_projections.push(matrix);
            family_offsets.push(offsets);
        }

        Self {
            projections: family_projections,
            offsets: family_offsets,
            second_hash_weights,
            hash_width,
            second_hash_size,
        }
    }

    pub(crate) fn tables(&self) -> usize {
        self.projections.len()
    }

    pub(crate) fn hash_width(&self) -> F {
        self.hash_width
    }

    pub(crate) fn second_hash_size(&self) -> usize {
        self.second_hash_size
    }

    /// `(a_j · x + b_j) / w` for every projection of `table`, i.e. the point's
    /// position in units of bucket width before flooring.
    pub(crate) fn project(&self, table: usize, point: ArrayView1<F>) -> Array1<F> {
        (self.projections[table].dot(&point) + &self.offsets[table]) / self.hash_width
    }

    /// The first-level hash vector of a projected point.
    pub(crate) fn code(projected: &Array1<F>) -> Vec<i64> {
        projected.iter().map(|v| v.floor().to_f64_lossy() as i64).collect()
    }

    /// Folds a first-level hash vector into a bucket id in
    /// `[0, second_hash_size)`.
    pub(crate) fn bucket(&self, code: &[i64]) -> usize {
        let folded = code
            .iter()
            .zip(self.second_hash_weights.iter())
            .fold(0i64, |acc, (&h, &weight)| acc.wrapping_add(weight.wrapping_mul(h)));
        folded.rem_euclid(self.second_hash_size as i64) as usize
    }

    /// Bucket of `point` in `table`.
    pub(crate) fn bucket_of(&self, table: usize, point: ArrayView1<F>) -> usize {
        self.bucket(&Self::code(&self.project(table, point)))
    }
}
