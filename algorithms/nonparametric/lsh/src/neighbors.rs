use std::cmp::Ordering;

use annsoft_helpers::{Distance, Float, L2Dist};
use ndarray::{Array2, ArrayView1};

use crate::LshError;

/// Neighbour index used for slots that could not be filled.
pub const NO_NEIGHBOR: usize = usize::MAX;

/// The result of a k-nearest-neighbour search.
///
/// Both matrices are `k × Q`: column `q` belongs to query `q`, and row `j`
/// holds its `(j + 1)`-th nearest neighbour. Slots that no candidate reached
/// hold [`NO_NEIGHBOR`] with an infinite distance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Neighbors<F: Float> {
    pub distances: Array2<F>,
    pub neighbors: Array2<usize>,
}

impl<F: Float> Neighbors<F> {
    /// Lays out per-query `(distance, index)` lists, each already sorted and
    /// at most `k` long.
    pub(crate) fn from_columns(k: usize, columns: Vec<Vec<(F, usize)>>) -> Self {
        let mut distances = Array2::from_elem((k, columns.len()), F::infinity());
        let mut neighbors = Array2::from_elem((k, columns.len()), NO_NEIGHBOR);
        for (q, column) in columns.into_iter().enumerate() {
            for (j, (distance, index)) in column.into_iter().enumerate() {
                distances[[j, q]] = distance;
                neighbors[[j, q]] = index;
            }
        }
        Self { distances, neighbors }
    }

    pub fn k(&self) -> usize {
        self.neighbors.nrows()
    }

    pub fn num_queries(&self) -> usize {
        self.neighbors.ncols()
    }

    /// Found neighbours of query `q` as `(index, distance)`, nearest first.
    pub fn of(&self, q: usize) -> impl Iterator<Item = (usize, F)> + '_ {
        self.neighbors
            .column(q)
            .into_iter()
            .zip(self.distances.column(q))
            .filter(|(index, _)| **index != NO_NEIGHBOR)
            .map(|(&index, &distance)| (index, distance))
    }

    /// Number of slots left empty across all queries.
    pub fn missing(&self) -> usize {
        self.neighbors.iter().filter(|&&i| i == NO_NEIGHBOR).count()
    }

    /// Fraction of the entries of `truth` (a `k × Q` matrix of true neighbour
    /// indices) that appear in the same query's column of this result.
    pub fn recall(&self, truth: &Array2<usize>) -> Result<f64, LshError> {
        if truth.dim() != self.neighbors.dim() {
            return Err(LshError::TruthShape {
                expected: self.neighbors.dim(),
                found: truth.dim(),
            });
        }
        let found: usize = truth
            .columns()
            .into_iter()
            .zip(self.neighbors.columns())
            .map(|(expected, returned)| {
                expected
                    .iter()
                    .filter(|&&t| t != NO_NEIGHBOR && returned.iter().any(|&r| r == t))
                    .count()
            })
            .sum();
        Ok(found as f64 / truth.len() as f64)
    }
}

/// Orders `(distance, index)` pairs by distance, then by index.
pub(crate) fn by_distance_then_index<F: Float>(a: &(F, usize), b: &(F, usize)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then(a.1.cmp(&b.1))
}

/// Ranks `candidates` (reference indices, any order, no duplicates) by
/// distance to `query` and keeps the `k` best.
pub(crate) fn select_k<'a, F, I>(
    query: ArrayView1<F>,
    candidates: I,
    point: impl Fn(usize) -> ArrayView1<'a, F>,
    k: usize,
) -> Vec<(F, usize)>
where
    F: Float + 'a,
    I: IntoIterator<Item = usize>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(F, usize)> = candidates
        .into_iter()
        .map(|i| (L2Dist.rdistance(query, point(i)), i))
        .collect();
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_distance_then_index);
        scored.truncate(k);
    }
    scored.sort_unstable_by(by_distance_then_index);
    scored
        .into_iter()
        .map(|(rdist, i)| (Distance::<F>::rdist_to_dist(&L2Dist, rdist), i))
        .collect()
}
