//! Exhaustive k-nearest-neighbour search, the ground truth LSH results are
//! measured against.

use annsoft_helpers::{Float, PointSet};
use rayon::prelude::*;

use crate::neighbors::select_k;
use crate::{LshError, Neighbors};

/// Exact `k` nearest neighbours of every query, in the same layout and with
/// the same tie-breaking as [`LshIndex::search`](crate::LshIndex::search).
pub fn brute_force<F: Float>(
    reference: &PointSet<F>,
    queries: &PointSet<F>,
    k: usize,
) -> Result<Neighbors<F>, LshError> {
    if k == 0 || k > reference.len() {
        return Err(LshError::InvalidConfig(format!(
            "k must be between 1 and the number of reference points ({}), got {k}",
            reference.len()
        )));
    }
    if queries.dim() != reference.dim() {
        return Err(LshError::DimensionMismatch {
            expected: reference.dim(),
            found: queries.dim(),
        });
    }

    let columns: Vec<Vec<(F, usize)>> = (0..queries.len())
        .into_par_iter()
        .map(|q| select_k(queries.point(q), 0..reference.len(), |i| reference.point(i), k))
        .collect();
    Ok(Neighbors::from_columns(k, columns))
}
