use std::collections::HashSet;

use annsoft_helpers::{Float, PointSet, resolve_seed};
use ndarray::ArrayView1;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use tracing::debug;

use crate::hash::{HashFamily, estimate_hash_width};
use crate::neighbors::select_k;
use crate::probe::probe_sequence;
use crate::{BucketPolicy, HashTable, LshConfig, LshError, Neighbors};

/// A multi-table LSH index over an owned reference set.
///
/// The index is immutable once built and can be searched concurrently.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LshIndex<F: Float> {
    reference: PointSet<F>,
    hashes: HashFamily<F>,
    tables: Vec<HashTable>,
    projections: usize,
    bucket_size: usize,
    bucket_policy: BucketPolicy,
    seed: u64,
}

impl<F: Float> LshIndex<F> {
    /// Hashes every reference point into `config.tables` tables.
    ///
    /// # Arguments
    ///
    /// * `reference` - The points to index. The index takes ownership and
    ///   reports neighbours by their position in this set.
    /// * `config` - Table and projection counts, bucket width, bucket
    ///   capacity and seed. A `hash_width` of `0` is estimated from the data.
    ///
    /// # Returns
    ///
    /// The index, ready for [`search`](Self::search) and
    /// [`search_reference`](Self::search_reference).
    ///
    /// # Errors
    ///
    /// Returns `LshError::InvalidConfig` for out-of-range options and
    /// `LshError::DegenerateHashWidth` when the bucket width (given or
    /// estimated) is not strictly positive.
    pub fn build(reference: PointSet<F>, config: LshConfig) -> Result<Self, LshError> {
        config.validate()?;

        let seed = resolve_seed(config.seed);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let hash_width = if config.hash_width == 0.0 {
            let estimated = estimate_hash_width(&reference, &mut rng);
            debug!(hash_width = estimated.to_f64_lossy(), "estimated hash width");
            estimated
        } else {
            F::from_f64_lossy(config.hash_width)
        };
        let width = hash_width.to_f64_lossy();
        if !width.is_finite() || width <= 0.0 {
            return Err(LshError::DegenerateHashWidth(width));
        }

        let hashes = HashFamily::draw(
            &mut rng,
            config.tables,
            config.projections,
            reference.dim(),
            hash_width,
            config.second_hash_size,
        );

        let filled: Vec<(HashTable, usize)> = (0..config.tables)
            .into_par_iter()
            .map(|t| {
                let mut table = HashTable::new();
                let mut dropped = 0;
                for (i, point) in reference.iter().enumerate() {
                    let bucket = hashes.bucket_of(t, point);
                    if !table.insert(bucket, i, config.bucket_size, config.bucket_policy) {
                        dropped += 1;
                    }
                }
                (table, dropped)
            })
            .collect();

        let dropped: usize = filled.iter().map(|(_, d)| d).sum();
        let tables: Vec<HashTable> = filled.into_iter().map(|(table, _)| table).collect();
        let overflowing: usize = tables.iter().map(|t| t.overflowing(config.bucket_size)).sum();
        debug!(
            points = reference.len(),
            tables = tables.len(),
            projections = config.projections,
            seed,
            overflowing,
            dropped,
            "built LSH index"
        );

        Ok(Self {
            reference,
            hashes,
            tables,
            projections: config.projections,
            bucket_size: config.bucket_size,
            bucket_policy: config.bucket_policy,
            seed,
        })
    }

    /// Approximate `k` nearest neighbours of every query point.
    ///
    /// # Arguments
    ///
    /// * `queries` - Points to search for.
    /// * `k` - Number of neighbours per query.
    /// * `num_probes` - Extra buckets visited per table in addition to the
    ///   query's own bucket.
    ///
    /// # Returns
    ///
    /// `k × queries.len()` neighbour indices and distances, nearest first.
    /// Slots with no candidate hold `NO_NEIGHBOR` and an infinite distance.
    ///
    /// # Errors
    ///
    /// `k` must lie in `1..=len()`; queries must have the reference
    /// dimensionality.
    pub fn search(
        &self,
        queries: &PointSet<F>,
        k: usize,
        num_probes: usize,
    ) -> Result<Neighbors<F>, LshError> {
        if k == 0 || k > self.len() {
            return Err(LshError::InvalidConfig(format!(
                "k must be between 1 and the number of reference points ({}), got {k}",
                self.len()
            )));
        }
        if queries.dim() != self.dim() {
            return Err(LshError::DimensionMismatch {
                expected: self.dim(),
                found: queries.dim(),
            });
        }

        let columns: Vec<Vec<(F, usize)>> = (0..queries.len())
            .into_par_iter()
            .map(|q| self.search_point(queries.point(q), k, num_probes, None))
            .collect();
        let result = Neighbors::from_columns(k, columns);
        debug!(queries = queries.len(), k, num_probes, missing = result.missing(), "LSH search");
        Ok(result)
    }

    /// Searches the reference set against itself; a point never counts as its
    /// own neighbour, so `k` must be smaller than `len()`.
    pub fn search_reference(&self, k: usize, num_probes: usize) -> Result<Neighbors<F>, LshError> {
        if k == 0 || k >= self.len() {
            return Err(LshError::InvalidConfig(format!(
                "k must be between 1 and {} for a reference search, got {k}",
                self.len().saturating_sub(1)
            )));
        }

        let columns: Vec<Vec<(F, usize)>> = (0..self.len())
            .into_par_iter()
            .map(|q| self.search_point(self.reference.point(q), k, num_probes, Some(q)))
            .collect();
        let result = Neighbors::from_columns(k, columns);
        debug!(queries = self.len(), k, num_probes, missing = result.missing(), "LSH reference search");
        Ok(result)
    }

    /// Reference indices sharing a probed bucket with `query`, ascending.
    pub fn candidates(&self, query: ArrayView1<F>, num_probes: usize) -> Vec<usize> {
        let mut candidates: Vec<usize> = self.candidate_set(query, num_probes).into_iter().collect();
        candidates.sort_unstable();
        candidates
    }

    fn candidate_set(&self, query: ArrayView1<F>, num_probes: usize) -> HashSet<usize> {
        let mut candidates = HashSet::new();
        for (t, table) in self.tables.iter().enumerate() {
            let projected = self.hashes.project(t, query);
            let code = HashFamily::code(&projected);
            candidates.extend(table.get(self.hashes.bucket(&code)));
            for probe in probe_sequence(&projected, &code, num_probes) {
                candidates.extend(table.get(self.hashes.bucket(&probe)));
            }
        }
        candidates
    }

    fn search_point(
        &self,
        query: ArrayView1<F>,
        k: usize,
        num_probes: usize,
        exclude: Option<usize>,
    ) -> Vec<(F, usize)> {
        let candidates = self
            .candidate_set(query, num_probes)
            .into_iter()
            .filter(|&i| Some(i) != exclude);
        select_k(query, candidates, |i| self.reference.point(i), k)
    }

    /// Number of reference points.
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.reference.dim()
    }

    pub fn reference(&self) -> &PointSet<F> {
        &self.reference
    }

    pub fn tables(&self) -> &[HashTable] {
        &self.tables
    }

    pub fn num_tables(&self) -> usize {
        self.hashes.tables()
    }

    pub fn num_projections(&self) -> usize {
        self.projections
    }

    pub fn hash_width(&self) -> F {
        self.hashes.hash_width()
    }

    pub fn second_hash_size(&self) -> usize {
        self.hashes.second_hash_size()
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn bucket_policy(&self) -> BucketPolicy {
        self.bucket_policy
    }

    /// The seed actually used, even when the index was built with seed `0`.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::brute_force;
    use crate::NO_NEIGHBOR;
    use annsoft_helpers::seeded_rng;
    use ndarray::{Array2, array};
    use rand::Rng;

    fn uniform_points(n: usize, dim: usize, seed: u64) -> PointSet<f64> {
        let mut rng = seeded_rng(seed);
        PointSet::from_rows(Array2::from_shape_simple_fn((n, dim), || rng.random_range(-1.0..1.0)))
            .unwrap()
    }

    #[test]
    fn test_nearest_of_small_scenario() {
        let reference = PointSet::from_rows(array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [10.0, 10.0]]).unwrap();
        let config = LshConfig::new().with_tables(30).with_projections(10).with_seed(1);
        let index = LshIndex::build(reference, config).unwrap();

        let query = PointSet::from_rows(array![[0.1, 0.1]]).unwrap();
        let result = index.search(&query, 1, 0).unwrap();
        assert_eq!(result.neighbors[[0, 0]], 0);
        assert!((result.distances[[0, 0]] - 0.02f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_each_point_is_its_own_nearest_neighbor() {
        let reference = uniform_points(60, 4, 21);
        let index = LshIndex::build(reference.clone(), LshConfig::new().with_seed(3)).unwrap();
        let result = index.search(&reference, 1, 0).unwrap();
        for q in 0..reference.len() {
            assert_eq!(result.neighbors[[0, q]], q);
            assert_eq!(result.distances[[0, q]], 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_index_and_results() {
        let reference = uniform_points(200, 6, 1);
        let queries = uniform_points(20, 6, 2);
        let config = LshConfig::new().with_tables(8).with_projections(5).with_seed(77);

        let a = LshIndex::build(reference.clone(), config.clone()).unwrap();
        let b = LshIndex::build(reference, config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.search(&queries, 5, 3).unwrap(), b.search(&queries, 5, 3).unwrap());
    }

    #[test]
    fn test_distances_are_non_decreasing() {
        let reference = uniform_points(300, 5, 4);
        let queries = uniform_points(25, 5, 5);
        let index = LshIndex::build(reference, LshConfig::new().with_tables(10).with_seed(9)).unwrap();
        let result = index.search(&queries, 8, 2).unwrap();
        for column in result.distances.columns() {
            for pair in column.to_vec().windows(2) {
                assert!(pair[0] <= pair[1]);
            }
        }
    }

    #[test]
    fn test_recall_grows_with_tables_and_probes() {
        let reference = uniform_points(300, 8, 10);
        let queries = uniform_points(30, 8, 11);
        let truth = brute_force(&reference, &queries, 5).unwrap().neighbors;

        let recall = |tables: usize, probes: usize| {
            let config = LshConfig::new().with_tables(tables).with_projections(6).with_seed(42);
            let index = LshIndex::build(reference.clone(), config).unwrap();
            index.search(&queries, 5, probes).unwrap().recall(&truth).unwrap()
        };

        let by_tables: Vec<f64> = [1, 4, 16].iter().map(|&t| recall(t, 0)).collect();
        assert!(by_tables.windows(2).all(|w| w[0] <= w[1]), "{by_tables:?}");

        let by_probes: Vec<f64> = [0, 2, 8].iter().map(|&p| recall(4, p)).collect();
        assert!(by_probes.windows(2).all(|w| w[0] <= w[1]), "{by_probes:?}");
    }

    #[test]
    fn test_high_recall_with_short_hashes() {
        let reference = uniform_points(300, 8, 12);
        let queries = uniform_points(30, 8, 13);
        let truth = brute_force(&reference, &queries, 3).unwrap().neighbors;
        let config = LshConfig::new().with_tables(32).with_projections(4).with_seed(8);
        let index = LshIndex::build(reference, config).unwrap();
        let recall = index.search(&queries, 3, 4).unwrap().recall(&truth).unwrap();
        assert!(recall > 0.8, "recall {recall}");
    }

    #[test]
    fn test_more_tables_keep_earlier_candidates() {
        let reference = uniform_points(150, 3, 30);
        let query = array![0.2, -0.1, 0.4];
        let small = LshIndex::build(reference.clone(), LshConfig::new().with_tables(3).with_seed(6)).unwrap();
        let large = LshIndex::build(reference, LshConfig::new().with_tables(9).with_seed(6)).unwrap();
        assert_eq!(small.tables()[..], large.tables()[..3]);
        let few = small.candidates(query.view(), 0);
        let many = large.candidates(query.view(), 0);
        assert!(few.iter().all(|c| many.contains(c)));
    }

    #[test]
    fn test_reference_search_excludes_self() {
        let reference = uniform_points(80, 3, 14);
        let index = LshIndex::build(reference, LshConfig::new().with_seed(15)).unwrap();
        let result = index.search_reference(3, 1).unwrap();
        for q in 0..index.len() {
            assert!(result.neighbors.column(q).iter().all(|&n| n != q));
        }
        assert!(index.search_reference(80, 0).is_err());
    }

    #[test]
    fn test_sparse_buckets_leave_slots_empty() {
        let reference: PointSet<f64> =
            PointSet::from_rows(array![[0.0, 0.0], [100.0, 0.0], [0.0, 100.0], [100.0, 100.0]]).unwrap();
        let config = LshConfig::new().with_tables(1).with_hash_width(0.01).with_seed(2);
        let index = LshIndex::build(reference, config).unwrap();
        let query = PointSet::from_rows(array![[0.0, 0.0]]).unwrap();
        let result = index.search(&query, 3, 0).unwrap();
        assert_eq!(result.neighbors[[0, 0]], 0);
        assert_eq!(result.neighbors[[2, 0]], NO_NEIGHBOR);
        assert!(result.distances[[2, 0]].is_infinite());
    }

    #[test]
    fn test_tiny_hash_width_visits_extra_buckets() {
        let reference: PointSet<f64> = PointSet::from_rows(array![[1.0, 2.0], [-3.0, 0.5], [0.25, -4.0]]).unwrap();
        let config = LshConfig::new()
            .with_tables(2)
            .with_projections(3)
            .with_hash_width(1e-300)
            .with_seed(1);
        let index = LshIndex::build(reference.clone(), config).unwrap();
        let result = index.search(&reference, 1, 4).unwrap();
        for q in 0..3 {
            assert_eq!(result.neighbors[[0, q]], q);
        }
    }

    #[test]
    fn test_truncate_policy_caps_buckets() {
        // Identical points all land in the same bucket of every table.
        let mut data = Array2::zeros((20, 2));
        data.row_mut(19).assign(&array![5.0, 5.0]);
        let reference = PointSet::from_rows(data).unwrap();
        let config = LshConfig::new()
            .with_tables(4)
            .with_bucket_size(5)
            .with_bucket_policy(BucketPolicy::Truncate)
            .with_hash_width(1.0)
            .with_seed(4);
        let index = LshIndex::build(reference, config).unwrap();
        for table in index.tables() {
            assert!(table.largest_bucket() <= 5);
        }

        let soft = LshConfig::new().with_tables(4).with_bucket_size(5).with_hash_width(1.0).with_seed(4);
        let index = LshIndex::build(index.reference().clone(), soft).unwrap();
        assert!(index.tables().iter().all(|t| t.largest_bucket() >= 19));
    }

    #[test]
    fn test_errors() {
        let reference = uniform_points(10, 3, 16);
        let index = LshIndex::build(reference.clone(), LshConfig::new().with_seed(1)).unwrap();

        let wrong_dim = uniform_points(2, 4, 17);
        assert_eq!(
            index.search(&wrong_dim, 1, 0).unwrap_err(),
            LshError::DimensionMismatch { expected: 3, found: 4 }
        );
        assert!(matches!(index.search(&reference, 0, 0), Err(LshError::InvalidConfig(_))));
        assert!(matches!(index.search(&reference, 11, 0), Err(LshError::InvalidConfig(_))));

        let single = PointSet::from_rows(array![[1.0, 2.0]]).unwrap();
        let err = LshIndex::build(single, LshConfig::new().with_seed(1)).unwrap_err();
        assert!(matches!(err, LshError::DegenerateHashWidth(_)));
        assert_eq!(err.kind(), annsoft_helpers::ErrorKind::Numeric);
    }

    #[test]
    fn test_seed_zero_is_resolved() {
        let index = LshIndex::build(uniform_points(10, 2, 18), LshConfig::new().with_tables(2)).unwrap();
        let rebuilt = LshIndex::build(
            index.reference().clone(),
            LshConfig::new().with_tables(2).with_seed(index.seed()),
        )
        .unwrap();
        assert_eq!(index, rebuilt);
    }

    #[test]
    fn test_clone_answers_identically() {
        let index = LshIndex::build(uniform_points(80, 3, 19), LshConfig::new().with_seed(4)).unwrap();
        let queries = uniform_points(8, 3, 20);
        let copy = index.clone();
        assert_eq!(copy.search(&queries, 3, 2).unwrap(), index.search(&queries, 3, 2).unwrap());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_round_trip() {
        let index = LshIndex::build(uniform_points(80, 3, 19), LshConfig::new().with_seed(4)).unwrap();
        let queries = uniform_points(8, 3, 20);
        let json = serde_json::to_string(&index).unwrap();
        let restored: LshIndex<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, index);
        assert_eq!(restored.search(&queries, 3, 2).unwrap(), index.search(&queries, 3, 2).unwrap());
    }
}
