use std::time::Instant;

use annsoft_helpers::{Float, PointSet};
use lsh::{BucketPolicy, LshConfig, LshError, LshIndex, Neighbors};
use ndarray::Array2;
use tracing::{info, warn};

use crate::Error;

/// Options of the LSH program.
///
/// Either `reference` (build a new index) or `input_model` (reuse one) must be
/// set. With `k > 0` the `query` set is searched, or the reference set against
/// itself when there is no query set.
#[derive(Debug, Clone)]
pub struct LshProgramParams<F: Float> {
    pub reference: Option<PointSet<F>>,
    pub input_model: Option<LshIndex<F>>,
    pub query: Option<PointSet<F>>,
    pub k: usize,
    /// `k × Q` indices of the exact neighbours, for measuring recall.
    pub true_neighbors: Option<Array2<usize>>,
    pub tables: usize,
    pub projections: usize,
    /// `0.0` estimates the width from the reference set.
    pub hash_width: f64,
    pub second_hash_size: usize,
    pub bucket_size: usize,
    pub bucket_policy: BucketPolicy,
    /// Additional buckets probed per table.
    pub num_probes: usize,
    pub seed: u64,
    pub verbose: bool,
}

impl<F: Float> Default for LshProgramParams<F> {
    fn default() -> Self {
        let config = LshConfig::default();
        Self {
            reference: None,
            input_model: None,
            query: None,
            k: 0,
            true_neighbors: None,
            tables: config.tables,
            projections: config.projections,
            hash_width: config.hash_width,
            second_hash_size: config.second_hash_size,
            bucket_size: config.bucket_size,
            bucket_policy: config.bucket_policy,
            num_probes: 0,
            seed: config.seed,
            verbose: false,
        }
    }
}

impl<F: Float> LshProgramParams<F> {
    fn config(&self) -> LshConfig {
        LshConfig {
            tables: self.tables,
            projections: self.projections,
            hash_width: self.hash_width,
            second_hash_size: self.second_hash_size,
            bucket_size: self.bucket_size,
            bucket_policy: self.bucket_policy,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LshProgramOutput<F: Float> {
    pub model: LshIndex<F>,
    pub neighbors: Option<Neighbors<F>>,
    /// Set when `true_neighbors` was given.
    pub recall: Option<f64>,
}

/// Builds or loads an LSH index and optionally searches it.
///
/// Every option is checked against the reference set (or the input model)
/// before the index is built, so bad queries fail without hashing anything.
///
/// # Arguments
///
/// * `params`: the reference set or a previously built index, the optional
///   query set, `k`, the optional ground truth and the build options.
///
/// # Returns
///
/// The index, plus the `k × Q` neighbours when `k > 0` and the recall when
/// `true_neighbors` is given.
///
/// # Errors
///
/// `Error::Configuration` when both or neither of `reference` and
/// `input_model` are given, or when `true_neighbors` is given with `k == 0`.
/// Query dimensionality, the range of `k` and the shape of `true_neighbors`
/// are reported as `Error::Lsh`, as are failures of the build itself.
pub fn run_lsh<F: Float>(params: LshProgramParams<F>) -> Result<LshProgramOutput<F>, Error> {
    let config = params.config();
    let LshProgramParams { reference, input_model, query, k, true_neighbors, num_probes, verbose, .. } =
        params;

    if true_neighbors.is_some() && k == 0 {
        return Err(Error::Configuration(
            "true neighbours can only be compared when k is positive".to_string(),
        ));
    }
    if query.is_some() && k == 0 {
        warn!("a query set was given but k is 0; no search will be run");
    }

    let (len, dim) = match (&reference, &input_model) {
        (Some(_), Some(_)) => {
            return Err(Error::Configuration(
                "give either a reference set or an input model, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(Error::Configuration(
                "either a reference set or an input model is required".to_string(),
            ));
        }
        (Some(reference), None) => (reference.len(), reference.dim()),
        (None, Some(model)) => (model.len(), model.dim()),
    };
    if k > 0 {
        check_search(len, dim, query.as_ref(), k, true_neighbors.as_ref())?;
    }

    let model = match (reference, input_model) {
        (Some(reference), _) => {
            let start = Instant::now();
            let index = LshIndex::build(reference, config)?;
            if verbose {
                info!(
                    elapsed = ?start.elapsed(),
                    points = index.len(),
                    tables = index.num_tables(),
                    hash_width = index.hash_width().to_f64_lossy(),
                    "built LSH index"
                );
            }
            index
        }
        (None, Some(model)) => model,
        (None, None) => {
            return Err(Error::Configuration(
                "either a reference set or an input model is required".to_string(),
            ));
        }
    };

    let neighbors = if k > 0 {
        let start = Instant::now();
        let result = match &query {
            Some(query) => model.search(query, k, num_probes)?,
            None => model.search_reference(k, num_probes)?,
        };
        if verbose {
            info!(
                elapsed = ?start.elapsed(),
                queries = result.num_queries(),
                k,
                num_probes,
                "searched LSH index"
            );
        }
        Some(result)
    } else {
        None
    };

    let recall = match (&neighbors, &true_neighbors) {
        (Some(found), Some(truth)) => {
            let recall = found.recall(truth)?;
            if verbose {
                info!(recall, "recall against true neighbours");
            }
            Some(recall)
        }
        _ => None,
    };

    Ok(LshProgramOutput { model, neighbors, recall })
}

/// Validates a search of `len` reference points of dimension `dim`.
///
/// Without a query set the reference set is searched against itself, which
/// leaves `len - 1` candidates per point.
fn check_search<F: Float>(
    len: usize,
    dim: usize,
    query: Option<&PointSet<F>>,
    k: usize,
    true_neighbors: Option<&Array2<usize>>,
) -> Result<(), LshError> {
    let num_queries = match query {
        Some(query) => {
            if query.dim() != dim {
                return Err(LshError::DimensionMismatch { expected: dim, found: query.dim() });
            }
            if k > len {
                return Err(LshError::InvalidConfig(format!(
                    "k must be between 1 and the number of reference points ({len}), got {k}"
                )));
            }
            query.len()
        }
        None => {
            if k >= len {
                return Err(LshError::InvalidConfig(format!(
                    "k must be between 1 and {} for a reference search, got {k}",
                    len.saturating_sub(1)
                )));
            }
            len
        }
    };
    if let Some(truth) = true_neighbors {
        if truth.dim() != (k, num_queries) {
            return Err(LshError::TruthShape { expected: (k, num_queries), found: truth.dim() });
        }
    }
    Ok(())
}
