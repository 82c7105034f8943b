//! Runs both programs on synthetic clustered data.
//!
//! Set `RUST_LOG=debug` to see what the engines report while they work.

use annsoft::programs::{LshProgramParams, SoftmaxProgramParams, run_lsh, run_softmax};
use annsoft::{Error, PointSet, lsh::exact};
use annsoft_helpers::seeded_rng;
use ndarray::{Array1, Array2};
use rand::Rng;
use tracing::info;

const CLUSTERS: usize = 4;
const DIM: usize = 16;
const CENTRE_SEED: u64 = 3;

/// Points scattered around `CLUSTERS` fixed random centres; labels are
/// cluster ids.
fn clustered(n: usize, seed: u64) -> Result<(PointSet<f64>, Array1<usize>), Error> {
    let mut rng = seeded_rng(CENTRE_SEED);
    let centres = Array2::from_shape_simple_fn((CLUSTERS, DIM), || rng.random_range(-10.0..10.0));
    let mut rng = seeded_rng(seed);
    let labels = Array1::from_shape_fn(n, |i| i % CLUSTERS);
    let data = Array2::from_shape_fn((n, DIM), |(i, j)| {
        centres[[labels[i], j]] + rng.random_range(-2.0..2.0)
    });
    Ok((PointSet::from_rows(data)?, labels))
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annsoft=info".into()),
        )
        .init();

    let (reference, labels) = clustered(4_000, 17)?;
    let (queries, query_labels) = clustered(500, 91)?;

    let k = 10;
    let truth = exact::brute_force(&reference, &queries, k)?;
    let lsh = run_lsh(LshProgramParams {
        reference: Some(reference.clone()),
        query: Some(queries.clone()),
        k,
        true_neighbors: Some(truth.neighbors),
        tables: 20,
        projections: 8,
        num_probes: 4,
        seed: 5,
        verbose: true,
        ..Default::default()
    })?;
    info!(recall = ?lsh.recall, tables = lsh.model.num_tables(), "LSH finished");

    let softmax = run_softmax(SoftmaxProgramParams {
        training: Some(reference),
        labels: Some(labels),
        test: Some(queries),
        test_labels: Some(query_labels),
        seed: 5,
        verbose: true,
        ..Default::default()
    })?;
    info!(accuracy = ?softmax.accuracy, classes = softmax.model.num_classes(), "softmax regression finished");

    Ok(())
}
