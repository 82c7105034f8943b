//! Compares LSH search against exhaustive search on random data and prints
//! the recall for a few table/probe settings.

use annsoft_helpers::{PointSet, seeded_rng};
use lsh::exact::brute_force;
use lsh::{LshConfig, LshError, LshIndex};
use ndarray::Array2;
use rand::Rng;

fn random_points(n: usize, dim: usize, seed: u64) -> Result<PointSet<f64>, LshError> {
    let mut rng = seeded_rng(seed);
    Ok(PointSet::from_rows(Array2::from_shape_simple_fn((n, dim), || {
        rng.random_range(-1.0..1.0)
    }))?)
}

fn main() -> Result<(), LshError> {
    println!("LSH recall against exhaustive search");
    println!("====================================");

    let reference = random_points(2_000, 16, 1)?;
    let queries = random_points(100, 16, 2)?;
    let k = 10;
    let truth = brute_force(&reference, &queries, k)?.neighbors;

    for tables in [5, 15, 30] {
        let config = LshConfig::new().with_tables(tables).with_projections(6).with_seed(42);
        let index = LshIndex::build(reference.clone(), config)?;
        for probes in [0, 4, 16] {
            let result = index.search(&queries, k, probes)?;
            println!(
                "tables = {tables:>2}, probes = {probes:>2}: recall = {:.3}, empty slots = {}",
                result.recall(&truth)?,
                result.missing()
            );
        }
    }
    Ok(())
}
