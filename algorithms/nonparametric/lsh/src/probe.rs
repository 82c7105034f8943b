//! Query-directed probing (Lv et al., 2007).
//!
//! A perturbation adds `-1` or `+1` to one coordinate of the first-level hash
//! vector. Its score is the squared distance, in units of bucket width, from
//! the projected query to the bucket boundary it crosses. Perturbation *sets*
//! are enumerated in increasing total score with a min-heap driven by the
//! `shift` and `expand` operations over the single perturbations sorted by
//! score.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use annsoft_helpers::Float;
use ndarray::Array1;

#[derive(Debug, Clone, Copy)]
struct Perturbation {
    score: f64,
    coordinate: usize,
    delta: i64,
}

#[derive(Debug)]
struct Candidate {
    score: f64,
    /// Ascending positions into the sorted perturbation list.
    set: Vec<usize>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.set.cmp(&other.set))
    }
}

/// Returns up to `num_probes` perturbed hash vectors of `code`, best first.
/// `projected` is the query's un-floored position, so `code == floor(projected)`.
pub(crate) fn probe_sequence<F: Float>(
    projected: &Array1<F>,
    code: &[i64],
    num_probes: usize,
) -> Vec<Vec<i64>> {
    if num_probes == 0 {
        return Vec::new();
    }

    let mut singles: Vec<Perturbation> = Vec::with_capacity(2 * code.len());
    for (coordinate, (&position, &h)) in projected.iter().zip(code).enumerate() {
        let lower = position.to_f64_lossy() - h as f64;
        let upper = 1.0 - lower;
        singles.push(Perturbation { score: lower * lower, coordinate, delta: -1 });
        singles.push(Perturbation { score: upper * upper, coordinate, delta: 1 });
    }
    singles.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then(a.coordinate.cmp(&b.coordinate))
            .then(a.delta.cmp(&b.delta))
    });

    let mut probes = Vec::with_capacity(num_probes);
    let mut heap = BinaryHeap::new();
    heap.push(Reverse(Candidate { score: singles[0].score, set: vec![0] }));

    while let Some(Reverse(candidate)) = heap.pop() {
        let last = candidate.set[candidate.set.len() - 1];
        if last + 1 < singles.len() {
            // shift: replace the last perturbation with the next one
            let mut shifted = candidate.set.clone();
            shifted[candidate.set.len() - 1] = last + 1;
            let score = candidate.score - singles[last].score + singles[last + 1].score;
            heap.push(Reverse(Candidate { score, set: shifted }));

            // expand: append the next perturbation
            let mut expanded = candidate.set.clone();
            expanded.push(last + 1);
            let score = candidate.score + singles[last + 1].score;
            heap.push(Reverse(Candidate { score, set: expanded }));
        }

        if is_valid(&candidate.set, &singles) {
            let mut probe = code.to_vec();
            for &i in &candidate.set {
                let coordinate = singles[i].coordinate;
                probe[coordinate] = probe[coordinate].wrapping_add(singles[i].delta);
            }
            probes.push(probe);
            if probes.len() == num_probes {
                break;
            }
        }
    }
    probes
}

/// A set is valid when it touches each coordinate at most once.
fn is_valid(set: &[usize], singles: &[Perturbation]) -> bool {
    let mut seen: Vec<usize> = set.iter().map(|&i| singles[i].coordinate).collect();
    seen.sort_unstable();
    seen.windows(2).all(|w| w[0] != w[1])
}
