use annsoft_helpers::Float;
use ndarray::{Array2, ArrayView1, ArrayView2, s};
use rayon::prelude::*;

use crate::DifferentiableFunction;

/// Rows per parallel work item. Partial sums are reduced in chunk order, so
/// the result does not depend on thread scheduling.
const CHUNK_SIZE: usize = 256;

/// Mean negative log-likelihood of a softmax model plus `(λ/2)·‖W‖²`.
///
/// Parameters are the `num_classes × design.ncols()` weight matrix.
pub(crate) struct SoftmaxObjective<'a, F: Float> {
    design: ArrayView2<'a, F>,
    labels: ArrayView1<'a, usize>,
    lambda: F,
}

impl<'a, F: Float> SoftmaxObjective<'a, F> {
    pub(crate) fn new(design: ArrayView2<'a, F>, labels: ArrayView1<'a, usize>, lambda: F) -> Self {
        Self { design, labels, lambda }
    }

    /// Log-likelihood loss and gradient contribution of rows `start..end`.
    fn chunk(&self, weights: &Array2<F>, start: usize, end: usize) -> (F, Array2<F>) {
        let x = self.design.slice(s![start..end, ..]);
        let labels = self.labels.slice(s![start..end]);

        // Becomes P - Y in place, row by row.
        let mut residual = x.dot(&weights.t());
        let mut loss = F::zero();
        for (mut row, &label) in residual.rows_mut().into_iter().zip(labels.iter()) {
            let max = row.fold(F::neg_infinity(), |m, &v| m.max(v));
            let shifted_label = row[label] - max;
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            loss += sum.ln() - shifted_label;
            row /= sum;
            row[label] -= F::one();
        }
        (loss, residual.t().dot(&x))
    }
}

impl<F: Float> DifferentiableFunction<F> for SoftmaxObjective<'_, F> {
    fn evaluate_with_gradient(&self, weights: &Array2<F>) -> (F, Array2<F>) {
        let n = self.design.nrows();
        let partials: Vec<(F, Array2<F>)> = (0..n.div_ceil(CHUNK_SIZE))
            .into_par_iter()
            .map(|c| self.chunk(weights, c * CHUNK_SIZE, ((c + 1) * CHUNK_SIZE).min(n)))
            .collect();

        let mut loss = F::zero();
        let mut gradient = Array2::zeros(weights.raw_dim());
        for (chunk_loss, chunk_gradient) in partials {
            loss += chunk_loss;
            gradient += &chunk_gradient;
        }

        let n = F::from_f64_lossy(n as f64);
        let half = F::from_f64_lossy(0.5);
        let penalty = weights.iter().map(|&w| w * w).sum::<F>();
        let value = loss / n + half * self.lambda * penalty;

        gradient /= n;
        gradient.scaled_add(self.lambda, weights);
        (value, gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn numeric_gradient(objective: &SoftmaxObjective<f64>, weights: &Array2<f64>) -> Array2<f64> {
        let eps = 1e-6;
        let mut gradient = Array2::zeros(weights.raw_dim());
        for ((i, j), g) in gradient.indexed_iter_mut() {
            let mut plus = weights.clone();
            plus[[i, j]] += eps;
            let mut minus = weights.clone();
            minus[[i, j]] -= eps;
            *g = (objective.evaluate_with_gradient(&plus).0 - objective.evaluate_with_gradient(&minus).0)
                / (2.0 * eps);
        }
        gradient
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let design = array![[0.5, -1.0, 1.0], [1.5, 0.2, 1.0], [-0.3, 0.8, 1.0], [2.0, 2.0, 1.0]];
        let labels = array![0, 2, 1, 2];
        let objective = SoftmaxObjective::new(design.view(), labels.view(), 0.1);
        let weights = array![[0.1, -0.2, 0.3], [0.0, 0.4, -0.1], [-0.3, 0.1, 0.2]];

        let (_, analytic) = objective.evaluate_with_gradient(&weights);
        let numeric = numeric_gradient(&objective, &weights);
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert_abs_diff_eq!(*a, *n, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_weights_give_uniform_loss() {
        let design = array![[1.0, 2.0], [3.0, 4.0]];
        let labels = array![0, 3];
        let objective = SoftmaxObjective::new(design.view(), labels.view(), 1.0);
        let (value, _) = objective.evaluate_with_gradient(&Array2::zeros((4, 2)));
        assert_abs_diff_eq!(value, 4.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_chunked_sum_matches_single_chunk() {
        // More rows than one chunk, so the parallel reduction is exercised.
        let n = CHUNK_SIZE * 2 + 17;
        let design = Array2::from_shape_fn((n, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64 / 11.0 - 0.5);
        let labels = ndarray::Array1::from_shape_fn(n, |i| i % 3);
        let weights = array![[0.2, -0.1, 0.05], [-0.3, 0.2, 0.1], [0.0, 0.1, -0.2]];
        let objective = SoftmaxObjective::new(design.view(), labels.view(), 0.01);

        let (value, gradient) = objective.evaluate_with_gradient(&weights);
        let (loss, raw) = objective.chunk(&weights, 0, n);
        let expected_value = loss / n as f64 + 0.005 * weights.iter().map(|w| w * w).sum::<f64>();
        assert_abs_diff_eq!(value, expected_value, epsilon = 1e-10);
        let expected_gradient = raw / n as f64 + &weights * 0.01;
        for (a, b) in gradient.iter().zip(expected_gradient.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }
}
