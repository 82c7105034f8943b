use annsoft_helpers::{Float, PointSet, seeded_rng};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::objective::SoftmaxObjective;
use crate::{Lbfgs, OptimizationReport, SoftmaxConfig, SoftmaxError};

/// Scale of the Gaussian the initial weights are drawn from.
const INITIAL_WEIGHT_SCALE: f64 = 0.005;

/// A trained softmax classifier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate", try_from = "RawSoftmaxModel<F>")
)]
pub struct SoftmaxModel<F: Float> {
    /// `num_classes × (D + 1)` with the intercept in the last column, or
    /// `num_classes × D` without one.
    weights: Array2<F>,
    fit_intercept: bool,
}

/// Deserialized weights, checked by [`SoftmaxModel::from_weights`] before use.
#[cfg(feature = "serde")]
#[derive(serde_crate::Deserialize)]
#[serde(crate = "serde_crate")]
struct RawSoftmaxModel<F: Float> {
    weights: Array2<F>,
    fit_intercept: bool,
}

#[cfg(feature = "serde")]
impl<F: Float> TryFrom<RawSoftmaxModel<F>> for SoftmaxModel<F> {
    type Error = SoftmaxError;

    fn try_from(raw: RawSoftmaxModel<F>) -> Result<Self, Self::Error> {
        SoftmaxModel::from_weights(raw.weights, raw.fit_intercept)
    }
}

impl<F: Float> SoftmaxModel<F> {
    /// Wraps previously trained weights.
    ///
    /// # Arguments
    ///
    /// * `weights` - `num_classes × D` matrix, or `num_classes × (D + 1)`
    ///   with the intercept in the last column.
    /// * `fit_intercept` - Whether the last column of `weights` is an
    ///   intercept.
    ///
    /// # Errors
    ///
    /// `TooFewClasses` for fewer than two rows, and `InvalidConfig` when the
    /// matrix has no feature columns or holds a non-finite weight.
    pub fn from_weights(weights: Array2<F>, fit_intercept: bool) -> Result<Self, SoftmaxError> {
        if weights.nrows() < 2 {
            return Err(SoftmaxError::TooFewClasses(weights.nrows()));
        }
        let min_cols = if fit_intercept { 2 } else { 1 };
        if weights.ncols() < min_cols {
            return Err(SoftmaxError::InvalidConfig(format!(
                "weights need at least {min_cols} columns, got {}",
                weights.ncols()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(SoftmaxError::InvalidConfig("weights must be finite".to_string()));
        }
        Ok(Self { weights, fit_intercept })
    }

    pub fn weights(&self) -> ArrayView2<'_, F> {
        self.weights.view()
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn fit_intercept(&self) -> bool {
        self.fit_intercept
    }

    /// Dimensionality of the points the model accepts.
    pub fn dim(&self) -> usize {
        self.weights.ncols().saturating_sub(usize::from(self.fit_intercept))
    }

    /// Class scores `w_c · x̃`, one row per point.
    fn scores(&self, test: &PointSet<F>) -> Result<Array2<F>, SoftmaxError> {
        let dim = self.dim();
        if test.dim() != dim {
            return Err(SoftmaxError::DimensionMismatch { expected: dim, found: test.dim() });
        }
        let mut scores = test.view().dot(&self.weights.slice(s![.., ..dim]).t());
        if self.fit_intercept {
            scores += &self.weights.column(dim);
        }
        Ok(scores)
    }

    /// Class probabilities, `N × num_classes`; every row sums to one.
    pub fn predict_proba(&self, test: &PointSet<F>) -> Result<Array2<F>, SoftmaxError> {
        let mut probabilities = self.scores(test)?;
        for mut row in probabilities.rows_mut() {
            let max = row.fold(F::neg_infinity(), |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row /= sum;
        }
        Ok(probabilities)
    }

    /// Most probable class of every point. Ties go to the smaller class id.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` when `test` points do not have [`dim`](Self::dim)
    /// coordinates.
    pub fn predict(&self, test: &PointSet<F>) -> Result<Array1<usize>, SoftmaxError> {
        let scores = self.scores(test)?;
        let predictions: Vec<usize> = (0..scores.nrows())
            .into_par_iter()
            .map(|i| argmax(scores.row(i)))
            .collect();
        Ok(Array1::from(predictions))
    }

    /// Fraction of `test` points whose predicted class equals their label.
    pub fn accuracy(&self, test: &PointSet<F>, labels: ArrayView1<usize>) -> Result<f64, SoftmaxError> {
        if labels.len() != test.len() {
            return Err(SoftmaxError::LabelCountMismatch { points: test.len(), labels: labels.len() });
        }
        let predictions = self.predict(test)?;
        let correct = predictions.iter().zip(labels.iter()).filter(|(p, l)| p == l).count();
        Ok(correct as f64 / test.len() as f64)
    }
}

fn argmax<F: Float>(row: ArrayView1<F>) -> usize {
    let mut best = 0;
    for (c, &score) in row.iter().enumerate().skip(1) {
        if score > row[best] {
            best = c;
        }
    }
    best
}

/// Training points with a trailing column of ones when fitting an intercept.
fn design_matrix<F: Float>(points: ArrayView2<F>, fit_intercept: bool) -> Array2<F> {
    if !fit_intercept {
        return points.to_owned();
    }
    let mut design = Array2::ones((points.nrows(), points.ncols() + 1));
    design.slice_mut(s![.., ..points.ncols()]).assign(&points);
    design
}

/// Trains [`SoftmaxModel`]s.
///
/// ```
/// use annsoft_helpers::PointSet;
/// use ndarray::array;
/// use softmax_regression::{SoftmaxConfig, SoftmaxRegression};
///
/// let points = PointSet::from_rows(array![[-2.0], [-1.0], [1.0], [2.0]]).unwrap();
/// let labels = array![0, 0, 1, 1];
/// let model = SoftmaxRegression::new(SoftmaxConfig::new().with_seed(3))
///     .fit(&points, labels.view())
///     .unwrap();
/// assert_eq!(model.predict(&points).unwrap(), labels);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SoftmaxRegression {
    config: SoftmaxConfig,
}

impl SoftmaxRegression {
    pub fn new(config: SoftmaxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SoftmaxConfig {
        &self.config
    }

    /// Trains a model on `training`.
    ///
    /// # Arguments
    ///
    /// * `training` - The training points.
    /// * `labels` - Class of every training point, in `[0, num_classes)`.
    ///
    /// # Returns
    ///
    /// The trained model. It has `num_classes` rows of weights, where
    /// `num_classes` is configured or inferred as the largest label plus one.
    ///
    /// # Errors
    ///
    /// Everything [`fit_with_report`](Self::fit_with_report) rejects, plus
    /// `LineSearchFailed` when the optimiser could not decrease the objective.
    pub fn fit<F: Float>(
        &self,
        training: &PointSet<F>,
        labels: ArrayView1<usize>,
    ) -> Result<SoftmaxModel<F>, SoftmaxError> {
        let (model, report) = self.fit_with_report(training, labels)?;
        report.ensure_progress()?;
        Ok(model)
    }

    /// Like [`fit`](Self::fit), also returning how the optimiser finished.
    /// A stalled line search is left in the report rather than raised.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad configuration, `LabelCountMismatch`,
    /// `LabelOutOfRange` or `TooFewClasses` for bad labels, and
    /// `NonFiniteObjective` when the data overflow the objective.
    pub fn fit_with_report<F: Float>(
        &self,
        training: &PointSet<F>,
        labels: ArrayView1<usize>,
    ) -> Result<(SoftmaxModel<F>, OptimizationReport), SoftmaxError> {
        self.config.validate()?;
        if labels.len() != training.len() {
            return Err(SoftmaxError::LabelCountMismatch {
                points: training.len(),
                labels: labels.len(),
            });
        }
        let num_classes = self.num_classes(labels)?;

        let design = design_matrix(training.view(), self.config.fit_intercept);
        let mut rng = seeded_rng(self.config.seed);
        let initial = Array2::from_shape_simple_fn((num_classes, design.ncols()), || {
            F::from_f64_lossy(INITIAL_WEIGHT_SCALE * rng.sample::<f64, _>(StandardNormal))
        });
        debug!(
            points = training.len(),
            dim = training.dim(),
            num_classes,
            "training softmax regression"
        );

        let objective = SoftmaxObjective::new(
            design.view(),
            labels.view(),
            F::from_f64_lossy(self.config.lambda),
        );
        let (weights, report) = Lbfgs::new(self.config.optimizer.clone()).minimize(&objective, initial)?;
        info!(
            iterations = report.iterations,
            objective = report.objective,
            termination = ?report.termination,
            "softmax regression trained"
        );

        let model = SoftmaxModel { weights, fit_intercept: self.config.fit_intercept };
        Ok((model, report))
    }

    fn num_classes(&self, labels: ArrayView1<usize>) -> Result<usize, SoftmaxError> {
        let num_classes = match self.config.num_classes {
            0 => match labels.iter().max() {
                Some(&max) => max.checked_add(1).ok_or(SoftmaxError::LabelOutOfRange {
                    label: max,
                    num_classes: usize::MAX,
                })?,
                None => 0,
            },
            n => {
                if let Some(&label) = labels.iter().find(|&&l| l >= n) {
                    return Err(SoftmaxError::LabelOutOfRange { label, num_classes: n });
                }
                n
            }
        };
        if num_classes < 2 {
            return Err(SoftmaxError::TooFewClasses(num_classes));
        }
        Ok(num_classes)
    }
}
