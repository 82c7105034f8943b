use std::time::Instant;

use annsoft_helpers::{Float, PointSet};
use ndarray::Array1;
use softmax_regression::{SoftmaxConfig, SoftmaxError, SoftmaxModel, SoftmaxRegression};
use tracing::{info, warn};

use crate::Error;

/// Options of the softmax regression program.
///
/// Either `training` (with `labels`) or `input_model` must be set. Points in
/// `test` are classified, and scored when `test_labels` is given.
#[derive(Debug, Clone)]
pub struct SoftmaxProgramParams<F: Float> {
    pub training: Option<PointSet<F>>,
    pub labels: Option<Array1<usize>>,
    pub input_model: Option<SoftmaxModel<F>>,
    pub test: Option<PointSet<F>>,
    pub test_labels: Option<Array1<usize>>,
    /// `0` infers the number of classes from the labels.
    pub num_classes: usize,
    pub lambda: f64,
    /// `0` trains until convergence.
    pub max_iterations: usize,
    pub no_intercept: bool,
    pub seed: u64,
    pub verbose: bool,
}

impl<F: Float> Default for SoftmaxProgramParams<F> {
    fn default() -> Self {
        let config = SoftmaxConfig::default();
        Self {
            training: None,
            labels: None,
            input_model: None,
            test: None,
            test_labels: None,
            num_classes: config.num_classes,
            lambda: config.lambda,
            max_iterations: config.max_iterations(),
            no_intercept: !config.fit_intercept,
            seed: config.seed,
            verbose: false,
        }
    }
}

impl<F: Float> SoftmaxProgramParams<F> {
    fn config(&self) -> SoftmaxConfig {
        SoftmaxConfig::new()
            .with_num_classes(self.num_classes)
            .with_lambda(self.lambda)
            .with_max_iterations(self.max_iterations)
            .with_intercept(!self.no_intercept)
            .with_seed(self.seed)
    }
}

#[derive(Debug, Clone)]
pub struct SoftmaxProgramOutput<F: Float> {
    pub model: SoftmaxModel<F>,
    pub predictions: Option<Array1<usize>>,
    /// Set when `test_labels` was given.
    pub accuracy: Option<f64>,
}

/// Trains or loads a softmax model and optionally classifies a test set.
///
/// The test set and its labels are checked against the training set (or the
/// input model) before any training starts.
///
/// # Errors
///
/// `Error::Configuration` when both or neither of `training` and
/// `input_model` are given, when `training` comes without `labels`, or when
/// `test_labels` comes without `test`. A test set of the wrong dimensionality
/// or a label count that does not match its points is an `Error::Softmax`
/// data error, as is anything the trainer rejects. A run whose line search
/// could not make progress is reported as a numeric error.
pub fn run_softmax<F: Float>(params: SoftmaxProgramParams<F>) -> Result<SoftmaxProgramOutput<F>, Error> {
    let config = params.config();
    let SoftmaxProgramParams { training, labels, input_model, test, test_labels, verbose, .. } = params;

    if test_labels.is_some() && test.is_none() {
        return Err(Error::Configuration("test labels were given without a test set".to_string()));
    }

    let dim = match (&training, &input_model) {
        (Some(_), Some(_)) => {
            return Err(Error::Configuration(
                "give either a training set or an input model, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(Error::Configuration(
                "either a training set or an input model is required".to_string(),
            ));
        }
        (Some(training), None) => {
            if labels.is_none() {
                return Err(Error::Configuration("a training set needs labels".to_string()));
            }
            training.dim()
        }
        (None, Some(model)) => model.dim(),
    };
    if let Some(test) = &test {
        check_test_set(dim, test, test_labels.as_ref())?;
    }

    let model = match (training, labels, input_model) {
        (Some(training), Some(labels), _) => {
            let start = Instant::now();
            let (model, report) = SoftmaxRegression::new(config).fit_with_report(&training, labels.view())?;
            report.ensure_progress()?;
            if verbose {
                info!(
                    elapsed = ?start.elapsed(),
                    points = training.len(),
                    num_classes = model.num_classes(),
                    iterations = report.iterations,
                    objective = report.objective,
                    "trained softmax regression model"
                );
            }
            model
        }
        (None, labels, Some(model)) => {
            if labels.is_some() {
                warn!("labels are ignored without a training set");
            }
            model
        }
        _ => {
            return Err(Error::Configuration(
                "a training set with labels or an input model is required".to_string(),
            ));
        }
    };

    let (predictions, accuracy) = match &test {
        Some(test) => {
            let start = Instant::now();
            let predictions = model.predict(test)?;
            if verbose {
                info!(elapsed = ?start.elapsed(), points = test.len(), "classified test set");
            }
            let accuracy = match &test_labels {
                Some(test_labels) => {
                    let accuracy = model.accuracy(test, test_labels.view())?;
                    if verbose {
                        info!(accuracy = accuracy * 100.0, "test set accuracy (%)");
                    }
                    Some(accuracy)
                }
                None => None,
            };
            (Some(predictions), accuracy)
        }
        None => (None, None),
    };

    Ok(SoftmaxProgramOutput { model, predictions, accuracy })
}

fn check_test_set<F: Float>(
    dim: usize,
    test: &PointSet<F>,
    test_labels: Option<&Array1<usize>>,
) -> Result<(), SoftmaxError> {
    if test.dim() != dim {
        return Err(SoftmaxError::DimensionMismatch { expected: dim, found: test.dim() });
    }
    match test_labels {
        Some(labels) if labels.len() != test.len() => Err(SoftmaxError::LabelCountMismatch {
            points: test.len(),
            labels: labels.len(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annsoft_helpers::ErrorKind;
    use ndarray::array;

    fn training() -> PointSet<f64> {
        PointSet::from_rows(array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]]).unwrap()
    }

    #[test]
    fn test_training_and_model_are_exclusive() {
        let model = SoftmaxModel::from_weights(array![[1.0, 0.0], [-1.0, 0.0]], true).unwrap();
        let both = SoftmaxProgramParams {
            training: Some(training()),
            labels: Some(array![0, 0, 0, 1, 1, 1]),
            input_model: Some(model),
            ..Default::default()
        };
        assert_eq!(run_softmax(both).unwrap_err().kind(), ErrorKind::Configuration);

        let neither = SoftmaxProgramParams::<f64>::default();
        assert_eq!(run_softmax(neither).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_training_needs_labels() {
        let params = SoftmaxProgramParams { training: Some(training()), ..Default::default() };
        assert!(matches!(run_softmax(params), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_test_labels_need_test_set() {
        let params = SoftmaxProgramParams {
            training: Some(training()),
            labels: Some(array![0, 0, 0, 1, 1, 1]),
            test_labels: Some(array![0, 1]),
            ..Default::default()
        };
        assert!(matches!(run_softmax(params), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_test_set_checked_before_training() {
        // A NaN lambda would be rejected by the trainer, so a data error here
        // means the test set was looked at first.
        let params = SoftmaxProgramParams {
            training: Some(training()),
            labels: Some(array![0, 0, 0, 1, 1, 1]),
            test: Some(PointSet::from_rows(array![[1.0, 2.0]]).unwrap()),
            lambda: f64::NAN,
            ..Default::default()
        };
        let err = run_softmax(params).unwrap_err();
        assert_eq!(err, Error::Softmax(SoftmaxError::DimensionMismatch { expected: 1, found: 2 }));

        let params = SoftmaxProgramParams {
            training: Some(training()),
            labels: Some(array![0, 0, 0, 1, 1, 1]),
            test: Some(PointSet::from_rows(array![[1.0], [2.0]]).unwrap()),
            test_labels: Some(array![1]),
            lambda: f64::NAN,
            ..Default::default()
        };
        let err = run_softmax(params).unwrap_err();
        assert_eq!(err, Error::Softmax(SoftmaxError::LabelCountMismatch { points: 2, labels: 1 }));
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn test_input_model_checks_test_set() {
        let model = SoftmaxModel::from_weights(array![[1.0, 0.0], [-1.0, 0.0]], true).unwrap();
        let params = SoftmaxProgramParams {
            input_model: Some(model),
            test: Some(PointSet::from_rows(array![[1.0, 2.0]]).unwrap()),
            ..Default::default()
        };
        assert_eq!(run_softmax(params).unwrap_err().kind(), ErrorKind::Data);
    }

    #[test]
    fn test_invalid_lambda_reaches_trainer() {
        let params = SoftmaxProgramParams {
            training: Some(training()),
            labels: Some(array![0, 0, 0, 1, 1, 1]),
            lambda: f64::NAN,
            ..Default::default()
        };
        assert_eq!(run_softmax(params).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_defaults_follow_config() {
        let params = SoftmaxProgramParams::<f32>::default();
        assert_eq!(params.lambda, 1e-4);
        assert_eq!(params.max_iterations, 400);
        assert!(!params.no_intercept);
        assert_eq!(params.config(), SoftmaxConfig::default());
    }
}
