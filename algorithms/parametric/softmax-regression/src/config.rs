use crate::{LbfgsConfig, SoftmaxError};

pub const DEFAULT_LAMBDA: f64 = 1e-4;
pub const DEFAULT_MAX_ITERATIONS: usize = 400;

/// Training parameters of a [`SoftmaxRegression`](crate::SoftmaxRegression).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct SoftmaxConfig {
    /// `0` infers `max(label) + 1`.
    pub num_classes: usize,
    /// L2 regularisation strength.
    pub lambda: f64,
    pub fit_intercept: bool,
    /// `0` draws a fresh seed for the weight initialisation.
    pub seed: u64,
    pub optimizer: LbfgsConfig,
}

impl Default for SoftmaxConfig {
    fn default() -> Self {
        Self {
            num_classes: 0,
            lambda: DEFAULT_LAMBDA,
            fit_intercept: true,
            seed: 0,
            optimizer: LbfgsConfig::default().with_max_iterations(DEFAULT_MAX_ITERATIONS),
        }
    }
}

impl SoftmaxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// `0` lets the optimiser run until it converges.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.optimizer.max_iterations = max_iterations;
        self
    }

    pub fn with_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_optimizer(mut self, optimizer: LbfgsConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.optimizer.max_iterations
    }

    pub(crate) fn validate(&self) -> Result<(), SoftmaxError> {
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(SoftmaxError::InvalidConfig(format!(
                "lambda must be finite and non-negative, got {}",
                self.lambda
            )));
        }
        self.optimizer.validate()
    }
}
