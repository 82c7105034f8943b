//! Limited-memory BFGS with a backtracking Armijo line search.
//!
//! The inverse Hessian is never formed: the last `num_basis` step/gradient
//! differences are replayed through the two-loop recursion (Nocedal & Wright,
//! Algorithm 7.4) to turn the gradient into a search direction.

use std::collections::VecDeque;

use annsoft_helpers::Float;
use ndarray::{Array2, Zip};
use tracing::{debug, warn};

use crate::SoftmaxError;

/// An objective whose gradient is available in closed form.
pub trait DifferentiableFunction<F: Float> {
    /// Objective value and gradient at `params`.
    fn evaluate_with_gradient(&self, params: &Array2<F>) -> (F, Array2<F>);
}

/// Settings of the optimiser.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LbfgsConfig {
    /// Number of correction pairs kept.
    pub num_basis: usize,
    /// `0` means no limit.
    pub max_iterations: usize,
    pub min_gradient_norm: f64,
    /// Sufficient-decrease constant `c1` of the Armijo condition.
    pub armijo_constant: f64,
    /// Step shrink factor applied after each rejected trial.
    pub backtrack_factor: f64,
    pub max_line_search_trials: usize,
    pub min_step: f64,
    /// Stop once the objective changes by less than `factr` relative to its
    /// magnitude.
    pub factr: f64,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            num_basis: 10,
            max_iterations: 10_000,
            min_gradient_norm: 1e-6,
            armijo_constant: 1e-4,
            backtrack_factor: 0.5,
            max_line_search_trials: 50,
            min_step: 1e-20,
            factr: 1e-15,
        }
    }
}

impl LbfgsConfig {
    pub fn with_num_basis(mut self, num_basis: usize) -> Self {
        self.num_basis = num_basis;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_min_gradient_norm(mut self, min_gradient_norm: f64) -> Self {
        self.min_gradient_norm = min_gradient_norm;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SoftmaxError> {
        if self.num_basis == 0 {
            return Err(SoftmaxError::InvalidConfig("num_basis must be positive".into()));
        }
        if self.max_line_search_trials == 0 {
            return Err(SoftmaxError::InvalidConfig(
                "max_line_search_trials must be positive".into(),
            ));
        }
        if !(self.armijo_constant > 0.0 && self.armijo_constant < 1.0) {
            return Err(SoftmaxError::InvalidConfig(
                "armijo_constant must lie in (0, 1)".into(),
            ));
        }
        if !(self.backtrack_factor > 0.0 && self.backtrack_factor < 1.0) {
            return Err(SoftmaxError::InvalidConfig(
                "backtrack_factor must lie in (0, 1)".into(),
            ));
        }
        if !(self.min_gradient_norm >= 0.0 && self.factr >= 0.0 && self.min_step > 0.0) {
            return Err(SoftmaxError::InvalidConfig(
                "tolerances must be non-negative and min_step positive".into(),
            ));
        }
        Ok(())
    }
}

/// Why the optimiser stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    GradientNorm,
    ObjectiveTolerance,
    MaxIterations,
    /// No step along the steepest-descent direction decreased the objective.
    LineSearchFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub iterations: usize,
    pub objective: f64,
    pub gradient_norm: f64,
    pub termination: Termination,
}

impl OptimizationReport {
    /// Turns a run that stalled in the line search into an error.
    ///
    /// # Errors
    ///
    /// `SoftmaxError::LineSearchFailed` when `termination` is
    /// [`Termination::LineSearchFailed`].
    pub fn ensure_progress(&self) -> Result<(), SoftmaxError> {
        match self.termination {
            Termination::LineSearchFailed => Err(SoftmaxError::LineSearchFailed { iterations: self.iterations }),
            _ => Ok(()),
        }
    }
}

struct Correction<F: Float> {
    s: Array2<F>,
    y: Array2<F>,
    rho: F,
}

struct Step<F: Float> {
    params: Array2<F>,
    objective: F,
    gradient: Array2<F>,
}

/// The L-BFGS minimiser.
#[derive(Debug, Clone, Default)]
pub struct Lbfgs {
    config: LbfgsConfig,
}

impl Lbfgs {
    pub fn new(config: LbfgsConfig) -> Self {
        Self { config }
    }

    /// Minimises `function` starting from `initial`.
    ///
    /// # Errors
    ///
    /// Returns `SoftmaxError::NonFiniteObjective` when the objective is NaN or
    /// infinite at `initial`. A line search that cannot make progress ends
    /// the run early with [`Termination::LineSearchFailed`] instead; see
    /// [`OptimizationReport::ensure_progress`].
    pub fn minimize<F, O>(
        &self,
        function: &O,
        initial: Array2<F>,
    ) -> Result<(Array2<F>, OptimizationReport), SoftmaxError>
    where
        F: Float,
        O: DifferentiableFunction<F>,
    {
        self.config.validate()?;

        let mut params = initial;
        let (mut objective, mut gradient) = function.evaluate_with_gradient(&params);
        if !objective.is_finite() {
            return Err(SoftmaxError::NonFiniteObjective);
        }

        let mut history: VecDeque<Correction<F>> = VecDeque::with_capacity(self.config.num_basis);
        let mut iterations = 0;
        let termination = loop {
            let gradient_norm = inner(&gradient, &gradient).sqrt().to_f64_lossy();
            if gradient_norm < self.config.min_gradient_norm {
                break Termination::GradientNorm;
            }
            if self.config.max_iterations != 0 && iterations >= self.config.max_iterations {
                break Termination::MaxIterations;
            }
            iterations += 1;

            let mut direction = two_loop(&gradient, &history);
            if inner(&gradient, &direction) >= F::zero() {
                history.clear();
                direction = gradient.mapv(|g| -g);
            }

            let step = match self.line_search(function, &params, objective, &gradient, &direction) {
                Some(step) => step,
                None if !history.is_empty() => {
                    debug!(iteration = iterations, "line search failed, restarting from steepest descent");
                    history.clear();
                    let steepest = gradient.mapv(|g| -g);
                    match self.line_search(function, &params, objective, &gradient, &steepest) {
                        Some(step) => step,
                        None => break Termination::LineSearchFailed,
                    }
                }
                None => break Termination::LineSearchFailed,
            };

            let s = &step.params - &params;
            let y = &step.gradient - &gradient;
            let sy = inner(&s, &y);
            if sy.to_f64_lossy() > 1e-10 {
                if history.len() == self.config.num_basis {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: F::one() / sy });
            }

            let scale = objective.abs().max(step.objective.abs()).max(F::one());
            let stalled = (objective - step.objective).abs().to_f64_lossy()
                <= self.config.factr * scale.to_f64_lossy();

            params = step.params;
            objective = step.objective;
            gradient = step.gradient;
            debug!(
                iteration = iterations,
                objective = objective.to_f64_lossy(),
                "L-BFGS iteration"
            );

            if stalled {
                break Termination::ObjectiveTolerance;
            }
        };

        let report = OptimizationReport {
            iterations,
            objective: objective.to_f64_lossy(),
            gradient_norm: inner(&gradient, &gradient).sqrt().to_f64_lossy(),
            termination,
        };
        if termination == Termination::LineSearchFailed {
            warn!(
                iterations,
                objective = report.objective,
                "L-BFGS stopped: line search could not decrease the objective"
            );
        }
        Ok((params, report))
    }

    /// Backtracks from a unit step until the Armijo condition holds.
    fn line_search<F, O>(
        &self,
        function: &O,
        params: &Array2<F>,
        objective: F,
        gradient: &Array2<F>,
        direction: &Array2<F>,
    ) -> Option<Step<F>>
    where
        F: Float,
        O: DifferentiableFunction<F>,
    {
        let slope = inner(gradient, direction);
        let armijo = F::from_f64_lossy(self.config.armijo_constant);
        let shrink = F::from_f64_lossy(self.config.backtrack_factor);
        let mut step_size = F::one();

        for _ in 0..self.config.max_line_search_trials {
            let mut trial = params.clone();
            trial.scaled_add(step_size, direction);
            let (value, trial_gradient) = function.evaluate_with_gradient(&trial);
            if value.is_finite() && value <= objective + armijo * step_size * slope {
                return Some(Step {
                    params: trial,
                    objective: value,
                    gradient: trial_gradient,
                });
            }
            step_size = step_size * shrink;
            if step_size.to_f64_lossy() < self.config.min_step {
                break;
            }
        }
        None
    }
}

/// Two-loop recursion: returns `-H·gradient` for the current inverse-Hessian
/// approximation `H`.
fn two_loop<F: Float>(gradient: &Array2<F>, history: &VecDeque<Correction<F>>) -> Array2<F> {
    let mut q = gradient.clone();
    let mut alphas = Vec::with_capacity(history.len());
    for correction in history.iter().rev() {
        let alpha = correction.rho * inner(&correction.s, &q);
        q.scaled_add(-alpha, &correction.y);
        alphas.push(alpha);
    }

    if let Some(last) = history.back() {
        let gamma = inner(&last.s, &last.y) / inner(&last.y, &last.y);
        q *= gamma;
    }

    for (correction, &alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = correction.rho * inner(&correction.y, &q);
        q.scaled_add(alpha - beta, &correction.s);
    }
    q.mapv_inplace(|v| -v);
    q
}

/// Frobenius inner product.
fn inner<F: Float>(a: &Array2<F>, b: &Array2<F>) -> F {
    Zip::from(a).and(b).fold(F::zero(), |acc, &x, &y| acc + x * y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// f(x) = Σ c_i (x_i - t_i)², minimised at t.
    struct Quadratic {
        target: Array2<f64>,
        curvature: Array2<f64>,
    }

    impl DifferentiableFunction<f64> for Quadratic {
        fn evaluate_with_gradient(&self, params: &Array2<f64>) -> (f64, Array2<f64>) {
            let diff = params - &self.target;
            let value = (&self.curvature * &diff * &diff).sum();
            (value, &self.curvature * &diff * 2.0)
        }
    }

    struct Rosenbrock;

    impl DifferentiableFunction<f64> for Rosenbrock {
        fn evaluate_with_gradient(&self, params: &Array2<f64>) -> (f64, Array2<f64>) {
            let (x, y) = (params[[0, 0]], params[[0, 1]]);
            let value = (1.0 - x).powi(2) + 100.0 * (y - x * x).powi(2);
            let dx = -2.0 * (1.0 - x) - 400.0 * x * (y - x * x);
            let dy = 200.0 * (y - x * x);
            (value, array![[dx, dy]])
        }
    }

    /// Reports the gradient of `x²` with its sign flipped, so no step along
    /// the negated gradient decreases the value.
    struct Uphill;

    impl DifferentiableFunction<f64> for Uphill {
        fn evaluate_with_gradient(&self, params: &Array2<f64>) -> (f64, Array2<f64>) {
            ((params * params).sum(), params * -2.0)
        }
    }

    struct NotANumber;

    impl DifferentiableFunction<f64> for NotANumber {
        fn evaluate_with_gradient(&self, params: &Array2<f64>) -> (f64, Array2<f64>) {
            (f64::NAN, params.clone())
        }
    }

    #[test]
    fn test_minimizes_ill_conditioned_quadratic() {
        let function = Quadratic {
            target: array![[1.0, -2.0], [3.0, 0.5]],
            curvature: array![[1.0, 50.0], [0.1, 10.0]],
        };
        let (params, report) = Lbfgs::default().minimize(&function, Array2::zeros((2, 2))).unwrap();
        for (p, t) in params.iter().zip(function.target.iter()) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-4);
        }
        assert_ne!(report.termination, Termination::LineSearchFailed);
        assert_ne!(report.termination, Termination::MaxIterations);
    }

    #[test]
    fn test_minimizes_rosenbrock() {
        let optimizer = Lbfgs::new(LbfgsConfig::default().with_min_gradient_norm(1e-8));
        let (params, _) = optimizer.minimize(&Rosenbrock, array![[-1.2, 1.0]]).unwrap();
        assert_abs_diff_eq!(params[[0, 0]], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(params[[0, 1]], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_respects_max_iterations() {
        let optimizer = Lbfgs::new(LbfgsConfig::default().with_max_iterations(3));
        let (_, report) = optimizer.minimize(&Rosenbrock, array![[-1.2, 1.0]]).unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.termination, Termination::MaxIterations);
    }

    #[test]
    fn test_non_finite_start_is_an_error() {
        let result = Lbfgs::default().minimize(&NotANumber, array![[1.0]]);
        assert_eq!(result.unwrap_err(), SoftmaxError::NonFiniteObjective);
    }

    #[test]
    fn test_rejects_empty_history() {
        let optimizer = Lbfgs::new(LbfgsConfig::default().with_num_basis(0));
        let result = optimizer.minimize(&Rosenbrock, array![[0.0, 0.0]]);
        assert!(matches!(result, Err(SoftmaxError::InvalidConfig(_))));
    }

    #[test]
    fn test_failed_line_search_is_reported() {
        let (params, report) = Lbfgs::default().minimize(&Uphill, array![[1.0]]).unwrap();
        assert_eq!(params, array![[1.0]]);
        assert_eq!(report.termination, Termination::LineSearchFailed);
        let err = report.ensure_progress().unwrap_err();
        assert_eq!(err, SoftmaxError::LineSearchFailed { iterations: 1 });
        assert_eq!(err.kind(), annsoft_helpers::ErrorKind::Numeric);

        let function = Quadratic { target: array![[2.0]], curvature: array![[1.0]] };
        let (_, report) = Lbfgs::default().minimize(&function, array![[0.0]]).unwrap();
        assert!(report.ensure_progress().is_ok());
    }
}
