use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MptError;
use crate::portfolio::evaluator::{vec_dot, PortfolioEvaluator};
use crate::types::Weights;
use crate::MptResult;

/// Sufficient-decrease constant of the Armijo rule.
const ARMIJO_C: f64 = 1e-4;
/// Step shrink factor during backtracking.
const BACKTRACK: f64 = 0.5;
const MIN_STEP: f64 = 1e-14;
const MAX_STEP: f64 = 1e3;
/// Stationarity accepted when the line search can no longer make progress.
const STALL_TOLERANCE: f64 = 1e-6;
/// Central-difference gradients cannot resolve stationarity below this.
const FINITE_DIFFERENCE_TOLERANCE: f64 = 1e-7;
const FINITE_DIFFERENCE_STEP: f64 = 1e-6;
/// Iterates with volatility below this fraction of the largest stand-alone
/// volatility are treated as running off toward a riskless corner.
const RUNAWAY_VOLATILITY_RATIO: f64 = 1e-6;
const UNBOUNDED_REASON: &str =
    "Sharpe ratio is unbounded: volatility collapses toward a zero-variance portfolio";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the objective gradient is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMode {
    /// Closed-form gradient of the negative Sharpe ratio.
    #[default]
    Analytic,
    /// Central differences on the objective only.
    FiniteDifference,
}

/// Settings for the constrained Sharpe-ratio search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Starting point; projected onto the simplex. Uniform weights when absent.
    #[serde(default)]
    pub initial_weights: Option<Vec<f64>>,
    /// Iteration cap (default 10 000).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Stationarity tolerance on `||w - P(w - grad)||_inf` (default 1e-9).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Relative objective-improvement tolerance (default 1e-15).
    #[serde(default = "default_ftol")]
    pub ftol: f64,
    #[serde(default)]
    pub gradient: GradientMode,
}

fn default_max_iterations() -> u32 {
    10_000
}

fn default_tolerance() -> f64 {
    1e-9
}

fn default_ftol() -> f64 {
    1e-15
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            initial_weights: None,
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            ftol: default_ftol(),
            gradient: GradientMode::default(),
        }
    }
}

/// Sharpe-maximising weights found by the constrained search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub weights: Weights,
    /// Negated final objective value.
    pub sharpe_ratio: f64,
    pub expected_return: f64,
    pub volatility: f64,
    /// Accepted descent steps.
    pub iterations: u32,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Maximise the Sharpe ratio over the long-only, fully-invested simplex.
///
/// Minimises `negative_sharpe` by projected gradient descent with Armijo
/// backtracking. Every iterate is projected onto `{w : w_i >= 0, sum w = 1}`,
/// so bounds and budget hold throughout the search, not only at the end.
///
/// The objective is not convex when the risk-free rate exceeds some asset
/// returns, so the descent is restarted from every vertex of the simplex and
/// from an excess-return tilt, keeping the best converged point. Errors from
/// the primary start (`initial_weights`, or uniform weights) propagate; a
/// failed alternative start is skipped unless it ran off toward a riskless
/// corner, which makes the whole problem unbounded.
pub fn maximize_sharpe(
    evaluator: &PortfolioEvaluator,
    settings: &OptimizerSettings,
) -> MptResult<OptimizationResult> {
    let n = evaluator.num_assets();
    validate_settings(settings, n)?;

    if n == 1 {
        return finish(evaluator, vec![1.0], 0, 0.0);
    }

    let search = Search {
        evaluator,
        settings,
        tolerance: match settings.gradient {
            GradientMode::Analytic => settings.tolerance,
            GradientMode::FiniteDifference => {
                settings.tolerance.max(FINITE_DIFFERENCE_TOLERANCE)
            }
        },
        volatility_floor: RUNAWAY_VOLATILITY_RATIO * largest_asset_volatility(evaluator),
    };

    let primary = match settings.initial_weights {
        Some(ref init) => project_onto_simplex(init),
        None => uniform_weights(n),
    };
    let mut best = search.descend(primary)?;

    for (label, start) in alternative_starts(evaluator) {
        match search.descend(start) {
            Ok(candidate) if candidate.sharpe_ratio > best.sharpe_ratio => {
                debug!(
                    start = %label,
                    sharpe = candidate.sharpe_ratio,
                    previous = best.sharpe_ratio,
                    "alternative start improved the optimum"
                );
                best = candidate;
            }
            Ok(_) => {}
            Err(MptError::NoFeasibleOptimum { ref reason, .. }) if reason == UNBOUNDED_REASON => {
                warn!(start = %label, "alternative start ran away toward zero volatility");
                return Err(no_optimum(best.iterations, UNBOUNDED_REASON));
            }
            Err(e) => debug!(start = %label, error = %e, "alternative start discarded"),
        }
    }

    Ok(best)
}

/// Euclidean projection onto the probability simplex (sort-based).
pub fn project_onto_simplex(v: &[f64]) -> Vec<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (j + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }

    v.iter().map(|x| (x - theta).max(0.0)).collect()
}

/// Equal weights for n assets.
pub fn uniform_weights(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

// ---------------------------------------------------------------------------
// Search internals
// ---------------------------------------------------------------------------

/// Fixed parameters of one projected-gradient run.
struct Search<'a> {
    evaluator: &'a PortfolioEvaluator,
    settings: &'a OptimizerSettings,
    tolerance: f64,
    /// Iterates below this volatility mean the Sharpe ratio is unbounded.
    volatility_floor: f64,
}

/// Outcome of one Armijo line search.
enum LineSearch {
    Accepted {
        candidate: Vec<f64>,
        objective: f64,
        step: f64,
    },
    /// No step was accepted. `runaway` is set when a trial point within
    /// stall distance of the iterate had zero volatility.
    Failed { runaway: bool },
}

impl Search<'_> {
    fn descend(&self, start: Vec<f64>) -> MptResult<OptimizationResult> {
        let evaluator = self.evaluator;
        let mut w = start;
        let mut f = evaluator.negative_sharpe(&w)?;
        let mut step = 1.0;
        let mut iterations: u32 = 0;

        while iterations < self.settings.max_iterations {
            let grad = objective_gradient(evaluator, &w, self.settings.gradient)?;
            if grad.iter().any(|g| !g.is_finite()) {
                return Err(no_optimum(iterations, "gradient is not finite"));
            }

            let stationarity = max_abs_diff(&w, &project_onto_simplex(&axpy(&w, -1.0, &grad)));
            if stationarity <= self.tolerance {
                debug!(iterations, stationarity, sharpe = -f, "optimizer converged");
                return finish(evaluator, w, iterations, self.volatility_floor);
            }

            let (candidate, f_candidate, accepted_step) =
                match backtrack(evaluator, &w, f, &grad, step)? {
                    LineSearch::Accepted {
                        candidate,
                        objective,
                        step,
                    } => (candidate, objective, step),
                    LineSearch::Failed { runaway: true } => {
                        warn!(iterations, sharpe = -f, "descent runs into a zero-volatility portfolio");
                        return Err(no_optimum(iterations, UNBOUNDED_REASON));
                    }
                    LineSearch::Failed { runaway: false } => {
                        if stationarity <= STALL_TOLERANCE {
                            debug!(iterations, stationarity, "line search stalled at a stationary point");
                            return finish(evaluator, w, iterations, self.volatility_floor);
                        }
                        warn!(iterations, stationarity, "line search failed to find a descent step");
                        return Err(no_optimum(iterations, "line search failed to find a descent step"));
                    }
                };

            let improvement = f - f_candidate;
            w = candidate;
            f = f_candidate;
            iterations += 1;
            step = (accepted_step * 2.0).min(MAX_STEP);

            let volatility = evaluator.volatility(&w)?;
            if volatility < self.volatility_floor {
                warn!(iterations, volatility, sharpe = -f, "volatility collapsing toward zero");
                return Err(no_optimum(iterations, UNBOUNDED_REASON));
            }

            if improvement <= self.settings.ftol * f.abs().max(1.0) {
                debug!(iterations, improvement, sharpe = -f, "objective improvement below ftol");
                return finish(evaluator, w, iterations, self.volatility_floor);
            }
        }

        warn!(
            max_iterations = self.settings.max_iterations,
            "optimizer hit the iteration cap"
        );
        Err(no_optimum(iterations, "iteration limit reached"))
    }
}

/// Simplex vertices, then `w ~ max(R - rf, 0) / Sigma_ii` when it is defined.
fn alternative_starts(evaluator: &PortfolioEvaluator) -> Vec<(String, Vec<f64>)> {
    let n = evaluator.num_assets();
    let mut starts: Vec<(String, Vec<f64>)> = (0..n)
        .map(|i| {
            let mut vertex = vec![0.0; n];
            vertex[i] = 1.0;
            (format!("vertex {}", i), vertex)
        })
        .collect();

    let rf = evaluator.risk_free_rate();
    let tilt: Vec<f64> = evaluator
        .returns()
        .iter()
        .zip(evaluator.covariance().iter().enumerate())
        .map(|(r, (i, row))| {
            if row[i] > 0.0 {
                (r - rf).max(0.0) / row[i]
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = tilt.iter().sum();
    if total > 0.0 && total.is_finite() {
        starts.push((
            "excess-return tilt".to_string(),
            tilt.iter().map(|t| t / total).collect(),
        ));
    }
    starts
}

fn largest_asset_volatility(evaluator: &PortfolioEvaluator) -> f64 {
    evaluator
        .covariance()
        .iter()
        .enumerate()
        .map(|(i, row)| row[i].max(0.0).sqrt())
        .fold(0.0, f64::max)
}

/// Armijo backtracking along the projection arc `P(w - t * grad)`.
/// Trial points with degenerate volatility are rejected, not fatal.
fn backtrack(
    evaluator: &PortfolioEvaluator,
    w: &[f64],
    f: f64,
    grad: &[f64],
    initial_step: f64,
) -> MptResult<LineSearch> {
    let mut runaway = false;
    let mut t = initial_step;
    while t >= MIN_STEP {
        let candidate = project_onto_simplex(&axpy(w, -t, grad));
        let direction: Vec<f64> = candidate.iter().zip(w).map(|(c, x)| c - x).collect();
        let predicted = vec_dot(grad, &direction);

        match evaluator.negative_sharpe(&candidate) {
            Ok(objective) if objective.is_finite() => {
                if objective <= f + ARMIJO_C * predicted && predicted < 0.0 {
                    return Ok(LineSearch::Accepted {
                        candidate,
                        objective,
                        step: t,
                    });
                }
            }
            Err(MptError::DegenerateVolatility { .. }) => {
                if max_abs_diff(&candidate, w) <= STALL_TOLERANCE {
                    runaway = true;
                }
            }
            Ok(_) => {}
            Err(e) => return Err(e),
        }
        t *= BACKTRACK;
    }
    Ok(LineSearch::Failed { runaway })
}

fn objective_gradient(
    evaluator: &PortfolioEvaluator,
    w: &[f64],
    mode: GradientMode,
) -> MptResult<Vec<f64>> {
    match mode {
        GradientMode::Analytic => evaluator.negative_sharpe_gradient(w),
        GradientMode::FiniteDifference => {
            let mut grad = Vec::with_capacity(w.len());
            let mut shifted = w.to_vec();
            for i in 0..w.len() {
                let h = FINITE_DIFFERENCE_STEP * w[i].abs().max(1.0);
                shifted[i] = w[i] + h;
                let up = evaluator.negative_sharpe(&shifted)?;
                shifted[i] = w[i] - h;
                let down = evaluator.negative_sharpe(&shifted)?;
                shifted[i] = w[i];
                grad.push((up - down) / (2.0 * h));
            }
            Ok(grad)
        }
    }
}

fn finish(
    evaluator: &PortfolioEvaluator,
    weights: Vec<f64>,
    iterations: u32,
    volatility_floor: f64,
) -> MptResult<OptimizationResult> {
    let metrics = evaluator.metrics(&weights)?;
    if !metrics.sharpe_ratio.is_finite() {
        return Err(no_optimum(iterations, "objective is not finite at the solution"));
    }
    if metrics.volatility < volatility_floor {
        return Err(no_optimum(iterations, UNBOUNDED_REASON));
    }
    Ok(OptimizationResult {
        weights,
        sharpe_ratio: metrics.sharpe_ratio,
        expected_return: metrics.expected_return,
        volatility: metrics.volatility,
        iterations,
        converged: true,
    })
}

fn validate_settings(settings: &OptimizerSettings, n: usize) -> MptResult<()> {
    if settings.max_iterations == 0 {
        return Err(MptError::InvalidInput {
            field: "optimizer.max_iterations".into(),
            reason: "Must be at least 1".into(),
        });
    }
    if !(settings.tolerance.is_finite() && settings.tolerance > 0.0) {
        return Err(MptError::InvalidInput {
            field: "optimizer.tolerance".into(),
            reason: "Must be a positive finite number".into(),
        });
    }
    if !(settings.ftol.is_finite() && settings.ftol >= 0.0) {
        return Err(MptError::InvalidInput {
            field: "optimizer.ftol".into(),
            reason: "Must be a non-negative finite number".into(),
        });
    }
    if let Some(ref init) = settings.initial_weights {
        if init.len() != n {
            return Err(MptError::DimensionMismatch {
                context: "optimizer.initial_weights".into(),
                expected: n,
                actual: init.len(),
            });
        }
        if init.iter().any(|w| !w.is_finite()) {
            return Err(MptError::InvalidInput {
                field: "optimizer.initial_weights".into(),
                reason: "Initial weights must be finite".into(),
            });
        }
    }
    Ok(())
}

fn no_optimum(iterations: u32, reason: &str) -> MptError {
    MptError::NoFeasibleOptimum {
        iterations,
        reason: reason.to_string(),
    }
}

fn axpy(x: &[f64], a: f64, y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| xi + a * yi).collect()
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn two_asset() -> PortfolioEvaluator {
        PortfolioEvaluator::new(
            vec![0.10, 0.20],
            vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            0.05,
        )
        .unwrap()
    }

    fn four_asset() -> PortfolioEvaluator {
        let vols = [0.18, 0.22, 0.12, 0.30];
        let corr = [
            [1.0, 0.4, 0.2, 0.5],
            [0.4, 1.0, 0.1, 0.6],
            [0.2, 0.1, 1.0, 0.0],
            [0.5, 0.6, 0.0, 1.0],
        ];
        let cov = (0..4)
            .map(|i| (0..4).map(|j| corr[i][j] * vols[i] * vols[j]).collect())
            .collect();
        PortfolioEvaluator::new(vec![0.09, 0.12, 0.05, 0.15], cov, 0.03).unwrap()
    }

    fn assert_on_simplex(w: &[f64]) {
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "weights sum to {}", sum);
        for wi in w {
            assert!(*wi >= -1e-9 && *wi <= 1.0 + 1e-9, "weight {} outside [0,1]", wi);
        }
    }

    #[test]
    fn test_projection_of_feasible_point_is_identity() {
        let w = [0.2, 0.3, 0.5];
        let p = project_onto_simplex(&w);
        for (a, b) in w.iter().zip(p.iter()) {
            assert!((a - b).abs() < 1e-15);
        }
    }

    #[test]
    fn test_projection_clips_and_rebalances() {
        let p = project_onto_simplex(&[2.0, -1.0, 0.5]);
        assert_on_simplex(&p);
        assert_eq!(p[1], 0.0);
        assert!((p[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_shifts_uniformly() {
        let p = project_onto_simplex(&[0.5, 0.5, 0.5]);
        for pi in &p {
            assert!((pi - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_two_asset_tangency() {
        // Independent assets: w ~ Sigma^-1 (R - rf) = (1.25, 1.6667) -> (3/7, 4/7)
        let result = maximize_sharpe(&two_asset(), &OptimizerSettings::default()).unwrap();
        assert!(result.converged);
        assert_on_simplex(&result.weights);
        assert!((result.weights[0] - 3.0 / 7.0).abs() < 1e-4, "{:?}", result.weights);
        assert!((result.weights[1] - 4.0 / 7.0).abs() < 1e-4, "{:?}", result.weights);
        let expected_sharpe = (0.25f64.powi(2) + 0.5f64.powi(2)).sqrt();
        assert!((result.sharpe_ratio - expected_sharpe).abs() < 1e-8);
    }

    #[test]
    fn test_two_asset_beats_both_single_assets() {
        let result = maximize_sharpe(&two_asset(), &OptimizerSettings::default()).unwrap();
        assert!(result.weights[1] > 0.0);
        assert!(result.sharpe_ratio > 0.25);
        assert!(result.sharpe_ratio > 0.50);
    }

    #[test]
    fn test_reported_sharpe_matches_weights() {
        let ev = four_asset();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert_eq!(result.sharpe_ratio, ev.sharpe_ratio(&result.weights).unwrap());
        assert_eq!(result.expected_return, ev.expected_return(&result.weights).unwrap());
    }

    #[test]
    fn test_four_asset_stays_feasible_and_improves_on_uniform() {
        let ev = four_asset();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert_on_simplex(&result.weights);
        let uniform = ev.sharpe_ratio(&uniform_weights(4)).unwrap();
        assert!(result.sharpe_ratio >= uniform);
    }

    #[test]
    fn test_corner_solution_when_one_asset_dominates() {
        // Asset 1 has the higher return and the lower risk, perfectly
        // correlated with asset 2: all weight goes to asset 1.
        let ev = PortfolioEvaluator::new(
            vec![0.12, 0.06],
            vec![vec![0.01, 0.015], vec![0.015, 0.0225]],
            0.02,
        )
        .unwrap();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert_on_simplex(&result.weights);
        assert!(result.weights[0] > 1.0 - 1e-6, "{:?}", result.weights);
    }

    #[test]
    fn test_finite_difference_agrees_with_analytic() {
        let ev = four_asset();
        let analytic = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        let numeric = maximize_sharpe(
            &ev,
            &OptimizerSettings {
                gradient: GradientMode::FiniteDifference,
                ..Default::default()
            },
        )
        .unwrap();
        assert!((analytic.sharpe_ratio - numeric.sharpe_ratio).abs() < 1e-6);
    }

    #[test]
    fn test_initial_guess_does_not_change_optimum() {
        let ev = two_asset();
        let from_corner = maximize_sharpe(
            &ev,
            &OptimizerSettings {
                initial_weights: Some(vec![0.9, 0.1]),
                ..Default::default()
            },
        )
        .unwrap();
        let from_uniform = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert!((from_corner.sharpe_ratio - from_uniform.sharpe_ratio).abs() < 1e-8);
    }

    #[test]
    fn test_single_asset_is_trivial() {
        let ev = PortfolioEvaluator::new(vec![0.08], vec![vec![0.04]], 0.02).unwrap();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert_eq!(result.weights, vec![1.0]);
        assert_eq!(result.iterations, 0);
        assert!((result.sharpe_ratio - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_iteration_cap_is_no_feasible_optimum() {
        let err = maximize_sharpe(
            &four_asset(),
            &OptimizerSettings {
                max_iterations: 1,
                tolerance: 1e-300,
                ftol: 0.0,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, MptError::NoFeasibleOptimum { .. }));
    }

    #[test]
    fn test_degenerate_start_propagates() {
        let ev = PortfolioEvaluator::new(
            vec![0.05, 0.07],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
            0.02,
        )
        .unwrap();
        let err = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap_err();
        assert!(matches!(err, MptError::DegenerateVolatility { .. }));
    }

    #[test]
    fn test_rejects_bad_settings() {
        let ev = two_asset();
        let bad_len = OptimizerSettings {
            initial_weights: Some(vec![1.0]),
            ..Default::default()
        };
        assert!(matches!(
            maximize_sharpe(&ev, &bad_len),
            Err(MptError::DimensionMismatch { .. })
        ));
        let bad_tol = OptimizerSettings {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            maximize_sharpe(&ev, &bad_tol),
            Err(MptError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_settings_defaults_from_empty_json() {
        let s: OptimizerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.max_iterations, 10_000);
        assert_eq!(s.gradient, GradientMode::Analytic);
        assert!(s.initial_weights.is_none());
    }

    /// Every asset returns less than rf. B and C are identical and highly
    /// correlated, so the uniform start descends to the middle of the B-C
    /// edge (Sharpe ~ -1.14), a stationary point. Vertex A (-0.92) is the
    /// global maximum.
    fn hurdle_above_all_returns() -> PortfolioEvaluator {
        let bc = 0.9 * 0.45 * 0.45;
        PortfolioEvaluator::new(
            vec![0.04, 0.0, 0.0],
            vec![
                vec![0.25, 0.0, 0.0],
                vec![0.0, 0.2025, bc],
                vec![0.0, bc, 0.2025],
            ],
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn test_risk_free_above_returns_finds_global_vertex() {
        let ev = hurdle_above_all_returns();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert_on_simplex(&result.weights);
        assert!(result.weights[0] > 1.0 - 1e-6, "{:?}", result.weights);
        assert!((result.sharpe_ratio - (-0.92)).abs() < 1e-9, "{}", result.sharpe_ratio);

        let edge_midpoint = ev.sharpe_ratio(&[0.0, 0.5, 0.5]).unwrap();
        assert!(result.sharpe_ratio > edge_midpoint);
    }

    #[test]
    fn test_multi_start_never_worse_than_any_vertex() {
        let ev = hurdle_above_all_returns();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        for i in 0..3 {
            let mut vertex = vec![0.0; 3];
            vertex[i] = 1.0;
            assert!(result.sharpe_ratio >= ev.sharpe_ratio(&vertex).unwrap() - 1e-12);
        }
    }

    #[test]
    fn test_riskless_asset_above_rf_is_unbounded() {
        // Asset 0 has zero variance and beats rf: Sharpe grows without bound
        // as weight moves onto it.
        let ev = PortfolioEvaluator::new(
            vec![0.06, 0.10],
            vec![vec![0.0, 0.0], vec![0.0, 0.04]],
            0.05,
        )
        .unwrap();
        let err = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap_err();
        assert!(
            matches!(err, MptError::NoFeasibleOptimum { .. }),
            "expected NoFeasibleOptimum, got {:?}",
            err
        );
    }

    #[test]
    fn test_unbounded_from_risky_vertex_start() {
        let ev = PortfolioEvaluator::new(
            vec![0.06, 0.10],
            vec![vec![0.0, 0.0], vec![0.0, 0.04]],
            0.05,
        )
        .unwrap();
        let settings = OptimizerSettings {
            initial_weights: Some(vec![0.0, 1.0]),
            ..OptimizerSettings::default()
        };
        let result = maximize_sharpe(&ev, &settings);
        assert!(
            matches!(result, Err(MptError::NoFeasibleOptimum { .. })),
            "expected NoFeasibleOptimum, got {:?}",
            result
        );
    }

    #[test]
    fn test_riskless_asset_below_rf_still_converges() {
        // A zero-variance asset under rf only drags the Sharpe ratio down.
        let ev = PortfolioEvaluator::new(
            vec![0.02, 0.10],
            vec![vec![0.0, 0.0], vec![0.0, 0.04]],
            0.05,
        )
        .unwrap();
        let result = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        assert!(result.weights[1] > 1.0 - 1e-6, "{:?}", result.weights);
        assert!((result.sharpe_ratio - 0.25).abs() < 1e-8);
    }
}
