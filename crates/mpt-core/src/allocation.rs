use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::MptError;
use crate::frontier::{self, FrontierSample, MonteCarloSettings, SampledFrontier};
use crate::portfolio::{self, OptimizationResult, OptimizerSettings, PortfolioEvaluator, PortfolioMetrics};
use crate::types::{with_metadata, AssetSet, ComputationOutput, Rate, Weights};
use crate::MptResult;

/// Monte Carlo best may exceed the optimizer by at most this much before
/// it is reported as a warning.
const DOMINANCE_TOLERANCE: f64 = 1e-9;
const CONCENTRATION_WARNING: f64 = 0.40;
const HHI_WARNING: f64 = 0.5;
const VOLATILITY_WARNING: f64 = 0.30;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluation context plus the two search procedures over it.
#[derive(Debug, Clone)]
pub struct PortfolioOptimizer {
    evaluator: PortfolioEvaluator,
}

/// Result of one combined optimizer + Monte Carlo run.
#[derive(Debug, Clone)]
pub struct AllocationRun {
    pub optimum: OptimizationResult,
    pub frontier: SampledFrontier,
}

impl PortfolioOptimizer {
    /// Fails with `DimensionMismatch` when `covariance` is not N x N for
    /// N = `returns.len()`, and `InvalidCovariance` when it is not symmetric.
    pub fn new(returns: Vec<f64>, covariance: Vec<Vec<f64>>, risk_free_rate: Rate) -> MptResult<Self> {
        Ok(Self {
            evaluator: PortfolioEvaluator::new(returns, covariance, risk_free_rate)?,
        })
    }

    pub fn evaluator(&self) -> &PortfolioEvaluator {
        &self.evaluator
    }

    pub fn maximize_sharpe(&self, settings: &OptimizerSettings) -> MptResult<OptimizationResult> {
        portfolio::maximize_sharpe(&self.evaluator, settings)
    }

    pub fn sample_frontier(&self, settings: &MonteCarloSettings) -> MptResult<SampledFrontier> {
        frontier::sample_frontier(&self.evaluator, settings)
    }

    /// Constrained max-Sharpe search plus `sample_count` Monte Carlo samples,
    /// with default solver settings and an entropy-seeded sampler. The
    /// frontier carries `best_index`, the max-Sharpe sample.
    pub fn find_optimal_allocation(
        &self,
        sample_count: u32,
    ) -> MptResult<(OptimizationResult, SampledFrontier)> {
        let run = self.find_optimal_allocation_with(
            &OptimizerSettings::default(),
            &MonteCarloSettings {
                num_samples: sample_count,
                ..Default::default()
            },
        )?;
        Ok((run.optimum, run.frontier))
    }

    pub fn find_optimal_allocation_with(
        &self,
        optimizer: &OptimizerSettings,
        monte_carlo: &MonteCarloSettings,
    ) -> MptResult<AllocationRun> {
        let optimum = self.maximize_sharpe(optimizer)?;
        let frontier = self.sample_frontier(monte_carlo)?;

        let sampled_best = frontier.best().metrics.sharpe_ratio;
        if sampled_best > optimum.sharpe_ratio + DOMINANCE_TOLERANCE {
            warn!(
                optimizer = optimum.sharpe_ratio,
                sampled = sampled_best,
                "monte carlo sample beat the constrained optimum"
            );
        }
        info!(
            sharpe = optimum.sharpe_ratio,
            iterations = optimum.iterations,
            samples = frontier.len(),
            "allocation search finished"
        );

        Ok(AllocationRun { optimum, frontier })
    }
}

// ---------------------------------------------------------------------------
// Serializable envelope
// ---------------------------------------------------------------------------

fn default_risk_free_rate() -> Rate {
    0.03
}

/// Input to a full allocation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    /// Asset identifiers; order fixes the index convention.
    pub asset_names: AssetSet,
    /// Annualized expected returns per asset.
    pub expected_returns: Vec<f64>,
    /// N x N annualized covariance matrix.
    pub covariance_matrix: Vec<Vec<f64>>,
    /// Annual risk-free rate (default 3%).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub monte_carlo: MonteCarloSettings,
}

/// A single asset weight with risk/return contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetWeight {
    pub name: String,
    pub weight: f64,
    /// Weight times expected return.
    pub contribution_to_return: f64,
    /// Marginal risk contribution times weight.
    pub contribution_to_risk: f64,
}

/// Output of a full allocation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutput {
    /// Sharpe-maximising weights, unrounded.
    pub allocation: Vec<AssetWeight>,
    pub portfolio_return: f64,
    pub portfolio_volatility: f64,
    pub sharpe_ratio: f64,
    pub iterations: u32,
    /// Highest-Sharpe Monte Carlo sample.
    pub monte_carlo_best: FrontierSample,
    /// All Monte Carlo samples.
    pub frontier: Vec<FrontierSample>,
    /// Weighted average vol / portfolio vol.
    pub diversification_ratio: f64,
    /// Herfindahl-Hirschman index of weights.
    pub hhi_concentration: f64,
}

/// Output of a Monte-Carlo-only run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierOutput {
    pub best_index: usize,
    pub best: FrontierSample,
    pub samples: Vec<FrontierSample>,
}

/// Input for evaluating caller-supplied weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub asset_names: AssetSet,
    pub expected_returns: Vec<f64>,
    pub covariance_matrix: Vec<Vec<f64>>,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    pub weights: Weights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutput {
    #[serde(flatten)]
    pub metrics: PortfolioMetrics,
    pub allocation: Vec<AssetWeight>,
}

/// Run the constrained optimizer and the Monte Carlo sampler on `input`.
pub fn optimize_allocation(
    input: &AllocationInput,
) -> MptResult<ComputationOutput<AllocationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let optimizer = build_optimizer(
        &input.asset_names,
        &input.expected_returns,
        &input.covariance_matrix,
        input.risk_free_rate,
    )?;
    let run = optimizer.find_optimal_allocation_with(&input.optimizer, &input.monte_carlo)?;
    let evaluator = optimizer.evaluator();
    let weights = &run.optimum.weights;

    let allocation = asset_weights(evaluator, &input.asset_names, weights)?;

    let individual_vols = evaluator.asset_volatilities()?;
    let weighted_avg_vol: f64 = weights
        .iter()
        .zip(individual_vols.iter())
        .map(|(w, v)| w * v)
        .sum();
    let diversification_ratio = weighted_avg_vol / run.optimum.volatility;
    let hhi_concentration: f64 = weights.iter().map(|w| w * w).sum();

    let best = run.frontier.best().clone();
    if best.metrics.sharpe_ratio > run.optimum.sharpe_ratio + DOMINANCE_TOLERANCE {
        warnings.push(format!(
            "Monte Carlo sample Sharpe {:.6} exceeds optimizer Sharpe {:.6}",
            best.metrics.sharpe_ratio, run.optimum.sharpe_ratio
        ));
    }
    for aw in &allocation {
        if aw.weight > CONCENTRATION_WARNING {
            warnings.push(format!(
                "Concentrated position: {} has weight {:.4}",
                aw.name, aw.weight
            ));
        }
    }
    if hhi_concentration > HHI_WARNING {
        warnings.push(format!("High concentration: HHI = {:.4}", hhi_concentration));
    }
    if run.optimum.volatility > VOLATILITY_WARNING {
        warnings.push(format!(
            "High portfolio volatility: {:.4}",
            run.optimum.volatility
        ));
    }

    let output = AllocationOutput {
        allocation,
        portfolio_return: run.optimum.expected_return,
        portfolio_volatility: run.optimum.volatility,
        sharpe_ratio: run.optimum.sharpe_ratio,
        iterations: run.optimum.iterations,
        monte_carlo_best: best,
        frontier: run.frontier.samples,
        diversification_ratio,
        hhi_concentration,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Max-Sharpe Mean-Variance Optimization (projected gradient) with Monte Carlo frontier",
        &serde_json::json!({
            "n_assets": input.asset_names.len(),
            "risk_free_rate": input.risk_free_rate,
            "long_only": true,
            "fully_invested": true,
            "gradient": input.optimizer.gradient,
            "num_samples": input.monte_carlo.num_samples,
            "seed": input.monte_carlo.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Sample the frontier only, without running the optimizer.
pub fn simulate_frontier(input: &AllocationInput) -> MptResult<ComputationOutput<FrontierOutput>> {
    let start = Instant::now();

    let optimizer = build_optimizer(
        &input.asset_names,
        &input.expected_returns,
        &input.covariance_matrix,
        input.risk_free_rate,
    )?;
    let frontier = optimizer.sample_frontier(&input.monte_carlo)?;

    let output = FrontierOutput {
        best_index: frontier.best_index,
        best: frontier.best().clone(),
        samples: frontier.samples,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo Efficient Frontier Sampling",
        &serde_json::json!({
            "n_assets": input.asset_names.len(),
            "risk_free_rate": input.risk_free_rate,
            "num_samples": input.monte_carlo.num_samples,
            "seed": input.monte_carlo.seed,
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

/// Return, volatility and Sharpe ratio of caller-supplied weights.
///
/// Weights are evaluated as given; they are not required to lie on the
/// simplex, but a warning is emitted when they do not.
pub fn evaluate_portfolio(input: &EvaluationInput) -> MptResult<ComputationOutput<EvaluationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let optimizer = build_optimizer(
        &input.asset_names,
        &input.expected_returns,
        &input.covariance_matrix,
        input.risk_free_rate,
    )?;
    let evaluator = optimizer.evaluator();

    let metrics = evaluator.metrics(&input.weights)?;
    let allocation = asset_weights(evaluator, &input.asset_names, &input.weights)?;

    let total: f64 = input.weights.iter().sum();
    if (total - 1.0).abs() > 1e-6 {
        warnings.push(format!("Weights sum to {:.6}, not 1", total));
    }
    if input.weights.iter().any(|w| *w < 0.0 || *w > 1.0) {
        warnings.push("Weights outside [0, 1]: not a long-only allocation".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-Variance Portfolio Metrics",
        &serde_json::json!({
            "n_assets": input.asset_names.len(),
            "risk_free_rate": input.risk_free_rate,
        }),
        warnings,
        elapsed,
        EvaluationOutput {
            metrics,
            allocation,
        },
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_optimizer(
    assets: &AssetSet,
    returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: Rate,
) -> MptResult<PortfolioOptimizer> {
    if returns.len() != assets.len() {
        return Err(MptError::DimensionMismatch {
            context: "expected_returns".into(),
            expected: assets.len(),
            actual: returns.len(),
        });
    }
    PortfolioOptimizer::new(returns.to_vec(), covariance.to_vec(), risk_free_rate)
}

fn asset_weights(
    evaluator: &PortfolioEvaluator,
    assets: &AssetSet,
    weights: &[f64],
) -> MptResult<Vec<AssetWeight>> {
    let risk = evaluator.risk_contributions(weights)?;
    Ok(assets
        .iter()
        .zip(weights.iter())
        .zip(evaluator.returns().iter())
        .zip(risk)
        .map(|(((name, w), r), rc)| AssetWeight {
            name: name.to_string(),
            weight: *w,
            contribution_to_return: w * r,
            contribution_to_risk: rc,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> AssetSet {
        AssetSet::new(v.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn two_asset_input() -> AllocationInput {
        AllocationInput {
            asset_names: names(&["A", "B"]),
            expected_returns: vec![0.10, 0.20],
            covariance_matrix: vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            risk_free_rate: 0.05,
            optimizer: OptimizerSettings::default(),
            monte_carlo: MonteCarloSettings {
                num_samples: 500,
                seed: Some(1),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_find_optimal_allocation_shapes() {
        let opt = PortfolioOptimizer::new(
            vec![0.10, 0.20],
            vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            0.05,
        )
        .unwrap();
        let (result, frontier) = opt.find_optimal_allocation(200).unwrap();
        assert_eq!(frontier.len(), 200);
        assert_eq!(result.weights.len(), 2);
        assert!(result.converged);

        let best = frontier.best();
        assert!(frontier
            .samples
            .iter()
            .all(|s| s.metrics.sharpe_ratio <= best.metrics.sharpe_ratio));
        assert!(result.sharpe_ratio >= best.metrics.sharpe_ratio - 1e-12);
    }

    #[test]
    fn test_constructor_dimension_mismatch() {
        let err = PortfolioOptimizer::new(
            vec![0.10, 0.20],
            vec![vec![0.04, 0.0, 0.0], vec![0.0, 0.09, 0.0], vec![0.0, 0.0, 0.01]],
            0.05,
        )
        .unwrap_err();
        assert!(matches!(err, MptError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_optimize_allocation_envelope() {
        let out = optimize_allocation(&two_asset_input()).unwrap();
        let res = &out.result;
        assert_eq!(res.allocation.len(), 2);
        assert_eq!(res.allocation[0].name, "A");
        assert_eq!(res.frontier.len(), 500);
        assert!(res.sharpe_ratio >= res.monte_carlo_best.metrics.sharpe_ratio - 1e-12);
        assert!(res.diversification_ratio >= 1.0);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_contributions_add_up() {
        let out = optimize_allocation(&two_asset_input()).unwrap();
        let res = &out.result;
        let ret: f64 = res.allocation.iter().map(|a| a.contribution_to_return).sum();
        let risk: f64 = res.allocation.iter().map(|a| a.contribution_to_risk).sum();
        assert!((ret - res.portfolio_return).abs() < 1e-12);
        assert!((risk - res.portfolio_volatility).abs() < 1e-12);
    }

    #[test]
    fn test_concentration_warning() {
        let out = optimize_allocation(&two_asset_input()).unwrap();
        // Optimum is ~(0.43, 0.57); both legs exceed the 40% threshold.
        assert!(out
            .warnings
            .iter()
            .any(|w| w.starts_with("Concentrated position: B")));
    }

    #[test]
    fn test_returns_length_mismatch() {
        let mut input = two_asset_input();
        input.expected_returns = vec![0.1, 0.2, 0.3];
        assert!(matches!(
            optimize_allocation(&input),
            Err(MptError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_simulate_frontier_reproducible() {
        let a = simulate_frontier(&two_asset_input()).unwrap();
        let b = simulate_frontier(&two_asset_input()).unwrap();
        assert_eq!(a.result.samples, b.result.samples);
        assert_eq!(a.result.best, a.result.samples[a.result.best_index]);
    }

    #[test]
    fn test_evaluate_portfolio_warns_off_simplex() {
        let input = EvaluationInput {
            asset_names: names(&["A", "B"]),
            expected_returns: vec![0.10, 0.20],
            covariance_matrix: vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            risk_free_rate: 0.05,
            weights: vec![0.7, 0.7],
        };
        let out = evaluate_portfolio(&input).unwrap();
        assert!(!out.warnings.is_empty());
        assert!((out.result.metrics.expected_return - 0.21).abs() < 1e-12);
    }

    #[test]
    fn test_input_defaults_from_json() {
        let input: AllocationInput = serde_json::from_str(
            r#"{
                "asset_names": ["A", "B"],
                "expected_returns": [0.1, 0.2],
                "covariance_matrix": [[0.04, 0.0], [0.0, 0.09]]
            }"#,
        )
        .unwrap();
        assert_eq!(input.risk_free_rate, 0.03);
        assert_eq!(input.monte_carlo.num_samples, 1_000);
        assert_eq!(input.optimizer.max_iterations, 10_000);
    }
}
