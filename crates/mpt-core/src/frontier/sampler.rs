use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Uniform;
use tracing::{debug, warn};

use crate::error::MptError;
use crate::portfolio::{PortfolioEvaluator, PortfolioMetrics};
use crate::types::Weights;
use crate::MptResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Settings for Monte Carlo sampling of the weight simplex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSettings {
    /// Number of random portfolios to draw (default 1000).
    #[serde(default = "default_num_samples")]
    pub num_samples: u32,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Redraws allowed per sample when a draw has degenerate volatility.
    #[serde(default = "default_max_retries")]
    pub max_retries_per_sample: u32,
}

fn default_num_samples() -> u32 {
    1_000
}

fn default_max_retries() -> u32 {
    100
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            num_samples: default_num_samples(),
            seed: None,
            max_retries_per_sample: default_max_retries(),
        }
    }
}

/// One random feasible portfolio and its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierSample {
    #[serde(flatten)]
    pub metrics: PortfolioMetrics,
    pub weights: Weights,
}

/// All drawn samples plus the position of the best Sharpe ratio among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledFrontier {
    pub samples: Vec<FrontierSample>,
    pub best_index: usize,
}

impl SampledFrontier {
    /// The max-Sharpe sample (first one on ties).
    pub fn best(&self) -> &FrontierSample {
        &self.samples[self.best_index]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Draw `num_samples` random portfolios from the simplex and evaluate each.
///
/// Uses a seeded `StdRng` when `settings.seed` is set, entropy otherwise.
pub fn sample_frontier(
    evaluator: &PortfolioEvaluator,
    settings: &MonteCarloSettings,
) -> MptResult<SampledFrontier> {
    let mut rng = match settings.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    sample_frontier_with_rng(evaluator, settings, &mut rng)
}

/// Same as [`sample_frontier`] with a caller-owned random source.
pub fn sample_frontier_with_rng<R: Rng + ?Sized>(
    evaluator: &PortfolioEvaluator,
    settings: &MonteCarloSettings,
    rng: &mut R,
) -> MptResult<SampledFrontier> {
    if settings.num_samples == 0 {
        return Err(MptError::InvalidInput {
            field: "monte_carlo.num_samples".into(),
            reason: "Must be at least 1".into(),
        });
    }

    let uniform = Uniform::new(0.0, 1.0).map_err(|e| MptError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Uniform parameters: {e}"),
    })?;

    let n = evaluator.num_assets();
    let mut samples: Vec<FrontierSample> = Vec::with_capacity(settings.num_samples as usize);
    let mut best_index = 0usize;

    for k in 0..settings.num_samples as usize {
        let sample = draw_sample(evaluator, rng, &uniform, n, settings.max_retries_per_sample)?;
        if k > 0 && sample.metrics.sharpe_ratio > samples[best_index].metrics.sharpe_ratio {
            best_index = k;
        }
        samples.push(sample);
    }

    debug!(
        num_samples = samples.len(),
        best_index,
        best_sharpe = samples[best_index].metrics.sharpe_ratio,
        "monte carlo frontier sampled"
    );

    Ok(SampledFrontier {
        samples,
        best_index,
    })
}

/// Draw n non-negative values and normalise them onto the simplex.
/// Returns `None` for an all-zero draw.
pub fn random_simplex_weights<R: Rng + ?Sized>(
    rng: &mut R,
    uniform: &Uniform,
    n: usize,
) -> Option<Weights> {
    let mut weights: Vec<f64> = (0..n).map(|_| rng.sample(uniform)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    Some(weights)
}

// ---------------------------------------------------------------------------
// Sampling internals
// ---------------------------------------------------------------------------

fn draw_sample<R: Rng + ?Sized>(
    evaluator: &PortfolioEvaluator,
    rng: &mut R,
    uniform: &Uniform,
    n: usize,
    max_retries: u32,
) -> MptResult<FrontierSample> {
    let mut last_volatility = 0.0;

    for attempt in 0..=max_retries {
        let Some(weights) = random_simplex_weights(rng, uniform, n) else {
            continue;
        };
        match evaluator.metrics(&weights) {
            Ok(metrics) => return Ok(FrontierSample { metrics, weights }),
            Err(MptError::DegenerateVolatility { volatility }) => {
                debug!(attempt, volatility, "discarding degenerate monte carlo draw");
                last_volatility = volatility;
            }
            Err(e) => return Err(e),
        }
    }

    warn!(max_retries, "monte carlo draw stayed degenerate after all retries");
    Err(MptError::DegenerateVolatility {
        volatility: last_volatility,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{maximize_sharpe, OptimizerSettings};
    use rand::rngs::mock::StepRng;

    fn three_asset() -> PortfolioEvaluator {
        let (v1, v2, v3) = (0.15, 0.20, 0.25);
        let c12 = 0.3 * v1 * v2;
        let c13 = 0.1 * v1 * v3;
        let c23 = 0.5 * v2 * v3;
        PortfolioEvaluator::new(
            vec![0.10, 0.04, 0.07],
            vec![
                vec![v1 * v1, c12, c13],
                vec![c12, v2 * v2, c23],
                vec![c13, c23, v3 * v3],
            ],
            0.02,
        )
        .unwrap()
    }

    fn seeded(num_samples: u32, seed: u64) -> MonteCarloSettings {
        MonteCarloSettings {
            num_samples,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_sample_count() {
        let frontier = sample_frontier(&three_asset(), &seeded(250, 7)).unwrap();
        assert_eq!(frontier.len(), 250);
    }

    #[test]
    fn test_samples_lie_on_simplex() {
        let frontier = sample_frontier(&three_asset(), &seeded(500, 11)).unwrap();
        for s in &frontier.samples {
            let sum: f64 = s.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
            assert!(s.weights.iter().all(|w| (0.0..=1.0).contains(w)));
        }
    }

    #[test]
    fn test_sample_metrics_match_evaluator() {
        let ev = three_asset();
        let frontier = sample_frontier(&ev, &seeded(50, 3)).unwrap();
        for s in &frontier.samples {
            assert_eq!(s.metrics, ev.metrics(&s.weights).unwrap());
        }
    }

    #[test]
    fn test_best_index_is_argmax() {
        let frontier = sample_frontier(&three_asset(), &seeded(300, 42)).unwrap();
        let max = frontier
            .samples
            .iter()
            .map(|s| s.metrics.sharpe_ratio)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(frontier.best().metrics.sharpe_ratio, max);
        assert_eq!(frontier.best().weights.len(), 3);
    }

    #[test]
    fn test_same_seed_same_frontier() {
        let ev = three_asset();
        let a = sample_frontier(&ev, &seeded(100, 99)).unwrap();
        let b = sample_frontier(&ev, &seeded(100, 99)).unwrap();
        assert_eq!(a.samples, b.samples);
        assert_eq!(a.best_index, b.best_index);
    }

    #[test]
    fn test_different_seed_different_frontier() {
        let ev = three_asset();
        let a = sample_frontier(&ev, &seeded(20, 1)).unwrap();
        let b = sample_frontier(&ev, &seeded(20, 2)).unwrap();
        assert_ne!(a.samples, b.samples);
    }

    #[test]
    fn test_optimizer_dominates_samples() {
        let ev = three_asset();
        let optimum = maximize_sharpe(&ev, &OptimizerSettings::default()).unwrap();
        let frontier = sample_frontier(&ev, &seeded(2_000, 2024)).unwrap();
        assert!(
            optimum.sharpe_ratio >= frontier.best().metrics.sharpe_ratio - 1e-12,
            "optimizer {} < sampled {}",
            optimum.sharpe_ratio,
            frontier.best().metrics.sharpe_ratio
        );
    }

    #[test]
    fn test_zero_samples_rejected() {
        let err = sample_frontier(&three_asset(), &seeded(0, 1)).unwrap_err();
        assert!(matches!(err, MptError::InvalidInput { .. }));
    }

    #[test]
    fn test_all_degenerate_fails_after_retries() {
        let ev = PortfolioEvaluator::new(
            vec![0.05, 0.07],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
            0.02,
        )
        .unwrap();
        let settings = MonteCarloSettings {
            num_samples: 10,
            seed: Some(5),
            max_retries_per_sample: 3,
        };
        let err = sample_frontier(&ev, &settings).unwrap_err();
        assert!(matches!(err, MptError::DegenerateVolatility { .. }));
    }

    #[test]
    fn test_degenerate_draw_is_redrawn() {
        // Asset 0 is riskless, so any draw that puts nothing on asset 1 is
        // degenerate. StepRng yields 2^61, 0, -2^61, ... : the first draw is
        // (x, 0) and so is the draw for the fourth sample.
        let ev = PortfolioEvaluator::new(
            vec![0.03, 0.08],
            vec![vec![0.0, 0.0], vec![0.0, 0.04]],
            0.02,
        )
        .unwrap();
        let settings = MonteCarloSettings {
            num_samples: 4,
            seed: None,
            max_retries_per_sample: 1,
        };
        let step = 1u64 << 61;
        let mut rng = StepRng::new(step, step.wrapping_neg());

        let frontier = sample_frontier_with_rng(&ev, &settings, &mut rng).unwrap();
        assert_eq!(frontier.len(), 4);
        for s in &frontier.samples {
            assert!(s.metrics.volatility > 0.0, "{:?}", s);
            assert!(s.weights[1] > 0.0);
        }
    }

    #[test]
    fn test_random_weights_normalised() {
        let mut rng = StdRng::seed_from_u64(17);
        let uniform = Uniform::new(0.0, 1.0).unwrap();
        let w = random_simplex_weights(&mut rng, &uniform, 5).unwrap();
        assert_eq!(w.len(), 5);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_settings_defaults_from_empty_json() {
        let s: MonteCarloSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.num_samples, 1_000);
        assert_eq!(s.max_retries_per_sample, 100);
        assert!(s.seed.is_none());
    }
}
