use serde::{Deserialize, Serialize};

use crate::error::MptError;
use crate::types::Rate;
use crate::MptResult;

/// Volatility at or below this level makes the Sharpe ratio undefined.
pub const VOLATILITY_EPSILON: f64 = 1e-12;

/// Absolute tolerance for `cov[i][j] == cov[j][i]`.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Quadratic forms in `[-VARIANCE_ROUNDING_TOLERANCE, 0)` are treated as
/// rounding noise and clamped to zero.
pub const VARIANCE_ROUNDING_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Return, risk and risk-adjusted return of one weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Fixed evaluation context: expected returns, covariance and risk-free rate.
///
/// Every operation is a pure function of the supplied weights; the context
/// itself is never mutated after construction.
#[derive(Debug, Clone)]
pub struct PortfolioEvaluator {
    returns: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    risk_free_rate: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl PortfolioEvaluator {
    /// Build an evaluator, validating that `covariance` is an N x N
    /// symmetric matrix matching the length of `returns`.
    pub fn new(returns: Vec<f64>, covariance: Vec<Vec<f64>>, risk_free_rate: Rate) -> MptResult<Self> {
        let n = returns.len();
        if n == 0 {
            return Err(MptError::InsufficientData(
                "At least one asset required".into(),
            ));
        }
        if let Some(i) = returns.iter().position(|r| !r.is_finite()) {
            return Err(MptError::InvalidInput {
                field: format!("expected_returns[{}]", i),
                reason: "Expected return must be finite".into(),
            });
        }
        if !risk_free_rate.is_finite() {
            return Err(MptError::InvalidInput {
                field: "risk_free_rate".into(),
                reason: "Risk-free rate must be finite".into(),
            });
        }
        validate_covariance_matrix(&covariance, n)?;

        Ok(Self {
            returns,
            covariance,
            risk_free_rate,
        })
    }

    pub fn num_assets(&self) -> usize {
        self.returns.len()
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    pub fn covariance(&self) -> &[Vec<f64>] {
        &self.covariance
    }

    pub fn risk_free_rate(&self) -> Rate {
        self.risk_free_rate
    }

    /// Portfolio expected return: `w . R`.
    pub fn expected_return(&self, weights: &[f64]) -> MptResult<f64> {
        self.check_dimension(weights)?;
        Ok(vec_dot(weights, &self.returns))
    }

    /// Portfolio variance: `w' Sigma w`, unclamped.
    pub fn variance(&self, weights: &[f64]) -> MptResult<f64> {
        self.check_dimension(weights)?;
        Ok(quadratic_form(&self.covariance, weights))
    }

    /// Portfolio volatility: `sqrt(w' Sigma w)`.
    pub fn volatility(&self, weights: &[f64]) -> MptResult<f64> {
        let var = self.variance(weights)?;
        volatility_from_variance(var)
    }

    /// `-(E[r] - rf) / sigma`, the minimisation objective of the optimizer.
    pub fn negative_sharpe(&self, weights: &[f64]) -> MptResult<f64> {
        let ret = self.expected_return(weights)?;
        let vol = self.volatility(weights)?;
        Ok(-self.excess_over_risk(ret, vol)?)
    }

    pub fn sharpe_ratio(&self, weights: &[f64]) -> MptResult<f64> {
        Ok(-self.negative_sharpe(weights)?)
    }

    /// Return, volatility and Sharpe ratio in a single pass.
    pub fn metrics(&self, weights: &[f64]) -> MptResult<PortfolioMetrics> {
        let expected_return = self.expected_return(weights)?;
        let volatility = self.volatility(weights)?;
        let sharpe_ratio = self.excess_over_risk(expected_return, volatility)?;
        Ok(PortfolioMetrics {
            expected_return,
            volatility,
            sharpe_ratio,
        })
    }

    /// Analytic gradient of `negative_sharpe` with respect to the weights:
    /// `-R / sigma + (E[r] - rf) * (Sigma w) / sigma^3`.
    pub fn negative_sharpe_gradient(&self, weights: &[f64]) -> MptResult<Vec<f64>> {
        self.check_dimension(weights)?;
        let sigma_w = mat_vec_multiply(&self.covariance, weights);
        let vol = volatility_from_variance(vec_dot(weights, &sigma_w))?;
        if vol <= VOLATILITY_EPSILON {
            return Err(MptError::DegenerateVolatility { volatility: vol });
        }
        let excess = vec_dot(weights, &self.returns) - self.risk_free_rate;
        let vol_cubed = vol * vol * vol;

        Ok(self
            .returns
            .iter()
            .zip(sigma_w.iter())
            .map(|(r, sw)| -r / vol + excess * sw / vol_cubed)
            .collect())
    }

    /// Per-asset contribution to volatility: `w_i * (Sigma w)_i / sigma`.
    /// Contributions sum to the portfolio volatility.
    pub fn risk_contributions(&self, weights: &[f64]) -> MptResult<Vec<f64>> {
        self.check_dimension(weights)?;
        let sigma_w = mat_vec_multiply(&self.covariance, weights);
        let vol = volatility_from_variance(vec_dot(weights, &sigma_w))?;
        if vol <= VOLATILITY_EPSILON {
            return Ok(vec![0.0; weights.len()]);
        }
        Ok(weights
            .iter()
            .zip(sigma_w.iter())
            .map(|(w, sw)| w * sw / vol)
            .collect())
    }

    /// Stand-alone volatility of each asset: `sqrt(Sigma_ii)`.
    pub fn asset_volatilities(&self) -> MptResult<Vec<f64>> {
        self.covariance
            .iter()
            .enumerate()
            .map(|(i, row)| {
                volatility_from_variance(row[i]).map_err(|_| {
                    MptError::InvalidCovariance(format!(
                        "Negative variance {} on diagonal entry [{},{}]",
                        row[i], i, i
                    ))
                })
            })
            .collect()
    }

    fn excess_over_risk(&self, ret: f64, vol: f64) -> MptResult<f64> {
        if vol <= VOLATILITY_EPSILON {
            return Err(MptError::DegenerateVolatility { volatility: vol });
        }
        Ok((ret - self.risk_free_rate) / vol)
    }

    fn check_dimension(&self, weights: &[f64]) -> MptResult<()> {
        if weights.len() != self.returns.len() {
            return Err(MptError::DimensionMismatch {
                context: "weight vector".into(),
                expected: self.returns.len(),
                actual: weights.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_covariance_matrix(cov: &[Vec<f64>], n: usize) -> MptResult<()> {
    if cov.len() != n {
        return Err(MptError::DimensionMismatch {
            context: "covariance matrix rows".into(),
            expected: n,
            actual: cov.len(),
        });
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(MptError::DimensionMismatch {
                context: format!("covariance matrix row {}", i),
                expected: n,
                actual: row.len(),
            });
        }
        if let Some(j) = row.iter().position(|v| !v.is_finite()) {
            return Err(MptError::InvalidCovariance(format!(
                "Non-finite entry at [{},{}]",
                i, j
            )));
        }
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if (cov[i][j] - cov[j][i]).abs() > SYMMETRY_TOLERANCE {
                return Err(MptError::InvalidCovariance(format!(
                    "Not symmetric: [{},{}]={} != [{},{}]={}",
                    i, j, cov[i][j], j, i, cov[j][i]
                )));
            }
        }
    }
    Ok(())
}

fn volatility_from_variance(var: f64) -> MptResult<f64> {
    if !var.is_finite() {
        return Err(MptError::InvalidCovariance(format!(
            "Quadratic form w'Sigma w is not finite ({})",
            var
        )));
    }
    if var < -VARIANCE_ROUNDING_TOLERANCE {
        return Err(MptError::InvalidCovariance(format!(
            "Negative quadratic form w'Sigma w = {:e}; matrix is not positive semi-definite",
            var
        )));
    }
    Ok(var.max(0.0).sqrt())
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

/// Matrix-vector multiplication.
pub(crate) fn mat_vec_multiply(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// Dot product.
pub(crate) fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn quadratic_form(mat: &[Vec<f64>], v: &[f64]) -> f64 {
    vec_dot(v, &mat_vec_multiply(mat, v))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
