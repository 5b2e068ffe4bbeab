use thiserror::Error;

#[derive(Debug, Error)]
pub enum MptError {
    #[error("Dimension mismatch: {context} — expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid covariance matrix: {0}")]
    InvalidCovariance(String),

    #[error("Degenerate volatility: portfolio volatility {volatility:e} is too close to zero for a Sharpe ratio")]
    DegenerateVolatility { volatility: f64 },

    #[error("No feasible optimum: solver stopped after {iterations} iterations ({reason})")]
    NoFeasibleOptimum { iterations: u32, reason: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for MptError {
    fn from(e: serde_json::Error) -> Self {
        MptError::SerializationError(e.to_string())
    }
}
