//! Portfolio metric evaluation and the constrained Sharpe-ratio search.

pub mod evaluator;
pub mod optimizer;

pub use evaluator::{PortfolioEvaluator, PortfolioMetrics};
pub use optimizer::{maximize_sharpe, GradientMode, OptimizationResult, OptimizerSettings};
