use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use mpt_core::allocation::{self, AllocationInput, EvaluationInput};

use crate::input;

#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a JSON or YAML allocation input (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Number of Monte Carlo frontier samples
    #[arg(long)]
    pub samples: Option<u32>,

    /// Seed for reproducible frontier sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Annual risk-free rate as a decimal (0.03 = 3%)
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,
}

#[derive(Args)]
pub struct FrontierArgs {
    /// Path to a JSON or YAML allocation input (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Number of Monte Carlo frontier samples
    #[arg(long)]
    pub samples: Option<u32>,

    /// Seed for reproducible frontier sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Annual risk-free rate as a decimal (0.03 = 3%)
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to a JSON or YAML evaluation input (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alloc_input: AllocationInput = load(args.input.as_deref(), "allocation optimization")?;
    apply_overrides(&mut alloc_input, args.samples, args.seed, args.risk_free_rate);
    debug!(
        assets = alloc_input.asset_names.len(),
        samples = alloc_input.monte_carlo.num_samples,
        "running optimize"
    );
    let result = allocation::optimize_allocation(&alloc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(args: FrontierArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alloc_input: AllocationInput = load(args.input.as_deref(), "frontier sampling")?;
    apply_overrides(&mut alloc_input, args.samples, args.seed, args.risk_free_rate);
    let result = allocation::simulate_frontier(&alloc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let eval_input: EvaluationInput = load(args.input.as_deref(), "portfolio evaluation")?;
    let result = allocation::evaluate_portfolio(&eval_input)?;
    Ok(serde_json::to_value(result)?)
}

fn load<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_input(path)
    } else if let Some(parsed) = input::stdin::read_stdin()? {
        Ok(parsed)
    } else {
        Err(format!("--input <file.json|file.yaml> or stdin required for {}", what).into())
    }
}

fn apply_overrides(
    alloc_input: &mut AllocationInput,
    samples: Option<u32>,
    seed: Option<u64>,
    risk_free_rate: Option<f64>,
) {
    if let Some(n) = samples {
        alloc_input.monte_carlo.num_samples = n;
    }
    if seed.is_some() {
        alloc_input.monte_carlo.seed = seed;
    }
    if let Some(rf) = risk_free_rate {
        alloc_input.risk_free_rate = rf;
    }
}
