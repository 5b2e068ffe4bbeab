mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::allocation::{EvaluateArgs, FrontierArgs, OptimizeArgs};
use commands::statistics::AnnualizeArgs;

/// Mean-variance portfolio optimization
#[derive(Parser)]
#[command(
    name = "mpt",
    version,
    about = "Sharpe-ratio portfolio optimization and efficient frontier sampling",
    long_about = "A CLI for long-only, fully-invested mean-variance allocation. \
                  Finds the max-Sharpe weights under the simplex constraint, samples \
                  the efficient frontier by Monte Carlo, evaluates given weights, and \
                  annualises price tables into return statistics."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the max-Sharpe allocation and sample the frontier
    Optimize(OptimizeArgs),
    /// Monte Carlo sample the efficient frontier only
    Frontier(FrontierArgs),
    /// Return, volatility and Sharpe ratio of given weights
    Evaluate(EvaluateArgs),
    /// Annualise a price table into expected returns and covariance
    Annualize(AnnualizeArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "mpt_core=debug,mpt_cli=debug"
    } else {
        "mpt_core=warn,mpt_cli=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::allocation::run_optimize(args),
        Commands::Frontier(args) => commands::allocation::run_frontier(args),
        Commands::Evaluate(args) => commands::allocation::run_evaluate(args),
        Commands::Annualize(args) => commands::statistics::run_annualize(args),
        Commands::Version => {
            println!("mpt {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
