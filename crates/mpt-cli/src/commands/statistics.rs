use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde_json::Value;

use mpt_core::statistics::returns::{self, ReturnFrequency, StatisticsInput};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl From<FrequencyArg> for ReturnFrequency {
    fn from(f: FrequencyArg) -> Self {
        match f {
            FrequencyArg::Daily => ReturnFrequency::Daily,
            FrequencyArg::Weekly => ReturnFrequency::Weekly,
            FrequencyArg::Monthly => ReturnFrequency::Monthly,
            FrequencyArg::Quarterly => ReturnFrequency::Quarterly,
            FrequencyArg::Annual => ReturnFrequency::Annual,
        }
    }
}

#[derive(Args)]
pub struct AnnualizeArgs {
    /// Path to a JSON or YAML statistics input
    #[arg(long, conflicts_with = "prices")]
    pub input: Option<String>,

    /// Path to a CSV price table with a `date,<ticker>...` header
    #[arg(long)]
    pub prices: Option<String>,

    /// First date included (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last date included (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Observation frequency of the price table
    #[arg(long)]
    pub frequency: Option<FrequencyArg>,

    /// Keep tickers in column order instead of sorting alphabetically
    #[arg(long)]
    pub no_sort: bool,
}

pub fn run_annualize(args: AnnualizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut stats_input: StatisticsInput = if let Some(ref path) = args.prices {
        StatisticsInput {
            history: input::file::read_price_csv(path)?,
            start_date: None,
            end_date: None,
            frequency: ReturnFrequency::default(),
            sort_tickers: true,
        }
    } else if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(parsed) = input::stdin::read_stdin()? {
        parsed
    } else {
        return Err("--prices <file.csv>, --input <file.json> or stdin required for annualize".into());
    };

    if args.start_date.is_some() {
        stats_input.start_date = args.start_date;
    }
    if args.end_date.is_some() {
        stats_input.end_date = args.end_date;
    }
    if let Some(f) = args.frequency {
        stats_input.frequency = f.into();
    }
    if args.no_sort {
        stats_input.sort_tickers = false;
    }

    let result = returns::annualize_prices(&stats_input)?;
    Ok(serde_json::to_value(result)?)
}
