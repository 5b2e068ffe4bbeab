use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::MptError;
use crate::types::{with_metadata, AssetSet, ComputationOutput};
use crate::MptResult;

/// Fewer return observations than this produce a warning.
const SHORT_WINDOW_WARNING: usize = 30;

/// Frequency of price observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl ReturnFrequency {
    /// Number of periods in a year for annualisation
    pub fn periods_per_year(&self) -> f64 {
        match self {
            ReturnFrequency::Daily => 252.0,
            ReturnFrequency::Weekly => 52.0,
            ReturnFrequency::Monthly => 12.0,
            ReturnFrequency::Quarterly => 4.0,
            ReturnFrequency::Annual => 1.0,
        }
    }
}

/// Closing prices of every ticker on one date, in `PriceHistory::tickers` order.
/// `None` (JSON `null`) marks a missing close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub prices: Vec<Option<f64>>,
}

/// A price table: one column per ticker, one row per date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub tickers: Vec<String>,
    pub observations: Vec<PriceObservation>,
}

fn default_sort_tickers() -> bool {
    true
}

/// Input for annualised return statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsInput {
    pub history: PriceHistory,
    /// First date included (inclusive).
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last date included (inclusive, unlike an exclusive download `end`).
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub frequency: ReturnFrequency,
    /// Reorder tickers alphabetically (default true).
    #[serde(default = "default_sort_tickers")]
    pub sort_tickers: bool,
}

/// Annualised expected returns and covariance, ready for the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub tickers: Vec<String>,
    pub expected_returns: Vec<f64>,
    pub covariance_matrix: Vec<Vec<f64>>,
    /// Number of log-return observations used.
    pub observations: usize,
    pub periods_per_year: f64,
}

/// Convert a price table into annualised log-return statistics.
///
/// Log returns `ln(p_t / p_{t-1})` are averaged and scaled by the periods per
/// year; the sample covariance (n - 1 divisor) is scaled the same way. A
/// missing close drops every return row that touches it (both the return
/// into and out of that date), never bridging the gap with a multi-period
/// return.
pub fn annualize_prices(
    input: &StatisticsInput,
) -> MptResult<ComputationOutput<ReturnStatistics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let assets = AssetSet::new(input.history.tickers.clone())?;
    let n = assets.len();

    if let (Some(from), Some(to)) = (input.start_date, input.end_date) {
        if from > to {
            return Err(MptError::DateError(format!(
                "start_date {} is after end_date {}",
                from, to
            )));
        }
    }

    let mut rows: Vec<&PriceObservation> = input
        .history
        .observations
        .iter()
        .filter(|o| input.start_date.map_or(true, |d| o.date >= d))
        .filter(|o| input.end_date.map_or(true, |d| o.date <= d))
        .collect();
    rows.sort_by_key(|o| o.date);

    for pair in rows.windows(2) {
        if pair[0].date == pair[1].date {
            return Err(MptError::DateError(format!(
                "Duplicate observation for {}",
                pair[0].date
            )));
        }
    }
    for row in &rows {
        validate_row(row, n)?;
    }
    if rows.len() < 3 {
        return Err(MptError::InsufficientData(format!(
            "At least 3 price observations required in the window, got {}",
            rows.len()
        )));
    }

    let order: Vec<usize> = if input.sort_tickers {
        let mut idx: Vec<usize> = (0..n).collect();
        idx.sort_by(|a, b| assets.names()[*a].cmp(&assets.names()[*b]));
        idx
    } else {
        (0..n).collect()
    };

    let prices: Vec<Vec<Option<f64>>> = rows
        .iter()
        .map(|o| order.iter().map(|&i| o.prices[i]).collect())
        .collect();
    let returns = complete_log_returns(&prices);

    let dropped = prices.len() - 1 - returns.len();
    if dropped > 0 {
        warnings.push(format!(
            "{} return observations dropped around missing prices",
            dropped
        ));
    }
    if returns.len() < 2 {
        return Err(MptError::InsufficientData(format!(
            "At least 2 complete return observations required, got {}",
            returns.len()
        )));
    }

    let periods = input.frequency.periods_per_year();
    let expected_returns: Vec<f64> = column_means(&returns).iter().map(|m| m * periods).collect();
    let covariance_matrix: Vec<Vec<f64>> = sample_covariance(&returns)
        .into_iter()
        .map(|row| row.into_iter().map(|c| c * periods).collect())
        .collect();

    if returns.len() < SHORT_WINDOW_WARNING {
        warnings.push(format!(
            "Short estimation window: {} return observations",
            returns.len()
        ));
    }

    let output = ReturnStatistics {
        tickers: order.iter().map(|&i| assets.names()[i].clone()).collect(),
        expected_returns,
        covariance_matrix,
        observations: returns.len(),
        periods_per_year: periods,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annualised log-return mean and sample covariance",
        &serde_json::json!({
            "frequency": input.frequency,
            "periods_per_year": periods,
            "start_date": rows.first().map(|o| o.date),
            "end_date": rows.last().map(|o| o.date),
            "sorted_tickers": input.sort_tickers,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Period-over-period log returns; one row fewer than `prices`.
pub fn log_returns(prices: &[Vec<f64>]) -> Vec<Vec<f64>> {
    prices
        .windows(2)
        .map(|pair| {
            pair[1]
                .iter()
                .zip(pair[0].iter())
                .map(|(curr, prev)| curr.ln() - prev.ln())
                .collect()
        })
        .collect()
}

/// Log returns over consecutive rows where both rows have every price.
fn complete_log_returns(prices: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    prices
        .windows(2)
        .filter_map(|pair| {
            pair[1]
                .iter()
                .zip(pair[0].iter())
                .map(|(curr, prev)| Some(curr.as_ref()?.ln() - prev.as_ref()?.ln()))
                .collect::<Option<Vec<f64>>>()
        })
        .collect()
}

fn validate_row(row: &PriceObservation, n: usize) -> MptResult<()> {
    if row.prices.len() != n {
        return Err(MptError::DimensionMismatch {
            context: format!("prices on {}", row.date),
            expected: n,
            actual: row.prices.len(),
        });
    }
    if let Some(p) = row.prices.iter().flatten().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(MptError::InvalidInput {
            field: format!("prices on {}", row.date),
            reason: format!("Prices must be positive and finite, got {}", p),
        });
    }
    Ok(())
}

fn column_means(rows: &[Vec<f64>]) -> Vec<f64> {
    let n = rows.first().map_or(0, |r| r.len());
    let count = rows.len() as f64;
    (0..n)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / count)
        .collect()
}

#[allow(clippy::needless_range_loop)]
fn sample_covariance(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let means = column_means(rows);
    let n = means.len();
    let denom = (rows.len() - 1) as f64;
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = rows
                .iter()
                .map(|r| (r[i] - means[i]) * (r[j] - means[j]))
                .sum::<f64>()
                / denom;
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}
