use chrono::NaiveDate;
use mpt_core::statistics::returns::{PriceHistory, PriceObservation};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a JSON or YAML file (by extension) and deserialise into a typed struct.
pub fn read_input<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let is_yaml = matches!(
        canonical.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: T = if is_yaml {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    Ok(value)
}

/// Read a price table CSV with a `date,<ticker>,<ticker>...` header.
///
/// Dates are ISO `YYYY-MM-DD`. An empty cell is a missing close; the row is
/// kept so the returns on either side of it are dropped downstream.
pub fn read_price_csv(path: &str) -> Result<PriceHistory, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let mut rdr = csv::Reader::from_path(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(format!(
            "'{}' needs a date column and at least one ticker column",
            canonical.display()
        )
        .into());
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut observations = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_date = record.get(0).unwrap_or_default().trim();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| format!("Row {}: invalid date '{}': {}", line + 2, raw_date, e))?;

        let prices = record
            .iter()
            .skip(1)
            .map(|c| c.trim())
            .map(|c| if c.is_empty() { Ok(None) } else { c.parse::<f64>().map(Some) })
            .collect::<Result<Vec<Option<f64>>, _>>()
            .map_err(|e| format!("Row {}: invalid price: {}", line + 2, e))?;

        observations.push(PriceObservation { date, prices });
    }

    Ok(PriceHistory {
        tickers,
        observations,
    })
}

/// Resolve and validate the path, preventing directory traversal.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    // Basic existence check
    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
