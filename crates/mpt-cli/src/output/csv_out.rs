use serde_json::{Map, Value};
use std::io::{self, Write};

use super::result_of;

/// Result arrays written as rows, in order of preference.
const ROW_KEYS: [&str; 3] = ["samples", "frontier", "allocation"];

/// Write output as CSV to stdout.
///
/// Frontier samples (or the allocation) become one row per entry with each
/// weight in its own column; return statistics become a labelled covariance
/// grid; anything else is written as field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let _ = write_csv(stdout.lock(), value);
}

fn write_csv<W: Write>(out: W, value: &Value) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

    match result_of(value) {
        Value::Object(result) => {
            if let Some(rows) = ROW_KEYS
                .iter()
                .find_map(|k| result.get(*k).and_then(Value::as_array))
            {
                write_rows(&mut wtr, rows)?;
            } else if let (Some(Value::Array(tickers)), Some(Value::Array(matrix))) =
                (result.get("tickers"), result.get("covariance_matrix"))
            {
                write_statistics(&mut wtr, result, tickers, matrix)?;
            } else {
                wtr.write_record(["field", "value"])?;
                for (key, val) in result {
                    wtr.write_record([key.as_str(), &format_csv_value(val)])?;
                }
            }
        }
        Value::Array(arr) => write_rows(&mut wtr, arr)?,
        other => wtr.write_record([&format_csv_value(other)])?,
    }

    wtr.flush()?;
    Ok(())
}

fn write_rows<W: Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> Result<(), csv::Error> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([&format_csv_value(item)])?;
        }
        return Ok(());
    };

    let scalar_keys: Vec<&str> = first
        .iter()
        .filter(|(_, v)| !v.is_array())
        .map(|(k, _)| k.as_str())
        .collect();
    let weight_count = first
        .get("weights")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    let mut header: Vec<String> = scalar_keys.iter().map(|k| k.to_string()).collect();
    header.extend((0..weight_count).map(|i| format!("w{}", i)));
    wtr.write_record(&header)?;

    for item in rows {
        if let Value::Object(map) = item {
            let mut record: Vec<String> = scalar_keys
                .iter()
                .map(|k| map.get(*k).map(format_csv_value).unwrap_or_default())
                .collect();
            if let Some(Value::Array(weights)) = map.get("weights") {
                record.extend(weights.iter().map(format_csv_value));
            }
            wtr.write_record(&record)?;
        }
    }
    Ok(())
}

fn write_statistics<W: Write>(
    wtr: &mut csv::Writer<W>,
    result: &Map<String, Value>,
    tickers: &[Value],
    matrix: &[Value],
) -> Result<(), csv::Error> {
    let mut header = vec!["ticker".to_string(), "expected_return".to_string()];
    header.extend(tickers.iter().map(format_csv_value));
    wtr.write_record(&header)?;

    let returns = result
        .get("expected_returns")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for (i, ticker) in tickers.iter().enumerate() {
        let mut record = vec![
            format_csv_value(ticker),
            returns.get(i).map(format_csv_value).unwrap_or_default(),
        ];
        if let Some(Value::Array(cells)) = matrix.get(i) {
            record.extend(cells.iter().map(format_csv_value));
        }
        wtr.write_record(&record)?;
    }
    Ok(())
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
