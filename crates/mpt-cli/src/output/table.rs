use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::result_of;

/// Arrays longer than this are summarised by their length.
const MAX_INLINE_ITEMS: usize = 12;

/// Render a computation envelope as tables using the tabled crate.
///
/// Scalar result fields go in a Field/Value table. The allocation is shown
/// as percentages, and a covariance matrix gets its own ticker-labelled grid.
pub fn print_table(value: &Value) {
    match result_of(value) {
        Value::Object(res_map) => {
            print_fields(res_map);
            if let Some(Value::Array(rows)) = res_map.get("allocation") {
                println!();
                print_allocation(rows);
            }
            if let (Some(Value::Array(tickers)), Some(Value::Array(matrix))) =
                (res_map.get("tickers"), res_map.get("covariance_matrix"))
            {
                println!();
                print_matrix(tickers, matrix);
            }
        }
        other => println!("{}", format_value(other)),
    }

    if let Value::Object(envelope) = value {
        print_notes(envelope);
    }
}

fn print_fields(res_map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in res_map {
        if key == "allocation" || key == "covariance_matrix" {
            continue;
        }
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_allocation(rows: &[Value]) {
    let mut builder = Builder::default();
    builder.push_record(["Asset", "Weight", "Return contribution", "Risk contribution"]);
    for row in rows {
        let name = row.get("name").and_then(Value::as_str).unwrap_or_default();
        let field = |key: &str| row.get(key).and_then(Value::as_f64);
        builder.push_record([
            name.to_string(),
            percent(field("weight")),
            rounded(field("contribution_to_return"), 6),
            rounded(field("contribution_to_risk"), 6),
        ]);
    }
    println!("{}", Table::from(builder));
}

fn print_matrix(tickers: &[Value], matrix: &[Value]) {
    let labels: Vec<String> = tickers.iter().map(format_value).collect();

    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(labels.iter().cloned());
    builder.push_record(header);

    for (label, row) in labels.iter().zip(matrix) {
        let mut record = vec![label.clone()];
        if let Value::Array(cells) = row {
            record.extend(cells.iter().map(|c| rounded(c.as_f64(), 6)));
        }
        builder.push_record(record);
    }
    println!("Covariance (annualised)");
    println!("{}", Table::from(builder));
}

fn print_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Format a fraction as a percentage rounded to two decimal places.
fn percent(value: Option<f64>) -> String {
    value
        .and_then(|v| Decimal::from_f64_retain(v * 100.0))
        .map(|d| format!("{:.2}%", d.round_dp(2)))
        .unwrap_or_default()
}

fn rounded(value: Option<f64>, dp: u32) -> String {
    value
        .and_then(Decimal::from_f64_retain)
        .map(|d| d.round_dp(dp).normalize().to_string())
        .unwrap_or_default()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) if arr.len() > MAX_INLINE_ITEMS => format!("[{} items]", arr.len()),
        Value::Array(arr) if arr.iter().any(Value::is_object) => {
            format!("[{} items]", arr.len())
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            items.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_rounds_to_two_places() {
        assert_eq!(percent(Some(0.428571428)), "42.86%");
        assert_eq!(percent(Some(1.0)), "100.00%");
        assert_eq!(percent(None), "");
    }

    #[test]
    fn test_long_arrays_are_summarised() {
        let samples = json!(vec![json!({"sharpe_ratio": 0.1}); 40]);
        assert_eq!(format_value(&samples), "[40 items]");
        assert_eq!(format_value(&json!([0.25, 0.75])), "0.25, 0.75");
    }

    #[test]
    fn test_nested_object_is_inlined() {
        let best = json!({"sharpe_ratio": 0.5, "weights": [0.4, 0.6]});
        assert_eq!(format_value(&best), "sharpe_ratio: 0.5; weights: 0.4, 0.6");
    }
}
