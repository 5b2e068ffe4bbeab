use serde_json::Value;

use super::result_of;

/// Result fields printed by `--output minimal`, in order of priority.
const PRIORITY_KEYS: [&str; 4] = [
    "sharpe_ratio",
    "portfolio_return",
    "expected_returns",
    "best_index",
];

/// Print just the key answer value from the output.
///
/// The optimizer and evaluator report the Sharpe ratio, frontier runs fall
/// through to the best sample, and statistics print the expected returns.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_line(value));
}

fn minimal_line(value: &Value) -> String {
    let result_obj = result_of(value);

    if let Value::Object(map) = result_obj {
        // Frontier output nests the answer under "best"
        if let Some(Value::Object(best)) = map.get("best") {
            if let Some(val) = best.get("sharpe_ratio") {
                return format_minimal(val);
            }
        }

        for key in &PRIORITY_KEYS {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    return format_minimal(val);
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }

    format_minimal(result_obj)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
