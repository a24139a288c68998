use serde_json::Value;

/// Fields worth printing on their own when only one value is wanted,
/// checked in order.
const PRIORITY_KEYS: &[&str] = &["rate_label", "cumulative_tax", "rate", "effective_rate"];

/// Print just the headline value for scripting use.
///
/// Planned reports collapse to a one-line summary; single-value results
/// print the first priority field found.
pub fn print_minimal(value: &Value) {
    let Some(result) = value.get("result") else {
        println!();
        return;
    };

    if let Some(summary) = result.get("summary").and_then(Value::as_object) {
        let line: Vec<String> = summary
            .iter()
            .map(|(k, v)| format!("{k}={}", scalar(v)))
            .collect();
        println!("{}", line.join(" "));
        return;
    }

    let Some(obj) = result.as_object() else {
        println!("{}", scalar(result));
        return;
    };

    for key in PRIORITY_KEYS {
        if let Some(v) = obj.get(*key) {
            if !v.is_null() {
                println!("{}", scalar(v));
                return;
            }
        }
    }

    if let Some((_, v)) = obj.iter().next() {
        println!("{}", scalar(v));
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
