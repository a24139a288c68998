use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Render the computation envelope as human-readable tables.
///
/// Planned-indicator reports carry a `rows` array plus a `summary` object;
/// those get a wide per-row table followed by a summary table. Flat results
/// (VAT rate, НДФЛ) fall back to a two-column field/value layout.
pub fn print_table(value: &Value) {
    let Some(result) = value.get("result") else {
        println!("{}", "No result to display".yellow());
        return;
    };

    match super::report_rows(result) {
        Some(rows) => {
            print_array_table(rows);
            if let Some(summary) = result.get("summary").and_then(Value::as_object) {
                println!();
                println!("{}", "Summary".bold());
                print_object_table(summary);
            }
        }
        None => {
            if let Some(obj) = result.as_object() {
                print_object_table(obj);
            } else {
                println!("{}", format_value(result));
            }
        }
    }

    if let Some(warnings) = value.get("warnings").and_then(Value::as_array) {
        if !warnings.is_empty() {
            println!();
            println!("{}", "Warnings:".yellow().bold());
            for w in warnings {
                if let Some(text) = w.as_str() {
                    println!("  {} {}", "!".yellow(), text.yellow());
                }
            }
        }
    }

    if let Some(methodology) = value.get("methodology").and_then(Value::as_str) {
        println!();
        println!("{}", methodology.dimmed());
    }
}

/// Print an array of uniform JSON objects as one table, columns taken from
/// the first element's key order.
fn print_array_table(rows: &[Value]) {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return;
    };
    let columns: Vec<String> = first.keys().cloned().collect();

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(String::as_str));
    for row in rows {
        let Some(obj) = row.as_object() else { continue };
        builder.push_record(
            columns
                .iter()
                .map(|c| obj.get(c).map(format_value).unwrap_or_default()),
        );
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");
}

fn print_object_table(obj: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in obj {
        builder.push_record([key.as_str(), &format_value(val)]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "?".to_string()),
    }
}
