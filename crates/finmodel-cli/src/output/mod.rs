pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch the computation envelope to the selected formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Monthly rows of a planned-indicators report, when present and non-empty.
/// Flat results (VAT rate, НДФЛ) have no `rows` key and return `None`.
fn report_rows(result: &Value) -> Option<&Vec<Value>> {
    result
        .get("rows")
        .and_then(Value::as_array)
        .filter(|rows| !rows.is_empty())
}
