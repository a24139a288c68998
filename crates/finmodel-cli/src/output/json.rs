use serde_json::Value;

/// Print the full computation envelope as pretty JSON.
pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to serialise output: {e}"),
    }
}
