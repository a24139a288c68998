use serde_json::Value;
use std::io::{self, Read};

/// Reads a JSON payload piped into the process, typically a planning input
/// exported from the spreadsheet model. Returns None when stdin is an
/// interactive terminal or the pipe carries nothing.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    Ok(Some(value))
}
