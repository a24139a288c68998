use serde_json::Value;

/// Emit the result portion of the envelope as CSV on stdout.
///
/// A `rows` array becomes a proper multi-row CSV with one column per field;
/// flat results degrade to two-column field/value records.
pub fn print_csv(value: &Value) {
    let Some(result) = value.get("result") else {
        eprintln!("No result to export");
        return;
    };

    let mut writer = csv::Writer::from_writer(std::io::stdout());

    let outcome = match super::report_rows(result) {
        Some(rows) => write_array_csv(&mut writer, rows),
        None => write_object_csv(&mut writer, result),
    };

    if let Err(e) = outcome.and_then(|_| writer.flush().map_err(Into::into)) {
        eprintln!("Failed to write CSV: {e}");
    }
}

fn write_array_csv(
    writer: &mut csv::Writer<std::io::Stdout>,
    rows: &[Value],
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return Ok(());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    writer.write_record(&columns)?;

    for row in rows {
        let Some(obj) = row.as_object() else { continue };
        let record: Vec<String> = columns
            .iter()
            .map(|c| obj.get(c).map(csv_value).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    Ok(())
}

fn write_object_csv(
    writer: &mut csv::Writer<std::io::Stdout>,
    result: &Value,
) -> Result<(), Box<dyn std::error::Error>> {
    writer.write_record(["field", "value"])?;
    if let Some(obj) = result.as_object() {
        for (key, val) in obj {
            writer.write_record([key.as_str(), &csv_value(val)])?;
        }
    } else {
        writer.write_record(["result", &csv_value(result)])?;
    }
    Ok(())
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
