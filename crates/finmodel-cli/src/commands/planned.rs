use clap::Args;
use log::info;
use serde_json::Value;

use finmodel_core::engine::{self, PlannedIndicatorsInput};

use crate::input;

/// Arguments for the planned-indicators report
#[derive(Args)]
pub struct PlannedArgs {
    /// Path to a JSON input file with rows, organizations, payroll and
    /// other_expenses
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_planned(args: PlannedArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let planned_input: PlannedIndicatorsInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input file is required (or pipe JSON via stdin)".into());
    };

    let result = engine::compute_planned_indicators(&planned_input)?;
    info!(
        "planned report: {} rows, {} warnings",
        result.result.summary.row_count,
        result.warnings.len()
    );
    Ok(serde_json::to_value(result)?)
}
