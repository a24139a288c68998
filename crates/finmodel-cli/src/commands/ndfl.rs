use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use finmodel_core::ndfl::{self, NdflInput};

use crate::input;

/// Arguments for the progressive НДФЛ calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct NdflArgs {
    /// Cumulative annual taxable base
    #[arg(long)]
    pub base: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_ndfl(args: NdflArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ndfl_input: NdflInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        NdflInput {
            cumulative_base: args.base.ok_or("--base is required (or provide --input)")?,
        }
    };

    let result = ndfl::compute_ndfl(&ndfl_input)?;
    Ok(serde_json::to_value(result)?)
}
