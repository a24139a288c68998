use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use finmodel_core::vat::{self, VatRateInput};
use finmodel_core::TaxMode;

use crate::input;

/// Arguments for VAT rate selection
#[derive(Args)]
pub struct VatRateArgs {
    /// Cumulative gross revenue before the month
    #[arg(long)]
    pub prev_cum: Option<Decimal>,

    /// Cumulative gross revenue including the month
    #[arg(long)]
    pub curr_cum: Option<Decimal>,

    /// Tax regime: Доходы, Доходы-Расходы or ОСНО
    #[arg(long, default_value = "Доходы")]
    pub mode: String,

    /// Configured minimum rate in percent
    #[arg(long)]
    pub floor: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_vat_rate(args: VatRateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let vat_input: VatRateInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        VatRateInput {
            prev_cum_gross: args
                .prev_cum
                .ok_or("--prev-cum is required (or provide --input)")?,
            curr_cum_gross: args
                .curr_cum
                .ok_or("--curr-cum is required (or provide --input)")?,
            tax_mode: TaxMode::parse(&args.mode)?,
            configured_floor: args.floor.unwrap_or(dec!(0)),
        }
    };

    let result = vat::compute_vat_rate(&vat_input)?;
    Ok(serde_json::to_value(result)?)
}
