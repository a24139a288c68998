mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::ndfl::NdflArgs;
use commands::planned::PlannedArgs;
use commands::vat::VatRateArgs;

/// Consolidated marketplace financial-model projections
#[derive(Parser)]
#[command(
    name = "finmodel",
    version,
    about = "Planned-indicator and tax projections for multi-entity marketplace sellers",
    long_about = "A CLI for projecting the planned indicators of a multi-entity marketplace \
                  business with decimal precision. Consolidates Wildberries and Ozon \
                  storefront economics into per-organization monthly rows with VAT, УСН \
                  and ОСНО taxes under the 2025 rules."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the planned-indicators report from economics and reference sheets
    PlannedIndicators(PlannedArgs),
    /// Select the VAT rate for one month of cumulative revenue
    VatRate(VatRateArgs),
    /// Progressive НДФЛ on a cumulative annual base
    Ndfl(NdflArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::PlannedIndicators(args) => commands::planned::run_planned(args),
        Commands::VatRate(args) => commands::vat::run_vat_rate(args),
        Commands::Ndfl(args) => commands::ndfl::run_ndfl(args),
        Commands::Version => {
            println!("finmodel {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
