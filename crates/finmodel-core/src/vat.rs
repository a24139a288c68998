//! VAT rate selection under the 2025 rules for simplified-regime payers.
//!
//! Simplified-regime organizations pay VAT at a reduced tier once their
//! cumulative gross revenue crosses the 60M / 250M thresholds; the general
//! regime and anyone past the USN ceiling pay the full rate. Tier selection
//! looks at the cumulative revenue *before* the current month, so a crossing
//! raises the rate starting from the following month.

use std::time::Instant;

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::normalize_percent;
use crate::error::FinmodelError;
use crate::parse::de_money;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, TaxMode};
use crate::FinmodelResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Annual gross-revenue ceiling for the simplified regime. Above it the
/// organization loses УСН and both VAT and profit tax follow ОСНО.
pub const USN_REVENUE_CEILING: Money = dec!(450_000_000);

/// Cumulative gross revenue above which a simplified payer charges at least 5%
pub const VAT_TIER_5_THRESHOLD: Money = dec!(60_000_000);

/// Cumulative gross revenue above which a simplified payer charges at least 7%
pub const VAT_TIER_7_THRESHOLD: Money = dec!(250_000_000);

/// Standard VAT rate for the general regime
pub const VAT_GENERAL_RATE: Rate = dec!(20);

// ---------------------------------------------------------------------------
// Rate selection
// ---------------------------------------------------------------------------

/// Selects the VAT rate for one month.
///
/// `prev_cum_gross` is the cumulative gross revenue before this month,
/// `curr_cum_gross` includes this month. The configured floor wins whenever
/// it exceeds the threshold tier, so an organization that opted into 7% keeps
/// charging 7% while its revenue is still in the 5% band.
pub fn select_vat_rate(
    prev_cum_gross: Money,
    curr_cum_gross: Money,
    mode: TaxMode,
    configured_floor: Rate,
) -> Rate {
    if mode == TaxMode::Osno || curr_cum_gross > USN_REVENUE_CEILING {
        return VAT_GENERAL_RATE;
    }
    if prev_cum_gross > VAT_TIER_7_THRESHOLD {
        return dec!(7).max(configured_floor);
    }
    if prev_cum_gross > VAT_TIER_5_THRESHOLD {
        return dec!(5).max(configured_floor);
    }
    configured_floor
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatRateInput {
    /// Cumulative gross revenue before the month in question
    #[serde(default, deserialize_with = "de_money")]
    pub prev_cum_gross: Money,
    /// Cumulative gross revenue including the month in question
    #[serde(deserialize_with = "de_money")]
    pub curr_cum_gross: Money,
    pub tax_mode: TaxMode,
    /// Configured minimum rate in percent, e.g. 5 for an organization that
    /// already charges the 5% tier
    #[serde(default, deserialize_with = "de_money")]
    pub configured_floor: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatRateOutput {
    /// Selected rate in percent
    pub rate: Rate,
    /// Rate as written in the report, e.g. "20%"
    pub rate_label: String,
}

/// Computes the VAT rate for a single month of one organization.
pub fn compute_vat_rate(
    input: &VatRateInput,
) -> FinmodelResult<ComputationOutput<VatRateOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let floor = normalize_percent(input.configured_floor);
    if floor < Money::ZERO || floor > dec!(100) {
        return Err(FinmodelError::InvalidInput {
            field: "configured_floor".to_string(),
            reason: format!("Rate must be between 0 and 100 percent, got {floor}"),
        });
    }
    if input.prev_cum_gross < Money::ZERO || input.curr_cum_gross < Money::ZERO {
        return Err(FinmodelError::InvalidInput {
            field: "cumulative revenue".to_string(),
            reason: "Cumulative gross revenue cannot be negative".to_string(),
        });
    }
    if input.prev_cum_gross > input.curr_cum_gross {
        warnings.push(
            "Previous cumulative revenue exceeds current cumulative revenue".to_string(),
        );
    }

    let rate = select_vat_rate(
        input.prev_cum_gross,
        input.curr_cum_gross,
        input.tax_mode,
        floor,
    );
    let result = VatRateOutput {
        rate,
        rate_label: format!("{}%", rate.round()),
    };

    let assumptions = serde_json::json!({
        "tier_5_threshold": VAT_TIER_5_THRESHOLD.to_string(),
        "tier_7_threshold": VAT_TIER_7_THRESHOLD.to_string(),
        "usn_revenue_ceiling": USN_REVENUE_CEILING.to_string(),
        "general_rate": VAT_GENERAL_RATE.to_string(),
        "tiering_basis": "cumulative gross revenue before the current month",
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "VAT tier selection for simplified-regime payers (2025 rules)",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
