//! Progressive personal income tax (НДФЛ) for sole proprietors on ОСНО,
//! using the five-bracket scale in force from 2025.

use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FinmodelError;
use crate::parse::de_money;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FinmodelResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Bracket upper bounds with their marginal rates. Income above the last
/// bound is taxed at [`NDFL_TOP_RATE`].
const NDFL_BRACKETS: [(Money, Decimal); 4] = [
    (dec!(2_400_000), dec!(0.13)),
    (dec!(5_000_000), dec!(0.15)),
    (dec!(20_000_000), dec!(0.18)),
    (dec!(50_000_000), dec!(0.20)),
];

const NDFL_TOP_RATE: Decimal = dec!(0.22);

// ---------------------------------------------------------------------------
// Ladder walk
// ---------------------------------------------------------------------------

/// Total НДФЛ owed on a cumulative annual base. Pure and monotonic
/// non-decreasing; monthly liabilities are always computed as differences of
/// this function, never by applying a rate to a monthly slice.
pub fn ndfl_progressive(cumulative_base: Money) -> Money {
    if cumulative_base <= Money::ZERO {
        return Money::ZERO;
    }
    let mut remaining = cumulative_base;
    let mut tax = Money::ZERO;
    let mut lower = Money::ZERO;
    for (upper, rate) in NDFL_BRACKETS {
        let slice = remaining.min(upper - lower);
        tax += slice * rate;
        remaining -= slice;
        if remaining <= Money::ZERO {
            return tax;
        }
        lower = upper;
    }
    tax + remaining * NDFL_TOP_RATE
}

fn marginal_rate(cumulative_base: Money) -> Decimal {
    for (upper, rate) in NDFL_BRACKETS {
        if cumulative_base <= upper {
            return rate;
        }
    }
    NDFL_TOP_RATE
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdflInput {
    /// Cumulative annual taxable base
    #[serde(deserialize_with = "de_money")]
    pub cumulative_base: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdflOutput {
    /// Total tax on the cumulative base, unrounded
    pub cumulative_tax: Money,
    /// Effective rate in percent, two decimal places
    pub effective_rate: Rate,
    /// Marginal rate in percent for the next ruble of income
    pub marginal_rate: Rate,
}

/// Computes НДФЛ on a cumulative annual base.
pub fn compute_ndfl(input: &NdflInput) -> FinmodelResult<ComputationOutput<NdflOutput>> {
    let start = Instant::now();
    let warnings = Vec::new();

    if input.cumulative_base < Money::ZERO {
        return Err(FinmodelError::InvalidInput {
            field: "cumulative_base".to_string(),
            reason: format!(
                "Taxable base cannot be negative, got {}",
                input.cumulative_base
            ),
        });
    }

    let tax = ndfl_progressive(input.cumulative_base);
    let effective = if input.cumulative_base > Money::ZERO {
        (tax / input.cumulative_base * dec!(100)).round_dp(2)
    } else {
        Money::ZERO
    };
    let result = NdflOutput {
        cumulative_tax: tax,
        effective_rate: effective,
        marginal_rate: marginal_rate(input.cumulative_base) * dec!(100),
    };

    let assumptions = serde_json::json!({
        "brackets": NDFL_BRACKETS
            .iter()
            .map(|(upper, rate)| serde_json::json!({
                "up_to": upper.to_string(),
                "rate": rate.to_string(),
            }))
            .collect::<Vec<_>>(),
        "top_rate": NDFL_TOP_RATE.to_string(),
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Progressive НДФЛ on cumulative annual base (five-bracket 2025 scale)",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_bracket_boundary() {
        assert_eq!(ndfl_progressive(dec!(2_400_000)), dec!(312000));
    }

    #[test]
    fn test_second_bracket_partial() {
        assert_eq!(ndfl_progressive(dec!(2_500_000)), dec!(327000));
    }

    #[test]
    fn test_top_bracket() {
        // 312k + 390k + 2.7M + 6M + 10M * 0.22
        assert_eq!(ndfl_progressive(dec!(60_000_000)), dec!(11602000));
    }

    #[test]
    fn test_non_positive_base_owes_nothing() {
        assert_eq!(ndfl_progressive(Money::ZERO), Money::ZERO);
        assert_eq!(ndfl_progressive(dec!(-100)), Money::ZERO);
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        let points = [
            Money::ZERO,
            dec!(1),
            dec!(2_400_000),
            dec!(2_400_001),
            dec!(5_000_000),
            dec!(19_999_999),
            dec!(50_000_000),
            dec!(80_000_000),
        ];
        for pair in points.windows(2) {
            assert!(ndfl_progressive(pair[0]) <= ndfl_progressive(pair[1]));
        }
    }

    #[test]
    fn test_envelope_reports_rates() {
        let out = compute_ndfl(&NdflInput {
            cumulative_base: dec!(2_500_000),
        })
        .unwrap();
        assert_eq!(out.result.cumulative_tax, dec!(327000));
        assert_eq!(out.result.effective_rate, dec!(13.08));
        assert_eq!(out.result.marginal_rate, dec!(15));
    }

    #[test]
    fn test_envelope_rejects_negative_base() {
        assert!(compute_ndfl(&NdflInput {
            cumulative_base: dec!(-1),
        })
        .is_err());
    }
}
