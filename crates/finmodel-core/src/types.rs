use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FinmodelError;
use crate::FinmodelResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed in percent (20 = 20%), matching the planning-report vocabulary.
pub type Rate = Decimal;

/// Month number within the planning year, 1..=12.
pub type Month = u32;

/// Tax regime of an organization, as written in the reference sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxMode {
    /// Simplified regime taxing revenue net of VAT ("УСН Доходы")
    #[serde(rename = "Доходы")]
    UsnIncome,
    /// Simplified regime taxing income minus expenses ("УСН Доходы-Расходы")
    #[serde(rename = "Доходы-Расходы")]
    UsnIncomeExpense,
    /// General regime ("ОСНО")
    #[serde(rename = "ОСНО")]
    Osno,
}

impl TaxMode {
    /// Parses the regime label used in reference sheets. Whitespace is ignored,
    /// anything unrecognized is a hard error so a typo cannot silently fall back
    /// to the general regime.
    pub fn parse(label: &str) -> FinmodelResult<Self> {
        match label.trim() {
            "Доходы" => Ok(TaxMode::UsnIncome),
            "Доходы-Расходы" => Ok(TaxMode::UsnIncomeExpense),
            "ОСНО" => Ok(TaxMode::Osno),
            other => Err(FinmodelError::UnknownTaxMode {
                value: other.to_string(),
            }),
        }
    }

    pub fn is_simplified(self) -> bool {
        matches!(self, TaxMode::UsnIncome | TaxMode::UsnIncomeExpense)
    }
}

impl fmt::Display for TaxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaxMode::UsnIncome => "Доходы",
            TaxMode::UsnIncomeExpense => "Доходы-Расходы",
            TaxMode::Osno => "ОСНО",
        };
        f.write_str(label)
    }
}

/// Legal form of an organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgKind {
    /// Limited liability company ("ООО"), pays corporate profit tax under ОСНО
    #[default]
    #[serde(rename = "ООО")]
    Company,
    /// Sole proprietor ("ИП"), pays progressive personal income tax under ОСНО
    #[serde(rename = "ИП")]
    SoleProprietor,
}

impl OrgKind {
    /// Recognizes the legal-form label from reference sheets. Returns `None`
    /// for anything that is neither "ООО" nor "ИП" so the caller can default
    /// with a warning instead of failing the whole run.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "ООО" => Some(OrgKind::Company),
            "ИП" => Some(OrgKind::SoleProprietor),
            _ => None,
        }
    }
}

impl fmt::Display for OrgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrgKind::Company => "ООО",
            OrgKind::SoleProprietor => "ИП",
        };
        f.write_str(label)
    }
}

/// Rounds to whole currency units, midpoint to even. Every figure written to
/// the report goes through this once, at emission.
pub fn round_money(value: Money) -> Money {
    value.round()
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
