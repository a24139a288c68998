//! Reference-sheet ingestion: organization tax settings, payroll figures and
//! other planned expenses. Raw entries keep the lenient spreadsheet shape;
//! resolution normalizes them into typed configs the engine consumes.

use std::collections::BTreeMap;

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FinmodelError;
use crate::parse::{de_money, de_opt_money};
use crate::types::{Money, OrgKind, Rate, TaxMode};
use crate::FinmodelResult;

/// Payroll scenario counted into the plan. Other scenarios are what-if rows
/// and are ignored.
const AS_IS_SCENARIO: &str = "как есть";

// ---------------------------------------------------------------------------
// Organization settings
// ---------------------------------------------------------------------------

/// One row of the organization reference sheet, as it arrives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfigEntry {
    pub org: String,
    /// Legal form label, "ООО" or "ИП"
    #[serde(default)]
    pub kind: Option<String>,
    /// Tax regime label, e.g. "Доходы"
    #[serde(default)]
    pub tax_mode: Option<String>,
    /// The literal "нет" keeps the organization out of the consolidated
    /// group; anything else, including an empty cell, keeps it in
    #[serde(default)]
    pub consolidation: Option<String>,
    /// Minimum VAT rate in percent; fractions like 0.05 are accepted
    #[serde(default, deserialize_with = "de_opt_money")]
    pub vat_rate_floor: Option<Rate>,
    /// УСН rate in percent
    #[serde(default, deserialize_with = "de_opt_money")]
    pub usn_rate: Option<Rate>,
}

/// Resolved tax settings for one organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub kind: OrgKind,
    pub tax_mode: TaxMode,
    pub consolidation: bool,
    pub vat_rate_floor: Rate,
    pub usn_rate: Rate,
}

impl Default for OrganizationConfig {
    /// Settings assumed for an organization that has economics rows but no
    /// reference entry: general regime, out of the consolidated group.
    fn default() -> Self {
        OrganizationConfig {
            kind: OrgKind::Company,
            tax_mode: TaxMode::Osno,
            consolidation: false,
            vat_rate_floor: Rate::ZERO,
            usn_rate: Rate::ZERO,
        }
    }
}

/// Reference sheets mix "5" and "0.05" for five percent. Values strictly
/// between 0 and 1 are read as fractions and scaled up.
pub fn normalize_percent(value: Rate) -> Rate {
    if value > Rate::ZERO && value < Rate::ONE {
        value * dec!(100)
    } else {
        value
    }
}

/// Resolves raw reference rows into per-organization configs.
///
/// Unknown tax modes are fatal. An unknown legal form falls back to ООО with
/// a warning, an empty regime cell falls back to ОСНО. Later rows for the
/// same organization overwrite earlier ones.
pub fn resolve_org_configs(
    entries: &[OrgConfigEntry],
    warnings: &mut Vec<String>,
) -> FinmodelResult<BTreeMap<String, OrganizationConfig>> {
    let mut configs = BTreeMap::new();
    for entry in entries {
        let org = entry.org.trim();
        if org.is_empty() {
            warnings.push("Organization reference row with an empty name skipped".to_string());
            continue;
        }

        let kind = match entry.kind.as_deref().map(str::trim) {
            None | Some("") => OrgKind::default(),
            Some(label) => OrgKind::from_label(label).unwrap_or_else(|| {
                warnings.push(format!(
                    "Unknown legal form '{label}' for {org}, assuming ООО"
                ));
                OrgKind::default()
            }),
        };

        let tax_mode = match entry.tax_mode.as_deref().map(str::trim) {
            None | Some("") => TaxMode::Osno,
            Some(label) => TaxMode::parse(label)?,
        };

        let consolidation = match &entry.consolidation {
            None => true,
            Some(cell) => cell.trim().to_lowercase() != "нет",
        };

        let vat_rate_floor = normalize_percent(entry.vat_rate_floor.unwrap_or(Rate::ZERO));
        validate_percent(&format!("vat_rate_floor ({org})"), vat_rate_floor)?;
        let usn_rate = normalize_percent(entry.usn_rate.unwrap_or(Rate::ZERO));
        validate_percent(&format!("usn_rate ({org})"), usn_rate)?;

        if tax_mode.is_simplified() && usn_rate == Rate::ZERO {
            warnings.push(format!(
                "{org} is on {tax_mode} with a zero УСН rate; its tax will be zero"
            ));
        }

        debug!(
            "[CFG] {org}: {kind} {tax_mode}, consolidation={consolidation}, \
             vat_floor={vat_rate_floor}%, usn={usn_rate}%"
        );
        configs.insert(
            org.to_string(),
            OrganizationConfig {
                kind,
                tax_mode,
                consolidation,
                vat_rate_floor,
                usn_rate,
            },
        );
    }
    Ok(configs)
}

// ---------------------------------------------------------------------------
// Payroll
// ---------------------------------------------------------------------------

/// One row of the payroll calculation sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollEntry {
    pub org: String,
    /// Only rows whose scenario is "как есть" are counted; rows without a
    /// scenario cell are skipped
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default, deserialize_with = "de_money")]
    pub total_salary: Money,
    /// Officially declared part of salary; defaults to the full salary
    #[serde(default, deserialize_with = "de_opt_money")]
    pub official_base: Option<Money>,
    #[serde(default, deserialize_with = "de_money")]
    pub total_contributions: Money,
}

/// Annual payroll figures per organization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayrollFigures {
    /// Full wage fund
    pub fot: Money,
    /// Officially declared wage fund, deductible under ОСНО
    pub fot_official: Money,
    /// Social contributions (ЕСН)
    pub esn: Money,
}

/// Sums as-is payroll rows per organization.
pub fn aggregate_payroll(entries: &[PayrollEntry]) -> BTreeMap<String, PayrollFigures> {
    let mut totals: BTreeMap<String, PayrollFigures> = BTreeMap::new();
    for entry in entries {
        let org = entry.org.trim();
        if org.is_empty() {
            continue;
        }
        let counted = match &entry.scenario {
            None => false,
            Some(s) => s.trim().to_lowercase() == AS_IS_SCENARIO,
        };
        if !counted {
            continue;
        }
        let figures = totals.entry(org.to_string()).or_default();
        figures.fot += entry.total_salary;
        figures.fot_official += entry.official_base.unwrap_or(entry.total_salary);
        figures.esn += entry.total_contributions;
    }
    totals
}

// ---------------------------------------------------------------------------
// Other expenses
// ---------------------------------------------------------------------------

/// One row of the other-expenses sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherExpenseEntry {
    pub org: String,
    #[serde(default, deserialize_with = "de_money")]
    pub amount: Money,
}

/// Sums other planned expenses per organization.
pub fn aggregate_other_expenses(entries: &[OtherExpenseEntry]) -> BTreeMap<String, Money> {
    let mut totals: BTreeMap<String, Money> = BTreeMap::new();
    for entry in entries {
        let org = entry.org.trim();
        if org.is_empty() {
            continue;
        }
        *totals.entry(org.to_string()).or_insert(Money::ZERO) += entry.amount;
    }
    totals
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_percent(field: &str, value: Rate) -> FinmodelResult<()> {
    if value < Decimal::ZERO || value > dec!(100) {
        return Err(FinmodelError::InvalidInput {
            field: field.to_string(),
            reason: format!("Rate must be between 0 and 100 percent, got {value}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(org: &str) -> OrgConfigEntry {
        OrgConfigEntry {
            org: org.to_string(),
            kind: None,
            tax_mode: None,
            consolidation: None,
            vat_rate_floor: None,
            usn_rate: None,
        }
    }

    #[test]
    fn test_percent_normalization() {
        assert_eq!(normalize_percent(dec!(0.06)), dec!(6));
        assert_eq!(normalize_percent(dec!(6)), dec!(6));
        assert_eq!(normalize_percent(Rate::ZERO), Rate::ZERO);
        assert_eq!(normalize_percent(Rate::ONE), Rate::ONE);
    }

    #[test]
    fn test_blank_cells_resolve_to_defaults() {
        let mut warnings = Vec::new();
        let configs = resolve_org_configs(&[entry("Альфа")], &mut warnings).unwrap();
        let cfg = &configs["Альфа"];
        assert_eq!(cfg.kind, OrgKind::Company);
        assert_eq!(cfg.tax_mode, TaxMode::Osno);
        assert!(cfg.consolidation);
        assert_eq!(cfg.vat_rate_floor, Rate::ZERO);
        assert_eq!(cfg.usn_rate, Rate::ZERO);
    }

    #[test]
    fn test_explicit_net_opts_out_of_consolidation() {
        let mut warnings = Vec::new();
        let mut e = entry("Бета");
        e.consolidation = Some(" Нет ".to_string());
        let configs = resolve_org_configs(&[e], &mut warnings).unwrap();
        assert!(!configs["Бета"].consolidation);

        let mut e = entry("Бета");
        e.consolidation = Some("да".to_string());
        let configs = resolve_org_configs(&[e], &mut warnings).unwrap();
        assert!(configs["Бета"].consolidation);
    }

    #[test]
    fn test_unknown_tax_mode_is_fatal() {
        let mut warnings = Vec::new();
        let mut e = entry("Гамма");
        e.tax_mode = Some("патент".to_string());
        let err = resolve_org_configs(&[e], &mut warnings).unwrap_err();
        assert!(matches!(err, FinmodelError::UnknownTaxMode { .. }));
    }

    #[test]
    fn test_unknown_legal_form_defaults_with_warning() {
        let mut warnings = Vec::new();
        let mut e = entry("Дельта");
        e.kind = Some("АО".to_string());
        let configs = resolve_org_configs(&[e], &mut warnings).unwrap();
        assert_eq!(configs["Дельта"].kind, OrgKind::Company);
        assert!(warnings.iter().any(|w| w.contains("АО")));
    }

    #[test]
    fn test_fractional_rates_scale_to_percent() {
        let mut warnings = Vec::new();
        let mut e = entry("Ипсилон");
        e.tax_mode = Some("Доходы".to_string());
        e.vat_rate_floor = Some(dec!(0.05));
        e.usn_rate = Some(dec!(0.06));
        let configs = resolve_org_configs(&[e], &mut warnings).unwrap();
        assert_eq!(configs["Ипсилон"].vat_rate_floor, dec!(5));
        assert_eq!(configs["Ипсилон"].usn_rate, dec!(6));
    }

    #[test]
    fn test_out_of_range_rate_is_rejected() {
        let mut warnings = Vec::new();
        let mut e = entry("Зета");
        e.vat_rate_floor = Some(dec!(150));
        assert!(resolve_org_configs(&[e], &mut warnings).is_err());
    }

    #[test]
    fn test_zero_usn_rate_on_simplified_mode_warns() {
        let mut warnings = Vec::new();
        let mut e = entry("Эта");
        e.tax_mode = Some("Доходы".to_string());
        resolve_org_configs(&[e], &mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("Эта")));
    }

    #[test]
    fn test_payroll_counts_only_as_is_scenario() {
        let entries = vec![
            PayrollEntry {
                org: "Альфа".to_string(),
                scenario: Some("как есть".to_string()),
                total_salary: dec!(1000),
                official_base: Some(dec!(600)),
                total_contributions: dec!(300),
            },
            PayrollEntry {
                org: "Альфа".to_string(),
                scenario: Some("план".to_string()),
                total_salary: dec!(9999),
                official_base: None,
                total_contributions: dec!(9999),
            },
            PayrollEntry {
                org: "Альфа".to_string(),
                scenario: Some(" Как есть ".to_string()),
                total_salary: dec!(500),
                official_base: None,
                total_contributions: dec!(150),
            },
        ];
        let totals = aggregate_payroll(&entries);
        let alpha = &totals["Альфа"];
        // label matches after trim and case fold
        assert_eq!(alpha.fot, dec!(1500));
        // second counted row has no official base, falls back to salary
        assert_eq!(alpha.fot_official, dec!(1100));
        assert_eq!(alpha.esn, dec!(450));
    }

    #[test]
    fn test_payroll_skips_rows_without_scenario() {
        let entries = vec![
            PayrollEntry {
                org: "Альфа".to_string(),
                scenario: None,
                total_salary: dec!(500),
                official_base: None,
                total_contributions: dec!(150),
            },
            PayrollEntry {
                org: "Альфа".to_string(),
                scenario: Some("как есть".to_string()),
                total_salary: dec!(1000),
                official_base: None,
                total_contributions: dec!(300),
            },
        ];
        let totals = aggregate_payroll(&entries);
        let alpha = &totals["Альфа"];
        assert_eq!(alpha.fot, dec!(1000));
        assert_eq!(alpha.esn, dec!(300));
    }

    #[test]
    fn test_other_expenses_sum_per_org() {
        let entries = vec![
            OtherExpenseEntry {
                org: "Альфа".to_string(),
                amount: dec!(100),
            },
            OtherExpenseEntry {
                org: "Альфа".to_string(),
                amount: dec!(50),
            },
            OtherExpenseEntry {
                org: "Бета".to_string(),
                amount: dec!(7),
            },
        ];
        let totals = aggregate_other_expenses(&entries);
        assert_eq!(totals["Альфа"], dec!(150));
        assert_eq!(totals["Бета"], dec!(7));
    }
}
