//! Grouping of raw marketplace economics rows (one per storefront-month)
//! into per-organization monthly aggregates, plus the COGS reconciliation
//! used once a row's VAT rate is known.

use std::collections::BTreeMap;

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::parse::{de_money, de_month, de_opt_money};
use crate::types::{Money, Month, Rate};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Marketplace commissions carry standard VAT; gross figures without an
/// explicit net counterpart are divided by this
const EXPENSE_VAT_DIVISOR: Decimal = dec!(1.2);

/// A provided net COGS is trusted only while it stays within this relative
/// distance of the gross figure divided by the VAT factor
const COST_RECONCILE_TOLERANCE: Decimal = dec!(0.01);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One row of the planned-economics sheet: a single storefront
/// (Wildberries or Ozon cabinet) of one organization in one month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicsRow {
    pub org: String,
    #[serde(deserialize_with = "de_month")]
    pub month: Month,
    /// Gross revenue, VAT included
    #[serde(deserialize_with = "de_money")]
    pub revenue: Money,
    /// Marketplace expenses, VAT included
    #[serde(deserialize_with = "de_money")]
    pub mp_expense_gross: Money,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub mp_expense_net: Option<Money>,
    /// Cost of goods sold, VAT included
    #[serde(deserialize_with = "de_money")]
    pub cost_gross: Money,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub cost_net: Option<Money>,
    /// Tax-deductible COGS, VAT included
    #[serde(default, deserialize_with = "de_opt_money")]
    pub cost_tax: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub cost_tax_net: Option<Money>,
}

/// All storefronts of one organization summed for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub org: String,
    pub month: Month,
    pub revenue: Money,
    pub mp_gross: Money,
    /// Net marketplace expenses; rows without an explicit net figure
    /// contribute their gross divided by the VAT factor
    pub mp_net: Money,
    pub cost_gross: Money,
    pub cost_net: Option<Money>,
    pub cost_tax: Option<Money>,
    pub cost_tax_net: Option<Money>,
}

impl MonthlyAggregate {
    fn empty(org: &str, month: Month) -> Self {
        MonthlyAggregate {
            org: org.to_string(),
            month,
            revenue: Money::ZERO,
            mp_gross: Money::ZERO,
            mp_net: Money::ZERO,
            cost_gross: Money::ZERO,
            cost_net: None,
            cost_tax: None,
            cost_tax_net: None,
        }
    }
}

/// Result of grouping raw rows
#[derive(Debug, Clone)]
pub struct RowAggregation {
    /// Aggregates ordered by (month, organization)
    pub aggregates: Vec<MonthlyAggregate>,
    /// Rows dropped for a missing or out-of-range month
    pub dropped_rows: usize,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

fn is_totals_label(org: &str) -> bool {
    matches!(org.to_lowercase().as_str(), "итого" | "total")
}

/// Groups storefront rows into per-organization monthly aggregates.
///
/// Blank-organization and totals-footer rows are skipped; rows with a month
/// outside 1..=12 are dropped, counted and reported as a single warning.
pub fn aggregate_rows(rows: &[EconomicsRow], warnings: &mut Vec<String>) -> RowAggregation {
    let mut buckets: BTreeMap<(Month, String), MonthlyAggregate> = BTreeMap::new();
    let mut dropped = 0usize;

    for row in rows {
        let org = row.org.trim();
        if org.is_empty() || is_totals_label(org) {
            debug!("[AGG] skipping footer/blank row in month {}", row.month);
            continue;
        }
        if !(1..=12).contains(&row.month) {
            dropped += 1;
            debug!("[AGG] dropped row for {org}: month {} out of range", row.month);
            continue;
        }

        let agg = buckets
            .entry((row.month, org.to_string()))
            .or_insert_with(|| MonthlyAggregate::empty(org, row.month));
        agg.revenue += row.revenue;
        agg.mp_gross += row.mp_expense_gross;
        agg.mp_net += row
            .mp_expense_net
            .unwrap_or_else(|| row.mp_expense_gross / EXPENSE_VAT_DIVISOR);
        agg.cost_gross += row.cost_gross;
        merge_opt(&mut agg.cost_net, row.cost_net);
        merge_opt(&mut agg.cost_tax, row.cost_tax);
        merge_opt(&mut agg.cost_tax_net, row.cost_tax_net);
    }

    if dropped > 0 {
        warnings.push(format!(
            "{dropped} economics rows dropped: month missing or outside 1..=12"
        ));
    }

    RowAggregation {
        aggregates: buckets.into_values().collect(),
        dropped_rows: dropped,
    }
}

fn merge_opt(acc: &mut Option<Money>, value: Option<Money>) {
    if let Some(v) = value {
        *acc = Some(acc.unwrap_or(Money::ZERO) + v);
    }
}

// ---------------------------------------------------------------------------
// Cost reconciliation
// ---------------------------------------------------------------------------

/// Reconciles the net COGS against the gross figure once the VAT rate is
/// known. The provided net value wins only while it agrees with
/// gross / (1 + rate) within tolerance; a stale or missing value is
/// recomputed from gross.
pub fn reconcile_cost_base(cost_net: Option<Money>, cost_gross: Money, vat_rate: Rate) -> Money {
    let expected = cost_gross / (Decimal::ONE + vat_rate / dec!(100));
    match cost_net {
        Some(net) if (net - expected).abs() <= expected.abs() * COST_RECONCILE_TOLERANCE => net,
        _ => expected,
    }
}

/// Scales a net cost base back up by the VAT factor.
pub fn full_cogs(cost_base: Money, vat_rate: Rate) -> Money {
    cost_base * (Decimal::ONE + vat_rate / dec!(100))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(org: &str, month: Month, revenue: Money) -> EconomicsRow {
        EconomicsRow {
            org: org.to_string(),
            month,
            revenue,
            mp_expense_gross: Money::ZERO,
            mp_expense_net: None,
            cost_gross: Money::ZERO,
            cost_net: None,
            cost_tax: None,
            cost_tax_net: None,
        }
    }

    #[test]
    fn test_storefronts_merge_per_org_month() {
        let mut wb = row("Альфа", 1, dec!(100));
        wb.mp_expense_gross = dec!(12);
        let mut ozon = row("Альфа", 1, dec!(50));
        ozon.mp_expense_gross = dec!(24);
        ozon.mp_expense_net = Some(dec!(21));

        let mut warnings = Vec::new();
        let out = aggregate_rows(&[wb, ozon], &mut warnings);
        assert_eq!(out.aggregates.len(), 1);
        let agg = &out.aggregates[0];
        assert_eq!(agg.revenue, dec!(150));
        assert_eq!(agg.mp_gross, dec!(36));
        // 12 / 1.2 derived for the first row, 21 explicit for the second
        assert_eq!(agg.mp_net, dec!(31));
        assert_eq!(agg.cost_net, None);
    }

    #[test]
    fn test_invalid_months_are_dropped_and_counted() {
        let rows = vec![row("Альфа", 0, dec!(1)), row("Альфа", 13, dec!(2)), row("Альфа", 3, dec!(3))];
        let mut warnings = Vec::new();
        let out = aggregate_rows(&rows, &mut warnings);
        assert_eq!(out.dropped_rows, 2);
        assert_eq!(out.aggregates.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("2 economics rows dropped"));
    }

    #[test]
    fn test_footer_rows_are_skipped_silently() {
        let rows = vec![
            row("Итого", 1, dec!(999)),
            row("Total", 1, dec!(999)),
            row("", 1, dec!(999)),
            row("Альфа", 1, dec!(10)),
        ];
        let mut warnings = Vec::new();
        let out = aggregate_rows(&rows, &mut warnings);
        assert_eq!(out.dropped_rows, 0);
        assert!(warnings.is_empty());
        assert_eq!(out.aggregates.len(), 1);
        assert_eq!(out.aggregates[0].revenue, dec!(10));
    }

    #[test]
    fn test_only_the_two_footer_labels_are_reserved() {
        // "Всего" is a legal organization name, not a recognised footer
        let rows = vec![row("Всего", 1, dec!(10)), row("Итог", 1, dec!(20))];
        let mut warnings = Vec::new();
        let out = aggregate_rows(&rows, &mut warnings);
        let orgs: Vec<&str> = out.aggregates.iter().map(|a| a.org.as_str()).collect();
        assert_eq!(orgs, vec!["Всего", "Итог"]);
    }

    #[test]
    fn test_aggregates_come_out_ordered() {
        let rows = vec![
            row("Бета", 2, dec!(1)),
            row("Альфа", 2, dec!(1)),
            row("Бета", 1, dec!(1)),
        ];
        let mut warnings = Vec::new();
        let out = aggregate_rows(&rows, &mut warnings);
        let keys: Vec<(Month, &str)> = out
            .aggregates
            .iter()
            .map(|a| (a.month, a.org.as_str()))
            .collect();
        assert_eq!(keys, vec![(1, "Бета"), (2, "Альфа"), (2, "Бета")]);
    }

    #[test]
    fn test_cost_base_trusts_consistent_net() {
        assert_eq!(reconcile_cost_base(Some(dec!(120)), dec!(144), dec!(20)), dec!(120));
    }

    #[test]
    fn test_cost_base_recomputes_stale_net() {
        let expected = dec!(160) / dec!(1.2);
        assert_eq!(reconcile_cost_base(Some(dec!(120)), dec!(160), dec!(20)), expected);
    }

    #[test]
    fn test_cost_base_derives_missing_net() {
        let expected = dec!(110) / dec!(1.1);
        assert_eq!(reconcile_cost_base(None, dec!(110), dec!(10)), expected);
    }

    #[test]
    fn test_full_cogs_scales_back_up() {
        assert_eq!(full_cogs(dec!(100), dec!(10)), dec!(110.0));
    }
}
