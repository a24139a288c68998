use finmodel_core::aggregate::EconomicsRow;
use finmodel_core::config::{OrgConfigEntry, PayrollEntry};
use finmodel_core::engine::{compute_planned_indicators, PlannedIndicatorsInput};
use finmodel_core::ndfl::{compute_ndfl, NdflInput};
use finmodel_core::vat::{compute_vat_rate, VatRateInput};
use finmodel_core::{FinmodelError, Money, TaxMode};
use rust_decimal_macros::dec;

// ===========================================================================
// Planned indicators: full report through the public API
// ===========================================================================

fn econ(org: &str, month: u32, revenue: Money) -> EconomicsRow {
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

fn org(name: &str, kind: &str, mode: &str, consolidated: bool, usn: Money) -> OrgConfigEntry {
    OrgConfigEntry {
        org: name.to_string(),
        kind: Some(kind.to_string()),
        tax_mode: Some(mode.to_string()),
        consolidation: Some(if consolidated { "да" } else { "нет" }.to_string()),
        vat_rate_floor: Some(Money::ZERO),
        usn_rate: Some(usn),
    }
}

fn as_is_payroll(name: &str, esn: Money) -> PayrollEntry {
    PayrollEntry {
        org: name.to_string(),
        scenario: Some("как есть".to_string()),
        total_salary: Money::ZERO,
        official_base: None,
        total_contributions: esn,
    }
}

fn sample_consolidated_group() -> PlannedIndicatorsInput {
    // Two УСН Доходы members sharing the contributions pool over two months
    PlannedIndicatorsInput {
        rows: vec![
            econ("Альфа", 1, dec!(10_000)),
            econ("Бета", 1, dec!(5_000)),
            econ("Альфа", 2, dec!(10_000)),
            econ("Бета", 2, dec!(5_000)),
        ],
        organizations: vec![
            org("Альфа", "ООО", "Доходы", true, dec!(6)),
            org("Бета", "ООО", "Доходы", true, dec!(6)),
        ],
        payroll: vec![as_is_payroll("Альфа", dec!(1_000))],
        other_expenses: vec![],
    }
}

#[test]
fn test_consolidated_income_group_year() {
    let out = compute_planned_indicators(&sample_consolidated_group()).unwrap();
    let report = &out.result;

    // Rows come out ordered by (month, organization)
    let keys: Vec<(u32, &str)> = report
        .rows
        .iter()
        .map(|r| (r.month, r.org.as_str()))
        .collect();
    assert_eq!(keys, vec![(1, "Альфа"), (1, "Бета"), (2, "Альфа"), (2, "Бета")]);

    // Raw tax 600/300 per month; the year-to-date cap grants 450 each month,
    // split 2:1 by raw tax
    let taxes: Vec<Money> = report.rows.iter().map(|r| r.tax).collect();
    assert_eq!(taxes, vec![dec!(300), dec!(150), dec!(300), dec!(150)]);
    for row in &report.rows {
        assert_eq!(row.tax_mode, TaxMode::UsnIncome);
        assert_eq!(row.tax_rate, "6%");
        assert_eq!(row.vat_rate, "0%");
    }

    let s = &report.summary;
    assert_eq!(s.organization_count, 2);
    assert_eq!(s.month_count, 2);
    assert_eq!(s.row_count, 4);
    assert_eq!(s.dropped_rows, 0);
    assert_eq!(s.total_revenue, dec!(30_000));
    assert_eq!(s.total_vat, Money::ZERO);
    assert_eq!(s.total_ebitda, dec!(28_000));
    assert_eq!(s.total_tax, dec!(900));
    assert_eq!(s.total_net_profit, dec!(27_100));
}

#[test]
fn test_minimum_tax_when_annual_profit_is_negative() {
    // Tax-basis COGS above revenue in both months: the nominal annual tax is
    // zero, the 1%-of-revenue minimum takes over on every row
    let mut m1 = econ("Сириус", 1, dec!(1_000));
    m1.cost_tax = Some(dec!(1_500));
    let mut m2 = econ("Сириус", 2, dec!(1_000));
    m2.cost_tax = Some(dec!(1_500));
    let input = PlannedIndicatorsInput {
        rows: vec![m1, m2],
        organizations: vec![org("Сириус", "ООО", "Доходы-Расходы", false, dec!(15))],
        payroll: vec![],
        other_expenses: vec![],
    };

    let out = compute_planned_indicators(&input).unwrap();
    for row in &out.result.rows {
        assert_eq!(row.tax, dec!(10));
        assert_eq!(row.tax_rate, "1%");
        assert_eq!(row.net_profit, dec!(990));
    }
    assert!(out.warnings.iter().any(|w| w.contains("minimum tax")));
}

#[test]
fn test_missing_organizations_sheet_is_rejected() {
    let input = PlannedIndicatorsInput {
        rows: vec![econ("Альфа", 1, dec!(1_000))],
        organizations: vec![],
        payroll: vec![],
        other_expenses: vec![],
    };
    let err = compute_planned_indicators(&input).unwrap_err();
    match err {
        FinmodelError::MissingInput { field } => assert_eq!(field, "organizations"),
        other => panic!("unexpected error: {other}"),
    }
}

// ===========================================================================
// VAT rate selection
// ===========================================================================

fn vat_rate(prev: Money, curr: Money, mode: TaxMode, floor: Money) -> (Money, String) {
    let out = compute_vat_rate(&VatRateInput {
        prev_cum_gross: prev,
        curr_cum_gross: curr,
        tax_mode: mode,
        configured_floor: floor,
    })
    .unwrap();
    (out.result.rate, out.result.rate_label)
}

#[test]
fn test_vat_tiers_follow_prior_cumulative() {
    let usn = TaxMode::UsnIncome;

    // Below every threshold the configured floor stands
    assert_eq!(vat_rate(Money::ZERO, dec!(1_000_000), usn, Money::ZERO).0, Money::ZERO);

    // Tiers look at the cumulative before the month, not including it
    assert_eq!(vat_rate(dec!(50_000_000), dec!(70_000_000), usn, Money::ZERO).0, Money::ZERO);
    assert_eq!(
        vat_rate(dec!(61_000_000), dec!(70_000_000), usn, Money::ZERO),
        (dec!(5), "5%".to_string())
    );
    assert_eq!(vat_rate(dec!(251_000_000), dec!(260_000_000), usn, Money::ZERO).0, dec!(7));

    // Crossing the УСН ceiling switches to the general rate within the month
    assert_eq!(vat_rate(dec!(100_000), dec!(451_000_000), usn, Money::ZERO).0, dec!(20));
    assert_eq!(vat_rate(Money::ZERO, dec!(1_000_000), TaxMode::Osno, Money::ZERO).0, dec!(20));

    // A floor above the tier wins
    assert_eq!(vat_rate(dec!(61_000_000), dec!(70_000_000), usn, dec!(20)).0, dec!(20));
}

// ===========================================================================
// Progressive НДФЛ
// ===========================================================================

#[test]
fn test_ndfl_top_bracket_anchor() {
    let out = compute_ndfl(&NdflInput {
        cumulative_base: dec!(60_000_000),
    })
    .unwrap();
    assert_eq!(out.result.cumulative_tax, dec!(11_602_000));
    assert_eq!(out.result.effective_rate, dec!(19.34));
    assert_eq!(out.result.marginal_rate, dec!(22));
}

#[test]
fn test_ndfl_rejects_negative_base() {
    let err = compute_ndfl(&NdflInput {
        cumulative_base: dec!(-1),
    })
    .unwrap_err();
    match err {
        FinmodelError::InvalidInput { field, .. } => assert_eq!(field, "cumulative_base"),
        other => panic!("unexpected error: {other}"),
    }
}
