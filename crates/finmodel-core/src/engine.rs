//! Planned-indicators consolidation engine.
//!
//! Takes storefront economics rows plus the reference sheets (organization
//! settings, payroll, other expenses) and produces the monthly planned rows
//! of the financial model: VAT split, management and tax-basis EBITDA, and
//! the tax of each organization under its effective regime. Organizations in
//! the consolidated group pool their revenue for VAT tiering, their УСН
//! deduction and their ОСНО cumulative bases; the pooled ОСНО tax lands on
//! a single row per month.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::{debug, info};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    aggregate_rows, full_cogs, reconcile_cost_base, EconomicsRow, MonthlyAggregate,
};
use crate::apportion::apportion;
use crate::config::{
    aggregate_other_expenses, aggregate_payroll, resolve_org_configs, OrgConfigEntry,
    OrganizationConfig, OtherExpenseEntry, PayrollEntry, PayrollFigures,
};
use crate::error::FinmodelError;
use crate::ndfl::ndfl_progressive;
use crate::types::{
    round_money, with_metadata, ComputationOutput, Money, Month, OrgKind, Rate, TaxMode,
};
use crate::vat::{select_vat_rate, USN_REVENUE_CEILING};
use crate::FinmodelResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Scope key under which consolidated organizations pool their bases
const CONSOLIDATED_KEY: &str = "consolidated";

/// Corporate profit tax rate under ОСНО from 2025
const CORPORATE_PROFIT_RATE: Decimal = dec!(0.25);

/// Minimum УСН Доходы-Расходы tax as a share of revenue net of VAT
const MINIMUM_TAX_RATE: Decimal = dec!(0.01);

/// Social contributions offset at most this share of the raw УСН Доходы tax
const DEDUCTION_CAP_SHARE: Decimal = dec!(0.5);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything the engine needs for one planning year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedIndicatorsInput {
    /// Storefront economics rows, one per cabinet-month
    pub rows: Vec<EconomicsRow>,
    /// Organization reference sheet
    pub organizations: Vec<OrgConfigEntry>,
    #[serde(default)]
    pub payroll: Vec<PayrollEntry>,
    #[serde(default)]
    pub other_expenses: Vec<OtherExpenseEntry>,
}

/// One emitted row of the planned-indicators report. All money figures are
/// rounded to whole rubles at emission; rate columns carry display labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRow {
    pub org: String,
    pub month: Month,
    pub revenue: Money,
    /// Cumulative gross revenue of the organization's consolidation scope
    pub revenue_cum: Money,
    /// Cumulative gross revenue of all organizations together
    pub revenue_cum_total: Money,
    pub revenue_net: Money,
    pub vat_amount: Money,
    pub vat_rate: String,
    pub cost_gross: Money,
    /// Reconciled VAT-free cost base
    pub cost_net: Money,
    /// Tax-deductible COGS, VAT included
    pub cost_tax: Money,
    pub mp_expense_gross: Money,
    pub mp_expense_net: Money,
    pub payroll: Money,
    pub contributions: Money,
    pub other_expenses: Money,
    pub ebitda: Money,
    pub ebitda_tax: Money,
    /// Cumulative management EBITDA of the organization
    pub ebitda_cum: Money,
    /// Management EBITDA of all organizations in this month
    pub ebitda_month_total: Money,
    /// Cumulative tax-basis EBITDA of the consolidation scope
    pub ebitda_tax_cum: Money,
    /// Effective regime for the month
    pub tax_mode: TaxMode,
    pub tax_rate: String,
    pub tax: Money,
    pub net_profit: Money,
}

/// Totals across the produced rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSummary {
    pub organization_count: usize,
    pub month_count: usize,
    pub row_count: usize,
    pub dropped_rows: usize,
    pub total_revenue: Money,
    pub total_vat: Money,
    pub total_ebitda: Money,
    pub total_tax: Money,
    pub total_net_profit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedIndicators {
    pub rows: Vec<PlannedRow>,
    pub summary: PlannedSummary,
}

/// Carried cumulative state of the tax computation, keyed by consolidation
/// scope: the shared pool key for consolidated organizations, otherwise the
/// organization's own name.
#[derive(Debug, Default)]
struct TaxEngineState {
    /// First month in which a scope crossed the УСН revenue ceiling.
    /// Revocation is permanent for the rest of the planning year.
    usn_revoked_from: BTreeMap<String, Month>,
    /// Effective regime the scope showed in the last processed month
    last_mode: BTreeMap<String, TaxMode>,
    /// Scopes whose ОСНО cumulative bases have been opened
    osno_opened: BTreeSet<String>,
    /// Cumulative НДФЛ base per sole-proprietor scope
    ndfl_base: BTreeMap<String, Money>,
    /// High-water mark of the НДФЛ base that has already been taxed
    ndfl_peak: BTreeMap<String, Money>,
    /// Cumulative profit base per company scope
    profit_base: BTreeMap<String, Money>,
    /// Cumulative raw УСН Доходы tax of the consolidated scope
    usn_raw_cum: BTreeMap<String, Money>,
    /// Cumulative contributions of the consolidated scope
    usn_esn_cum: BTreeMap<String, Money>,
    /// Deduction already granted against the raw УСН tax
    usn_deduction_consumed: BTreeMap<String, i64>,
}

impl TaxEngineState {
    /// Opens the ОСНО cumulative bases when a scope first enters the general
    /// regime from a different one. A scope cannot leave ОСНО within the
    /// planning year, so the bases are opened at most once and a mixed-mode
    /// group does not wipe them again in later months.
    fn enter_osno(&mut self, scope: &str) {
        let prior = self.last_mode.get(scope).copied();
        if prior != Some(TaxMode::Osno) && !self.osno_opened.contains(scope) {
            self.ndfl_base.insert(scope.to_string(), Money::ZERO);
            self.ndfl_peak.insert(scope.to_string(), Money::ZERO);
            self.profit_base.insert(scope.to_string(), Money::ZERO);
            debug!("[TAX] scope {scope}: entering ОСНО, cumulative bases opened");
        }
        self.osno_opened.insert(scope.to_string());
    }
}

/// One organization-month after enrichment, before tax finalization
struct EnrichedRow {
    org: String,
    month: Month,
    scope: String,
    cfg: OrganizationConfig,
    mode: TaxMode,
    revenue: Money,
    revenue_cum: Money,
    revenue_net: Money,
    vat_amount: Money,
    vat_rate: Rate,
    cost_gross: Money,
    cost_base: Money,
    cost_tax: Money,
    mp_gross: Money,
    mp_net: Money,
    fot: Money,
    esn: Money,
    other: Money,
    ebitda: Money,
    ebitda_tax: Money,
    ebitda_cum: Money,
    ebitda_tax_cum: Money,
    usn_raw_tax: Money,
    usn_deduction: Money,
    forced_minimum: bool,
    tax: Money,
    tax_rate_label: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Computes the planned-indicators report for one planning year.
pub fn compute_planned_indicators(
    input: &PlannedIndicatorsInput,
) -> FinmodelResult<ComputationOutput<PlannedIndicators>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if input.organizations.is_empty() {
        return Err(FinmodelError::MissingInput {
            field: "organizations".to_string(),
        });
    }
    let configs = resolve_org_configs(&input.organizations, &mut warnings)?;
    let payroll = aggregate_payroll(&input.payroll);
    let other = aggregate_other_expenses(&input.other_expenses);

    let grouped = aggregate_rows(&input.rows, &mut warnings);
    if grouped.aggregates.is_empty() {
        return Err(FinmodelError::InsufficientData(
            "no usable economics rows after filtering".to_string(),
        ));
    }
    info!(
        "[PLAN] {} economics rows grouped into {} org-month aggregates, {} dropped",
        input.rows.len(),
        grouped.aggregates.len(),
        grouped.dropped_rows
    );

    let mut unknown_orgs: BTreeSet<String> = BTreeSet::new();
    for agg in &grouped.aggregates {
        if !configs.contains_key(&agg.org) {
            unknown_orgs.insert(agg.org.clone());
        }
    }
    for org in &unknown_orgs {
        warnings.push(format!(
            "{org} has no reference entry; assuming ОСНО outside the consolidated group"
        ));
    }

    // Monthly gross revenue: whole model and consolidated group
    let months: BTreeSet<Month> = grouped.aggregates.iter().map(|a| a.month).collect();
    let mut total_by_month: BTreeMap<Month, Money> = BTreeMap::new();
    let mut group_by_month: BTreeMap<Month, Money> = BTreeMap::new();
    for agg in &grouped.aggregates {
        *total_by_month.entry(agg.month).or_insert(Money::ZERO) += agg.revenue;
        let consolidated = configs.get(&agg.org).map(|c| c.consolidation).unwrap_or(false);
        if consolidated {
            *group_by_month.entry(agg.month).or_insert(Money::ZERO) += agg.revenue;
        }
    }
    let total_cum = cumulative_by_month(&months, &total_by_month);
    let group_cum = cumulative_by_month(&months, &group_by_month);

    // VAT tier schedule of the consolidated group. The group counts as ОСНО
    // if any member is nominally on the general regime.
    let any_osno = configs
        .values()
        .any(|c| c.consolidation && c.tax_mode == TaxMode::Osno);
    let group_mode = if any_osno {
        TaxMode::Osno
    } else {
        TaxMode::UsnIncome
    };
    let mut group_tier: BTreeMap<Month, Rate> = BTreeMap::new();
    let mut prev_group = Money::ZERO;
    for &m in &months {
        let curr = group_cum[&m];
        let tier = select_vat_rate(prev_group, curr, group_mode, Rate::ZERO);
        debug!("[NDS] month {m}: group prev={prev_group} curr={curr} tier={tier}%");
        group_tier.insert(m, tier);
        prev_group = curr;
    }

    let mut state = TaxEngineState::default();
    let mut enriched = enrich_rows(
        &grouped.aggregates,
        &configs,
        &payroll,
        &other,
        &months,
        &group_cum,
        &group_tier,
        &mut state,
        &mut warnings,
    );

    apply_minimum_tax_gate(&mut enriched, &mut warnings);
    schedule_consolidated_deduction(&mut enriched, &mut state);
    finalize_taxes(&mut enriched, &mut state);

    // Emission: round everything once, attach the month-level totals
    let mut ebitda_month_total: BTreeMap<Month, Money> = BTreeMap::new();
    for row in &enriched {
        *ebitda_month_total.entry(row.month).or_insert(Money::ZERO) += row.ebitda;
    }
    let mut rows_out = Vec::with_capacity(enriched.len());
    for row in &enriched {
        let net_profit = round_money(row.ebitda - row.tax);
        rows_out.push(PlannedRow {
            org: row.org.clone(),
            month: row.month,
            revenue: round_money(row.revenue),
            revenue_cum: round_money(row.revenue_cum),
            revenue_cum_total: round_money(total_cum[&row.month]),
            revenue_net: round_money(row.revenue_net),
            vat_amount: round_money(row.vat_amount),
            vat_rate: format!("{}%", row.vat_rate.round()),
            cost_gross: round_money(row.cost_gross),
            cost_net: round_money(row.cost_base),
            cost_tax: round_money(row.cost_tax),
            mp_expense_gross: round_money(row.mp_gross),
            mp_expense_net: round_money(row.mp_net),
            payroll: round_money(row.fot),
            contributions: round_money(row.esn),
            other_expenses: round_money(row.other),
            ebitda: round_money(row.ebitda),
            ebitda_tax: round_money(row.ebitda_tax),
            ebitda_cum: round_money(row.ebitda_cum),
            ebitda_month_total: round_money(ebitda_month_total[&row.month]),
            ebitda_tax_cum: round_money(row.ebitda_tax_cum),
            tax_mode: row.mode,
            tax_rate: row.tax_rate_label.clone(),
            tax: row.tax,
            net_profit,
        });
    }

    let organization_count = enriched
        .iter()
        .map(|r| r.org.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let summary = PlannedSummary {
        organization_count,
        month_count: months.len(),
        row_count: rows_out.len(),
        dropped_rows: grouped.dropped_rows,
        total_revenue: rows_out.iter().map(|r| r.revenue).sum(),
        total_vat: rows_out.iter().map(|r| r.vat_amount).sum(),
        total_ebitda: rows_out.iter().map(|r| r.ebitda).sum(),
        total_tax: rows_out.iter().map(|r| r.tax).sum(),
        total_net_profit: rows_out.iter().map(|r| r.net_profit).sum(),
    };
    info!(
        "[PLAN] produced {} planned rows for {} organizations over {} months",
        summary.row_count, summary.organization_count, summary.month_count
    );

    let assumptions = serde_json::json!({
        "usn_revenue_ceiling": USN_REVENUE_CEILING.to_string(),
        "vat_tiering_basis": "cumulative gross revenue before the current month",
        "corporate_profit_rate": CORPORATE_PROFIT_RATE.to_string(),
        "minimum_tax_rate": MINIMUM_TAX_RATE.to_string(),
        "deduction_cap_share": DEDUCTION_CAP_SHARE.to_string(),
        "rounding": "whole rubles, midpoint to even",
    });
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Consolidated planned-indicators projection across УСН and ОСНО regimes",
        &assumptions,
        warnings,
        elapsed,
        PlannedIndicators {
            rows: rows_out,
            summary,
        },
    ))
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Resolves VAT, cost bases and both EBITDA figures for every
/// organization-month, tracking scope revenue for the ceiling crossover.
#[allow(clippy::too_many_arguments)]
fn enrich_rows(
    aggregates: &[MonthlyAggregate],
    configs: &BTreeMap<String, OrganizationConfig>,
    payroll: &BTreeMap<String, PayrollFigures>,
    other: &BTreeMap<String, Money>,
    months: &BTreeSet<Month>,
    group_cum: &BTreeMap<Month, Money>,
    group_tier: &BTreeMap<Month, Rate>,
    state: &mut TaxEngineState,
    warnings: &mut Vec<String>,
) -> Vec<EnrichedRow> {
    let mut org_prev_gross: BTreeMap<String, Money> = BTreeMap::new();
    let mut org_ebitda_cum: BTreeMap<String, Money> = BTreeMap::new();
    let mut scope_ebitda_tax_cum: BTreeMap<String, Money> = BTreeMap::new();
    let mut enriched = Vec::with_capacity(aggregates.len());

    for agg in aggregates {
        let cfg = configs.get(&agg.org).cloned().unwrap_or_default();
        let scope = if cfg.consolidation {
            CONSOLIDATED_KEY.to_string()
        } else {
            agg.org.clone()
        };

        let org_prev = *org_prev_gross.get(&agg.org).unwrap_or(&Money::ZERO);
        let (scope_prev, scope_curr) = if cfg.consolidation {
            let prior = months
                .range(..agg.month)
                .next_back()
                .map(|pm| group_cum[pm])
                .unwrap_or(Money::ZERO);
            (prior, group_cum[&agg.month])
        } else {
            (org_prev, org_prev + agg.revenue)
        };

        // Crossing the УСН ceiling revokes the simplified regime for the
        // whole scope from this month to the end of the year
        if cfg.tax_mode.is_simplified()
            && !state.usn_revoked_from.contains_key(&scope)
            && scope_curr > USN_REVENUE_CEILING
        {
            state.usn_revoked_from.insert(scope.clone(), agg.month);
            info!("[TAX] {}: УСН ceiling crossed in month {}", scope_name(&scope), agg.month);
            warnings.push(format!(
                "{} crossed the УСН revenue ceiling in month {}; ОСНО applies from then on",
                scope_name(&scope),
                agg.month
            ));
        }
        let mode = if state
            .usn_revoked_from
            .get(&scope)
            .is_some_and(|&from| agg.month >= from)
        {
            TaxMode::Osno
        } else {
            cfg.tax_mode
        };

        let tier = if cfg.consolidation {
            group_tier[&agg.month]
        } else {
            select_vat_rate(scope_prev, scope_curr, mode, cfg.vat_rate_floor)
        };
        let vat_rate = tier.max(cfg.vat_rate_floor);
        debug!(
            "[NDS] month {} {}: prev={} curr={} mode={} rate={}%",
            agg.month, agg.org, scope_prev, scope_curr, mode, vat_rate
        );

        let revenue_net = agg.revenue / (Decimal::ONE + vat_rate / dec!(100));
        let vat_amount = agg.revenue - revenue_net;

        let cost_base = reconcile_cost_base(agg.cost_net, agg.cost_gross, vat_rate);
        let cost_tax = match agg.cost_tax {
            Some(ct) => ct,
            None => full_cogs(agg.cost_tax_net.unwrap_or(cost_base), vat_rate),
        };

        let pay = payroll.get(&agg.org).cloned().unwrap_or_default();
        let oth = other.get(&agg.org).copied().unwrap_or(Money::ZERO);

        let ebitda = revenue_net - (cost_base + agg.mp_net + pay.fot + pay.esn + oth);
        let ebitda_tax =
            revenue_net - (cost_tax + agg.mp_gross + pay.fot_official + pay.esn + oth);

        let ebitda_cum = {
            let e = org_ebitda_cum.entry(agg.org.clone()).or_insert(Money::ZERO);
            *e += ebitda;
            *e
        };
        let ebitda_tax_cum = {
            let e = scope_ebitda_tax_cum.entry(scope.clone()).or_insert(Money::ZERO);
            *e += ebitda_tax;
            *e
        };
        org_prev_gross.insert(agg.org.clone(), org_prev + agg.revenue);

        enriched.push(EnrichedRow {
            org: agg.org.clone(),
            month: agg.month,
            scope,
            cfg,
            mode,
            revenue: agg.revenue,
            revenue_cum: scope_curr,
            revenue_net,
            vat_amount,
            vat_rate,
            cost_gross: agg.cost_gross,
            cost_base,
            cost_tax,
            mp_gross: agg.mp_gross,
            mp_net: agg.mp_net,
            fot: pay.fot,
            esn: pay.esn,
            other: oth,
            ebitda,
            ebitda_tax,
            ebitda_cum,
            ebitda_tax_cum,
            usn_raw_tax: Money::ZERO,
            usn_deduction: Money::ZERO,
            forced_minimum: false,
            tax: Money::ZERO,
            tax_rate_label: String::new(),
        });
    }
    enriched
}

// ---------------------------------------------------------------------------
// УСН Доходы-Расходы minimum gate
// ---------------------------------------------------------------------------

/// Marks Доходы-Расходы scopes whose annual tax at the nominal rate falls
/// below the 1%-of-revenue minimum. Such scopes pay the minimum in every
/// month instead.
fn apply_minimum_tax_gate(enriched: &mut [EnrichedRow], warnings: &mut Vec<String>) {
    let mut scopes: BTreeMap<String, (Money, Money, Rate)> = BTreeMap::new();
    for row in enriched.iter() {
        if row.mode == TaxMode::UsnIncomeExpense {
            let slot = scopes
                .entry(row.scope.clone())
                .or_insert((Money::ZERO, Money::ZERO, row.cfg.usn_rate));
            slot.0 += row.revenue_net;
            slot.1 += row.ebitda_tax;
        }
    }

    let mut forced: BTreeSet<String> = BTreeSet::new();
    for (scope, (income, profit, rate)) in &scopes {
        let real = round_money((*profit).max(Money::ZERO) * *rate / dec!(100));
        let minimum = round_money(*income * MINIMUM_TAX_RATE);
        if real < minimum {
            info!(
                "[TAX] {}: minimum tax applies (nominal {real} < minimum {minimum})",
                scope_name(scope)
            );
            warnings.push(format!(
                "{} pays the 1% minimum tax: nominal {real} is below minimum {minimum}",
                scope_name(scope)
            ));
            forced.insert(scope.clone());
        }
    }

    for row in enriched.iter_mut() {
        if row.mode == TaxMode::UsnIncomeExpense && forced.contains(&row.scope) {
            row.forced_minimum = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Consolidated УСН Доходы deduction schedule
// ---------------------------------------------------------------------------

/// Grants the contributions deduction to consolidated Доходы rows month by
/// month. The year-to-date grant never exceeds
/// floor(min(cumulative ЕСН, half the cumulative raw tax)); each month hands
/// out only the increment over what earlier months already consumed, split
/// across members in proportion to their raw tax.
fn schedule_consolidated_deduction(enriched: &mut [EnrichedRow], state: &mut TaxEngineState) {
    for row in enriched.iter_mut() {
        if row.mode == TaxMode::UsnIncome {
            row.usn_raw_tax =
                round_money(row.revenue_net.max(Money::ZERO) * row.cfg.usn_rate / dec!(100));
        }
    }

    let mut by_month: BTreeMap<Month, Vec<usize>> = BTreeMap::new();
    for (idx, row) in enriched.iter().enumerate() {
        if row.mode == TaxMode::UsnIncome && row.cfg.consolidation {
            by_month.entry(row.month).or_default().push(idx);
        }
    }

    for (month, indices) in &by_month {
        let month_raw: Money = indices.iter().map(|&i| enriched[i].usn_raw_tax).sum();
        let month_esn: Money = indices.iter().map(|&i| enriched[i].esn).sum();

        let raw_cum = {
            let e = state
                .usn_raw_cum
                .entry(CONSOLIDATED_KEY.to_string())
                .or_insert(Money::ZERO);
            *e += month_raw;
            *e
        };
        let esn_cum = {
            let e = state
                .usn_esn_cum
                .entry(CONSOLIDATED_KEY.to_string())
                .or_insert(Money::ZERO);
            *e += month_esn;
            *e
        };

        let cap = (raw_cum * DEDUCTION_CAP_SHARE).min(esn_cum).floor();
        let consumed = state
            .usn_deduction_consumed
            .entry(CONSOLIDATED_KEY.to_string())
            .or_insert(0);
        let increment = (cap.to_i64().unwrap_or(0) - *consumed).max(0);

        // A month with no raw tax grants nothing; the allowance carries
        // forward to the next month with a positive raw tax
        if month_raw > Money::ZERO && increment > 0 {
            let weights: Vec<Money> = indices.iter().map(|&i| enriched[i].usn_raw_tax).collect();
            let shares = apportion(increment, &weights);
            for (&i, share) in indices.iter().zip(shares) {
                enriched[i].usn_deduction = Money::from(share);
            }
            *consumed += increment;
            debug!(
                "[TAX] month {month}: consolidated deduction {increment} granted against raw {month_raw}"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tax finalization
// ---------------------------------------------------------------------------

/// Computes the tax of every row. ОСНО rows are processed in month batches
/// per scope and legal form, with the alphabetically first member carrying
/// the pooled tax; УСН rows are finalized individually.
fn finalize_taxes(enriched: &mut [EnrichedRow], state: &mut TaxEngineState) {
    let mut month_rows: BTreeMap<Month, Vec<usize>> = BTreeMap::new();
    for (idx, row) in enriched.iter().enumerate() {
        month_rows.entry(row.month).or_default().push(idx);
    }

    for (&month, indices) in &month_rows {
        let mut ip_batches: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut company_batches: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for &i in indices {
            let row = &enriched[i];
            if row.mode == TaxMode::Osno {
                match row.cfg.kind {
                    OrgKind::SoleProprietor => {
                        ip_batches.entry(row.scope.clone()).or_default().push(i)
                    }
                    OrgKind::Company => {
                        company_batches.entry(row.scope.clone()).or_default().push(i)
                    }
                }
            }
        }

        for (scope, batch) in &ip_batches {
            state.enter_osno(scope);
            let month_base: Money = batch.iter().map(|&i| enriched[i].ebitda_tax).sum();
            let cum = {
                let e = state.ndfl_base.entry(scope.clone()).or_insert(Money::ZERO);
                *e += month_base;
                *e
            };
            let peak = *state.ndfl_peak.get(scope).unwrap_or(&Money::ZERO);
            // НДФЛ is owed only on new highs of the cumulative base, so a
            // loss month pays nothing and later gains first refill the dip
            let tax_total = if cum > peak {
                state.ndfl_peak.insert(scope.clone(), cum);
                round_money(ndfl_progressive(cum) - ndfl_progressive(peak))
            } else {
                Money::ZERO
            };
            debug!(
                "[TAX] month {month} {}: НДФЛ base {cum} peak {peak} tax {tax_total}",
                scope_name(scope)
            );
            assign_batch_tax(enriched, batch, tax_total, |tax| {
                effective_rate_label(tax, month_base)
            });
        }

        for (scope, batch) in &company_batches {
            state.enter_osno(scope);
            let month_base: Money = batch.iter().map(|&i| enriched[i].ebitda_tax).sum();
            let (prev, cum) = {
                let e = state.profit_base.entry(scope.clone()).or_insert(Money::ZERO);
                let prev = *e;
                *e += month_base;
                (prev, *e)
            };
            let tax_total = if cum <= Money::ZERO {
                Money::ZERO
            } else {
                (round_money(cum.max(Money::ZERO) * CORPORATE_PROFIT_RATE)
                    - round_money(prev.max(Money::ZERO) * CORPORATE_PROFIT_RATE))
                .max(Money::ZERO)
            };
            debug!(
                "[TAX] month {month} {}: profit base {cum} prev {prev} tax {tax_total}",
                scope_name(scope)
            );
            assign_batch_tax(enriched, batch, tax_total, |_| "25%".to_string());
        }

        for &i in indices {
            let row = &mut enriched[i];
            match row.mode {
                TaxMode::UsnIncome => {
                    if !row.cfg.consolidation {
                        row.usn_deduction = row.esn.min(row.usn_raw_tax * DEDUCTION_CAP_SHARE);
                    }
                    row.tax = round_money(row.usn_raw_tax - row.usn_deduction);
                    row.tax_rate_label = format!("{}%", row.cfg.usn_rate.normalize());
                }
                TaxMode::UsnIncomeExpense => {
                    if row.forced_minimum {
                        row.tax = round_money(row.revenue_net * MINIMUM_TAX_RATE);
                        row.tax_rate_label = "1%".to_string();
                    } else {
                        let base = row.ebitda_tax.max(Money::ZERO);
                        row.tax = round_money(base * row.cfg.usn_rate / dec!(100));
                        row.tax_rate_label = effective_rate_label(row.tax, base);
                    }
                }
                // Assigned by the batch passes above
                TaxMode::Osno => {}
            }
            debug!(
                "[TAX] month {month} {}: mode {} tax {} ({})",
                row.org, row.mode, row.tax, row.tax_rate_label
            );
            state.last_mode.insert(row.scope.clone(), row.mode);
        }
    }
}

/// Puts the pooled tax on the first (alphabetically smallest) row of the
/// batch; sibling rows show zero so the group total is not double-counted.
fn assign_batch_tax(
    enriched: &mut [EnrichedRow],
    batch: &[usize],
    tax_total: Money,
    label: impl Fn(Money) -> String,
) {
    for (pos, &i) in batch.iter().enumerate() {
        if pos == 0 {
            enriched[i].tax = tax_total;
            enriched[i].tax_rate_label = label(tax_total);
        } else {
            enriched[i].tax = Money::ZERO;
            enriched[i].tax_rate_label = "0%".to_string();
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn cumulative_by_month(
    months: &BTreeSet<Month>,
    monthly: &BTreeMap<Month, Money>,
) -> BTreeMap<Month, Money> {
    let mut cumulative = BTreeMap::new();
    let mut running = Money::ZERO;
    for &m in months {
        running += monthly.get(&m).copied().unwrap_or(Money::ZERO);
        cumulative.insert(m, running);
    }
    cumulative
}

/// Effective tax rate over a monthly base, as written in the report
fn effective_rate_label(tax: Money, base: Money) -> String {
    if base > Money::ZERO {
        format!("{:.2}%", (tax / base * dec!(100)).round_dp(2))
    } else {
        "0%".to_string()
    }
}

fn scope_name(scope: &str) -> String {
    if scope == CONSOLIDATED_KEY {
        "Consolidated group".to_string()
    } else {
        scope.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
