//! Largest-remainder apportionment. Used to split a whole-ruble group figure
//! (the consolidated УСН deduction) across member organizations so the
//! member amounts always sum exactly to the group amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::Money;

/// Splits `total` across `weights` proportionally, in whole units.
///
/// Floors each proportional share, then hands the leftover units out one by
/// one in order of descending fractional remainder (ties keep input order).
/// Negative weights count as zero; when no weight is positive the split is
/// even, with earlier entries taking the odd units. A negative total is
/// apportioned by magnitude and negated.
pub fn apportion(total: i64, weights: &[Money]) -> Vec<i64> {
    if weights.is_empty() {
        return Vec::new();
    }
    if total < 0 {
        return apportion(-total, weights).into_iter().map(|s| -s).collect();
    }
    if total == 0 {
        return vec![0; weights.len()];
    }

    let clamped: Vec<Money> = weights.iter().map(|w| (*w).max(Money::ZERO)).collect();
    let weight_sum: Money = clamped.iter().copied().sum();

    if weight_sum <= Money::ZERO {
        let n = weights.len() as i64;
        let base = total / n;
        let extra = (total % n) as usize;
        return (0..weights.len())
            .map(|i| base + i64::from(i < extra))
            .collect();
    }

    let total_dec = Decimal::from(total);
    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    let mut assigned = 0i64;
    for w in &clamped {
        let ideal = total_dec * *w / weight_sum;
        let floor = ideal.floor();
        let share = floor.to_i64().unwrap_or(0);
        shares.push(share);
        remainders.push(ideal - floor);
        assigned += share;
    }

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|a, b| remainders[*b].cmp(&remainders[*a]));
    let mut leftover = total - assigned;
    for idx in order {
        if leftover == 0 {
            break;
        }
        shares[idx] += 1;
        leftover -= 1;
    }
    shares
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
