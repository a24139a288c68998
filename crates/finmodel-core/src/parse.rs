//! Lenient parsers for spreadsheet-shaped cells. Planning data arrives with
//! currency signs, thousands spaces and mixed month formats; these helpers
//! normalize all of that without failing the run on a single dirty cell.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::{Money, Month};

// ---------------------------------------------------------------------------
// Cell parsers
// ---------------------------------------------------------------------------

/// Parses a money-like cell: strips currency signs, thousands spaces and
/// percent signs, converts the comma decimal separator to a dot. Returns
/// `None` when nothing numeric is left.
pub fn parse_money(raw: &str) -> Option<Money> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Parses a month label. Accepts a bare number ("3"), a month.year date
/// ("03.2024") and an ISO year-month ("2024-03"). Returns 0 for anything
/// unrecognized; callers treat months outside 1..=12 as invalid.
pub fn parse_month_str(raw: &str) -> Month {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().unwrap_or(0);
    }
    let token = if let Some((head, _)) = s.split_once('.') {
        head
    } else if let Some((_, tail)) = s.rsplit_once('-') {
        tail
    } else {
        return 0;
    };
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().unwrap_or(0)
    } else {
        0
    }
}

/// Month from a raw JSON cell. Whole numbers pass through, fractional
/// numbers are invalid, strings go through [`parse_month_str`].
pub fn parse_month(value: &Value) -> Month {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).unwrap_or(0)
            } else if let Some(f) = n.as_f64() {
                if f >= 0.0 && f.fract() == 0.0 {
                    f as Month
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => parse_month_str(s),
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Serde adapters
// ---------------------------------------------------------------------------

/// Deserializes a money field that may arrive as a number, a formatted
/// string or null. Unparseable or missing cells become zero.
pub fn de_money<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_money(deserializer)?.unwrap_or(Money::ZERO))
}

/// Like [`de_money`] but keeps "absent" distinct from zero, for fields with
/// a derivation fallback.
pub fn de_opt_money<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
        }
        Some(Value::String(s)) => parse_money(&s),
        Some(_) => None,
    })
}

/// Deserializes a month field from any of the supported cell shapes.
pub fn de_month<'de, D>(deserializer: D) -> Result<Month, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_month(&value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parses_formatted_money() {
        assert_eq!(parse_money("1 234,56 ₽"), Some(dec!(1234.56)));
        assert_eq!(parse_money("-500"), Some(dec!(-500)));
        assert_eq!(parse_money("12%"), Some(dec!(12)));
        assert_eq!(parse_money("0,06"), Some(dec!(0.06)));
    }

    #[test]
    fn test_money_junk_returns_none() {
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("   "), None);
        assert_eq!(parse_money("n/a"), None);
        assert_eq!(parse_money("1.2.3"), None);
    }

    #[test]
    fn test_month_formats_agree() {
        assert_eq!(parse_month_str("03.2024"), 3);
        assert_eq!(parse_month_str("2024-03"), 3);
        assert_eq!(parse_month_str("3"), 3);
        assert_eq!(parse_month_str("03.2024"), parse_month_str("2024-03"));
    }

    #[test]
    fn test_month_junk_returns_zero() {
        assert_eq!(parse_month_str(""), 0);
        assert_eq!(parse_month_str("март"), 0);
        assert_eq!(parse_month_str("x.2024"), 0);
    }

    #[test]
    fn test_month_from_json_cells() {
        assert_eq!(parse_month(&json!(3)), 3);
        assert_eq!(parse_month(&json!(3.0)), 3);
        assert_eq!(parse_month(&json!(3.5)), 0);
        assert_eq!(parse_month(&json!("03.2024")), 3);
        assert_eq!(parse_month(&json!(null)), 0);
        assert_eq!(parse_month(&json!(-2)), 0);
    }

    #[test]
    fn test_money_from_json_number_keeps_textual_value() {
        #[derive(serde::Deserialize)]
        struct Cell {
            #[serde(deserialize_with = "de_money")]
            v: Money,
        }
        let c: Cell = serde_json::from_value(json!({ "v": 1234.56 })).unwrap();
        assert_eq!(c.v, dec!(1234.56));
        let c: Cell = serde_json::from_value(json!({ "v": "1 000" })).unwrap();
        assert_eq!(c.v, dec!(1000));
        let c: Cell = serde_json::from_value(json!({ "v": null })).unwrap();
        assert_eq!(c.v, Money::ZERO);
    }
}
