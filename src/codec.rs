/// JSON codec helpers (spec §6.4) and the cents-based float equality rule
/// used wherever the spec calls for "JSON-identical" comparison (spec §9,
/// Design Notes — Numeric equality).
use chrono::{DateTime, FixedOffset};
use serde_json::Value as JsonValue;

use crate::error::{EngineError, EngineResult};

/// The engine's wire format for date-time fields: `yyyy-MM-dd HH:mm:ss ZZZZZ`
/// with an explicit numeric offset, e.g. `2020-04-14 01:40:59 +0000`.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Format a date-time the way the engine expects it to round-trip.
pub fn format_date(dt: &DateTime<FixedOffset>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

/// Parse a date-time in the engine's wire format.
pub fn parse_date(s: &str) -> EngineResult<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, DATE_FORMAT).map_err(|e| EngineError::DateFormat(e.to_string()))
}

/// Round a raw amount to integer cents, per the Design Notes' money-equality
/// rule. Used only for comparison, never for the JSON representation itself.
pub fn money_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Recursively normalize every JSON number to cents precision so that
/// money-like floats compare stably regardless of binary floating-point
/// representation. Integers embedded as JSON numbers with no fractional part
/// are left untouched in spirit — rounding to cents is a no-op on them.
pub fn normalize_for_equality(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Number(n) => {
            if let Some(f) = n.as_f64() {
                if n.is_i64() || n.is_u64() {
                    value.clone()
                } else {
                    let cents = money_cents(f);
                    serde_json::json!(cents as f64 / 100.0)
                }
            } else {
                value.clone()
            }
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(normalize_for_equality).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_for_equality(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Two encoded JSON blobs are considered equal for idempotence purposes when
/// they parse and normalize to the same value. An empty string (meaning "not
/// applicable," e.g. the `before_json` of a create) only equals another
/// empty string.
pub fn json_blobs_equal(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    let (Ok(av), Ok(bv)) = (
        serde_json::from_str::<JsonValue>(a),
        serde_json::from_str::<JsonValue>(b),
    ) else {
        return a == b;
    };
    normalize_for_equality(&av) == normalize_for_equality(&bv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_round_trips() {
        let dt = parse_date("2020-04-14 01:40:59 +0000").unwrap();
        assert_eq!(format_date(&dt), "2020-04-14 01:40:59 +0000");
    }

    #[test]
    fn money_cents_rounds_binary_jitter() {
        assert_eq!(money_cents(1.1 + 0.5), 160);
    }

    #[test]
    fn json_blobs_equal_ignores_float_jitter() {
        let a = serde_json::json!({"budgeted": 1.1 + 0.5}).to_string();
        let b = serde_json::json!({"budgeted": 1.6}).to_string();
        assert!(json_blobs_equal(&a, &b));
    }

    #[test]
    fn json_blobs_equal_detects_real_change() {
        let a = serde_json::json!({"budgeted": 1.5}).to_string();
        let b = serde_json::json!({"budgeted": 1.6}).to_string();
        assert!(!json_blobs_equal(&a, &b));
    }

    #[test]
    fn empty_blobs_equal_only_each_other() {
        assert!(json_blobs_equal("", ""));
        assert!(!json_blobs_equal("", "{}"));
    }
}
