// src/numeric.rs

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Everything that cannot be part of a number: currency symbols, thousands
/// separators, units, whitespace.
static NON_NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.\-]").unwrap());

/// Counts how often a non-empty value fell back to 0.0 because it could not
/// be read as a number. The fallback itself is the contract; this counter
/// makes data-quality regressions visible in logs and tests.
#[derive(Debug, Default)]
pub struct NumericStats {
    fallbacks: AtomicU64,
}

impl NumericStats {
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

/// Coerce an untyped extraction value into a finite float.
///
/// Upstream extraction is unreliable: amounts arrive as numbers, strings with
/// currency symbols and thousands separators, placeholders like "N/A", or not
/// at all. Absent/falsy input and anything unparseable map to 0.0. Never
/// panics, never returns NaN or an infinity.
pub fn normalize_number(value: &Value) -> f64 {
    parse_value(value).unwrap_or(0.0)
}

/// Same as [`normalize_number`], but records a [`NumericStats`] fallback when
/// a value that *looked* like data (non-null, non-empty) still parsed to
/// nothing.
pub fn normalize_counted(value: &Value, stats: &NumericStats) -> f64 {
    match parse_value(value) {
        Some(n) => n,
        None => {
            if !is_vacant(value) {
                stats.record_fallback();
            }
            0.0
        }
    }
}

fn parse_value(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Bool(_) => None,
        Value::Number(n) => {
            let f = n.as_f64()?;
            f.is_finite().then_some(f)
        }
        Value::String(s) => {
            let stripped = NON_NUMERIC.replace_all(s, "");
            let f = stripped.parse::<f64>().ok()?;
            f.is_finite().then_some(f)
        }
        // Arrays and objects never carry a usable scalar
        _ => None,
    }
}

/// True when there was nothing to parse in the first place: absent or falsy
/// inputs map to 0.0 by contract, not as an anomaly.
fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
