//! Lenient coercions behind the typed getters.
//!
//! Each function returns `None` when the value cannot be read as the requested
//! type; callers substitute their default.

use serde_json::Value;

/// Integer view of a value: integers, floats truncated toward zero, numeric strings.
pub fn as_long(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if n.is_u64() {
                None
            } else {
                n.as_f64().and_then(truncate_f64)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_f64))
        }
        _ => None,
    }
}

/// Like [`as_long`], but `None` outside the `i32` range.
pub fn as_int(value: &Value) -> Option<i32> {
    as_long(value).and_then(|i| i32::try_from(i).ok())
}

pub fn as_double(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Booleans, plus the strings "true" and "false" in any case.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Strings as-is; numbers and booleans rendered as their JSON text.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn truncate_f64(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return None;
    }
    Some(t as i64)
}
