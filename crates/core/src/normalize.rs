//! Value canonicalization used by every comparison the engine makes.
//!
//! Strings are lower-cased and trimmed; every other JSON value passes through
//! unchanged. All helpers are pure.

use serde_json::Value;

/// Canonicalize a scalar value for comparison.
///
/// Idempotent: `normalize(&normalize(v)) == normalize(v)`.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_str(s)),
        other => other.clone(),
    }
}

/// String form of [`normalize`].
pub fn normalize_str(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Compare two values after normalization.
pub fn normalized_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => normalize_str(x) == normalize_str(y),
        _ => json_eq(a, b),
    }
}

/// Raw JSON equality with numbers compared by value, as JSONB does
/// (`10` equals `10.0`). Strings are compared as-is.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

/// Whether a candidate value can take part in a match condition.
///
/// Null, blank strings, and empty arrays/objects are unpopulated.
pub fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !normalize_str(s).is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Loose truthiness: `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
