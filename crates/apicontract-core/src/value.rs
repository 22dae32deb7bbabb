//! Concrete values exchanged with the pattern engine
//!
//! Values are plain `serde_json::Value`s. This module adds the literal
//! conventions used by rows, query strings and headers: strings travel raw,
//! everything else travels as JSON text.

use serde_json::{Number, Value};

/// Literal/diagnostic helpers on concrete values.
pub trait ValueExt {
    /// Render as the literal used in rows, headers and query strings.
    fn to_string_literal(&self) -> String;

    /// Short type descriptor used in mismatch messages.
    fn type_name(&self) -> &'static str;

    /// Short rendering for diagnostics (long strings are elided).
    fn display_short(&self) -> String;
}

impl ValueExt for Value {
    fn to_string_literal(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn display_short(&self) -> String {
        const MAX: usize = 64;
        let rendered = self.to_string();
        if rendered.chars().count() <= MAX {
            return rendered;
        }
        let head: String = rendered.chars().take(MAX).collect();
        format!("{head}…")
    }
}

/// Parse a literal without knowing its type: `null`, booleans, numbers and
/// JSON documents are recognised, anything else is a string.
pub fn parse_literal(literal: &str) -> Value {
    let trimmed = literal.trim();
    match trimmed {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(n) = parse_number(trimmed) {
        return Value::Number(n);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
            return v;
        }
    }
    Value::String(literal.to_string())
}

/// Parse a numeric literal, keeping integers integral.
pub fn parse_number(literal: &str) -> Option<Number> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return Some(Number::from(u));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

/// Whether a number has no fractional part.
pub fn is_integral(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

/// Structural equality that treats `1` and `1.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_render_raw() {
        assert_eq!(json!("abc").to_string_literal(), "abc");
        assert_eq!(json!(10).to_string_literal(), "10");
        assert_eq!(json!({"a": 1}).to_string_literal(), r#"{"a":1}"#);
    }

    #[test]
    fn parse_literal_recognises_scalars() {
        assert_eq!(parse_literal("null"), Value::Null);
        assert_eq!(parse_literal("true"), json!(true));
        assert_eq!(parse_literal("42"), json!(42));
        assert_eq!(parse_literal("4.5"), json!(4.5));
        assert_eq!(parse_literal("hello"), json!("hello"));
        assert_eq!(parse_literal(r#"{"a":[1]}"#), json!({"a": [1]}));
    }

    #[test]
    fn integral_detection() {
        assert!(is_integral(&Number::from(3)));
        assert!(is_integral(&Number::from_f64(3.0).unwrap()));
        assert!(!is_integral(&Number::from_f64(3.5).unwrap()));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!({"a": [1]}), &json!({"a": [1.0]})));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn display_short_elides_long_values() {
        let long = Value::String("x".repeat(200));
        assert!(long.display_short().ends_with('…'));
        assert_eq!(json!(1).display_short(), "1");
    }
}
