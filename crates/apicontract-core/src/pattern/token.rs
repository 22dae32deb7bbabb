//! Pattern tokens: `(string)`, `(Pet)`, `(Pet?)`, `(Pet*)`, `(Pet...)`
//!
//! Tokens appear in example rows, DSL steps and mock payloads. Built-in
//! type names are lower case; anything starting with an upper-case letter
//! names a registered pattern.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ListPattern, ObjectPattern, Pattern, ScalarPattern};
use crate::error::{ContractError, Result};
use crate::value::parse_literal;

/// Whether `text` is written as a pattern token.
#[must_use]
pub fn is_token(text: &str) -> bool {
    let t = text.trim();
    t.len() > 2 && t.starts_with('(') && t.ends_with(')')
}

/// Built-in pattern for a lower-case type name.
#[must_use]
pub fn builtin(name: &str) -> Option<Pattern> {
    let pattern = match name {
        "string" => Pattern::string(),
        "number" => Pattern::number(),
        "integer" | "int" => Pattern::integer(),
        "boolean" | "bool" => Pattern::boolean(),
        "email" => Pattern::Scalar(ScalarPattern::Email),
        "uuid" => Pattern::Scalar(ScalarPattern::Uuid),
        "date" => Pattern::Scalar(ScalarPattern::Date),
        "datetime" | "date-time" => Pattern::Scalar(ScalarPattern::DateTime),
        "binary" => Pattern::Scalar(ScalarPattern::Binary),
        "byte" | "base64" => Pattern::Scalar(ScalarPattern::Byte),
        "null" => Pattern::null(),
        "anyvalue" | "any" => Pattern::AnyValue,
        "object" => Pattern::Object(ObjectPattern::free_form()),
        _ => return None,
    };
    Some(pattern)
}

/// Parse one token.
///
/// # Errors
///
/// Returns [`ContractError::InvalidPatternToken`] for malformed tokens and
/// unknown lower-case type names such as `(strnig)`.
pub fn parse_token(text: &str) -> Result<Pattern> {
    let invalid = || ContractError::InvalidPatternToken(text.to_string());
    if !is_token(text) {
        return Err(invalid());
    }
    let trimmed = text.trim();
    let inner = trimmed[1..trimmed.len() - 1].trim();
    parse_type_expression(inner).ok_or_else(invalid)
}

fn parse_type_expression(expr: &str) -> Option<Pattern> {
    if let Some(element) = expr.strip_suffix("...").or_else(|| expr.strip_suffix('*')) {
        return parse_type_expression(element.trim()).map(|p| Pattern::List(ListPattern::new(p)));
    }
    if let Some(inner) = expr.strip_suffix('?') {
        return parse_type_expression(inner.trim()).map(Pattern::nullable);
    }
    if expr.is_empty() {
        return None;
    }
    if let Some(pattern) = builtin(expr) {
        return Some(pattern);
    }
    let mut chars = expr.chars();
    let first = chars.next()?;
    let identifier = first.is_ascii_uppercase()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    identifier.then(|| Pattern::deferred(expr))
}

/// Pattern for a literal written in a row, DSL step or example: tokens
/// become their patterns, JSON documents become structural patterns, and
/// anything else is an exact value.
///
/// # Errors
///
/// Returns [`ContractError::InvalidPatternToken`] for malformed tokens.
pub fn pattern_from_literal(text: &str) -> Result<Pattern> {
    if is_token(text) {
        return parse_token(text);
    }
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return pattern_from_json(&value);
        }
    }
    Ok(Pattern::Exact(parse_literal(text)))
}

/// Structural pattern for a JSON document whose string leaves may be tokens.
///
/// # Errors
///
/// Returns [`ContractError::InvalidPatternToken`] for malformed tokens.
pub fn pattern_from_json(value: &Value) -> Result<Pattern> {
    match value {
        Value::String(s) if is_token(s) => parse_token(s),
        Value::Object(map) => {
            let keys = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), pattern_from_json(v)?)))
                .collect::<Result<BTreeMap<_, _>>>()?;
            Ok(Pattern::Object(ObjectPattern::new(keys)))
        }
        Value::Array(items) => {
            let element = match items.first() {
                None => Pattern::AnyValue,
                Some(Value::String(s)) if items.len() == 1 && is_token(s) => match parse_token(s)? {
                    // ["(Pet*)"] and ["(Pet)"] both mean a list of Pet
                    Pattern::List(inner) => *inner.element,
                    other => other,
                },
                Some(first) => pattern_from_json(first)?,
            };
            Ok(Pattern::List(ListPattern::new(element)))
        }
        other => Ok(Pattern::Exact(other.clone())),
    }
}
