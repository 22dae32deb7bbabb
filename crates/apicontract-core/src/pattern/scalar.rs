//! Scalar patterns: strings and their formats, numbers, booleans

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rand::Rng;
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::LazyLock;
use tracing::warn;

use crate::constraints::NumericBounds;
use crate::error::{ContractError, Result};
use crate::result::{Failure, MatchResult, MismatchKind};
use crate::value::{ValueExt, is_integral, parse_number};

/// Length used for strings with no (or loose) length bounds.
const DEFAULT_STRING_LENGTH: usize = 5;

/// Span used when a number is bounded on one side only.
const DEFAULT_NUMBER_SPAN: f64 = 1000.0;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex is valid")
});

/// Compiled regex that compares by source text.
#[derive(Debug, Clone)]
pub struct PatternRegex(Regex);

impl PatternRegex {
    /// # Errors
    ///
    /// Returns the regex error for sources the `regex` crate rejects
    /// (lookaround, backreferences).
    pub fn new(source: &str) -> std::result::Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for PatternRegex {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringPattern {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub regex: Option<PatternRegex>,
}

impl StringPattern {
    fn target_length(&self) -> usize {
        match (self.min_length, self.max_length) {
            (None, None) => DEFAULT_STRING_LENGTH,
            (Some(min), None) => min,
            (None, Some(max)) => DEFAULT_STRING_LENGTH.min(max),
            (Some(min), Some(max)) => DEFAULT_STRING_LENGTH.max(min).min(max),
        }
    }

    fn length_ok(&self, len: usize) -> bool {
        self.min_length.is_none_or(|m| len >= m) && self.max_length.is_none_or(|m| len <= m)
    }

    fn check(&self, text: &str) -> Option<Failure> {
        let len = text.chars().count();
        if let Some(min) = self.min_length.filter(|m| len < *m) {
            return Some(Failure::new(
                MismatchKind::ConstraintViolation,
                format!("Expected string with minLength {min}, actual length was {len}"),
            ));
        }
        if let Some(max) = self.max_length.filter(|m| len > *m) {
            return Some(Failure::new(
                MismatchKind::ConstraintViolation,
                format!("Expected string with maxLength {max}, actual length was {len}"),
            ));
        }
        if let Some(regex) = self.regex.as_ref().filter(|r| !r.is_match(text)) {
            return Some(Failure::new(
                MismatchKind::ConstraintViolation,
                format!("Expected string matching /{}/, actual was {text:?}", regex.as_str()),
            ));
        }
        None
    }

    fn generate(&self, rng: &mut impl Rng) -> String {
        let len = self.target_length();
        let Some(regex) = &self.regex else {
            return random_alnum(rng, len);
        };
        let candidates = [
            random_alnum(rng, len),
            random_from(rng, len, b"0123456789"),
            random_from(rng, len, b"abcdefghijklmnopqrstuvwxyz"),
            random_from(rng, len, b"ABCDEFGHIJKLMNOPQRSTUVWXYZ"),
        ];
        if let Some(hit) = candidates
            .iter()
            .find(|c| regex.is_match(c) && self.length_ok(c.chars().count()))
        {
            return hit.clone();
        }
        warn!(regex = regex.as_str(), "no generated candidate satisfies the regex");
        candidates[0].clone()
    }

    /// The narrower pattern accepts a subset of what `self` accepts.
    fn encompasses(&self, other: &StringPattern) -> bool {
        let min_ok = self
            .min_length
            .is_none_or(|m| other.min_length.is_some_and(|o| o >= m));
        let max_ok = self
            .max_length
            .is_none_or(|m| other.max_length.is_some_and(|o| o <= m));
        let regex_ok = self.regex.is_none() || self.regex == other.regex;
        min_ok && max_ok && regex_ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberPattern {
    pub bounds: NumericBounds,
    pub integer: bool,
}

impl NumberPattern {
    #[must_use]
    pub fn integer() -> Self {
        Self {
            integer: true,
            ..Self::default()
        }
    }

    fn check(&self, n: &Number) -> Option<Failure> {
        if self.integer && !is_integral(n) {
            return Some(Failure::new(
                MismatchKind::TypeMismatch,
                format!("Expected integer, actual was {n} (number)"),
            ));
        }
        let f = n.as_f64()?;
        let b = &self.bounds;
        if let Some(min) = b.minimum {
            let below = if b.exclusive_minimum { f <= min } else { f < min };
            if below {
                let op = if b.exclusive_minimum { ">" } else { ">=" };
                return Some(Failure::new(
                    MismatchKind::ConstraintViolation,
                    format!("Expected number {op} {}, actual was {n}", fmt_number(min)),
                ));
            }
        }
        if let Some(max) = b.maximum {
            let above = if b.exclusive_maximum { f >= max } else { f > max };
            if above {
                let op = if b.exclusive_maximum { "<" } else { "<=" };
                return Some(Failure::new(
                    MismatchKind::ConstraintViolation,
                    format!("Expected number {op} {}, actual was {n}", fmt_number(max)),
                ));
            }
        }
        None
    }

    /// Inclusive range values are drawn from.
    fn range(&self) -> (f64, f64) {
        let lo = self.bounds.effective_min();
        let hi = self.bounds.effective_max();
        match (lo, hi) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo + DEFAULT_NUMBER_SPAN),
            (None, Some(hi)) => (hi - DEFAULT_NUMBER_SPAN, hi),
            (None, None) => (1.0, DEFAULT_NUMBER_SPAN),
        }
    }

    fn generate(&self, rng: &mut impl Rng) -> Value {
        let (lo, hi) = self.range();
        let (int_lo, int_hi) = (lo.ceil(), hi.floor());
        if int_lo <= int_hi {
            let picked = if int_lo == int_hi {
                int_lo
            } else {
                rng.gen_range(int_lo..=int_hi).round()
            };
            return number_value(picked);
        }
        if self.integer {
            warn!(minimum = lo, maximum = hi, "integer range holds no integer; using the nearest one");
            return number_value(lo.round());
        }
        number_value((self.bounds.minimum.unwrap_or(lo) + self.bounds.maximum.unwrap_or(hi)) / 2.0)
    }

    fn encompasses(&self, other: &NumberPattern) -> bool {
        if self.integer && !other.integer {
            return false;
        }
        let (a, b) = (&self.bounds, &other.bounds);
        let min_ok = match (a.minimum, b.minimum) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(x), Some(y)) => y > x || (y == x && (!a.exclusive_minimum || b.exclusive_minimum)),
        };
        let max_ok = match (a.maximum, b.maximum) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(x), Some(y)) => y < x || (y == x && (!a.exclusive_maximum || b.exclusive_maximum)),
        };
        min_ok && max_ok
    }
}

/// Leaf patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarPattern {
    String(StringPattern),
    Email,
    Uuid,
    Date,
    DateTime,
    /// Raw bytes; any string on the JSON level
    Binary,
    /// Base64-encoded bytes
    Byte,
    Number(NumberPattern),
    Boolean,
}

impl ScalarPattern {
    #[must_use]
    pub fn string() -> Self {
        Self::String(StringPattern::default())
    }

    #[must_use]
    pub fn number() -> Self {
        Self::Number(NumberPattern::default())
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::Number(NumberPattern::integer())
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Binary => "binary",
            Self::Byte => "byte",
            Self::Number(n) if n.integer => "integer",
            Self::Number(_) => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Whether values of this pattern are JSON strings.
    #[must_use]
    pub fn is_string_like(&self) -> bool {
        !matches!(self, Self::Number(_) | Self::Boolean)
    }

    pub fn matches(&self, value: &Value) -> MatchResult {
        let failure = match (self, value) {
            (Self::String(s), Value::String(text)) => s.check(text),
            (Self::Email, Value::String(text)) => (!EMAIL.is_match(text))
                .then(|| format_mismatch("email", text)),
            (Self::Uuid, Value::String(text)) => uuid::Uuid::parse_str(text)
                .is_err()
                .then(|| format_mismatch("uuid", text)),
            (Self::Date, Value::String(text)) => parse_date(text)
                .is_none()
                .then(|| format_mismatch("date (YYYY-MM-DD)", text)),
            (Self::DateTime, Value::String(text)) => DateTime::parse_from_rfc3339(text)
                .is_err()
                .then(|| format_mismatch("RFC 3339 date-time", text)),
            (Self::Byte, Value::String(text)) => Base64
                .decode(text)
                .is_err()
                .then(|| format_mismatch("base64", text)),
            (Self::Binary, Value::String(_)) => None,
            (Self::Number(n), Value::Number(actual)) => n.check(actual),
            (Self::Boolean, Value::Bool(_)) => None,
            (pattern, actual) => Some(Failure::type_mismatch(pattern.type_name(), actual)),
        };
        failure.map_or(MatchResult::Success, MatchResult::failure)
    }

    pub fn generate(&self, rng: &mut impl Rng) -> Value {
        match self {
            Self::String(s) => Value::String(s.generate(rng)),
            Self::Email => Value::String(format!("user{}@example.com", rng.gen_range(1..9999_u32))),
            Self::Uuid => Value::String(
                uuid::Builder::from_random_bytes(rng.r#gen())
                    .into_uuid()
                    .to_string(),
            ),
            Self::Date => Value::String(random_date(rng)),
            Self::DateTime => Value::String(random_datetime(rng)),
            Self::Binary => Value::String(random_alnum(rng, DEFAULT_STRING_LENGTH)),
            Self::Byte => {
                let bytes: [u8; 6] = rng.r#gen();
                Value::String(Base64.encode(bytes))
            }
            Self::Number(n) => n.generate(rng),
            Self::Boolean => Value::Bool(rng.gen_bool(0.5)),
        }
    }

    /// Parse a literal (row value, header, query parameter) as this type.
    ///
    /// Only the type is checked here; bounds are checked by [`Self::matches`].
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Parse`] when the literal is not of this type.
    pub fn parse(&self, literal: &str) -> Result<Value> {
        let parsed = match self {
            Self::Number(n) => parse_number(literal)
                .filter(|num| !n.integer || is_integral(num))
                .map(Value::Number),
            Self::Boolean => match literal.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::String(_) | Self::Binary => Some(Value::String(literal.to_string())),
            other => {
                let candidate = Value::String(literal.to_string());
                other.matches(&candidate).is_success().then_some(candidate)
            }
        };
        parsed.ok_or_else(|| ContractError::parse("", literal, self.type_name()))
    }

    /// Whether every value of `other` is also a value of `self`.
    #[must_use]
    pub fn encompasses(&self, other: &ScalarPattern) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.encompasses(b),
            (Self::String(a), b) if b.is_string_like() => *a == StringPattern::default(),
            (Self::Number(a), Self::Number(b)) => a.encompasses(b),
            (a, b) => a == b,
        }
    }

    /// Legal values at the edges of the declared bounds.
    #[must_use]
    pub fn boundary_values(&self) -> Vec<(Value, String)> {
        match self {
            Self::String(s) if s.regex.is_none() => {
                let mut out = Vec::new();
                if let Some(min) = s.min_length {
                    out.push((Value::String("a".repeat(min)), format!("length at minLength {min}")));
                }
                if let Some(max) = s.max_length.filter(|m| Some(*m) != s.min_length) {
                    out.push((Value::String("a".repeat(max)), format!("length at maxLength {max}")));
                }
                out
            }
            Self::Number(n) => {
                let (lo, hi) = n.range();
                let mut out = Vec::new();
                if n.bounds.minimum.is_some() {
                    out.push((number_value(lo.ceil()), format!("value at minimum {}", fmt_number(lo))));
                }
                if n.bounds.maximum.is_some() && hi.floor() != lo.ceil() {
                    out.push((number_value(hi.floor()), format!("value at maximum {}", fmt_number(hi))));
                }
                out.retain(|(v, _)| self.matches(v).is_success());
                out
            }
            _ => Vec::new(),
        }
    }

    /// Values that violate this pattern's type, format or bounds.
    #[must_use]
    pub fn negative_values(&self) -> Vec<(Value, String)> {
        let name = self.type_name();
        let mut out = Vec::new();
        match self {
            Self::String(s) => {
                if let Some(min) = s.min_length {
                    out.push((
                        Value::String("a".repeat(min.saturating_sub(1))),
                        format!("{name} shorter than minLength {min}"),
                    ));
                }
                if let Some(max) = s.max_length {
                    out.push((
                        Value::String("a".repeat(max + 1)),
                        format!("{name} longer than maxLength {max}"),
                    ));
                }
            }
            Self::Email | Self::Uuid | Self::Date | Self::DateTime | Self::Byte => {
                out.push((
                    Value::String(format!("not-a-{name}!")),
                    format!("{name} mutated to an invalid format"),
                ));
            }
            Self::Number(n) => {
                let (lo, hi) = n.range();
                if n.bounds.minimum.is_some() {
                    out.push((number_value(lo.ceil() - 1.0), format!("{name} below minimum")));
                }
                if n.bounds.maximum.is_some() {
                    out.push((number_value(hi.floor() + 1.0), format!("{name} above maximum")));
                }
                if n.integer {
                    out.push((number_value(lo.ceil() + 0.5), format!("{name} mutated to a fraction")));
                }
            }
            Self::Binary | Self::Boolean => {}
        }
        if self.is_string_like() {
            out.push((Value::from(12345), format!("{name} mutated to number")));
            out.push((Value::Bool(true), format!("{name} mutated to boolean")));
        } else {
            out.push((Value::String("abc".into()), format!("{name} mutated to string")));
            if matches!(self, Self::Boolean) {
                out.push((Value::from(1), format!("{name} mutated to number")));
            } else {
                out.push((Value::Bool(true), format!("{name} mutated to boolean")));
            }
        }
        out.push((Value::Null, format!("{name} mutated to null")));
        out.retain(|(v, _)| !self.matches(v).is_success());
        out
    }
}

fn format_mismatch(expected: &str, text: &str) -> Failure {
    let actual = Value::String(text.to_string());
    Failure::new(
        MismatchKind::TypeMismatch,
        format!("Expected {expected}, actual was {}", actual.display_short()),
    )
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn random_date(rng: &mut impl Rng) -> String {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|start| start.checked_add_days(chrono::Days::new(rng.gen_range(0..730))))
        .map_or_else(|| "2024-01-15".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn random_datetime(rng: &mut impl Rng) -> String {
    // 2024-01-01T00:00:00Z plus up to two years
    let secs = 1_704_067_200 + rng.gen_range(0..63_072_000_i64);
    DateTime::<Utc>::from_timestamp(secs, 0).map_or_else(
        || "2024-01-15T12:00:00Z".to_string(),
        |dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

fn random_alnum(rng: &mut impl Rng, len: usize) -> String {
    random_from(
        rng,
        len,
        b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789",
    )
}

fn random_from(rng: &mut impl Rng, len: usize, charset: &[u8]) -> String {
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

/// Integral floats become JSON integers.
pub(crate) fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

fn fmt_number(f: f64) -> String {
    number_value(f).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;

    fn bounded_string(min: Option<usize>, max: Option<usize>) -> ScalarPattern {
        ScalarPattern::String(StringPattern {
            min_length: min,
            max_length: max,
            regex: None,
        })
    }

    fn bounded_integer(min: Option<f64>, max: Option<f64>) -> ScalarPattern {
        ScalarPattern::Number(NumberPattern {
            bounds: NumericBounds {
                minimum: min,
                maximum: max,
                ..NumericBounds::default()
            },
            integer: true,
        })
    }

    fn all_formats() -> Vec<ScalarPattern> {
        vec![
            ScalarPattern::string(),
            bounded_string(Some(3), Some(8)),
            ScalarPattern::Email,
            ScalarPattern::Uuid,
            ScalarPattern::Date,
            ScalarPattern::DateTime,
            ScalarPattern::Binary,
            ScalarPattern::Byte,
            ScalarPattern::number(),
            ScalarPattern::integer(),
            bounded_integer(Some(-5.0), Some(5.0)),
            ScalarPattern::Boolean,
        ]
    }

    #[test]
    fn string_length_rules() {
        let mut rng = SmallRng::seed_from_u64(1);
        let len = |p: &ScalarPattern, rng: &mut SmallRng| {
            p.generate(rng).as_str().map(|s| s.len()).unwrap_or_default()
        };
        assert_eq!(len(&ScalarPattern::string(), &mut rng), 5);
        assert_eq!(len(&bounded_string(Some(9), None), &mut rng), 9);
        assert_eq!(len(&bounded_string(None, Some(3)), &mut rng), 3);
        assert_eq!(len(&bounded_string(Some(2), Some(4)), &mut rng), 4);
    }

    #[test]
    fn string_constraints_are_checked() {
        let p = bounded_string(Some(2), Some(3));
        assert!(p.matches(&json!("ab")).is_success());
        assert!(!p.matches(&json!("a")).is_success());
        assert!(!p.matches(&json!("abcd")).is_success());
        assert!(!p.matches(&json!(12)).is_success());
    }

    #[test]
    fn regex_strings_generate_matching_candidates() {
        let p = ScalarPattern::String(StringPattern {
            regex: Some(PatternRegex::new("^[0-9]+$").unwrap()),
            ..StringPattern::default()
        });
        let mut rng = SmallRng::seed_from_u64(3);
        let v = p.generate(&mut rng);
        assert!(p.matches(&v).is_success(), "{v}");
    }

    #[test]
    fn exclusive_bounds_are_strict() {
        let p = ScalarPattern::Number(NumberPattern {
            bounds: NumericBounds {
                minimum: Some(0.0),
                maximum: Some(10.0),
                exclusive_minimum: true,
                exclusive_maximum: false,
            },
            integer: false,
        });
        assert!(!p.matches(&json!(0)).is_success());
        assert!(p.matches(&json!(0.5)).is_success());
        assert!(p.matches(&json!(10)).is_success());
    }

    #[test]
    fn integers_stay_integral_when_the_range_holds_none() {
        let mut rng = SmallRng::seed_from_u64(5);
        let empty = bounded_integer(Some(1.5), Some(1.7));
        assert_eq!(empty.generate(&mut rng), json!(2));

        let fractional = ScalarPattern::Number(NumberPattern {
            bounds: NumericBounds {
                minimum: Some(1.5),
                maximum: Some(1.7),
                ..NumericBounds::default()
            },
            integer: false,
        });
        let v = fractional.generate(&mut rng);
        assert!(fractional.matches(&v).is_success(), "{v}");
    }

    #[test]
    fn integer_rejects_fractions() {
        let p = ScalarPattern::integer();
        assert!(!p.matches(&json!(1.5)).is_success());
        assert!(p.parse("1.5").is_err());
        assert_eq!(p.parse("7").unwrap(), json!(7));
    }

    #[test]
    fn formats_parse_only_valid_literals() {
        assert!(ScalarPattern::Uuid.parse("not-a-uuid").is_err());
        assert!(ScalarPattern::Date.parse("2024-02-30").is_err());
        assert_eq!(ScalarPattern::Date.parse("2024-02-29").unwrap(), json!("2024-02-29"));
        assert!(ScalarPattern::Boolean.parse("yes").is_err());
    }

    #[test]
    fn boundaries_are_legal_and_negatives_are_not() {
        for p in [bounded_string(Some(2), Some(6)), bounded_integer(Some(1.0), Some(9.0))] {
            let boundaries = p.boundary_values();
            assert_eq!(boundaries.len(), 2);
            for (v, _) in boundaries {
                assert!(p.matches(&v).is_success(), "{v}");
            }
            for (v, comment) in p.negative_values() {
                assert!(!p.matches(&v).is_success(), "{comment}: {v}");
            }
        }
    }

    #[test]
    fn string_encompasses_formats_but_not_the_reverse() {
        assert!(ScalarPattern::string().encompasses(&ScalarPattern::Email));
        assert!(!ScalarPattern::Email.encompasses(&ScalarPattern::string()));
        assert!(ScalarPattern::number().encompasses(&ScalarPattern::integer()));
        assert!(!ScalarPattern::integer().encompasses(&ScalarPattern::number()));
        assert!(bounded_string(Some(1), Some(10)).encompasses(&bounded_string(Some(2), Some(5))));
    }

    proptest! {
        #[test]
        fn generated_values_match_and_survive_literal_round_trip(seed in any::<u64>(), idx in 0usize..12) {
            let pattern = &all_formats()[idx];
            let mut rng = SmallRng::seed_from_u64(seed);
            let value = pattern.generate(&mut rng);
            prop_assert!(pattern.matches(&value).is_success(), "{} generated {}", pattern.type_name(), value);
            let reparsed = pattern.parse(&value.to_string_literal()).unwrap();
            prop_assert!(pattern.matches(&reparsed).is_success());
        }
    }
}
