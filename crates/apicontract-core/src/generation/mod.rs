//! Positive and negative variant generation
//!
//! Variants are produced lazily as owned iterators: nothing is computed
//! until the consumer pulls, and calling again restarts from the top.
//! Each variant is a pattern (usually with some keys pinned to exact
//! values) plus a comment describing what was varied.

mod negative;
mod positive;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::warn;

use crate::error::{ContractError, Result};
use crate::keys::key_name;
use crate::pattern::{Pattern, token};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::row::Row;

pub(crate) use positive::{base_object, base_pattern};

/// Seed for the instance generated when checking that a negative variant
/// really is invalid.
const NEGATIVE_CHECK_SEED: u64 = 0x5eed_cafe;

/// Maximum depth searched when locating a row column inside a pattern.
const MAX_ROW_SEARCH_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub pattern: Pattern,
    pub comment: Option<String>,
}

impl Variant {
    #[must_use]
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            comment: None,
        }
    }

    #[must_use]
    pub fn with_comment(pattern: Pattern, comment: impl Into<String>) -> Self {
        Self {
            pattern,
            comment: Some(comment.into()),
        }
    }
}

/// Lazy, restartable sequence of variants.
pub type Variants = Box<dyn Iterator<Item = Variant>>;

/// Positive variants of `pattern` seeded by `row`.
///
/// Non-generative resolvers yield the example-seeded pattern plus its
/// mandatory-keys-only form. Generative resolvers additionally vary one key
/// at a time through its own positive variants and omit each optional key.
#[must_use]
pub fn positive(pattern: &Pattern, row: &Row, resolver: &Resolver) -> Variants {
    positive::variants(pattern, row, resolver)
}

/// Negative variants of `pattern` seeded by `row`: one field violated per
/// variant, plus one variant per omitted mandatory key. Variants whose
/// generated instance still matches `pattern` are dropped.
#[must_use]
pub fn negative(pattern: &Pattern, row: &Row, resolver: &Resolver) -> Variants {
    let inner = negative::variants(pattern, row, resolver);
    let original = pattern.clone();
    let resolver = resolver.clone();
    Box::new(inner.filter(move |variant| still_invalid(&original, variant, &resolver)))
}

fn still_invalid(original: &Pattern, variant: &Variant, resolver: &Resolver) -> bool {
    let mut rng = SmallRng::seed_from_u64(NEGATIVE_CHECK_SEED);
    let value = variant.pattern.generate(resolver, &mut rng);
    !original.matches(&value, resolver).is_acceptable()
}

/// Pattern for a row literal in the position of `pattern`: tokens become
/// their pattern, other literals are parsed into exact values.
///
/// A literal that does not parse under `pattern` is kept as an exact string
/// and logged; [`validate_row`] reports such rows up front.
pub(crate) fn row_value_pattern(pattern: &Pattern, literal: &str, resolver: &Resolver) -> Pattern {
    if token::is_token(literal) {
        return match token::parse_token(literal) {
            Ok(p) => p,
            Err(err) => {
                warn!(literal, error = %err, "ignoring invalid pattern token in example row");
                pattern.clone()
            }
        };
    }
    match pattern.parse(literal, resolver) {
        Ok(value) => Pattern::Exact(value),
        Err(err) => {
            warn!(literal, error = %err, "example value does not fit its pattern");
            Pattern::Exact(serde_json::Value::String(literal.to_string()))
        }
    }
}

/// Check that every row column naming a key of `pattern` parses under that
/// key's pattern.
///
/// # Errors
///
/// Returns [`ContractError::InvalidExample`] for the first column that does
/// not fit.
pub fn validate_row(pattern: &Pattern, row: &Row, resolver: &Resolver) -> Result<()> {
    for (column, literal) in row.columns() {
        let Some(expected) = find_key_pattern(pattern, column, resolver, 0) else {
            continue;
        };
        let outcome = if token::is_token(literal) {
            token::parse_token(literal).map(|_| ())
        } else {
            expected
                .parse(literal, resolver)
                .and_then(|value| match expected.matches(&value, resolver) {
                    MatchResult::Success => Ok(()),
                    MatchResult::Failure(f) => Err(ContractError::parse("", literal, f.report())),
                })
        };
        outcome.map_err(|err| ContractError::InvalidExample {
            example: row.name.clone(),
            message: format!("column {column}: {err}"),
        })?;
    }
    Ok(())
}

fn find_key_pattern(pattern: &Pattern, name: &str, resolver: &Resolver, depth: usize) -> Option<Pattern> {
    if depth > MAX_ROW_SEARCH_DEPTH {
        return None;
    }
    match pattern {
        Pattern::Object(object) => object.keys.iter().find_map(|(key, p)| {
            if key_name(key) == name {
                Some(p.clone())
            } else {
                find_key_pattern(p, name, resolver, depth + 1)
            }
        }),
        Pattern::List(list) => find_key_pattern(&list.element, name, resolver, depth + 1),
        Pattern::Any(any) => any
            .branches
            .iter()
            .find_map(|b| find_key_pattern(b, name, resolver, depth + 1)),
        Pattern::Deferred(ref_name) => resolver
            .resolve(ref_name)
            .ok()
            .and_then(|p| find_key_pattern(p, name, resolver, depth + 1)),
        _ => None,
    }
}

/// Prefix a variant comment with the key it was found under, joining key
/// paths with dots: `age: ...` under `person` becomes `person.age: ...`.
pub(crate) fn prefix_comment(name: &str, comment: &str) -> String {
    match comment.split_once(": ") {
        Some((path, rest)) if !path.contains(' ') => format!("{name}.{path}: {rest}"),
        _ => format!("{name}: {comment}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ObjectPattern;
    use std::collections::BTreeMap;

    fn person() -> Pattern {
        let mut keys = BTreeMap::new();
        keys.insert("age".to_string(), Pattern::integer());
        keys.insert("name".to_string(), Pattern::string());
        Pattern::Object(ObjectPattern::new(keys))
    }

    #[test]
    fn comments_nest_as_paths() {
        assert_eq!(prefix_comment("age", "integer mutated to string"), "age: integer mutated to string");
        assert_eq!(
            prefix_comment("person", "age: integer mutated to string"),
            "person.age: integer mutated to string"
        );
    }

    #[test]
    fn validate_row_accepts_fitting_columns() {
        let row = Row::named("ok").with_column("age", "30").with_column("unrelated", "x");
        assert!(validate_row(&person(), &row, &Resolver::default()).is_ok());
    }

    #[test]
    fn validate_row_rejects_mistyped_columns() {
        let row = Row::named("bad").with_column("age", "thirty");
        let err = validate_row(&person(), &row, &Resolver::default()).unwrap_err();
        assert!(matches!(err, ContractError::InvalidExample { ref example, .. } if example == "bad"));
    }

    #[test]
    fn row_literals_become_exact_values() {
        let resolver = Resolver::default();
        assert_eq!(
            row_value_pattern(&Pattern::integer(), "7", &resolver),
            Pattern::Exact(serde_json::json!(7))
        );
        assert_eq!(row_value_pattern(&Pattern::integer(), "(number)", &resolver), Pattern::number());
    }
}
