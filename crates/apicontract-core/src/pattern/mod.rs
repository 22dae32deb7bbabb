//! The pattern model
//!
//! A [`Pattern`] is the compiled, schema-level shape of a value. Patterns
//! match concrete values, generate values, parse literals and expand into
//! positive/negative variants for test generation.
//!
//! Self-referential shapes are cut with [`Pattern::Deferred`], a lookup by
//! name in the [`crate::Registry`] carried by the [`Resolver`].

pub mod any;
pub mod enumeration;
pub mod list;
pub mod object;
pub mod scalar;
pub mod token;

pub use any::{AnyPattern, Discriminator};
pub use enumeration::EnumPattern;
pub use list::ListPattern;
pub use object::{AdditionalProperties, ObjectPattern};
pub use scalar::{NumberPattern, PatternRegex, ScalarPattern, StringPattern};

use rand::Rng;
use serde_json::Value;
use tracing::warn;

use crate::error::{ContractError, Result};
use crate::generation::{self, Variants};
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult, MismatchKind};
use crate::row::Row;
use crate::value::{ValueExt, parse_literal, values_equal};

/// Maximum number of `Deferred` hops followed when resolving a name.
const MAX_ALIAS_HOPS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Scalar(ScalarPattern),
    /// Exactly one literal value (`null` included)
    Exact(Value),
    Object(ObjectPattern),
    List(ListPattern),
    /// Union of candidate patterns, optionally discriminated
    Any(AnyPattern),
    Enum(EnumPattern),
    /// Reference to a registered pattern by name
    Deferred(String),
    /// Any JSON value
    AnyValue,
}

impl Pattern {
    #[must_use]
    pub fn null() -> Self {
        Self::Exact(Value::Null)
    }

    #[must_use]
    pub fn string() -> Self {
        Self::Scalar(ScalarPattern::string())
    }

    #[must_use]
    pub fn number() -> Self {
        Self::Scalar(ScalarPattern::number())
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::Scalar(ScalarPattern::integer())
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::Scalar(ScalarPattern::Boolean)
    }

    #[must_use]
    pub fn deferred(name: impl Into<String>) -> Self {
        Self::Deferred(name.into())
    }

    #[must_use]
    pub fn is_null_like(&self) -> bool {
        matches!(self, Self::Exact(Value::Null))
    }

    /// Whether `null` is a legal value.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Exact(Value::Null) | Self::AnyValue => true,
            Self::Any(any) => any.branches.iter().any(Pattern::is_nullable),
            Self::Enum(e) => e.values.contains(&Value::Null),
            _ => false,
        }
    }

    /// Union of `self` and `null`, unless `self` already accepts null.
    #[must_use]
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            return self;
        }
        Self::Any(AnyPattern::new(vec![self, Self::null()]))
    }

    /// Short descriptor used in diagnostics and pattern tokens.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Scalar(s) => s.type_name().to_string(),
            Self::Exact(v) => v.type_name().to_string(),
            Self::Object(o) => o.type_alias.clone().unwrap_or_else(|| "object".into()),
            Self::List(l) => l
                .type_alias
                .clone()
                .unwrap_or_else(|| format!("list of {}", l.element.type_name())),
            Self::Any(a) => a.type_alias.clone().unwrap_or_else(|| {
                a.branches
                    .iter()
                    .map(Pattern::type_name)
                    .collect::<Vec<_>>()
                    .join(" or ")
            }),
            Self::Enum(e) => e.type_alias.clone().unwrap_or_else(|| "enum".into()),
            Self::Deferred(name) => name.clone(),
            Self::AnyValue => "anyvalue".into(),
        }
    }

    /// Name of the component this pattern was compiled from, if any.
    #[must_use]
    pub fn type_alias(&self) -> Option<&str> {
        match self {
            Self::Object(o) => o.type_alias.as_deref(),
            Self::List(l) => l.type_alias.as_deref(),
            Self::Any(a) => a.type_alias.as_deref(),
            Self::Enum(e) => e.type_alias.as_deref(),
            Self::Deferred(name) => Some(name),
            _ => None,
        }
    }

    /// Attach a component name. Scalars and exact values carry no alias.
    #[must_use]
    pub fn with_type_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = Some(alias.into());
        match &mut self {
            Self::Object(o) => o.type_alias = alias,
            Self::List(l) => l.type_alias = alias,
            Self::Any(a) => a.type_alias = alias,
            Self::Enum(e) => e.type_alias = alias,
            _ => {}
        }
        self
    }

    /// Follow `Deferred` links to a concrete pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::UnknownPattern`] for unregistered names.
    pub fn resolved<'a>(&'a self, resolver: &'a Resolver) -> Result<&'a Pattern> {
        let mut current = self;
        for _ in 0..MAX_ALIAS_HOPS {
            match current {
                Self::Deferred(name) => current = resolver.resolve(name)?,
                other => return Ok(other),
            }
        }
        Err(ContractError::UnknownPattern(self.type_name()))
    }

    /// Whether generating this pattern would re-enter a name past the
    /// resolver's cycle depth.
    #[must_use]
    pub fn would_cycle(&self, resolver: &Resolver) -> bool {
        match self {
            Self::Deferred(name) => resolver.cycle_exceeded(name),
            Self::Any(any) => {
                let concrete: Vec<&Pattern> = any.branches.iter().filter(|b| !b.is_null_like()).collect();
                !concrete.is_empty() && concrete.iter().all(|b| b.would_cycle(resolver))
            }
            _ => false,
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if resolver.mock_mode() {
            if let Some(result) = self.match_mock_token(value, resolver) {
                return result;
            }
        }
        match self {
            Self::Scalar(s) => s.matches(value),
            Self::Exact(expected) => {
                if values_equal(expected, value) {
                    MatchResult::Success
                } else {
                    MatchResult::failure(Failure::new(
                        MismatchKind::ValueMismatch,
                        format!(
                            "Expected {}, actual was {}",
                            expected.display_short(),
                            value.display_short()
                        ),
                    ))
                }
            }
            Self::Object(o) => o.matches(value, resolver),
            Self::List(l) => l.matches(value, resolver),
            Self::Any(a) => a.matches(value, resolver),
            Self::Enum(e) => e.matches(value),
            Self::Deferred(name) => match resolver.resolve(name) {
                Ok(pattern) => pattern.matches(value, resolver),
                Err(err) => MatchResult::failure(Failure::new(MismatchKind::TypeMismatch, err.to_string())),
            },
            Self::AnyValue => MatchResult::Success,
        }
    }

    /// In mock mode a value may be a pattern token such as `"(string)"`,
    /// accepted when this pattern covers the token's pattern.
    fn match_mock_token(&self, value: &Value, resolver: &Resolver) -> Option<MatchResult> {
        let text = value.as_str().filter(|t| token::is_token(t))?;
        let declared = token::parse_token(text).ok()?;
        if self.encompasses(&declared, resolver) {
            Some(MatchResult::Success)
        } else {
            Some(MatchResult::failure(Failure::new(
                MismatchKind::TypeMismatch,
                format!("Expected {}, actual was token {text}", self.type_name()),
            )))
        }
    }

    /// Produce one concrete value.
    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> Value {
        match self {
            Self::Scalar(s) => s.generate(rng),
            Self::Exact(v) => v.clone(),
            Self::Object(o) => o.generate(resolver, rng),
            Self::List(l) => l.generate(resolver, rng),
            Self::Any(a) => a.generate(resolver, rng),
            Self::Enum(e) => e.generate(rng),
            Self::Deferred(name) => {
                let resolved = match resolver.resolve(name) {
                    Ok(p) => p,
                    Err(err) => {
                        warn!(pattern = %name, error = %err, "cannot generate unregistered pattern");
                        return Value::Null;
                    }
                };
                if resolver.cycle_exceeded(name) {
                    return cycle_default(name, resolved);
                }
                resolved.generate(&resolver.entering(name), rng)
            }
            Self::AnyValue => Value::String(format!("anything-{}", rng.gen_range(0..1000_u32))),
        }
    }

    /// Parse a literal (row value, header, query parameter) into a value of
    /// this pattern's type.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Parse`] when the literal cannot be read as
    /// this type.
    pub fn parse(&self, literal: &str, resolver: &Resolver) -> Result<Value> {
        match self {
            Self::Scalar(s) => s.parse(literal),
            Self::Exact(Value::String(_)) => Ok(Value::String(literal.to_string())),
            Self::Exact(expected) => {
                let parsed = parse_literal(literal);
                if parsed.type_name() == expected.type_name() {
                    Ok(parsed)
                } else {
                    Err(ContractError::parse("", literal, expected.type_name()))
                }
            }
            Self::Object(_) | Self::List(_) => {
                let parsed: Value = serde_json::from_str(literal)
                    .map_err(|_| ContractError::parse("", literal, self.type_name()))?;
                let expected_object = matches!(self, Self::Object(_));
                if parsed.is_object() == expected_object && (expected_object || parsed.is_array()) {
                    Ok(parsed)
                } else {
                    Err(ContractError::parse("", literal, self.type_name()))
                }
            }
            Self::Any(a) => a.parse(literal, resolver),
            Self::Enum(e) => e.parse(literal),
            Self::Deferred(name) => resolver.resolve(name)?.parse(literal, resolver),
            Self::AnyValue => Ok(parse_literal(literal)),
        }
    }

    /// Whether every value matched by `other` is also matched by `self`.
    #[must_use]
    pub fn encompasses(&self, other: &Pattern, resolver: &Resolver) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Self::AnyValue, _) => true,
            (_, Self::AnyValue) => false,
            (Self::Deferred(a), Self::Deferred(b)) if a == b => true,
            (Self::Deferred(name), _) => {
                if resolver.is_in_flight(name) {
                    return true;
                }
                resolver
                    .resolve(name)
                    .is_ok_and(|p| p.encompasses(other, &resolver.entering(name)))
            }
            (_, Self::Deferred(name)) => {
                if resolver.is_in_flight(name) {
                    return true;
                }
                resolver
                    .resolve(name)
                    .is_ok_and(|p| self.encompasses(p, &resolver.entering(name)))
            }
            (_, Self::Any(b)) => b.branches.iter().all(|branch| self.encompasses(branch, resolver)),
            (Self::Any(a), _) => a.branches.iter().any(|branch| branch.encompasses(other, resolver)),
            (_, Self::Exact(v)) => self.matches(v, resolver).is_success(),
            (_, Self::Enum(e)) => e
                .values
                .iter()
                .all(|v| self.matches(v, resolver).is_success()),
            (Self::Scalar(a), Self::Scalar(b)) => a.encompasses(b),
            (Self::Object(a), Self::Object(b)) => a.encompasses(b, resolver),
            (Self::List(a), Self::List(b)) => a.element.encompasses(&b.element, resolver),
            _ => false,
        }
    }

    /// Positive variants seeded by `row`, per the resolver's strategy.
    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Variants {
        generation::positive(self, row, resolver)
    }

    /// Negative variants seeded by `row`, one violated field at a time.
    #[must_use]
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Variants {
        generation::negative(self, row, resolver)
    }
}

impl From<ScalarPattern> for Pattern {
    fn from(s: ScalarPattern) -> Self {
        Self::Scalar(s)
    }
}

impl From<ObjectPattern> for Pattern {
    fn from(o: ObjectPattern) -> Self {
        Self::Object(o)
    }
}

impl From<ListPattern> for Pattern {
    fn from(l: ListPattern) -> Self {
        Self::List(l)
    }
}

impl From<AnyPattern> for Pattern {
    fn from(a: AnyPattern) -> Self {
        Self::Any(a)
    }
}

impl From<EnumPattern> for Pattern {
    fn from(e: EnumPattern) -> Self {
        Self::Enum(e)
    }
}

/// Instance used when a mandatory branch would recurse past the cycle depth.
fn cycle_default(name: &str, resolved: &Pattern) -> Value {
    warn!(pattern = %name, "cycle depth reached; substituting an empty instance");
    match resolved {
        Pattern::List(_) => Value::Array(Vec::new()),
        Pattern::Object(_) => Value::Object(serde_json::Map::new()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn node_registry() -> Registry {
        let mut keys = BTreeMap::new();
        keys.insert("value".to_string(), Pattern::integer());
        keys.insert("child?".to_string(), Pattern::deferred("Node"));
        let node = Pattern::Object(ObjectPattern::new(keys)).with_type_alias("Node");
        let mut registry = Registry::new();
        registry.register("Node", node);
        registry
    }

    #[test]
    fn self_referential_generation_terminates_with_nesting() {
        let resolver = Resolver::new(Arc::new(node_registry()));
        let mut rng = SmallRng::seed_from_u64(7);
        let value = Pattern::deferred("Node").generate(&resolver, &mut rng);
        assert!(value.get("child").is_some(), "{value}");
        assert!(Pattern::deferred("Node").matches(&value, &resolver).is_success());
    }

    #[test]
    fn nullable_wraps_once() {
        let p = Pattern::string().nullable();
        assert!(p.is_nullable());
        assert_eq!(p.clone().nullable(), p);
        assert!(p.matches(&Value::Null, &Resolver::default()).is_success());
    }

    #[test]
    fn exact_numbers_compare_by_value() {
        let p = Pattern::Exact(json!(2));
        assert!(p.matches(&json!(2.0), &Resolver::default()).is_success());
        assert!(!p.matches(&json!(3), &Resolver::default()).is_success());
    }

    #[test]
    fn mock_mode_accepts_covered_tokens() {
        let resolver = Resolver::default().with_mock_mode(true);
        assert!(Pattern::string().matches(&json!("(string)"), &resolver).is_success());
        assert!(!Pattern::integer().matches(&json!("(string)"), &resolver).is_success());
        assert!(Pattern::number().matches(&json!("(integer)"), &resolver).is_success());
    }

    #[test]
    fn encompasses_follows_unions() {
        let resolver = Resolver::default();
        let nullable = Pattern::string().nullable();
        assert!(nullable.encompasses(&Pattern::null(), &resolver));
        assert!(nullable.encompasses(&Pattern::Exact(json!("x")), &resolver));
        assert!(!Pattern::string().encompasses(&nullable, &resolver));
        assert!(Pattern::AnyValue.encompasses(&nullable, &resolver));
    }

    #[test]
    fn parse_reads_literals_by_type() {
        let resolver = Resolver::default();
        assert_eq!(Pattern::integer().parse("10", &resolver).unwrap(), json!(10));
        assert_eq!(Pattern::string().parse("10", &resolver).unwrap(), json!("10"));
        assert!(Pattern::integer().parse("ten", &resolver).is_err());
        let list = Pattern::List(ListPattern::new(Pattern::integer()));
        assert_eq!(list.parse("[1,2]", &resolver).unwrap(), json!([1, 2]));
        assert!(list.parse("{}", &resolver).is_err());
    }

    #[test]
    fn type_alias_only_sticks_to_composites() {
        assert_eq!(Pattern::string().with_type_alias("Name").type_alias(), None);
        let obj = Pattern::Object(ObjectPattern::default()).with_type_alias("Pet");
        assert_eq!(obj.type_alias(), Some("Pet"));
        assert_eq!(obj.type_name(), "Pet");
    }
}
