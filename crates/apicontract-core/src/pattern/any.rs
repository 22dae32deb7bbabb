//! Unions (oneOf, anyOf, nullable) and discriminators

use std::collections::BTreeMap;

use rand::Rng;
use serde_json::Value;

use super::Pattern;
use crate::error::{ContractError, Result};
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult, MismatchKind};

/// Declared discriminator: property name plus tag value → component name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discriminator {
    pub property_name: String,
    pub mapping: BTreeMap<String, String>,
}

impl Discriminator {
    #[must_use]
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            mapping: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_mapping(mut self, value: impl Into<String>, target: impl Into<String>) -> Self {
        self.mapping.insert(value.into(), target.into());
        self
    }

    /// Component name for a tag value.
    #[must_use]
    pub fn target_for(&self, value: &str) -> Option<&str> {
        self.mapping.get(value).map(String::as_str)
    }

    /// Tag values, in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.mapping.keys().map(String::as_str)
    }

    /// Tag value that maps to `target`.
    #[must_use]
    pub fn value_for(&self, target: &str) -> Option<&str> {
        self.mapping
            .iter()
            .find(|(_, t)| t.as_str() == target)
            .map(|(v, _)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnyPattern {
    pub branches: Vec<Pattern>,
    pub discriminator: Option<Discriminator>,
    pub type_alias: Option<String>,
}

impl AnyPattern {
    #[must_use]
    pub fn new(branches: Vec<Pattern>) -> Self {
        Self {
            branches,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    /// Branch compiled from the named component.
    #[must_use]
    pub fn branch_named(&self, name: &str) -> Option<&Pattern> {
        self.branches.iter().find(|b| b.type_alias() == Some(name))
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if let Some(result) = self.match_discriminated(value, resolver) {
            return result;
        }

        let mut failures = Vec::new();
        for branch in &self.branches {
            match branch.matches(value, resolver) {
                MatchResult::Success => return MatchResult::Success,
                MatchResult::Failure(f) => failures.push(f),
            }
        }
        if let Some(idx) = failures.iter().position(Failure::is_partial) {
            return MatchResult::failure(failures.swap_remove(idx));
        }
        failures
            .into_iter()
            .max_by_key(Failure::closeness)
            .map_or(MatchResult::Success, MatchResult::failure)
    }

    /// Fast path: route on the discriminator tag when the value carries one.
    fn match_discriminated(&self, value: &Value, resolver: &Resolver) -> Option<MatchResult> {
        let discriminator = self.discriminator.as_ref()?;
        let property = discriminator.property_name.as_str();
        let tag = value.get(property)?.as_str()?;

        let Some((target, branch)) = discriminator
            .target_for(tag)
            .and_then(|t| self.branch_named(t).map(|b| (t, b)))
        else {
            let expected = discriminator.values().collect::<Vec<_>>().join(", ");
            return Some(MatchResult::failure(
                Failure::new(
                    MismatchKind::ValueMismatch,
                    format!("Expected {property} to be one of [{expected}], actual was {tag:?}"),
                )
                .with_reason(FailureReason::DiscriminatorMismatch)
                .under(property),
            ));
        };

        Some(match branch.matches(value, resolver) {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(cause) => {
                let partial = cause.is_partial();
                let mut failure = Failure::new(
                    MismatchKind::ValueMismatch,
                    format!("Value with {property}={tag:?} does not match {target}"),
                )
                .with_reason(FailureReason::DiscriminatorMismatch);
                failure.partial = partial;
                failure.causes.push(cause);
                MatchResult::failure(failure)
            }
        })
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> Value {
        let candidates: Vec<&Pattern> = self
            .branches
            .iter()
            .filter(|b| !b.would_cycle(resolver))
            .collect();
        let pool = if candidates.is_empty() {
            self.branches.iter().collect()
        } else {
            candidates
        };
        match pool.len() {
            0 => Value::Null,
            n => pool[rng.gen_range(0..n)].generate(resolver, rng),
        }
    }

    /// First branch that both parses the literal and matches the result.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Parse`] when no branch can read the literal.
    pub fn parse(&self, literal: &str, resolver: &Resolver) -> Result<Value> {
        let parsed: Vec<Value> = self
            .branches
            .iter()
            .filter_map(|b| b.parse(literal, resolver).ok().map(|v| (b, v)))
            .filter(|(b, v)| b.matches(v, resolver).is_success())
            .map(|(_, v)| v)
            .collect();
        parsed.into_iter().next().ok_or_else(|| {
            ContractError::parse("", literal, Pattern::Any(self.clone()).type_name())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ObjectPattern;
    use serde_json::json;

    fn pet(name: &str, tag: &str, extra: &str) -> Pattern {
        let mut keys = BTreeMap::new();
        keys.insert("petType".to_string(), Pattern::Exact(json!(tag)));
        keys.insert(extra.to_string(), Pattern::string());
        Pattern::Object(ObjectPattern::new(keys)).with_type_alias(name)
    }

    fn pets() -> AnyPattern {
        AnyPattern::new(vec![pet("Dog", "dog", "bark"), pet("Cat", "cat", "meow")]).with_discriminator(
            Discriminator::new("petType")
                .with_mapping("dog", "Dog")
                .with_mapping("cat", "Cat"),
        )
    }

    #[test]
    fn discriminator_routes_to_mapped_branch() {
        let resolver = Resolver::default();
        assert!(pets().matches(&json!({"petType": "dog", "bark": "woof"}), &resolver).is_success());
        let failed = pets().matches(&json!({"petType": "dog", "meow": "purr"}), &resolver);
        let failure = failed.as_failure().unwrap();
        assert_eq!(failure.reason, Some(FailureReason::DiscriminatorMismatch));
        assert!(failure.report().contains("does not match Dog"));
    }

    #[test]
    fn unknown_tag_is_a_discriminator_mismatch() {
        let failed = pets().matches(&json!({"petType": "fish"}), &Resolver::default());
        assert_eq!(
            failed.as_failure().and_then(Failure::first_reason),
            Some(FailureReason::DiscriminatorMismatch)
        );
    }

    #[test]
    fn undiscriminated_union_reports_closest_branch() {
        let union = AnyPattern::new(vec![Pattern::integer(), pet("Dog", "dog", "bark")]);
        let result = union.matches(&json!({"petType": "dog", "bark": 1}), &Resolver::default());
        let entries = result.as_failure().unwrap().entries();
        assert_eq!(entries[0].0, "bark");
    }

    #[test]
    fn parse_prefers_branch_that_accepts_the_literal() {
        let union = AnyPattern::new(vec![Pattern::integer(), Pattern::null()]);
        assert_eq!(union.parse("5", &Resolver::default()).unwrap(), json!(5));
        assert_eq!(union.parse("null", &Resolver::default()).unwrap(), Value::Null);
        assert!(union.parse("five", &Resolver::default()).is_err());
    }
}
