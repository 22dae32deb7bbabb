//! Object patterns and key policy

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde_json::{Map, Value};

use super::Pattern;
use crate::keys::{self, is_optional, key_name};
use crate::resolver::{KeyCheck, Resolver};
use crate::result::{Failure, MatchResult};

/// Policy for value keys the pattern does not declare.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AdditionalProperties {
    /// Undeclared keys are unexpected (subject to the resolver's key check)
    #[default]
    NoAdditional,
    /// Undeclared keys may hold anything
    FreeForm,
    /// Undeclared keys must match the given pattern
    Constrained(Box<Pattern>),
}

/// Map of key → pattern; keys ending in `?` are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPattern {
    pub keys: BTreeMap<String, Pattern>,
    pub additional: AdditionalProperties,
    pub type_alias: Option<String>,
}

impl ObjectPattern {
    #[must_use]
    pub fn new(keys: BTreeMap<String, Pattern>) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }

    /// Object with no declared keys that accepts anything.
    #[must_use]
    pub fn free_form() -> Self {
        Self {
            additional: AdditionalProperties::FreeForm,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_additional(mut self, additional: AdditionalProperties) -> Self {
        self.additional = additional;
        self
    }

    /// Declared key (with its optional marker) and pattern for a bare name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<(&str, &Pattern)> {
        if let Some((k, p)) = self.keys.get_key_value(name) {
            return Some((k.as_str(), p));
        }
        self.keys
            .get_key_value(&keys::optional_key(name))
            .map(|(k, p)| (k.as_str(), p))
    }

    #[must_use]
    pub fn is_mandatory(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    pub fn mandatory_keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().filter(|k| !is_optional(k)).map(String::as_str)
    }

    pub fn optional_keys(&self) -> impl Iterator<Item = &str> {
        self.keys
            .keys()
            .filter(|k| is_optional(k))
            .map(|k| key_name(k))
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Object(map) = value else {
            let expected = self.type_alias.as_deref().unwrap_or("json object");
            return MatchResult::failure(Failure::type_mismatch(expected, value));
        };

        let declared: BTreeSet<&str> = self.keys.keys().map(|k| key_name(k)).collect();
        let case_insensitive = !matches!(resolver.key_check(), KeyCheck::Strict);
        let mut located: BTreeMap<&str, &Value> = BTreeMap::new();
        let mut case_matched: BTreeSet<&str> = BTreeSet::new();
        for &name in &declared {
            if let Some(actual) = map.get(name) {
                located.insert(name, actual);
            } else if case_insensitive {
                let found = map.iter().find(|(k, _)| {
                    !declared.contains(k.as_str()) && !case_matched.contains(k.as_str()) && k.eq_ignore_ascii_case(name)
                });
                if let Some((k, actual)) = found {
                    case_matched.insert(k.as_str());
                    located.insert(name, actual);
                }
            }
        }

        let mut suggested: BTreeSet<&str> = BTreeSet::new();
        let mut extra_failures = Vec::new();

        let undeclared = map
            .iter()
            .filter(|(k, _)| !declared.contains(k.as_str()) && !case_matched.contains(k.as_str()));
        for (key, actual) in undeclared {
            match &self.additional {
                AdditionalProperties::FreeForm => {}
                AdditionalProperties::Constrained(pattern) => {
                    if let MatchResult::Failure(f) = pattern.matches(actual, resolver) {
                        extra_failures.push(f.under(key.as_str()));
                    }
                }
                AdditionalProperties::NoAdditional => match resolver.key_check() {
                    KeyCheck::Extensible => {}
                    KeyCheck::Strict => extra_failures.push(Failure::unexpected_key(key).under(key.as_str())),
                    KeyCheck::Fuzzy {
                        optional_as_warning,
                    } => {
                        let candidates = declared
                            .iter()
                            .copied()
                            .filter(|d| !located.contains_key(d) && !suggested.contains(d));
                        match keys::suggest(key, candidates) {
                            Some(candidate) => {
                                let partial = optional_as_warning && !self.is_mandatory(candidate);
                                suggested.insert(candidate);
                                extra_failures.push(
                                    Failure::key_suggestion(key, candidate, partial).under(key.as_str()),
                                );
                            }
                            None => extra_failures.push(Failure::unexpected_key(key).under(key.as_str())),
                        }
                    }
                },
            }
        }

        let mut failures = Vec::new();
        for (key, pattern) in &self.keys {
            let name = key_name(key);
            match located.get(name) {
                Some(actual) => {
                    if let MatchResult::Failure(f) = pattern.matches(actual, resolver) {
                        failures.push(f.under(name));
                    }
                }
                None if is_optional(key) || resolver.mock_mode() || suggested.contains(name) => {}
                None => failures.push(Failure::missing_key(name).under(name)),
            }
        }
        failures.extend(extra_failures);
        MatchResult::from_failures(failures)
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> Value {
        let mut map = Map::new();
        for (key, pattern) in &self.keys {
            if is_optional(key) && pattern.would_cycle(resolver) {
                continue;
            }
            map.insert(key_name(key).to_string(), pattern.generate(resolver, rng));
        }
        Value::Object(map)
    }

    /// Whether every object matched by `other` is matched by `self`.
    #[must_use]
    pub fn encompasses(&self, other: &ObjectPattern, resolver: &Resolver) -> bool {
        for (key, pattern) in &self.keys {
            match other.get(key_name(key)) {
                Some((other_key, other_pattern)) => {
                    if !is_optional(key) && is_optional(other_key) {
                        return false;
                    }
                    if !pattern.encompasses(other_pattern, resolver) {
                        return false;
                    }
                }
                None if !is_optional(key) => return false,
                None => {}
            }
        }
        let extra_ok = other
            .keys
            .iter()
            .filter(|(k, _)| self.get(key_name(k)).is_none())
            .all(|(_, p)| self.accepts_additional(p, resolver));
        let additional_ok = match (&self.additional, &other.additional) {
            (_, AdditionalProperties::NoAdditional) | (AdditionalProperties::FreeForm, _) => true,
            (AdditionalProperties::Constrained(a), AdditionalProperties::Constrained(b)) => {
                a.encompasses(b, resolver)
            }
            (AdditionalProperties::Constrained(a), AdditionalProperties::FreeForm) => {
                **a == Pattern::AnyValue
            }
            (AdditionalProperties::NoAdditional, _) => false,
        };
        extra_ok && additional_ok
    }

    fn accepts_additional(&self, pattern: &Pattern, resolver: &Resolver) -> bool {
        match &self.additional {
            AdditionalProperties::NoAdditional => false,
            AdditionalProperties::FreeForm => true,
            AdditionalProperties::Constrained(p) => p.encompasses(pattern, resolver),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::MismatchKind;
    use serde_json::json;

    fn object(keys: &[(&str, Pattern)]) -> ObjectPattern {
        ObjectPattern::new(
            keys.iter()
                .map(|(k, p)| ((*k).to_string(), p.clone()))
                .collect(),
        )
    }

    fn fuzzy(optional_as_warning: bool) -> Resolver {
        Resolver::default().with_key_check(KeyCheck::Fuzzy {
            optional_as_warning,
        })
    }

    #[test]
    fn strict_mode_rejects_unexpected_keys() {
        let p = object(&[("a", Pattern::string())]);
        let result = p.matches(&json!({"a": "x", "b": "y"}), &Resolver::default());
        let failure = result.as_failure().unwrap();
        assert!(failure.contains_kind(MismatchKind::UnexpectedKey));
        assert_eq!(failure.entries()[0].0, "b");
    }

    #[test]
    fn extensible_mode_tolerates_unexpected_keys() {
        let p = object(&[("a", Pattern::string())]);
        let resolver = Resolver::default().with_key_check(KeyCheck::Extensible);
        assert!(p.matches(&json!({"a": "x", "b": "y"}), &resolver).is_success());
    }

    #[test]
    fn fuzzy_mode_suggests_declared_key() {
        let p = object(&[("a", Pattern::string()), ("ab", Pattern::string())]);
        let result = p.matches(&json!({"a": "x", "b": "y"}), &fuzzy(false));
        let report = result.report();
        assert!(report.contains("did you mean \"ab\"?"), "{report}");
        assert!(!result.as_failure().unwrap().contains_kind(MismatchKind::MissingKey));
        assert!(!result.is_acceptable());
    }

    #[test]
    fn fuzzy_suggestion_on_optional_key_can_be_a_warning() {
        let p = object(&[("a", Pattern::string()), ("ab?", Pattern::string())]);
        let result = p.matches(&json!({"a": "x", "b": "y"}), &fuzzy(true));
        assert!(!result.is_success());
        assert!(result.is_acceptable());
    }

    #[test]
    fn case_variant_keys_are_type_checked() {
        let p = object(&[("name?", Pattern::string())]);
        let result = p.matches(&json!({"Name": 42}), &fuzzy(true));
        assert!(!result.is_acceptable(), "{}", result.report());
        assert!(result.as_failure().unwrap().contains_kind(MismatchKind::TypeMismatch));
        assert_eq!(result.as_failure().unwrap().entries()[0].0, "name");

        assert!(p.matches(&json!({"Name": "x"}), &fuzzy(false)).is_success());
        let extensible = Resolver::default().with_key_check(KeyCheck::Extensible);
        assert!(p.matches(&json!({"NAME": "x"}), &extensible).is_success());
    }

    #[test]
    fn strict_mode_keeps_keys_case_sensitive() {
        let p = object(&[("name", Pattern::string())]);
        let result = p.matches(&json!({"Name": "x"}), &Resolver::default());
        let failure = result.as_failure().unwrap();
        assert!(failure.contains_kind(MismatchKind::UnexpectedKey));
        assert!(failure.contains_kind(MismatchKind::MissingKey));
    }

    #[test]
    fn missing_mandatory_key_is_reported() {
        let p = object(&[("id", Pattern::integer()), ("name?", Pattern::string())]);
        let result = p.matches(&json!({}), &Resolver::default());
        let entries = result.as_failure().unwrap().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "id");
        assert!(p.matches(&json!({}), &Resolver::default().with_mock_mode(true)).is_success());
    }

    #[test]
    fn constrained_additional_properties_are_checked() {
        let p = ObjectPattern::default()
            .with_additional(AdditionalProperties::Constrained(Box::new(Pattern::integer())));
        assert!(p.matches(&json!({"x": 1}), &Resolver::default()).is_success());
        assert!(!p.matches(&json!({"x": "1"}), &Resolver::default()).is_success());
    }

    #[test]
    fn optional_keys_encompass_mandatory_ones() {
        let resolver = Resolver::default();
        let loose = object(&[("a?", Pattern::string())]);
        let tight = object(&[("a", Pattern::string())]);
        assert!(loose.encompasses(&tight, &resolver));
        assert!(!tight.encompasses(&loose, &resolver));
        assert!(ObjectPattern::free_form().encompasses(&tight, &resolver));
    }
}
