//! Homogeneous list patterns

use rand::Rng;
use serde_json::Value;

use super::Pattern;
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};

/// Upper bound on generated list length.
const MAX_GENERATED_ITEMS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ListPattern {
    pub element: Box<Pattern>,
    pub type_alias: Option<String>,
}

impl ListPattern {
    #[must_use]
    pub fn new(element: Pattern) -> Self {
        Self {
            element: Box::new(element),
            type_alias: None,
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Array(items) = value else {
            return MatchResult::failure(Failure::type_mismatch("json array", value));
        };
        let failures = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match self.element.matches(item, resolver) {
                MatchResult::Success => None,
                MatchResult::Failure(f) => Some(f.under(format!("[{i}]"))),
            })
            .collect();
        MatchResult::from_failures(failures)
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> Value {
        if self.element.would_cycle(resolver) {
            return Value::Array(Vec::new());
        }
        let count = rng.gen_range(1..=MAX_GENERATED_ITEMS);
        Value::Array(
            (0..count)
                .map(|_| self.element.generate(resolver, rng))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;

    #[test]
    fn element_failures_are_index_qualified() {
        let list = ListPattern::new(Pattern::integer());
        let result = list.matches(&json!([1, "two", 3]), &Resolver::default());
        let entries = result.as_failure().unwrap().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "[1]");
    }

    #[test]
    fn non_arrays_are_type_mismatches() {
        let list = ListPattern::new(Pattern::integer());
        assert!(!list.matches(&json!({"a": 1}), &Resolver::default()).is_success());
        assert!(list.matches(&json!([]), &Resolver::default()).is_success());
    }

    #[test]
    fn generated_lists_are_short_and_valid() {
        let list = ListPattern::new(Pattern::string());
        let resolver = Resolver::default();
        let mut rng = SmallRng::seed_from_u64(11);
        let value = list.generate(&resolver, &mut rng);
        let len = value.as_array().map(Vec::len).unwrap_or_default();
        assert!((1..=MAX_GENERATED_ITEMS).contains(&len));
        assert!(list.matches(&value, &resolver).is_success());
    }
}
