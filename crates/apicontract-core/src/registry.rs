//! Named pattern registry owned by one compilation unit

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{ContractError, Result};
use crate::pattern::Pattern;

/// Name → pattern table. Deferred patterns look names up here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    patterns: BTreeMap<String, Pattern>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern under `name`. A name is registered once; later
    /// registrations are ignored and return `false`.
    pub fn register(&mut self, name: impl Into<String>, pattern: Pattern) -> bool {
        let name = name.into();
        if self.patterns.contains_key(&name) {
            debug!(name = %name, "pattern already registered");
            return false;
        }
        self.patterns.insert(name, pattern);
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// Look up a name that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::UnknownPattern`] for unregistered names.
    pub fn resolve(&self, name: &str) -> Result<&Pattern> {
        self.get(name)
            .ok_or_else(|| ContractError::UnknownPattern(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pattern)> {
        self.patterns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every entry of `other` that is not registered here yet.
    pub fn extend(&mut self, other: Registry) {
        for (name, pattern) in other.patterns {
            self.register(name, pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ScalarPattern;

    #[test]
    fn first_registration_wins() {
        let mut registry = Registry::new();
        assert!(registry.register("Id", Pattern::Scalar(ScalarPattern::Uuid)));
        assert!(!registry.register("Id", Pattern::Scalar(ScalarPattern::Boolean)));
        assert_eq!(registry.get("Id"), Some(&Pattern::Scalar(ScalarPattern::Uuid)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_reports_unknown_names() {
        let registry = Registry::new();
        assert_eq!(
            registry.resolve("Missing"),
            Err(ContractError::UnknownPattern("Missing".into()))
        );
    }
}
