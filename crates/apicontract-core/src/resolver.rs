//! Policy and context threaded through matching and generation
//!
//! A [`Resolver`] is never mutated in place: nested calls receive a derived
//! copy (`with_*`, [`Resolver::entering`]).

use std::sync::Arc;

use crate::error::Result;
use crate::pattern::Pattern;
use crate::registry::Registry;

/// Default number of times one named pattern may be in flight during
/// generation before the branch is short-circuited.
pub const DEFAULT_CYCLE_DEPTH: usize = 2;

/// How value keys absent from an object pattern are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyCheck {
    /// Unexpected keys fail the match
    #[default]
    Strict,
    /// Unexpected keys are tolerated
    Extensible,
    /// Unexpected keys are matched against declared keys and reported as
    /// "did you mean" suggestions
    Fuzzy {
        /// Suggestions pointing at optional keys are warnings, not failures
        optional_as_warning: bool,
    },
}

/// Generation policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationStrategy {
    /// One instantiation per example, no variants
    #[default]
    NonGenerativeTests,
    /// Per-key variants; negatives unless `positive_only`
    GenerativeTestsEnabled { positive_only: bool },
}

/// The parts of a [`Resolver`] that come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub key_check: KeyCheck,
    pub strategy: GenerationStrategy,
    pub mock_mode: bool,
    pub cycle_depth: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            key_check: KeyCheck::default(),
            strategy: GenerationStrategy::default(),
            mock_mode: false,
            cycle_depth: DEFAULT_CYCLE_DEPTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
    settings: ResolverSettings,
    in_flight: Vec<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(Arc::new(Registry::new()))
    }
}

impl Resolver {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            settings: ResolverSettings::default(),
            in_flight: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_key_check(mut self, key_check: KeyCheck) -> Self {
        self.settings.key_check = key_check;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: GenerationStrategy) -> Self {
        self.settings.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.settings.mock_mode = mock_mode;
        self
    }

    #[must_use]
    pub fn with_cycle_depth(mut self, cycle_depth: usize) -> Self {
        self.settings.cycle_depth = cycle_depth.max(1);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> ResolverSettings {
        self.settings
    }

    #[must_use]
    pub fn key_check(&self) -> KeyCheck {
        self.settings.key_check
    }

    #[must_use]
    pub fn strategy(&self) -> GenerationStrategy {
        self.settings.strategy
    }

    #[must_use]
    pub fn is_generative(&self) -> bool {
        matches!(
            self.settings.strategy,
            GenerationStrategy::GenerativeTestsEnabled { .. }
        )
    }

    #[must_use]
    pub fn generates_negatives(&self) -> bool {
        matches!(
            self.settings.strategy,
            GenerationStrategy::GenerativeTestsEnabled {
                positive_only: false
            }
        )
    }

    #[must_use]
    pub fn mock_mode(&self) -> bool {
        self.settings.mock_mode
    }

    /// Look up a named pattern.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ContractError::UnknownPattern`] for unregistered names.
    pub fn resolve(&self, name: &str) -> Result<&Pattern> {
        self.registry.resolve(name)
    }

    /// How many times `name` is on the current generation stack.
    #[must_use]
    pub fn in_flight_count(&self, name: &str) -> usize {
        self.in_flight.iter().filter(|n| *n == name).count()
    }

    #[must_use]
    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight_count(name) > 0
    }

    /// Whether recursing into `name` again would exceed the cycle depth.
    #[must_use]
    pub fn cycle_exceeded(&self, name: &str) -> bool {
        self.in_flight_count(name) >= self.settings.cycle_depth
    }

    /// Derived resolver with `name` pushed onto the generation stack.
    #[must_use]
    pub fn entering(&self, name: &str) -> Self {
        let mut derived = self.clone();
        derived.in_flight.push(name.to_string());
        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_do_not_touch_the_original() {
        let base = Resolver::default();
        let fuzzy = base.clone().with_key_check(KeyCheck::Fuzzy {
            optional_as_warning: true,
        });
        assert_eq!(base.key_check(), KeyCheck::Strict);
        assert!(matches!(fuzzy.key_check(), KeyCheck::Fuzzy { .. }));
    }

    #[test]
    fn cycle_depth_counts_in_flight_names() {
        let resolver = Resolver::default().with_cycle_depth(2);
        let once = resolver.entering("Node");
        assert!(once.is_in_flight("Node"));
        assert!(!once.cycle_exceeded("Node"));
        let twice = once.entering("Node");
        assert!(twice.cycle_exceeded("Node"));
        assert!(!resolver.is_in_flight("Node"));
    }

    #[test]
    fn strategy_flags() {
        let positive = Resolver::default().with_strategy(GenerationStrategy::GenerativeTestsEnabled {
            positive_only: true,
        });
        assert!(positive.is_generative());
        assert!(!positive.generates_negatives());
        assert!(!Resolver::default().is_generative());
    }
}
