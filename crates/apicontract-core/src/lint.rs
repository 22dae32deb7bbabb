//! Lint records for tolerated schema problems
//!
//! Lint violations never abort compilation. Each one carries a stable rule
//! identifier so reports and tests can key on it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Stable lint rule identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LintRule {
    /// Constraint value that cannot be used at all
    BadValue,
    /// Bounds that contradict each other and were repaired
    ConflictingConstraints,
    /// Length bound clamped to the configured ceiling
    LengthDownsampled,
    /// Schema with no recognisable shape, degraded to any value
    UnknownSchema,
    /// allOf branches that declare the same key with incompatible types
    AllOfTypeConflict,
    /// Media type the compiler does not model, treated as a plain string
    UnsupportedMediaType,
}

impl LintRule {
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::BadValue => "BAD_VALUE",
            Self::ConflictingConstraints => "CONFLICTING_CONSTRAINTS",
            Self::LengthDownsampled => "LENGTH_DOWNSAMPLED",
            Self::UnknownSchema => "UNKNOWN_SCHEMA",
            Self::AllOfTypeConflict => "ALL_OF_TYPE_CONFLICT",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
        }
    }

    #[must_use]
    pub const fn severity(self) -> LintSeverity {
        match self {
            Self::BadValue => LintSeverity::Error,
            _ => LintSeverity::Warning,
        }
    }
}

impl std::fmt::Display for LintRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Warning,
    Error,
}

/// One tolerated (or rejected) schema problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LintViolation {
    pub rule: LintRule,
    pub breadcrumb: String,
    pub message: String,
}

impl LintViolation {
    pub fn new(rule: LintRule, breadcrumb: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule,
            breadcrumb: breadcrumb.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn severity(&self) -> LintSeverity {
        self.rule.severity()
    }

    /// Emit this violation through `tracing`.
    pub fn log(&self) {
        match self.severity() {
            LintSeverity::Error => error!(
                rule = self.rule.id(),
                breadcrumb = %self.breadcrumb,
                "{}",
                self.message
            ),
            LintSeverity::Warning => warn!(
                rule = self.rule.id(),
                breadcrumb = %self.breadcrumb,
                "{}",
                self.message
            ),
        }
    }
}

impl std::fmt::Display for LintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.rule.id(), self.breadcrumb, self.message)
    }
}

/// Collects violations during one compilation, logging each as it arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintLog {
    violations: Vec<LintViolation>,
}

impl LintLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, violation: LintViolation) {
        violation.log();
        self.violations.push(violation);
    }

    #[must_use]
    pub fn violations(&self) -> &[LintViolation] {
        &self.violations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation carries the given rule.
    #[must_use]
    pub fn has(&self, rule: LintRule) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<LintViolation> {
        self.violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_ids_are_stable() {
        assert_eq!(LintRule::ConflictingConstraints.id(), "CONFLICTING_CONSTRAINTS");
        assert_eq!(
            serde_json::to_value(LintRule::BadValue).unwrap(),
            serde_json::json!("BAD_VALUE")
        );
    }

    #[test]
    fn bad_value_is_an_error() {
        assert_eq!(LintRule::BadValue.severity(), LintSeverity::Error);
        assert_eq!(LintRule::UnknownSchema.severity(), LintSeverity::Warning);
    }

    #[test]
    fn log_records_in_order() {
        let mut log = LintLog::new();
        log.record(LintViolation::new(LintRule::UnknownSchema, "a", "first"));
        log.record(LintViolation::new(LintRule::LengthDownsampled, "b", "second"));
        assert_eq!(log.violations().len(), 2);
        assert!(log.has(LintRule::LengthDownsampled));
        assert!(!log.has(LintRule::BadValue));
        assert_eq!(log.violations()[0].to_string(), "[UNKNOWN_SCHEMA] a: first");
    }
}
