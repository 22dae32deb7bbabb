//! Serializable reports: the interchange format of the CLI
//!
//! Rendering (JUnit, CTRF, HTML) is left to consumers; these types are the
//! JSON they read.

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::http::HttpRequest;
use crate::lint::{LintRule, LintSeverity, LintViolation};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchResult};
use crate::scenario::{TestCase, TestKind};

/// Top-level document written by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContractReport {
    /// Spec file the report was produced from
    pub spec: String,
    #[serde(default)]
    pub lint: LintReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<GeneratedTest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchReport>,
}

/// Schema problems found while compiling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LintReport {
    pub errors: usize,
    pub warnings: usize,
    pub violations: Vec<LintEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LintEntry {
    pub rule: LintRule,
    pub severity: LintSeverity,
    pub breadcrumb: String,
    pub message: String,
}

impl LintReport {
    #[must_use]
    pub fn new(violations: &[LintViolation]) -> Self {
        let violations: Vec<LintEntry> = violations
            .iter()
            .map(|v| LintEntry {
                rule: v.rule,
                severity: v.severity(),
                breadcrumb: v.breadcrumb.clone(),
                message: v.message.clone(),
            })
            .collect();
        let errors = violations
            .iter()
            .filter(|v| v.severity == LintSeverity::Error)
            .count();
        Self {
            errors,
            warnings: violations.len() - errors,
            violations,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Outcome of matching one exchange or value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatchReport {
    /// What was matched, e.g. a scenario name or file
    pub subject: String,
    pub success: bool,
    /// Rendered failure tree; empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// `(breadcrumb, message)` per failing node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FailureEntry {
    pub breadcrumb: String,
    pub message: String,
}

impl MatchReport {
    #[must_use]
    pub fn new(subject: impl Into<String>, result: &MatchResult) -> Self {
        let subject = subject.into();
        match result.as_failure() {
            None => Self {
                subject,
                success: true,
                report: String::new(),
                reason: None,
                failures: Vec::new(),
            },
            Some(failure) => Self {
                subject,
                success: result.is_acceptable(),
                report: failure.report(),
                reason: failure.first_reason(),
                failures: failure
                    .entries()
                    .into_iter()
                    .map(|(breadcrumb, message)| FailureEntry { breadcrumb, message })
                    .collect(),
            },
        }
    }
}

/// One generated test with its concrete request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedTest {
    pub name: String,
    pub scenario: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub example: String,
    pub kind: TestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Declared status, or `4xx` for negative tests
    pub expected_status: String,
    pub request: HttpRequest,
}

impl GeneratedTest {
    pub fn new(test: &TestCase, resolver: &Resolver, rng: &mut impl Rng) -> Self {
        Self {
            name: test.name(),
            scenario: test.scenario.clone(),
            example: test.example.clone(),
            kind: test.kind,
            comment: test.comment.clone(),
            expected_status: test.expected_status(),
            request: test.generate_request(resolver, rng),
        }
    }
}

/// Generate JSON Schema for the interchange format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(ContractReport);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}
