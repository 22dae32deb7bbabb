//! Match outcomes: success, or a tree of failures with breadcrumbs
//!
//! A [`Failure`] node carries its own breadcrumb segment; the full path of a
//! leaf is the concatenation of segments from the root. [`FailureReason`]
//! tags drive fluffiness ranking when many candidate scenarios are tried.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Why a match failed at the HTTP/scenario level. Used to rank near-misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// HTTP method differs
    MethodMismatch,
    /// Path literal segments differ
    UrlPathMismatch,
    /// SOAPAction header differs
    SoapActionMismatch,
    /// Response status differs
    StatusMismatch,
    /// Media type differs
    ContentTypeMismatch,
    /// Request differed and the status was wrong as well
    RequestMismatchButStatusAlsoWrong,
    /// Discriminated union branch did not match
    DiscriminatorMismatch,
    /// Key looks like a misspelling of a declared key
    KeyNameMisspelt,
}

impl FailureReason {
    /// Higher levels are more likely to be an irrelevant near-miss.
    #[must_use]
    pub const fn fluff_level(self) -> u8 {
        match self {
            Self::MethodMismatch | Self::UrlPathMismatch | Self::SoapActionMismatch => 2,
            Self::StatusMismatch
            | Self::ContentTypeMismatch
            | Self::RequestMismatchButStatusAlsoWrong => 1,
            Self::DiscriminatorMismatch | Self::KeyNameMisspelt => 0,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::MethodMismatch => "method mismatch",
            Self::UrlPathMismatch => "url path mismatch",
            Self::SoapActionMismatch => "SOAPAction mismatch",
            Self::StatusMismatch => "status mismatch",
            Self::ContentTypeMismatch => "content-type mismatch",
            Self::RequestMismatchButStatusAlsoWrong => "request mismatch with wrong status",
            Self::DiscriminatorMismatch => "discriminator mismatch",
            Self::KeyNameMisspelt => "key name misspelt",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// What went wrong at one node of the failure tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    TypeMismatch,
    ValueMismatch,
    ConstraintViolation,
    MissingKey,
    UnexpectedKey,
    KeySuggestion,
    /// Wrapper node that only adds a breadcrumb or groups causes
    Nested,
}

/// One node of a failure tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub breadcrumb: String,
    pub kind: MismatchKind,
    pub reason: Option<FailureReason>,
    /// Warning-level failure (e.g. fuzzy key suggestion on an optional key)
    pub partial: bool,
    pub causes: Vec<Failure>,
}

impl Failure {
    pub fn new(kind: MismatchKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            breadcrumb: String::new(),
            kind,
            reason: None,
            partial: false,
            causes: Vec::new(),
        }
    }

    pub fn type_mismatch(expected: &str, actual: &serde_json::Value) -> Self {
        use crate::value::ValueExt;
        Self::new(
            MismatchKind::TypeMismatch,
            format!(
                "Expected {expected}, actual was {} ({})",
                actual.display_short(),
                actual.type_name()
            ),
        )
    }

    pub fn missing_key(key: &str) -> Self {
        Self::new(
            MismatchKind::MissingKey,
            format!("Expected key named \"{key}\" was missing"),
        )
    }

    pub fn unexpected_key(key: &str) -> Self {
        Self::new(
            MismatchKind::UnexpectedKey,
            format!("Key named \"{key}\" was unexpected"),
        )
    }

    pub fn key_suggestion(key: &str, candidate: &str, partial: bool) -> Self {
        let mut failure = Self::new(
            MismatchKind::KeySuggestion,
            format!("Key named \"{key}\" was unexpected, did you mean \"{candidate}\"?"),
        )
        .with_reason(FailureReason::KeyNameMisspelt);
        failure.partial = partial;
        failure
    }

    /// Group several failures under one (breadcrumb-less) node.
    pub fn group(causes: Vec<Failure>) -> Self {
        let partial = causes.iter().all(Failure::is_partial);
        Self {
            message: String::new(),
            breadcrumb: String::new(),
            kind: MismatchKind::Nested,
            reason: None,
            partial,
            causes,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: FailureReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Wrap this failure under a breadcrumb segment.
    #[must_use]
    pub fn under(self, segment: impl Into<String>) -> Self {
        let partial = self.is_partial();
        Self {
            message: String::new(),
            breadcrumb: segment.into(),
            kind: MismatchKind::Nested,
            reason: None,
            partial,
            causes: vec![self],
        }
    }

    /// Whether every leaf of this tree is a warning.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        if self.causes.is_empty() {
            self.partial
        } else {
            self.partial || self.causes.iter().all(Failure::is_partial)
        }
    }

    /// Whether this failure is a near-miss above the acceptable fluff level.
    #[must_use]
    pub fn is_fluffy(&self, acceptable_level: u8) -> bool {
        self.reason
            .is_some_and(|r| r.fluff_level() > acceptable_level)
            || self.causes.iter().any(|c| c.is_fluffy(acceptable_level))
    }

    /// First reason tag found walking the tree depth-first.
    #[must_use]
    pub fn first_reason(&self) -> Option<FailureReason> {
        self.reason
            .or_else(|| self.causes.iter().find_map(Failure::first_reason))
    }

    /// Whether any node of the tree has the given kind.
    #[must_use]
    pub fn contains_kind(&self, kind: MismatchKind) -> bool {
        self.kind == kind || self.causes.iter().any(|c| c.contains_kind(kind))
    }

    /// Depth of the deepest breadcrumb: deeper failures matched more structure.
    #[must_use]
    pub fn closeness(&self) -> usize {
        let own = usize::from(!self.breadcrumb.is_empty());
        own + self.causes.iter().map(Failure::closeness).max().unwrap_or(0)
    }

    /// `(full path, message)` for every node that carries a message.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_entries("", &mut out);
        out
    }

    fn collect_entries(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        let path = join_breadcrumb(prefix, &self.breadcrumb);
        if !self.message.is_empty() {
            out.push((path.clone(), self.message.clone()));
        }
        for cause in &self.causes {
            cause.collect_entries(&path, out);
        }
    }

    /// Human-readable report: one `>> path` block per failing node.
    #[must_use]
    pub fn report(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(path, message)| {
                if path.is_empty() {
                    format!("   {message}")
                } else {
                    format!(">> {path}\n\n   {message}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Join breadcrumb segments: index segments attach without a dot.
fn join_breadcrumb(prefix: &str, segment: &str) -> String {
    match (prefix.is_empty(), segment.is_empty()) {
        (_, true) => prefix.to_string(),
        (true, false) => segment.to_string(),
        (false, false) if segment.starts_with('[') => format!("{prefix}{segment}"),
        (false, false) => format!("{prefix}.{segment}"),
    }
}

/// Outcome of a match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Success,
    Failure(Failure),
}

impl MatchResult {
    pub fn failure(failure: Failure) -> Self {
        Self::Failure(failure)
    }

    /// Success when there are no failures, the single failure when there is
    /// one, otherwise a grouping node.
    pub fn from_failures(mut failures: Vec<Failure>) -> Self {
        match failures.len() {
            0 => Self::Success,
            1 => Self::Failure(failures.remove(0)),
            _ => Self::Failure(Failure::group(failures)),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Success, or a failure made only of warnings.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        match self {
            Self::Success => true,
            Self::Failure(f) => f.is_partial(),
        }
    }

    #[must_use]
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Success => None,
            Self::Failure(f) => Some(f),
        }
    }

    /// Prefix the failure (if any) with a breadcrumb segment.
    #[must_use]
    pub fn breadcrumb(self, segment: impl Into<String>) -> Self {
        match self {
            Self::Success => Self::Success,
            Self::Failure(f) => Self::Failure(f.under(segment)),
        }
    }

    /// Tag the failure (if any) with a reason.
    #[must_use]
    pub fn with_reason(self, reason: FailureReason) -> Self {
        match self {
            Self::Success => Self::Success,
            Self::Failure(f) => Self::Failure(f.with_reason(reason)),
        }
    }

    #[must_use]
    pub fn is_fluffy(&self, acceptable_level: u8) -> bool {
        self.as_failure()
            .is_some_and(|f| f.is_fluffy(acceptable_level))
    }

    #[must_use]
    pub fn report(&self) -> String {
        match self {
            Self::Success => String::new(),
            Self::Failure(f) => f.report(),
        }
    }
}

/// Results of matching one value against many candidates (e.g. scenarios).
#[derive(Debug, Clone, Default)]
pub struct Results {
    results: Vec<MatchResult>,
}

impl Results {
    #[must_use]
    pub fn new(results: Vec<MatchResult>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, result: MatchResult) {
        self.results.push(result);
    }

    #[must_use]
    pub fn has_success(&self) -> bool {
        self.results.iter().any(MatchResult::is_success)
    }

    /// Failures with fluffy ones discarded first: level 0, then level 1,
    /// falling back to every failure when all of them are fluffy.
    #[must_use]
    pub fn without_fluff(&self) -> Vec<&Failure> {
        let failures: Vec<&Failure> = self
            .results
            .iter()
            .filter_map(MatchResult::as_failure)
            .collect();
        for level in 0..=1 {
            let kept: Vec<&Failure> = failures
                .iter()
                .copied()
                .filter(|f| !f.is_fluffy(level))
                .collect();
            if !kept.is_empty() {
                return kept;
            }
        }
        failures
    }

    /// The least fluffy failure, preferring the one that matched the most
    /// structure.
    #[must_use]
    pub fn most_relevant(&self) -> Option<&Failure> {
        self.without_fluff()
            .into_iter()
            .max_by_key(|f| f.closeness())
    }

    #[must_use]
    pub fn report(&self) -> String {
        self.without_fluff()
            .into_iter()
            .map(Failure::report)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
