//! HTTP contract layer: request/response values and their patterns
//!
//! Headers, query parameters and path parameters are all "fields": named
//! string literals on the wire, each parsed under a [`Pattern`] before it is
//! matched. The helpers at the bottom of this module are shared by the three.

pub mod content_type;
pub mod headers;
pub mod path;
pub mod query;
pub mod request;
pub mod response;
pub mod security;

pub use content_type::MediaType;
pub use headers::HttpHeadersPattern;
pub use path::{HttpPathPattern, PathSegment};
pub use query::HttpQueryParamPattern;
pub use request::{HttpRequestPattern, RequestVariant, RequestVariants};
pub use response::HttpResponsePattern;
pub use security::SecurityScheme;

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::{self, Variant};
use crate::keys::{self, is_optional, key_name};
use crate::pattern::{AdditionalProperties, ObjectPattern, Pattern, token};
use crate::resolver::{KeyCheck, Resolver};
use crate::result::{Failure, MatchResult, MismatchKind};
use crate::row::Row;
use crate::value::ValueExt;

/// A concrete HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Request for `url`; a query string in `url` is split into parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (k.to_string(), v.to_string())
            })
            .collect();
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.to_string(),
            query,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value, looked up case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_ignore_case(&self.headers, name)
    }

    /// `METHOD /path?query` for logs and reports.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.query.is_empty() {
            return format!("{} {}", self.method, self.path);
        }
        let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{} {}?{}", self.method, self.path, query.join("&"))
    }
}

/// A concrete HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_ignore_case(&self.headers, name)
    }
}

pub(crate) fn ignore_none(_: &str) -> bool {
    false
}

pub(crate) fn find_ignore_case<'a>(map: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// How a set of named fields treats names it does not declare.
#[derive(Clone, Copy)]
pub(crate) struct FieldPolicy<'a> {
    pub case_insensitive: bool,
    pub check_unexpected: bool,
    /// Names never reported as unexpected
    pub ignored: &'a dyn Fn(&str) -> bool,
}

/// Match wire literals against declared field patterns. Failures are keyed
/// by field name; the caller adds the part's breadcrumb.
pub(crate) fn match_fields(
    declared: &BTreeMap<String, Pattern>,
    actual: &BTreeMap<String, String>,
    policy: FieldPolicy<'_>,
    resolver: &Resolver,
) -> Vec<Failure> {
    let same = |a: &str, b: &str| {
        if policy.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };
    let lookup = |name: &str| actual.iter().find(|(k, _)| same(k.as_str(), name)).map(|(_, v)| v.as_str());

    let mut failures = Vec::new();
    let mut suggested = BTreeSet::new();

    if policy.check_unexpected && resolver.key_check() != KeyCheck::Extensible {
        for name in actual.keys() {
            if (policy.ignored)(name) || declared.keys().any(|d| same(key_name(d), name.as_str())) {
                continue;
            }
            let candidate = match resolver.key_check() {
                KeyCheck::Fuzzy { .. } => keys::suggest(
                    name,
                    declared
                        .keys()
                        .map(|d| key_name(d))
                        .filter(|d| lookup(*d).is_none()),
                ),
                _ => None,
            };
            match candidate {
                Some(candidate) => {
                    let optional_as_warning =
                        matches!(resolver.key_check(), KeyCheck::Fuzzy { optional_as_warning: true });
                    let partial = optional_as_warning && declared.contains_key(&keys::optional_key(candidate));
                    suggested.insert(candidate.to_string());
                    failures.push(Failure::key_suggestion(name, candidate, partial).under(name.as_str()));
                }
                None => failures.push(Failure::unexpected_key(name).under(name.as_str())),
            }
        }
    }

    for (key, pattern) in declared {
        let name = key_name(key);
        match lookup(name) {
            Some(literal) => {
                if let Some(failure) = match_literal(pattern, literal, resolver) {
                    failures.push(failure.under(name));
                }
            }
            None if is_optional(key) || resolver.mock_mode() || suggested.contains(name) => {}
            None => failures.push(Failure::missing_key(name).under(name)),
        }
    }
    failures
}

/// Parse a wire literal under `pattern` and match it.
pub(crate) fn match_literal(pattern: &Pattern, literal: &str, resolver: &Resolver) -> Option<Failure> {
    if resolver.mock_mode() && token::is_token(literal) {
        return pattern
            .matches(&Value::String(literal.to_string()), resolver)
            .as_failure()
            .cloned();
    }
    match pattern.parse(literal, resolver) {
        Ok(value) => pattern.matches(&value, resolver).as_failure().cloned(),
        Err(_) => Some(Failure::new(
            MismatchKind::TypeMismatch,
            format!("Expected {}, actual was \"{literal}\"", pattern.type_name()),
        )),
    }
}

/// One value per declared field, rendered as wire literals.
pub(crate) fn generate_fields(
    declared: &BTreeMap<String, Pattern>,
    resolver: &Resolver,
    rng: &mut impl Rng,
) -> BTreeMap<String, String> {
    declared
        .iter()
        .map(|(key, pattern)| {
            (
                key_name(key).to_string(),
                pattern.generate(resolver, rng).to_string_literal(),
            )
        })
        .collect()
}

fn fields_pattern(declared: &BTreeMap<String, Pattern>) -> Pattern {
    Pattern::Object(ObjectPattern::new(declared.clone()).with_additional(AdditionalProperties::FreeForm))
}

fn fields_of(pattern: Pattern) -> BTreeMap<String, Pattern> {
    match pattern {
        Pattern::Object(object) => object.keys,
        _ => BTreeMap::new(),
    }
}

/// Field sets varied the way object keys are, as `(fields, comment)`.
pub(crate) type FieldVariants = Box<dyn Iterator<Item = (BTreeMap<String, Pattern>, Option<String>)>>;

pub(crate) fn positive_fields(
    declared: &BTreeMap<String, Pattern>,
    row: &Row,
    resolver: &Resolver,
) -> FieldVariants {
    Box::new(
        generation::positive(&fields_pattern(declared), row, resolver)
            .map(|Variant { pattern, comment }| (fields_of(pattern), comment)),
    )
}

/// Negative field sets. A mutation is kept only when its wire literal is
/// rejected too: `12345` is still a valid string header once rendered.
pub(crate) fn negative_fields(
    declared: &BTreeMap<String, Pattern>,
    row: &Row,
    resolver: &Resolver,
) -> FieldVariants {
    let original = declared.clone();
    let resolver = resolver.clone();
    let variants = generation::negative(&fields_pattern(declared), row, &resolver);
    Box::new(variants.filter_map(move |Variant { pattern, comment }| {
        let fields = fields_of(pattern);
        let mut rng = SmallRng::seed_from_u64(WIRE_CHECK_SEED);
        let wire = generate_fields(&fields, &resolver, &mut rng);
        let policy = FieldPolicy {
            case_insensitive: false,
            check_unexpected: false,
            ignored: &ignore_none,
        };
        let rejected = match_fields(&original, &wire, policy, &resolver)
            .iter()
            .any(|f| !f.is_partial());
        rejected.then_some((fields, comment))
    }))
}

const WIRE_CHECK_SEED: u64 = 0x00c0_ffee;

/// Failures of one request or response part, wrapped under its breadcrumb.
pub(crate) fn collect(part: &str, failures: Vec<Failure>) -> Option<Failure> {
    match MatchResult::from_failures(failures) {
        MatchResult::Success => None,
        MatchResult::Failure(f) => Some(f.under(part)),
    }
}
