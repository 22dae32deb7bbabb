//! Header patterns: case-insensitive names, content type, SOAPAction

use std::collections::BTreeMap;

use rand::Rng;

use super::{FieldPolicy, content_type, find_ignore_case, generate_fields, match_fields};
use crate::keys::key_name;
use crate::pattern::Pattern;
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult};
use crate::row::Row;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const SOAP_ACTION: &str = "SOAPAction";

/// Headers added by clients, proxies and servers on their own. They are
/// never reported as unexpected.
pub const IGNORED_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-encoding",
    "accept-language",
    "cache-control",
    "connection",
    "content-length",
    "date",
    "host",
    "keep-alive",
    "server",
    "transfer-encoding",
    "user-agent",
    "vary",
    "x-forwarded-for",
    "x-request-id",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpHeadersPattern {
    /// Declared headers; optional names carry a `?` suffix
    pub headers: BTreeMap<String, Pattern>,
    /// Headers declared further up (shared request parts); filtered out
    /// before the unexpected-header check
    pub ancestors: Vec<String>,
    pub content_type: Option<String>,
    /// Tolerate undeclared headers regardless of the key-check policy
    pub extensible: bool,
}

impl HttpHeadersPattern {
    #[must_use]
    pub fn new(headers: BTreeMap<String, Pattern>) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_ancestors(mut self, ancestors: Vec<String>) -> Self {
        self.ancestors = ancestors;
        self
    }

    #[must_use]
    pub fn extensible(mut self) -> Self {
        self.extensible = true;
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, pattern: Pattern) {
        self.headers.insert(name.into(), pattern);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.content_type.is_none()
    }

    pub fn matches(&self, actual: &BTreeMap<String, String>, resolver: &Resolver) -> MatchResult {
        self.matches_allowing(actual, &[], resolver)
    }

    /// Match, treating `allowed` header names (e.g. credentials checked
    /// elsewhere) as declared.
    pub fn matches_allowing(
        &self,
        actual: &BTreeMap<String, String>,
        allowed: &[&str],
        resolver: &Resolver,
    ) -> MatchResult {
        let ignored = |name: &str| {
            name.eq_ignore_ascii_case(CONTENT_TYPE)
                || IGNORED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
                || allowed.iter().any(|h| h.eq_ignore_ascii_case(name))
                || self.ancestors.iter().any(|h| key_name(h).eq_ignore_ascii_case(name))
        };
        let policy = FieldPolicy {
            case_insensitive: true,
            check_unexpected: !self.extensible,
            ignored: &ignored,
        };

        let mut failures: Vec<Failure> = match_fields(&self.headers, actual, policy, resolver)
            .into_iter()
            .map(|f| {
                if f.breadcrumb.eq_ignore_ascii_case(SOAP_ACTION) {
                    f.with_reason(FailureReason::SoapActionMismatch)
                } else {
                    f
                }
            })
            .collect();

        if let Some(expected) = &self.content_type {
            if let Some(failure) = content_type::check(expected, find_ignore_case(actual, CONTENT_TYPE)) {
                failures.push(failure.under(CONTENT_TYPE));
            }
        }
        MatchResult::from_failures(failures)
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> BTreeMap<String, String> {
        let mut headers = generate_fields(&self.headers, resolver, rng);
        if let Some(content_type) = &self.content_type {
            headers.insert(CONTENT_TYPE.to_string(), content_type.clone());
        }
        headers
    }

    fn with_headers(&self, headers: BTreeMap<String, Pattern>) -> Self {
        Self {
            headers,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Box<dyn Iterator<Item = (Self, Option<String>)>> {
        let this = self.clone();
        Box::new(super::positive_fields(&self.headers, row, resolver).map(move |(h, c)| (this.with_headers(h), c)))
    }

    #[must_use]
    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
    ) -> Box<dyn Iterator<Item = (Self, Option<String>)>> {
        let this = self.clone();
        Box::new(super::negative_fields(&self.headers, row, resolver).map(move |(h, c)| (this.with_headers(h), c)))
    }
}
