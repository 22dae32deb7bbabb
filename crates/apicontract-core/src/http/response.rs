use rand::Rng;

use super::request::match_body;
use super::{HttpHeadersPattern, HttpResponse, collect};
use crate::pattern::Pattern;
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult, MismatchKind};

/// Shape of one declared response. Undeclared headers are tolerated.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponsePattern {
    pub status: u16,
    pub headers: HttpHeadersPattern,
    pub body: Option<Pattern>,
}

impl HttpResponsePattern {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HttpHeadersPattern::default().extensible(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HttpHeadersPattern) -> Self {
        self.headers = headers.extensible();
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Pattern) -> Self {
        self.body = Some(body);
        self
    }

    pub fn matches(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        if response.status != self.status {
            return MatchResult::failure(
                Failure::new(
                    MismatchKind::ValueMismatch,
                    format!("Expected status {}, actual was {}", self.status, response.status),
                )
                .with_reason(FailureReason::StatusMismatch)
                .under("STATUS")
                .under("RESPONSE"),
            );
        }
        let mut failures = Vec::new();
        failures.extend(collect(
            "HEADERS",
            self.headers
                .matches(&response.headers, resolver)
                .as_failure()
                .cloned()
                .into_iter()
                .collect(),
        ));
        failures.extend(match_body(self.body.as_ref(), response.body.as_ref(), resolver).map(|f| f.under("BODY")));
        MatchResult::from_failures(failures).breadcrumb("RESPONSE")
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> HttpResponse {
        HttpResponse {
            status: self.status,
            headers: self.headers.generate(resolver, rng),
            body: self.body.as_ref().map(|b| b.generate(resolver, rng)),
        }
    }
}
