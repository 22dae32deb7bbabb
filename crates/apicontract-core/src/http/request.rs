use std::iter;

use rand::Rng;
use serde_json::Value;

use super::{
    HttpHeadersPattern, HttpPathPattern, HttpQueryParamPattern, HttpRequest, SecurityScheme, collect,
};
use crate::generation::{self, prefix_comment};
use crate::pattern::Pattern;
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult, MismatchKind};
use crate::row::Row;

/// Shape of the requests one operation accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestPattern {
    pub method: String,
    pub path: HttpPathPattern,
    pub query: HttpQueryParamPattern,
    pub headers: HttpHeadersPattern,
    /// `None` when the operation declares no body
    pub body: Option<Pattern>,
    /// Alternatives: a request carrying any one of them is authenticated
    pub security: Vec<SecurityScheme>,
}

/// One request pattern produced by generation, with what was varied.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestVariant {
    pub pattern: HttpRequestPattern,
    pub comment: Option<String>,
}

pub type RequestVariants = Box<dyn Iterator<Item = RequestVariant>>;

type Parts<T> = Box<dyn Iterator<Item = (T, Option<String>)>>;

impl HttpRequestPattern {
    #[must_use]
    pub fn new(method: &str, path: HttpPathPattern) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path,
            query: HttpQueryParamPattern::default(),
            headers: HttpHeadersPattern::default(),
            body: None,
            security: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: HttpQueryParamPattern) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HttpHeadersPattern) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Pattern) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_security(mut self, security: Vec<SecurityScheme>) -> Self {
        self.security = security;
        self
    }

    /// `METHOD /template` for names and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.path.template())
    }

    pub fn matches(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        if !self.method.eq_ignore_ascii_case(&request.method) {
            return MatchResult::failure(
                Failure::new(
                    MismatchKind::ValueMismatch,
                    format!("Expected method {}, actual was {}", self.method, request.method),
                )
                .with_reason(FailureReason::MethodMismatch)
                .under("METHOD")
                .under("REQUEST"),
            );
        }

        let path = self.path.matches(&request.path, resolver);
        if path.as_failure().and_then(Failure::first_reason) == Some(FailureReason::UrlPathMismatch) {
            return path.breadcrumb("PATH").breadcrumb("REQUEST");
        }

        let mut failures = Vec::new();
        failures.extend(path.breadcrumb("PATH").as_failure().cloned());

        let header_credentials: Vec<&str> = self.security.iter().filter_map(SecurityScheme::header_name).collect();
        let query_credentials: Vec<&str> = self.security.iter().filter_map(SecurityScheme::query_name).collect();

        let mut query_failures = Vec::new();
        let mut header_failures = Vec::new();
        if let Some(missing) = self.missing_credentials(request) {
            for (scheme, failure) in missing {
                if scheme.query_name().is_some() {
                    query_failures.push(failure);
                } else {
                    header_failures.push(failure);
                }
            }
        }
        query_failures.extend(
            self.query
                .matches_allowing(&request.query, &query_credentials, resolver)
                .as_failure()
                .cloned(),
        );
        header_failures.extend(
            self.headers
                .matches_allowing(&request.headers, &header_credentials, resolver)
                .as_failure()
                .cloned(),
        );
        failures.extend(collect("QUERY", query_failures));
        failures.extend(collect("HEADERS", header_failures));
        failures.extend(match_body(self.body.as_ref(), request.body.as_ref(), resolver).map(|f| f.under("BODY")));

        MatchResult::from_failures(failures).breadcrumb("REQUEST")
    }

    /// `None` when no scheme is declared or one of them is satisfied;
    /// otherwise the failure of every scheme.
    fn missing_credentials(&self, request: &HttpRequest) -> Option<Vec<(&SecurityScheme, Failure)>> {
        if self.security.is_empty() {
            return None;
        }
        let mut missing = Vec::new();
        for scheme in &self.security {
            match scheme.check(request) {
                None => return None,
                Some(failure) => missing.push((scheme, failure)),
            }
        }
        Some(missing)
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> HttpRequest {
        let mut request = HttpRequest {
            method: self.method.clone(),
            path: self.path.generate(resolver, rng),
            query: self.query.generate(resolver, rng),
            headers: self.headers.generate(resolver, rng),
            body: self.body.as_ref().map(|b| b.generate(resolver, rng)),
        };
        if let Some(scheme) = self.security.first() {
            scheme.apply(&mut request, rng);
        }
        request
    }

    fn body_variants(&self, row: &Row, resolver: &Resolver) -> Parts<Option<Pattern>> {
        match (&self.body, &row.request_body) {
            (Some(body), Some(literal)) => Box::new(iter::once((
                Some(generation::row_value_pattern(body, literal, resolver)),
                None,
            ))),
            (Some(body), None) => Box::new(generation::positive(body, row, resolver).map(|v| (Some(v.pattern), v.comment))),
            (None, _) => Box::new(iter::once((None, None))),
        }
    }

    /// The example-seeded request: every part at its first positive variant.
    fn base(&self, row: &Row, resolver: &Resolver) -> Self {
        Self {
            method: self.method.clone(),
            path: first(self.path.new_based_on(row, resolver)).unwrap_or_else(|| self.path.clone()),
            query: first(self.query.new_based_on(row, resolver)).unwrap_or_else(|| self.query.clone()),
            headers: first(self.headers.new_based_on(row, resolver)).unwrap_or_else(|| self.headers.clone()),
            body: first(self.body_variants(row, resolver)).unwrap_or_else(|| self.body.clone()),
            security: self.security.clone(),
        }
    }

    /// Positive request variants: the example-seeded request, then each
    /// part varied on its own with the other parts held at the example.
    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> RequestVariants {
        let base = self.base(row, resolver);
        Box::new(
            iter::once(RequestVariant {
                pattern: base.clone(),
                comment: None,
            })
            .chain(vary(&base, self.body_variants(row, resolver).skip(1), "", |r, b| r.body = b))
            .chain(vary(&base, self.query.new_based_on(row, resolver).skip(1), "QUERY", |r, q| r.query = q))
            .chain(vary(&base, self.headers.new_based_on(row, resolver).skip(1), "HEADERS", |r, h| {
                r.headers = h;
            }))
            .chain(vary(&base, self.path.new_based_on(row, resolver).skip(1), "PATH", |r, p| r.path = p)),
        )
    }

    /// Negative request variants: one part violated at a time, plus a
    /// request without credentials when the operation is secured.
    #[must_use]
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> RequestVariants {
        let base = self.base(row, resolver);
        let bodies: Parts<Option<Pattern>> = match &self.body {
            Some(body) => Box::new(generation::negative(body, row, resolver).map(|v| (Some(v.pattern), v.comment))),
            None => Box::new(iter::empty()),
        };
        let unauthenticated = (!self.security.is_empty()).then(|| RequestVariant {
            pattern: Self {
                security: Vec::new(),
                ..base.clone()
            },
            comment: Some("credentials omitted".to_string()),
        });
        Box::new(
            vary(&base, bodies, "", |r, b| r.body = b)
                .chain(vary(&base, self.query.negative_based_on(row, resolver), "QUERY", |r, q| r.query = q))
                .chain(vary(&base, self.headers.negative_based_on(row, resolver), "HEADERS", |r, h| {
                    r.headers = h;
                }))
                .chain(vary(&base, self.path.negative_based_on(row, resolver), "PATH", |r, p| r.path = p))
                .chain(unauthenticated),
        )
    }
}

fn first<T>(mut parts: Parts<T>) -> Option<T> {
    parts.next().map(|(part, _)| part)
}

fn vary<T: 'static>(
    base: &HttpRequestPattern,
    parts: impl Iterator<Item = (T, Option<String>)> + 'static,
    label: &'static str,
    set: impl Fn(&mut HttpRequestPattern, T) + 'static,
) -> impl Iterator<Item = RequestVariant> + 'static {
    let base = base.clone();
    parts.map(move |(part, comment)| {
        let mut pattern = base.clone();
        set(&mut pattern, part);
        let comment = match (label, comment) {
            (_, None) => None,
            ("", Some(c)) => Some(c),
            (label, Some(c)) => Some(prefix_comment(label, &c)),
        };
        RequestVariant { pattern, comment }
    })
}

/// Body check shared by requests and responses.
pub(crate) fn match_body(expected: Option<&Pattern>, actual: Option<&Value>, resolver: &Resolver) -> Option<Failure> {
    let pattern = expected?;
    match actual {
        Some(value) => pattern.matches(value, resolver).as_failure().cloned(),
        None if pattern.is_nullable() || resolver.mock_mode() => None,
        None => Some(Failure::new(
            MismatchKind::MissingKey,
            format!("Expected a body of type {}, but there was none", pattern.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ObjectPattern;
    use crate::resolver::GenerationStrategy;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn create_pet() -> HttpRequestPattern {
        let mut body = BTreeMap::new();
        body.insert("name".to_string(), Pattern::string());
        body.insert("age".to_string(), Pattern::integer());
        body.insert("tag?".to_string(), Pattern::string());
        let mut query = HttpQueryParamPattern::default();
        query.insert("dryRun?", Pattern::boolean());
        HttpRequestPattern::new("post", HttpPathPattern::parse("/pets", &BTreeMap::new()).unwrap())
            .with_query(query)
            .with_headers(HttpHeadersPattern::default().with_content_type("application/json"))
            .with_body(Pattern::Object(ObjectPattern::new(body)))
    }

    fn valid_request() -> HttpRequest {
        HttpRequest::new("POST", "/pets")
            .with_header("Content-Type", "application/json")
            .with_body(json!({"name": "Rex", "age": 3}))
    }

    #[test]
    fn matching_request_succeeds() {
        assert!(create_pet().matches(&valid_request(), &Resolver::default()).is_success());
    }

    #[test]
    fn method_and_path_mismatches_are_fluffy() {
        let resolver = Resolver::default();
        let wrong_method = HttpRequest {
            method: "GET".into(),
            ..valid_request()
        };
        let result = create_pet().matches(&wrong_method, &resolver);
        assert!(result.is_fluffy(1));
        assert_eq!(result.report(), ">> REQUEST.METHOD\n\n   Expected method POST, actual was GET");

        let wrong_path = HttpRequest {
            path: "/owners".into(),
            ..valid_request()
        };
        assert!(create_pet().matches(&wrong_path, &resolver).is_fluffy(1));
    }

    #[test]
    fn body_failures_carry_the_body_breadcrumb() {
        let request = valid_request().with_body(json!({"name": "Rex", "age": "three"}));
        let result = create_pet().matches(&request, &Resolver::default());
        let entries = result.as_failure().unwrap().entries();
        assert_eq!(entries[0].0, "REQUEST.BODY.age");
        assert!(!result.is_fluffy(0));
    }

    #[test]
    fn secured_requests_need_credentials() {
        let secured = create_pet().with_security(vec![
            SecurityScheme::Bearer,
            SecurityScheme::ApiKeyQuery { name: "key".into() },
        ]);
        let resolver = Resolver::default();
        assert!(!secured.matches(&valid_request(), &resolver).is_success());
        let with_key = valid_request().with_query("key", "k1");
        assert!(secured.matches(&with_key, &resolver).is_success());
        let with_token = valid_request().with_header("Authorization", "Bearer t");
        assert!(secured.matches(&with_token, &resolver).is_success());
    }

    #[test]
    fn generated_requests_match() {
        let mut rng = SmallRng::seed_from_u64(4);
        let resolver = Resolver::default();
        let secured = create_pet().with_security(vec![SecurityScheme::Basic]);
        let request = secured.generate(&resolver, &mut rng);
        assert!(secured.matches(&request, &resolver).is_success(), "{request:?}");
    }

    #[test]
    fn request_body_column_pins_the_whole_body() {
        let row = Row::new().with_request_body(r#"{"name": "Tom", "age": 7}"#);
        let first = create_pet().new_based_on(&row, &Resolver::default()).next().unwrap();
        assert_eq!(first.pattern.body, Some(Pattern::Exact(json!({"name": "Tom", "age": 7}))));
    }

    #[test]
    fn variants_vary_one_part_at_a_time() {
        let resolver = Resolver::default().with_strategy(GenerationStrategy::GenerativeTestsEnabled {
            positive_only: false,
        });
        let positives: Vec<_> = create_pet().new_based_on(&Row::new(), &resolver).collect();
        assert!(positives.iter().any(|v| v.comment.as_deref() == Some("tag omitted")
            || v.comment.as_deref() == Some("optional keys omitted")));
        let mut rng = SmallRng::seed_from_u64(8);
        for variant in &positives {
            let request = variant.pattern.generate(&resolver, &mut rng);
            assert!(create_pet().matches(&request, &resolver).is_success(), "{:?}", variant.comment);
        }

        let negatives: Vec<_> = create_pet().negative_based_on(&Row::new(), &resolver).collect();
        assert!(negatives.len() >= 2);
        for variant in &negatives {
            let request = variant.pattern.generate(&resolver, &mut rng);
            assert!(!create_pet().matches(&request, &resolver).is_success(), "{:?}", variant.comment);
        }
        assert!(negatives.iter().any(|v| v.comment.as_deref() == Some("QUERY.dryRun: boolean mutated to string")));
    }
}
