//! Scenarios, generated test cases and stubbing
//!
//! A [`Scenario`] is one request/response contract (an OpenAPI operation
//! and status, or one DSL scenario) plus its example rows. A [`Feature`]
//! groups scenarios with the registry their patterns were compiled into.

use std::sync::Arc;

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::generation::validate_row;
use crate::http::{HttpRequest, HttpRequestPattern, HttpResponse, HttpResponsePattern};
use crate::registry::Registry;
use crate::resolver::{Resolver, ResolverSettings};
use crate::result::{Failure, FailureReason, MatchResult, MismatchKind, Results};
use crate::row::Row;
use crate::value::values_equal;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub request: HttpRequestPattern,
    pub response: HttpResponsePattern,
    pub examples: Vec<Row>,
}

impl Scenario {
    #[must_use]
    pub fn new(name: impl Into<String>, request: HttpRequestPattern, response: HttpResponsePattern) -> Self {
        Self {
            name: name.into(),
            request,
            response,
            examples: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_examples(mut self, examples: Vec<Row>) -> Self {
        self.examples = examples;
        self
    }

    pub fn matches_request(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        self.request.matches(request, resolver)
    }

    pub fn matches_response(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        self.response.matches(response, resolver)
    }

    /// Match a full exchange. A request failure seen together with a wrong
    /// status is tagged so the pair ranks below closer scenarios.
    pub fn matches(&self, request: &HttpRequest, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        match self.matches_request(request, resolver) {
            MatchResult::Success => self.matches_response(response, resolver),
            MatchResult::Failure(f) if response.status != self.response.status => {
                MatchResult::failure(f.with_reason(FailureReason::RequestMismatchButStatusAlsoWrong))
            }
            failure => failure,
        }
    }

    fn declares_success(&self) -> bool {
        (200..300).contains(&self.response.status)
    }

    /// Example rows; a 2xx scenario without examples gets one unseeded pass,
    /// other statuses are only exercised through examples.
    fn rows(&self) -> Vec<Row> {
        match (self.examples.is_empty(), self.declares_success()) {
            (false, _) => self.examples.clone(),
            (true, true) => vec![Row::new()],
            (true, false) => Vec::new(),
        }
    }

    /// Test cases for every example row (or one unseeded pass when there
    /// are none). Positive cases expect this scenario's response; negative
    /// cases, produced for 2xx scenarios when the resolver enables them,
    /// expect a 4xx.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ContractError::InvalidExample`] when a row value does
    /// not fit the request body it seeds.
    pub fn generate_tests(&self, resolver: &Resolver) -> Result<TestCases> {
        let rows = self.rows();
        if let Some(body) = &self.request.body {
            for row in &rows {
                validate_row(body, row, resolver)?;
            }
        }

        let scenario = self.clone();
        let resolver = resolver.clone();
        Ok(Box::new(rows.into_iter().flat_map(move |row| {
            let positives = {
                let scenario = scenario.clone();
                let row_name = row.name.clone();
                scenario
                    .request
                    .new_based_on(&row, &resolver)
                    .map(move |variant| TestCase {
                        scenario: scenario.name.clone(),
                        example: row_name.clone(),
                        kind: TestKind::Positive,
                        comment: variant.comment,
                        request: variant.pattern,
                        response: Some(scenario.response.clone()),
                    })
            };
            let negatives: Box<dyn Iterator<Item = TestCase>> = if resolver.generates_negatives() && scenario.declares_success() {
                let name = scenario.name.clone();
                let row_name = row.name.clone();
                Box::new(
                    scenario
                        .request
                        .negative_based_on(&row, &resolver)
                        .map(move |variant| TestCase {
                            scenario: name.clone(),
                            example: row_name.clone(),
                            kind: TestKind::Negative,
                            comment: variant.comment,
                            request: variant.pattern,
                            response: None,
                        }),
                )
            } else {
                Box::new(std::iter::empty())
            };
            positives.chain(negatives)
        })))
    }

    /// Response for a request this scenario accepts: the row's recorded
    /// response when one of its example requests equals `request`,
    /// otherwise a generated one.
    pub fn stub_response(&self, request: &HttpRequest, resolver: &Resolver, rng: &mut impl Rng) -> HttpResponse {
        let recorded = self.examples.iter().find_map(|row| match (&row.request_example, &row.response_example) {
            (Some(example), Some(response)) if same_request(example, request) => Some(response.clone()),
            _ => None,
        });
        recorded.unwrap_or_else(|| self.response.generate(resolver, rng))
    }
}

fn same_request(example: &HttpRequest, actual: &HttpRequest) -> bool {
    let bodies_equal = match (&example.body, &actual.body) {
        (Some(a), Some(b)) => values_equal(a, b),
        (None, None) => true,
        _ => false,
    };
    example.method.eq_ignore_ascii_case(&actual.method)
        && example.path == actual.path
        && example.query == actual.query
        && bodies_equal
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Positive,
    Negative,
}

/// One generated contract test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub scenario: String,
    /// Name of the example row that seeded this case
    pub example: String,
    pub kind: TestKind,
    pub comment: Option<String>,
    pub request: HttpRequestPattern,
    /// Expected response; `None` for negative cases, which expect a 4xx
    pub response: Option<HttpResponsePattern>,
}

pub type TestCases = Box<dyn Iterator<Item = TestCase>>;

impl TestCase {
    /// Display name: scenario, example and variant comment.
    #[must_use]
    pub fn name(&self) -> String {
        let mut name = match self.kind {
            TestKind::Positive => format!("+ve {}", self.scenario),
            TestKind::Negative => format!("-ve {}", self.scenario),
        };
        if !self.example.is_empty() {
            name.push_str(&format!(" [{}]", self.example));
        }
        if let Some(comment) = &self.comment {
            name.push_str(&format!(" ({comment})"));
        }
        name
    }

    /// Expected status as reported: the declared status, or `4xx`.
    #[must_use]
    pub fn expected_status(&self) -> String {
        self.response
            .as_ref()
            .map_or_else(|| "4xx".to_string(), |r| r.status.to_string())
    }

    pub fn generate_request(&self, resolver: &Resolver, rng: &mut impl Rng) -> HttpRequest {
        self.request.generate(resolver, rng)
    }

    /// Check what the system under test answered.
    pub fn check_response(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        match &self.response {
            Some(expected) => expected.matches(response, resolver),
            None if (400..500).contains(&response.status) => MatchResult::Success,
            None => MatchResult::failure(
                Failure::new(
                    MismatchKind::ValueMismatch,
                    format!("Expected a 4xx status, actual was {}", response.status),
                )
                .with_reason(FailureReason::StatusMismatch)
                .under("STATUS")
                .under("RESPONSE"),
            ),
        }
    }
}

/// Scenarios plus the registry their `Deferred` references point into.
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub scenarios: Vec<Scenario>,
    registry: Arc<Registry>,
    settings: ResolverSettings,
}

impl Feature {
    #[must_use]
    pub fn new(name: impl Into<String>, scenarios: Vec<Scenario>, registry: Registry) -> Self {
        Self {
            name: name.into(),
            scenarios,
            registry: Arc::new(registry),
            settings: ResolverSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolver over this feature's registry with its settings.
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.registry)).with_settings(self.settings)
    }

    #[must_use]
    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Test cases of every scenario, lazily, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first example row that does not fit its scenario.
    pub fn generate_tests(&self) -> Result<TestCases> {
        let resolver = self.resolver();
        let mut all: TestCases = Box::new(std::iter::empty());
        for scenario in &self.scenarios {
            all = Box::new(all.chain(scenario.generate_tests(&resolver)?));
        }
        Ok(all)
    }

    /// Mock response for `request` from the first scenario that accepts it.
    ///
    /// # Errors
    ///
    /// When no scenario accepts the request, returns the failures of the
    /// least fluffy candidates, grouped.
    pub fn stub_response(&self, request: &HttpRequest, rng: &mut impl Rng) -> std::result::Result<HttpResponse, Failure> {
        let resolver = self.resolver();
        let mut results = Results::default();
        for scenario in &self.scenarios {
            let result = scenario.matches_request(request, &resolver);
            if result.is_acceptable() {
                debug!(scenario = %scenario.name, request = %request.summary(), "stubbing response");
                return Ok(scenario.stub_response(request, &resolver, rng));
            }
            results.push(result);
        }
        let mut failures: Vec<Failure> = results.without_fluff().into_iter().cloned().collect();
        Err(match failures.len() {
            0 => Failure::new(MismatchKind::Nested, "No scenarios are declared"),
            1 => failures.remove(0),
            _ => Failure::group(failures),
        })
    }

    /// Match a recorded exchange against every scenario.
    #[must_use]
    pub fn matches(&self, request: &HttpRequest, response: &HttpResponse) -> Results {
        let resolver = self.resolver();
        Results::new(
            self.scenarios
                .iter()
                .map(|s| s.matches(request, response, &resolver))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpHeadersPattern, HttpPathPattern};
    use crate::pattern::{ObjectPattern, Pattern};
    use crate::resolver::GenerationStrategy;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn pet() -> Pattern {
        let mut keys = BTreeMap::new();
        keys.insert("id".to_string(), Pattern::integer());
        keys.insert("name".to_string(), Pattern::string());
        Pattern::Object(ObjectPattern::new(keys))
    }

    fn new_pet() -> Pattern {
        let mut keys = BTreeMap::new();
        keys.insert("name".to_string(), Pattern::string());
        keys.insert("age".to_string(), Pattern::integer());
        Pattern::Object(ObjectPattern::new(keys))
    }

    fn feature() -> Feature {
        let params: BTreeMap<_, _> = [("id".to_string(), Pattern::integer())].into();
        let get = Scenario::new(
            "GET /pets/{id} -> 200",
            HttpRequestPattern::new("GET", HttpPathPattern::parse("/pets/{id}", &params).unwrap()),
            HttpResponsePattern::new(200).with_body(pet()),
        )
        .with_examples(vec![
            Row::named("rex")
                .with_column("id", "7")
                .with_exchange(
                    HttpRequest::new("GET", "/pets/7"),
                    HttpResponse::new(200).with_body(json!({"id": 7, "name": "Rex"})),
                ),
        ]);
        let create = Scenario::new(
            "POST /pets -> 201",
            HttpRequestPattern::new("POST", HttpPathPattern::parse("/pets", &BTreeMap::new()).unwrap())
                .with_headers(HttpHeadersPattern::default().with_content_type("application/json"))
                .with_body(new_pet()),
            HttpResponsePattern::new(201).with_body(pet()),
        );
        Feature::new("pets", vec![get, create], Registry::new())
    }

    #[test]
    fn stub_uses_recorded_examples() {
        let mut rng = SmallRng::seed_from_u64(1);
        let response = feature().stub_response(&HttpRequest::new("GET", "/pets/7"), &mut rng).unwrap();
        assert_eq!(response.body, Some(json!({"id": 7, "name": "Rex"})));
    }

    #[test]
    fn stub_generates_when_no_example_matches() {
        let mut rng = SmallRng::seed_from_u64(1);
        let f = feature();
        let response = f.stub_response(&HttpRequest::new("GET", "/pets/8"), &mut rng).unwrap();
        assert_eq!(response.status, 200);
        assert!(f.scenarios[0].matches_response(&response, &f.resolver()).is_success());
    }

    #[test]
    fn stub_reports_the_closest_scenario() {
        let mut rng = SmallRng::seed_from_u64(1);
        let request = HttpRequest::new("POST", "/pets")
            .with_header("Content-Type", "application/json")
            .with_body(json!({"name": "Rex", "age": "old"}));
        let failure = feature().stub_response(&request, &mut rng).unwrap_err();
        let report = failure.report();
        assert!(report.contains("REQUEST.BODY.age"), "{report}");
        assert!(!report.contains("METHOD"), "{report}");
    }

    #[test]
    fn error_scenarios_only_run_from_examples() {
        let not_found = Scenario::new(
            "GET /pets/{id} -> 404",
            HttpRequestPattern::new("GET", HttpPathPattern::parse("/pets/{id}", &BTreeMap::new()).unwrap()),
            HttpResponsePattern::new(404),
        );
        let resolver = Resolver::default();
        assert_eq!(not_found.generate_tests(&resolver).unwrap().count(), 0);

        let seeded = not_found.with_examples(vec![Row::named("missing").with_column("id", "0")]);
        let tests: Vec<TestCase> = seeded.generate_tests(&resolver).unwrap().collect();
        assert!(!tests.is_empty());
        assert!(tests.iter().all(|t| t.expected_status() == "404" && t.example == "missing"));
    }

    #[test]
    fn negative_tests_expect_client_errors() {
        let f = feature().with_settings(ResolverSettings {
            strategy: GenerationStrategy::GenerativeTestsEnabled { positive_only: false },
            ..ResolverSettings::default()
        });
        let tests: Vec<TestCase> = f.generate_tests().unwrap().collect();
        let negatives: Vec<&TestCase> = tests.iter().filter(|t| t.kind == TestKind::Negative).collect();
        assert!(negatives.len() >= 3);
        assert!(negatives.iter().all(|t| t.expected_status() == "4xx"));
        let resolver = f.resolver();
        assert!(negatives[0].check_response(&HttpResponse::new(400), &resolver).is_success());
        assert!(!negatives[0].check_response(&HttpResponse::new(200), &resolver).is_success());
    }

    #[test]
    fn positive_only_generation_has_no_negatives() {
        let tests: Vec<TestCase> = feature().generate_tests().unwrap().collect();
        assert!(tests.iter().all(|t| t.kind == TestKind::Positive));
        assert_eq!(tests[0].name(), "+ve GET /pets/{id} -> 200 [rex]");
        let mut rng = SmallRng::seed_from_u64(3);
        let request = tests[0].generate_request(&feature().resolver(), &mut rng);
        assert_eq!(request.path, "/pets/7");
    }

    #[test]
    fn mistyped_examples_are_rejected_up_front() {
        let mut f = feature();
        f.scenarios[1].examples = vec![Row::named("bad").with_column("age", "old")];
        assert!(f.generate_tests().is_err());
    }

    #[test]
    fn request_mismatch_with_wrong_status_is_tagged() {
        let f = feature();
        let results = f.matches(&HttpRequest::new("GET", "/pets/x"), &HttpResponse::new(500));
        assert!(!results.has_success());
        assert!(results.report().contains("REQUEST.PATH.id"));
    }
}
