//! Gherkin contract DSL
//!
//! Steps arrive already tokenized (keyword, text, optional table); the
//! Gherkin parser itself lives outside this crate. Supported step texts:
//!
//! ```text
//! Given type Pet                      (two-column table: key | pattern)
//! Given type Pets (Pet*)
//! When GET /pets/(id:integer)?limit=(integer)
//! And request-header X-Trace (string)
//! And query-param offset? (integer)
//! And request-body (Pet)              (or inline JSON, or a key | pattern table)
//! Then status 200
//! And response-header X-Rate (integer)
//! And response-body (Pet*)
//! ```
//!
//! `Examples` tables become example rows: the first line names the columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ContractError, Result};
use crate::http::headers::CONTENT_TYPE;
use crate::keys::key_name;
use crate::http::{HttpHeadersPattern, HttpPathPattern, HttpQueryParamPattern, HttpRequestPattern, HttpResponsePattern};
use crate::pattern::token::pattern_from_literal;
use crate::pattern::{AdditionalProperties, ObjectPattern, Pattern};
use crate::registry::Registry;
use crate::row::Row;
use crate::scenario::{Feature, Scenario};

/// One tokenized Gherkin step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// `Given`, `When`, `Then`, `And`, `But` or `*`
    pub keyword: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<Vec<String>>,
}

impl Step {
    #[must_use]
    pub fn new(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
            table: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: Vec<Vec<String>>) -> Self {
        self.table = table;
        self
    }

    fn describe(&self) -> String {
        format!("{} {}", self.keyword, self.text)
    }

    fn error(&self, message: impl Into<String>) -> ContractError {
        ContractError::Dsl {
            step: self.describe(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DslScenario {
    pub name: String,
    pub steps: Vec<Step>,
    /// Examples table; the first line holds the column names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DslFeature {
    pub name: String,
    /// Steps shared by every scenario: type declarations, and request
    /// headers every scenario tolerates without declaring them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub background: Vec<Step>,
    pub scenarios: Vec<DslScenario>,
}

/// Compile a DSL feature into scenarios over one registry of declared types.
///
/// # Errors
///
/// Returns [`ContractError::Dsl`] for unknown or malformed steps, duplicate
/// type declarations, scenarios without a request line or status, and
/// references to undeclared types.
pub fn compile_feature(feature: &DslFeature) -> Result<Feature> {
    let mut registry = Registry::new();
    let mut shared_headers = Vec::new();
    for step in &feature.background {
        match classify(step)? {
            StepKind::Type { name, rest } => declare_type(&mut registry, step, name, rest)?,
            StepKind::RequestHeader(text) => {
                let (name, _) = named_value(step, text)?;
                shared_headers.push(name.to_string());
            }
            _ => return Err(step.error("only type declarations and request headers are allowed in a background")),
        }
    }

    let mut scenarios = Vec::with_capacity(feature.scenarios.len());
    for dsl in &feature.scenarios {
        scenarios.push(compile_scenario(dsl, &mut registry, &shared_headers)?);
    }

    for scenario in &scenarios {
        check_references(scenario, &registry)?;
    }
    debug!(feature = %feature.name, scenarios = scenarios.len(), types = registry.len(), "compiled DSL feature");
    Ok(Feature::new(feature.name.clone(), scenarios, registry))
}

enum StepKind<'a> {
    Type { name: &'a str, rest: &'a str },
    Request { method: &'a str, url: &'a str },
    RequestHeader(&'a str),
    QueryParam(&'a str),
    RequestBody(&'a str),
    Status(&'a str),
    ResponseHeader(&'a str),
    ResponseBody(&'a str),
}

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE"];

fn classify(step: &Step) -> Result<StepKind<'_>> {
    let text = step.text.trim();
    let (word, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let rest = rest.trim();
    let kind = match word {
        "type" => {
            let (name, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if name.is_empty() {
                return Err(step.error("type declaration without a name"));
            }
            StepKind::Type { name, rest: rest.trim() }
        }
        method if METHODS.contains(&method) => {
            if !rest.starts_with('/') {
                return Err(step.error("request path must start with /"));
            }
            StepKind::Request { method, url: rest }
        }
        "request-header" => StepKind::RequestHeader(rest),
        "query-param" => StepKind::QueryParam(rest),
        "request-body" => StepKind::RequestBody(rest),
        "status" => StepKind::Status(rest),
        "response-header" => StepKind::ResponseHeader(rest),
        "response-body" => StepKind::ResponseBody(rest),
        _ => return Err(step.error("unknown step")),
    };
    Ok(kind)
}

fn declare_type(registry: &mut Registry, step: &Step, name: &str, rest: &str) -> Result<()> {
    let pattern = match (rest.is_empty(), step.table.is_empty()) {
        (false, true) => pattern_from_literal(rest).map_err(|e| step.error(e.to_string()))?,
        (true, false) => table_pattern(step)?,
        (true, true) => return Err(step.error("type declaration needs a pattern or a table")),
        (false, false) => return Err(step.error("type declaration has both a pattern and a table")),
    };
    if !registry.register(name, pattern.with_type_alias(name)) {
        return Err(step.error(format!("type {name} is declared more than once")));
    }
    Ok(())
}

/// Object pattern from a `key | pattern` table.
fn table_pattern(step: &Step) -> Result<Pattern> {
    let mut keys = BTreeMap::new();
    for line in &step.table {
        let [key, literal] = line.as_slice() else {
            return Err(step.error("type tables have exactly two columns"));
        };
        let pattern = pattern_from_literal(literal).map_err(|e| step.error(e.to_string()))?;
        keys.insert(key.trim().to_string(), pattern);
    }
    Ok(Pattern::Object(ObjectPattern::new(keys)))
}

/// `Name (pattern)` or `Name literal`.
fn named_value<'a>(step: &Step, text: &'a str) -> Result<(&'a str, Pattern)> {
    let (name, literal) = text
        .split_once(char::is_whitespace)
        .ok_or_else(|| step.error("expected a name followed by a value"))?;
    let pattern = pattern_from_literal(literal.trim()).map_err(|e| step.error(e.to_string()))?;
    Ok((name, pattern))
}

fn body_pattern(step: &Step, text: &str) -> Result<Pattern> {
    match (text.is_empty(), step.table.is_empty()) {
        (true, false) => table_pattern(step),
        (false, _) => pattern_from_literal(text).map_err(|e| step.error(e.to_string())),
        (true, true) => Err(step.error("body step needs a pattern, a JSON document or a table")),
    }
}

#[derive(Default)]
struct ScenarioBuilder {
    request: Option<(String, HttpPathPattern)>,
    query: HttpQueryParamPattern,
    request_headers: HttpHeadersPattern,
    request_body: Option<Pattern>,
    status: Option<u16>,
    response_headers: HttpHeadersPattern,
    response_body: Option<Pattern>,
}

fn compile_scenario(dsl: &DslScenario, registry: &mut Registry, shared_headers: &[String]) -> Result<Scenario> {
    let mut b = ScenarioBuilder::default();
    for step in &dsl.steps {
        match classify(step)? {
            StepKind::Type { name, rest } => declare_type(registry, step, name, rest)?,
            StepKind::Request { method, url } => {
                if b.request.is_some() {
                    return Err(step.error("scenario already has a request line"));
                }
                let (path, query) = url.split_once('?').unwrap_or((url, ""));
                let path = HttpPathPattern::parse(path, &BTreeMap::new()).map_err(|e| step.error(e.to_string()))?;
                for pair in query.split('&').filter(|p| !p.is_empty()) {
                    let (name, literal) = pair
                        .split_once('=')
                        .ok_or_else(|| step.error(format!("query parameter {pair:?} has no value")))?;
                    let pattern = pattern_from_literal(literal).map_err(|e| step.error(e.to_string()))?;
                    b.query.insert(name, pattern);
                }
                b.request = Some((method.to_string(), path));
            }
            StepKind::RequestHeader(text) => {
                let (name, pattern) = named_value(step, text)?;
                match (name.eq_ignore_ascii_case(CONTENT_TYPE), pattern) {
                    (true, Pattern::Exact(serde_json::Value::String(media))) => {
                        b.request_headers.content_type = Some(media);
                    }
                    (_, pattern) => b.request_headers.insert(name, pattern),
                }
            }
            StepKind::QueryParam(text) => {
                let (name, pattern) = named_value(step, text)?;
                b.query.insert(name, pattern);
            }
            StepKind::RequestBody(text) => b.request_body = Some(body_pattern(step, text)?),
            StepKind::Status(text) => {
                let status = text
                    .parse::<u16>()
                    .ok()
                    .filter(|s| (100..600).contains(s))
                    .ok_or_else(|| step.error(format!("{text:?} is not an HTTP status")))?;
                b.status = Some(status);
            }
            StepKind::ResponseHeader(text) => {
                let (name, pattern) = named_value(step, text)?;
                match (name.eq_ignore_ascii_case(CONTENT_TYPE), pattern) {
                    (true, Pattern::Exact(serde_json::Value::String(media))) => {
                        b.response_headers.content_type = Some(media);
                    }
                    (_, pattern) => b.response_headers.insert(name, pattern),
                }
            }
            StepKind::ResponseBody(text) => b.response_body = Some(body_pattern(step, text)?),
        }
    }

    let scenario_error = |message: &str| ContractError::Dsl {
        step: dsl.name.clone(),
        message: message.to_string(),
    };
    let (method, path) = b.request.ok_or_else(|| scenario_error("scenario has no request line"))?;
    let status = b.status.ok_or_else(|| scenario_error("scenario has no status"))?;

    let ancestors = shared_headers
        .iter()
        .filter(|shared| b.request_headers.headers.keys().all(|k| !key_name(k).eq_ignore_ascii_case(shared)))
        .cloned()
        .collect();
    let mut request = HttpRequestPattern::new(&method, path)
        .with_query(b.query)
        .with_headers(b.request_headers.with_ancestors(ancestors));
    if let Some(body) = b.request_body {
        request = request.with_body(body);
    }
    let mut response = HttpResponsePattern::new(status).with_headers(b.response_headers);
    if let Some(body) = b.response_body {
        response = response.with_body(body);
    }
    Ok(Scenario::new(dsl.name.clone(), request, response).with_examples(example_rows(dsl)?))
}

fn example_rows(dsl: &DslScenario) -> Result<Vec<Row>> {
    let Some((columns, lines)) = dsl.examples.split_first() else {
        return Ok(Vec::new());
    };
    lines
        .iter()
        .enumerate()
        .map(|(i, values)| {
            if values.len() != columns.len() {
                return Err(ContractError::InvalidExample {
                    example: format!("{} example {}", dsl.name, i + 1),
                    message: format!("expected {} values, found {}", columns.len(), values.len()),
                });
            }
            let mut row = Row::from_columns(columns, values);
            row.name = format!("example {}", i + 1);
            Ok(row)
        })
        .collect()
}

fn check_references(scenario: &Scenario, registry: &Registry) -> Result<()> {
    let mut names = Vec::new();
    let request = &scenario.request;
    let response = &scenario.response;
    let path_params = request.path.params();
    let patterns = request
        .query
        .params
        .values()
        .chain(request.headers.headers.values())
        .chain(path_params.values())
        .chain(request.body.iter())
        .chain(response.headers.headers.values())
        .chain(response.body.iter())
        .chain(registry.iter().map(|(_, p)| p));
    for pattern in patterns {
        referenced_names(pattern, &mut names);
    }
    match names.into_iter().find(|n| !registry.contains(n)) {
        Some(missing) => Err(ContractError::Dsl {
            step: scenario.name.clone(),
            message: format!("type {missing} is used but never declared"),
        }),
        None => Ok(()),
    }
}

fn referenced_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Deferred(name) => out.push(name.clone()),
        Pattern::Object(object) => {
            for p in object.keys.values() {
                referenced_names(p, out);
            }
            if let AdditionalProperties::Constrained(p) = &object.additional {
                referenced_names(p, out);
            }
        }
        Pattern::List(list) => referenced_names(&list.element, out),
        Pattern::Any(any) => {
            for p in &any.branches {
                referenced_names(p, out);
            }
        }
        Pattern::Scalar(_) | Pattern::Exact(_) | Pattern::Enum(_) | Pattern::AnyValue => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::resolver::KeyCheck;
    use crate::scenario::TestKind;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;

    fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| (*c).to_string()).collect())
            .collect()
    }

    fn pets_feature() -> DslFeature {
        DslFeature {
            name: "pets".into(),
            background: vec![
                Step::new("Given", "type Pet").with_table(table(&[
                    &["id", "(integer)"],
                    &["name", "(string)"],
                    &["tag?", "(string)"],
                ])),
            ],
            scenarios: vec![
                DslScenario {
                    name: "get pet".into(),
                    steps: vec![
                        Step::new("When", "GET /pets/(id:integer)"),
                        Step::new("Then", "status 200"),
                        Step::new("And", "response-header Content-Type application/json"),
                        Step::new("And", "response-body (Pet)"),
                    ],
                    examples: table(&[&["id"], &["7"], &["9"]]),
                },
                DslScenario {
                    name: "list pets".into(),
                    steps: vec![
                        Step::new("When", "GET /pets?limit=(integer)"),
                        Step::new("And", "query-param offset? (integer)"),
                        Step::new("Then", "status 200"),
                        Step::new("And", "response-body (Pet*)"),
                    ],
                    examples: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn compiled_scenarios_match_traffic() {
        let feature = compile_feature(&pets_feature()).unwrap();
        let resolver = feature.resolver();
        let get = feature.scenario("get pet").unwrap();
        assert!(get.matches_request(&HttpRequest::new("GET", "/pets/3"), &resolver).is_success());
        let response = HttpResponse::new(200)
            .with_header("Content-Type", "application/json")
            .with_body(json!({"id": 3, "name": "Rex"}));
        assert!(get.matches_response(&response, &resolver).is_success());

        let list = feature.scenario("list pets").unwrap();
        let request = HttpRequest::new("GET", "/pets?limit=10");
        assert!(list.matches_request(&request, &resolver).is_success());
        let missing_limit = list.matches_request(&HttpRequest::new("GET", "/pets?offset=2"), &resolver);
        assert!(missing_limit.report().contains("REQUEST.QUERY.limit"), "{}", missing_limit.report());
    }

    #[test]
    fn examples_become_rows() {
        let feature = compile_feature(&pets_feature()).unwrap();
        let tests: Vec<_> = feature.generate_tests().unwrap().collect();
        let gets: Vec<_> = tests
            .iter()
            .filter(|t| t.scenario == "get pet" && t.kind == TestKind::Positive)
            .collect();
        assert_eq!(gets.len(), 2);
        let mut rng = SmallRng::seed_from_u64(4);
        let request = gets[1].generate_request(&feature.resolver(), &mut rng);
        assert_eq!(request.path, "/pets/9");
    }

    #[test]
    fn inline_bodies_and_type_tokens() {
        let dsl = DslFeature {
            name: "orders".into(),
            background: vec![Step::new("Given", "type Ids (integer*)")],
            scenarios: vec![DslScenario {
                name: "create order".into(),
                steps: vec![
                    Step::new("When", "POST /orders"),
                    Step::new("And", "request-header Content-Type application/json"),
                    Step::new("And", r#"request-body {"items": "(Ids)", "note": "(string)"}"#),
                    Step::new("Then", "status 201"),
                ],
                examples: Vec::new(),
            }],
        };
        let feature = compile_feature(&dsl).unwrap();
        let resolver = feature.resolver();
        let scenario = &feature.scenarios[0];
        let request = HttpRequest::new("POST", "/orders")
            .with_header("Content-Type", "application/json")
            .with_body(json!({"items": [1, 2], "note": "asap"}));
        assert!(scenario.matches_request(&request, &resolver).is_success());
        let wrong = request.clone().with_body(json!({"items": ["a"], "note": "asap"}));
        assert!(!scenario.matches_request(&wrong, &resolver).is_success());
    }

    #[test]
    fn undeclared_types_are_rejected() {
        let mut dsl = pets_feature();
        dsl.scenarios[0].steps[3] = Step::new("And", "response-body (Owner)");
        let err = compile_feature(&dsl).unwrap_err();
        assert!(err.to_string().contains("Owner"), "{err}");
    }

    #[test]
    fn background_headers_are_tolerated_by_every_scenario() {
        let mut dsl = pets_feature();
        dsl.background.push(Step::new("And", "request-header X-Tenant (string)"));
        let feature = compile_feature(&dsl).unwrap();
        let get = feature.scenario("get pet").unwrap();
        assert_eq!(get.request.headers.ancestors, vec!["X-Tenant".to_string()]);
        assert!(!get.request.headers.headers.contains_key("X-Tenant"));

        let resolver = feature.resolver().with_key_check(KeyCheck::Strict);
        let tenant = HttpRequest::new("GET", "/pets/3").with_header("x-tenant", "t1");
        assert!(get.matches_request(&tenant, &resolver).is_success());
        let stranger = HttpRequest::new("GET", "/pets/3").with_header("X-Other", "t1");
        assert!(!get.matches_request(&stranger, &resolver).is_success());
    }

    #[test]
    fn backgrounds_reject_request_lines() {
        let mut dsl = pets_feature();
        dsl.background.push(Step::new("When", "GET /pets"));
        assert!(matches!(compile_feature(&dsl), Err(ContractError::Dsl { .. })));
    }

    #[test]
    fn malformed_steps_are_rejected() {
        let cases = [
            Step::new("When", "FETCH /pets"),
            Step::new("Then", "status ok"),
            Step::new("When", "GET pets"),
            Step::new("And", "request-header X-Trace"),
        ];
        for step in cases {
            let dsl = DslFeature {
                name: "bad".into(),
                background: Vec::new(),
                scenarios: vec![DslScenario {
                    name: "bad".into(),
                    steps: vec![step.clone()],
                    examples: Vec::new(),
                }],
            };
            assert!(
                matches!(compile_feature(&dsl), Err(ContractError::Dsl { .. })),
                "{step:?}"
            );
        }
    }

    #[test]
    fn scenarios_need_a_request_and_status() {
        let mut dsl = pets_feature();
        dsl.scenarios[1].steps.retain(|s| !s.text.starts_with("status"));
        let err = compile_feature(&dsl).unwrap_err();
        assert!(err.to_string().contains("no status"), "{err}");
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let mut dsl = pets_feature();
        dsl.scenarios[0].steps.insert(0, Step::new("Given", "type Pet (string)"));
        assert!(compile_feature(&dsl).is_err());
    }

    #[test]
    fn ragged_example_tables_are_rejected() {
        let mut dsl = pets_feature();
        dsl.scenarios[0].examples = table(&[&["id", "name"], &["7"]]);
        assert!(matches!(
            compile_feature(&dsl),
            Err(ContractError::InvalidExample { .. })
        ));
    }
}
