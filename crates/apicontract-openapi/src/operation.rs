//! One OpenAPI operation → scenarios, one per declared response status

use std::collections::{BTreeMap, BTreeSet};

use apicontract_core::http::headers::CONTENT_TYPE;
use apicontract_core::http::{
    HttpHeadersPattern, HttpPathPattern, HttpQueryParamPattern, MediaType, PathSegment,
};
use apicontract_core::keys::{is_optional, key_name, optional_key};
use apicontract_core::lint::{LintRule, LintViolation};
use apicontract_core::{
    ContractError, HttpRequest, HttpRequestPattern, HttpResponse, HttpResponsePattern, Pattern, Result, Row,
    Scenario, SecurityScheme,
};
use serde_json::Value;
use tracing::debug;

use crate::compiler::SchemaCompiler;
use crate::document::deref;

/// Operation keys of a path item, in the order scenarios are emitted.
pub(crate) const METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Header parameters OpenAPI describes elsewhere (media types, security).
const RESERVED_HEADERS: &[&str] = &["content-type", "accept", "authorization"];

/// Name given to a lone `example` value.
const DEFAULT_EXAMPLE: &str = "example";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug)]
struct Parameter<'a> {
    location: Location,
    name: String,
    required: bool,
    schema: Option<&'a Value>,
    raw: &'a Value,
}

pub(crate) struct Operation<'a> {
    document: &'a Value,
    path: &'a str,
    method: &'a str,
    path_item: &'a Value,
    operation: &'a Value,
}

impl<'a> Operation<'a> {
    pub(crate) fn new(
        document: &'a Value,
        path: &'a str,
        method: &'a str,
        path_item: &'a Value,
        operation: &'a Value,
    ) -> Self {
        Self {
            document,
            path,
            method,
            path_item,
            operation,
        }
    }

    fn breadcrumb(&self) -> String {
        format!("{} {}", self.method.to_ascii_uppercase(), self.path)
    }

    pub(crate) fn scenarios(&self, compiler: &mut SchemaCompiler<'_>) -> Result<Vec<Scenario>> {
        let parameters = self.parameters()?;
        let request = self.request(compiler, &parameters)?;
        let mut rows = self.request_rows(&parameters)?;
        let mut claimed = BTreeSet::new();

        let mut scenarios = Vec::new();
        let Some(responses) = self.operation.get("responses").and_then(Value::as_object) else {
            debug!(operation = %self.breadcrumb(), "operation declares no responses");
            return Ok(scenarios);
        };
        for (status, raw) in responses {
            let Ok(code) = status.parse::<u16>() else {
                debug!(operation = %self.breadcrumb(), status = %status, "skipping non-numeric response status");
                continue;
            };
            let response = deref(self.document, raw, &self.breadcrumb())?;
            let (pattern, media) = self.response(compiler, code, response)?;

            let mut examples = Vec::new();
            for (name, body) in self.media_examples(response.get("content"))? {
                let row = match rows.get(&name) {
                    Some(row) => {
                        claimed.insert(name.clone());
                        row.clone()
                    }
                    None => Row::named(name.as_str()),
                };
                let Some(concrete) = concrete_request(&request, &row) else {
                    if !row.is_empty() {
                        examples.push(row);
                    }
                    continue;
                };
                let mut recorded = HttpResponse::new(code).with_body(body.clone());
                if let Some(media) = &media {
                    recorded = recorded.with_header(CONTENT_TYPE, media.as_str());
                }
                examples.push(row.with_exchange(concrete, recorded));
            }

            let name = format!("{} -> {code}", request.summary());
            scenarios.push(Scenario::new(name, request.clone(), pattern).with_examples(examples));
        }

        rows.retain(|name, _| !claimed.contains(name));
        if !rows.is_empty() {
            let target = scenarios
                .iter()
                .position(|s| (200..300).contains(&s.response.status))
                .or_else(|| (!scenarios.is_empty()).then_some(0));
            if let Some(index) = target {
                scenarios[index].examples.extend(rows.into_values());
            }
        }
        Ok(scenarios)
    }

    /// Path-item parameters overridden by operation parameters of the same
    /// name and location.
    fn parameters(&self) -> Result<Vec<Parameter<'a>>> {
        let breadcrumb = self.breadcrumb();
        let mut parameters: Vec<Parameter<'a>> = Vec::new();
        let sources = [self.path_item.get("parameters"), self.operation.get("parameters")];
        for raw in sources.into_iter().flatten().filter_map(Value::as_array).flatten() {
            let raw = deref(self.document, raw, &breadcrumb)?;
            let name = raw
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ContractError::compilation(&breadcrumb, "parameter has no name"))?;
            let location = match raw.get("in").and_then(Value::as_str) {
                Some("path") => Location::Path,
                Some("query") => Location::Query,
                Some("header") => Location::Header,
                Some("cookie") => Location::Cookie,
                other => {
                    return Err(ContractError::compilation(
                        format!("{breadcrumb}.{name}"),
                        format!("unknown parameter location {other:?}"),
                    ));
                }
            };
            let schema = raw.get("schema").or_else(|| {
                raw.get("content")
                    .and_then(Value::as_object)
                    .and_then(|content| content.values().next())
                    .and_then(|media| media.get("schema"))
            });
            let parameter = Parameter {
                location,
                name: name.to_string(),
                required: location == Location::Path || raw.get("required").and_then(Value::as_bool).unwrap_or(false),
                schema,
                raw,
            };
            match parameters
                .iter_mut()
                .find(|p| p.location == location && p.name == name)
            {
                Some(existing) => *existing = parameter,
                None => parameters.push(parameter),
            }
        }
        Ok(parameters)
    }

    fn request(&self, compiler: &mut SchemaCompiler<'_>, parameters: &[Parameter<'a>]) -> Result<HttpRequestPattern> {
        let breadcrumb = self.breadcrumb();
        let mut path_params = BTreeMap::new();
        let mut query = HttpQueryParamPattern::default();
        let mut headers = HttpHeadersPattern::default();

        for parameter in parameters {
            let part = match parameter.location {
                Location::Path => "PATH",
                Location::Query => "QUERY",
                Location::Header => "HEADERS",
                Location::Cookie => {
                    debug!(operation = %breadcrumb, name = %parameter.name, "cookie parameters are not modelled");
                    continue;
                }
            };
            if parameter.location == Location::Header
                && RESERVED_HEADERS.contains(&parameter.name.to_ascii_lowercase().as_str())
            {
                debug!(operation = %breadcrumb, name = %parameter.name, "header is described by the operation itself");
                continue;
            }
            let pattern = match parameter.schema {
                Some(schema) => compiler.compile(schema, None, &format!("{breadcrumb}.{part}.{}", parameter.name))?,
                None => Pattern::string(),
            };
            let key = if parameter.required {
                parameter.name.clone()
            } else {
                optional_key(&parameter.name)
            };
            match parameter.location {
                Location::Path => {
                    path_params.insert(parameter.name.clone(), pattern);
                }
                Location::Query => query.insert(key, pattern),
                _ => headers.insert(key, pattern),
            }
        }

        let path = HttpPathPattern::parse(self.path, &path_params)?;
        let mut request = HttpRequestPattern::new(self.method, path).with_query(query);
        if let Some(raw) = self.operation.get("requestBody") {
            let body = deref(self.document, raw, &breadcrumb)?;
            if let Some((media, content)) = pick_media(body.get("content")) {
                let pattern = media_pattern(compiler, media, content, &format!("{breadcrumb}.REQUEST.BODY"))?;
                headers = headers.with_content_type(media);
                request = request.with_body(pattern);
            }
        }
        let declared: Vec<&str> = parameters
            .iter()
            .filter(|p| p.location == Location::Header)
            .map(|p| p.name.as_str())
            .collect();
        let headers = headers.with_ancestors(self.shared_headers(&declared));
        Ok(request.with_headers(headers).with_security(self.security()?))
    }

    /// Header parameters the document shares under `components.parameters`
    /// that this operation does not declare itself.
    fn shared_headers(&self, declared: &[&str]) -> Vec<String> {
        let shared = self
            .document
            .pointer("/components/parameters")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|parameters| parameters.values());
        let mut names: Vec<String> = shared
            .filter(|raw| raw.get("in").and_then(Value::as_str) == Some("header"))
            .filter_map(|raw| raw.get("name").and_then(Value::as_str))
            .filter(|name| !declared.iter().any(|d| d.eq_ignore_ascii_case(name)))
            .map(str::to_string)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn response(
        &self,
        compiler: &mut SchemaCompiler<'_>,
        status: u16,
        response: &Value,
    ) -> Result<(HttpResponsePattern, Option<String>)> {
        let breadcrumb = format!("{} -> {status}.RESPONSE", self.breadcrumb());
        let mut headers = HttpHeadersPattern::default();
        for (name, raw) in response.get("headers").and_then(Value::as_object).into_iter().flatten() {
            if name.eq_ignore_ascii_case(CONTENT_TYPE) {
                continue;
            }
            let header = deref(self.document, raw, &breadcrumb)?;
            let pattern = match header.get("schema") {
                Some(schema) => compiler.compile(schema, None, &format!("{breadcrumb}.HEADERS.{name}"))?,
                None => Pattern::string(),
            };
            let required = header.get("required").and_then(Value::as_bool).unwrap_or(false);
            headers.insert(if required { name.clone() } else { optional_key(name) }, pattern);
        }

        let mut pattern = HttpResponsePattern::new(status);
        let mut content_type = None;
        if let Some((media, content)) = pick_media(response.get("content")) {
            let body = media_pattern(compiler, media, content, &format!("{breadcrumb}.BODY"))?;
            headers = headers.with_content_type(media);
            content_type = Some(media.to_string());
            pattern = pattern.with_body(body);
        }
        Ok((pattern.with_headers(headers), content_type))
    }

    /// Credentials the operation accepts; any one of them satisfies it.
    fn security(&self) -> Result<Vec<SecurityScheme>> {
        let requirements = self
            .operation
            .get("security")
            .or_else(|| self.document.get("security"))
            .and_then(Value::as_array);
        let mut schemes = Vec::new();
        for requirement in requirements.into_iter().flatten() {
            let Some(requirement) = requirement.as_object() else {
                continue;
            };
            // `{}` makes the operation callable anonymously.
            if requirement.is_empty() {
                return Ok(Vec::new());
            }
            for name in requirement.keys() {
                let raw = self
                    .document
                    .get("components")
                    .and_then(|c| c.get("securitySchemes"))
                    .and_then(|s| s.get(name))
                    .ok_or_else(|| ContractError::UnresolvedReference {
                        breadcrumb: self.breadcrumb(),
                        reference: format!("#/components/securitySchemes/{name}"),
                    })?;
                let declared = deref(self.document, raw, &self.breadcrumb())?;
                match security_scheme(declared) {
                    Some(scheme) if !schemes.contains(&scheme) => schemes.push(scheme),
                    Some(_) => {}
                    None => debug!(operation = %self.breadcrumb(), scheme = %name, "security scheme is not modelled"),
                }
            }
        }
        Ok(schemes)
    }

    /// Rows named after parameter and request-body examples. Values sharing
    /// an example name end up in the same row.
    fn request_rows(&self, parameters: &[Parameter<'a>]) -> Result<BTreeMap<String, Row>> {
        let mut rows: BTreeMap<String, Row> = BTreeMap::new();
        for parameter in parameters.iter().filter(|p| p.location != Location::Cookie) {
            for (name, value) in self.examples(parameter.raw)? {
                let row = rows.entry(name.clone()).or_insert_with(|| Row::named(name));
                *row = std::mem::take(row).with_column(parameter.name.as_str(), literal(value));
            }
        }
        if let Some(raw) = self.operation.get("requestBody") {
            let body = deref(self.document, raw, &self.breadcrumb())?;
            for (name, value) in self.media_examples(body.get("content"))? {
                let row = rows.entry(name.clone()).or_insert_with(|| Row::named(name));
                *row = std::mem::take(row).with_request_body(literal(value));
            }
        }
        Ok(rows)
    }

    fn media_examples(&self, content: Option<&'a Value>) -> Result<Vec<(String, &'a Value)>> {
        match pick_media(content) {
            Some((_, media)) => self.examples(media),
            None => Ok(Vec::new()),
        }
    }

    /// `example` and `examples` of a parameter or media object. Example
    /// objects given only as `externalValue` are skipped.
    fn examples(&self, node: &'a Value) -> Result<Vec<(String, &'a Value)>> {
        let mut found = Vec::new();
        if let Some(value) = node.get("example") {
            found.push((DEFAULT_EXAMPLE.to_string(), value));
        }
        for (name, raw) in node.get("examples").and_then(Value::as_object).into_iter().flatten() {
            let example = deref(self.document, raw, &self.breadcrumb())?;
            match example.get("value") {
                Some(value) => found.push((name.clone(), value)),
                None => debug!(operation = %self.breadcrumb(), example = %name, "example has no inline value"),
            }
        }
        Ok(found)
    }
}

/// Preferred body representation: JSON, then form data, then whatever
/// comes first.
fn pick_media(content: Option<&Value>) -> Option<(&str, &Value)> {
    let content = content?.as_object()?;
    let find = |check: fn(&MediaType) -> bool| {
        content
            .iter()
            .find(|(name, _)| MediaType::parse(name).is_some_and(|m| check(&m)))
    };
    find(MediaType::is_json)
        .or_else(|| find(MediaType::is_form))
        .or_else(|| content.iter().next())
        .map(|(name, media)| (name.as_str(), media))
}

fn media_pattern(compiler: &mut SchemaCompiler<'_>, media: &str, content: &Value, breadcrumb: &str) -> Result<Pattern> {
    if MediaType::parse(media).is_some_and(|m| m.is_xml()) {
        compiler.record(LintViolation::new(
            LintRule::UnsupportedMediaType,
            breadcrumb,
            format!("{media} bodies are matched as plain strings"),
        ));
        return Ok(Pattern::string());
    }
    match content.get("schema") {
        Some(schema) => compiler.compile(schema, None, breadcrumb),
        None => Ok(Pattern::AnyValue),
    }
}

fn security_scheme(declared: &Value) -> Option<SecurityScheme> {
    let text = |key: &str| declared.get(key).and_then(Value::as_str);
    match text("type")? {
        "apiKey" => {
            let name = text("name")?.to_string();
            match text("in")? {
                "header" => Some(SecurityScheme::ApiKeyHeader { name }),
                "query" => Some(SecurityScheme::ApiKeyQuery { name }),
                _ => None,
            }
        }
        "http" => match text("scheme")?.to_ascii_lowercase().as_str() {
            "bearer" => Some(SecurityScheme::Bearer),
            "basic" => Some(SecurityScheme::Basic),
            _ => None,
        },
        "oauth2" | "openIdConnect" => Some(SecurityScheme::Bearer),
        _ => None,
    }
}

/// Row cell for an example value: strings verbatim, anything else as JSON.
fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The request an example row describes, when the row supplies every
/// required part.
pub(crate) fn concrete_request(pattern: &HttpRequestPattern, row: &Row) -> Option<HttpRequest> {
    let mut path = String::new();
    for segment in &pattern.path.segments {
        path.push('/');
        match segment {
            PathSegment::Literal(text) => path.push_str(text),
            PathSegment::Param { name, .. } => path.push_str(row.get(name)?),
        }
    }
    if path.is_empty() {
        path.push('/');
    }

    let mut request = HttpRequest::new(pattern.method.as_str(), &path);
    for key in pattern.query.params.keys() {
        match row.get(key_name(key)) {
            Some(value) => request = request.with_query(key_name(key), value),
            None if is_optional(key) => {}
            None => return None,
        }
    }
    for key in pattern.headers.headers.keys() {
        match row.get(key_name(key)) {
            Some(value) => request = request.with_header(key_name(key), value),
            None if is_optional(key) => {}
            None => return None,
        }
    }
    if let Some(content_type) = &pattern.headers.content_type {
        request = request.with_header(CONTENT_TYPE, content_type.as_str());
    }
    match (&pattern.body, &row.request_body) {
        (Some(_), Some(body)) => {
            let parsed = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone()));
            request = request.with_body(parsed);
        }
        (Some(_), None) => return None,
        (None, _) => {}
    }
    Some(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicontract_core::resolver::KeyCheck;
    use apicontract_core::{CompilerOptions, Resolver};
    use serde_json::json;

    use crate::document::SpecVersion;

    #[test]
    fn security_schemes_map_to_credentials() {
        assert_eq!(
            security_scheme(&json!({"type": "apiKey", "in": "header", "name": "X-Key"})),
            Some(SecurityScheme::ApiKeyHeader { name: "X-Key".into() })
        );
        assert_eq!(
            security_scheme(&json!({"type": "apiKey", "in": "query", "name": "key"})),
            Some(SecurityScheme::ApiKeyQuery { name: "key".into() })
        );
        assert_eq!(security_scheme(&json!({"type": "http", "scheme": "Bearer"})), Some(SecurityScheme::Bearer));
        assert_eq!(security_scheme(&json!({"type": "http", "scheme": "basic"})), Some(SecurityScheme::Basic));
        assert_eq!(security_scheme(&json!({"type": "oauth2", "flows": {}})), Some(SecurityScheme::Bearer));
        assert_eq!(security_scheme(&json!({"type": "apiKey", "in": "cookie", "name": "sid"})), None);
    }

    #[test]
    fn json_is_preferred_over_other_media() {
        let content = json!({
            "application/xml": {"schema": {"type": "string"}},
            "application/json": {"schema": {"type": "object"}}
        });
        assert_eq!(pick_media(Some(&content)).map(|(m, _)| m), Some("application/json"));
        let form = json!({"text/plain": {}, "application/x-www-form-urlencoded": {}});
        assert_eq!(pick_media(Some(&form)).map(|(m, _)| m), Some("application/x-www-form-urlencoded"));
        assert_eq!(pick_media(None), None);
    }

    #[test]
    fn shared_header_parameters_are_tolerated_but_not_required() {
        let document = json!({
            "openapi": "3.0.3",
            "paths": {"/pets": {"get": {
                "parameters": [{"$ref": "#/components/parameters/Trace"}],
                "responses": {"204": {"description": "empty"}}
            }}},
            "components": {"parameters": {
                "Tenant": {"name": "X-Tenant", "in": "header", "schema": {"type": "string"}},
                "Trace": {"name": "X-Trace", "in": "header", "schema": {"type": "string"}},
                "Limit": {"name": "limit", "in": "query", "schema": {"type": "integer"}}
            }}
        });
        let item = &document["paths"]["/pets"];
        let operation = Operation::new(&document, "/pets", "get", item, &item["get"]);
        let mut compiler = SchemaCompiler::new(&document, SpecVersion::V3_0, CompilerOptions::default());
        let scenarios = operation.scenarios(&mut compiler).unwrap();
        let request = &scenarios[0].request;
        assert_eq!(request.headers.ancestors, vec!["X-Tenant".to_string()]);

        let resolver = Resolver::default().with_key_check(KeyCheck::Strict);
        let tenant = HttpRequest::new("GET", "/pets").with_header("x-tenant", "t1");
        assert!(request.matches(&tenant, &resolver).is_success());
        let stranger = HttpRequest::new("GET", "/pets").with_header("X-Unknown", "1");
        assert!(!request.matches(&stranger, &resolver).is_success());
    }

    #[test]
    fn rows_become_concrete_requests() {
        let params: BTreeMap<_, _> = [("id".to_string(), Pattern::integer())].into();
        let mut query = HttpQueryParamPattern::default();
        query.insert("verbose?", Pattern::boolean());
        let pattern = HttpRequestPattern::new("get", HttpPathPattern::parse("/pets/{id}", &params).unwrap())
            .with_query(query);

        let row = Row::named("rex").with_column("id", "7");
        let request = concrete_request(&pattern, &row).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/pets/7");
        assert!(request.query.is_empty());

        assert!(concrete_request(&pattern, &Row::named("empty")).is_none());
    }
}
