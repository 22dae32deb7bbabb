//! External example files: recorded exchanges that seed scenarios
//!
//! Each `*.json` file in the examples directory holds one exchange:
//!
//! ```json
//! {
//!   "name": "rex",
//!   "request": {"method": "GET", "path": "/pets/7"},
//!   "response": {"status": 200, "body": {"id": 7, "name": "Rex"}}
//! }
//! ```

use std::path::Path;

use apicontract_core::http::PathSegment;
use apicontract_core::keys::key_name;
use apicontract_core::{ContractError, Feature, HttpRequest, HttpRequestPattern, HttpResponse, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::SpecError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalExample {
    /// Defaults to the file stem
    #[serde(default)]
    pub name: String,
    pub request: HttpRequest,
    pub response: HttpResponse,
}

/// Load every `*.json` example in `dir`, in file-name order.
///
/// # Errors
///
/// Returns [`SpecError::Io`] when the directory or a file cannot be read and
/// [`SpecError::Parse`] for malformed example files.
pub fn load_examples(dir: &Path) -> Result<Vec<ExternalExample>, SpecError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SpecError::Io(dir.to_path_buf(), e.to_string()))?;
    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path).map_err(|e| SpecError::Io(path.clone(), e.to_string()))?;
            let mut example: ExternalExample = serde_json::from_str(&content)
                .map_err(|e| SpecError::Parse(format!("Invalid example {}: {e}", path.display())))?;
            if example.name.is_empty() {
                example.name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
            }
            Ok(example)
        })
        .collect()
}

/// Attach each example to the scenario whose request and status it fits.
/// Returns the names of examples no scenario accepts.
///
/// # Errors
///
/// Returns [`ContractError::InvalidExample`] when the scenario accepts the
/// request but the recorded response breaks its contract.
pub fn attach_examples(feature: &mut Feature, examples: Vec<ExternalExample>) -> Result<Vec<String>, ContractError> {
    let resolver = feature.resolver();
    let mut unmatched = Vec::new();
    for example in examples {
        let target = feature.scenarios.iter().position(|s| {
            s.response.status == example.response.status && s.matches_request(&example.request, &resolver).is_success()
        });
        let Some(index) = target else {
            warn!(example = %example.name, request = %example.request.summary(), "no scenario accepts this example");
            unmatched.push(example.name);
            continue;
        };
        let scenario = &mut feature.scenarios[index];
        let result = scenario.matches_response(&example.response, &resolver);
        if !result.is_success() {
            return Err(ContractError::InvalidExample {
                example: example.name,
                message: result.report(),
            });
        }
        debug!(example = %example.name, scenario = %scenario.name, "attached example");
        let row = row_from_request(&scenario.request, &example);
        scenario.examples.push(row);
    }
    Ok(unmatched)
}

/// Row holding the concrete values of a recorded request.
fn row_from_request(pattern: &HttpRequestPattern, example: &ExternalExample) -> Row {
    let request = &example.request;
    let mut row = Row::named(example.name.as_str());

    let actual = request.path.split('/').filter(|s| !s.is_empty());
    for (segment, value) in pattern.path.segments.iter().zip(actual) {
        if let PathSegment::Param { name, .. } = segment {
            row = row.with_column(name.as_str(), value);
        }
    }
    for key in pattern.query.params.keys() {
        if let Some(value) = request.query.get(key_name(key)) {
            row = row.with_column(key_name(key), value.as_str());
        }
    }
    for key in pattern.headers.headers.keys() {
        if let Some(value) = request.header(key_name(key)) {
            row = row.with_column(key_name(key), value);
        }
    }
    if let Some(body) = &request.body {
        let literal = match body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        row = row.with_request_body(literal);
    }
    row.with_exchange(request.clone(), example.response.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpenApiSpecification;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;

    const SPEC: &str = r##"{
        "openapi": "3.0.3",
        "info": {"title": "Pets", "version": "1"},
        "paths": {
            "/pets/{id}": {
                "get": {
                    "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
                        }
                    }
                }
            }
        },
        "components": {"schemas": {"Pet": {
            "type": "object",
            "required": ["id", "name"],
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
        }}}
    }"##;

    fn feature() -> Feature {
        SPEC.parse::<OpenApiSpecification>().unwrap().compile().unwrap().feature
    }

    fn write(dir: &Path, file: &str, value: &Value) {
        std::fs::write(dir.join(file), serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    #[test]
    fn examples_load_in_file_order_with_default_names() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b_second.json", &json!({
            "request": {"method": "GET", "path": "/pets/2"},
            "response": {"status": 200, "body": {"id": 2, "name": "Tom"}}
        }));
        write(dir.path(), "a_first.json", &json!({
            "name": "rex",
            "request": {"method": "GET", "path": "/pets/1"},
            "response": {"status": 200, "body": {"id": 1, "name": "Rex"}}
        }));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let examples = load_examples(dir.path()).unwrap();
        let names: Vec<&str> = examples.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["rex", "b_second"]);
    }

    #[test]
    fn malformed_example_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        let err = load_examples(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.json"), "{err}");
    }

    #[test]
    fn attached_examples_seed_rows_and_stubs() {
        let mut feature = feature();
        let examples = vec![
            ExternalExample {
                name: "rex".into(),
                request: HttpRequest::new("GET", "/pets/1"),
                response: HttpResponse::new(200)
                    .with_header("Content-Type", "application/json")
                    .with_body(json!({"id": 1, "name": "Rex"})),
            },
            ExternalExample {
                name: "orphan".into(),
                request: HttpRequest::new("DELETE", "/pets/1"),
                response: HttpResponse::new(204),
            },
        ];
        let unmatched = attach_examples(&mut feature, examples).unwrap();
        assert_eq!(unmatched, ["orphan"]);

        let row = &feature.scenarios[0].examples[0];
        assert_eq!(row.get("id"), Some("1"));

        let mut rng = SmallRng::seed_from_u64(8);
        let stub = feature.stub_response(&HttpRequest::new("GET", "/pets/1"), &mut rng).unwrap();
        assert_eq!(stub.body, Some(json!({"id": 1, "name": "Rex"})));
    }

    #[test]
    fn responses_breaking_the_contract_are_rejected() {
        let mut feature = feature();
        let bad = ExternalExample {
            name: "nameless".into(),
            request: HttpRequest::new("GET", "/pets/1"),
            response: HttpResponse::new(200)
                .with_header("Content-Type", "application/json")
                .with_body(json!({"id": 1})),
        };
        let err = attach_examples(&mut feature, vec![bad]).unwrap_err();
        assert!(matches!(err, ContractError::InvalidExample { ref example, .. } if example == "nameless"));
    }
}
