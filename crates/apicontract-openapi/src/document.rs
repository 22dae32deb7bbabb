//! Raw OpenAPI documents: parsing, version detection, `$ref` lookup

use std::path::{Path, PathBuf};

use apicontract_core::ContractError;
use serde_json::Value;

/// OpenAPI dialects the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpecVersion {
    /// 3.0.x: `nullable`, boolean `exclusiveMinimum`, `$ref` siblings ignored
    V3_0,
    /// 3.1.x: JSON Schema 2020-12 types, numeric `exclusiveMinimum`
    V3_1,
}

impl SpecVersion {
    /// Read the dialect from the document's `openapi` / `swagger` field.
    ///
    /// # Errors
    ///
    /// Swagger 2.0 and unknown versions are rejected.
    pub fn detect(document: &Value) -> Result<Self, SpecError> {
        if let Some(swagger) = document.get("swagger") {
            let version = swagger.as_str().map_or_else(|| swagger.to_string(), str::to_string);
            return Err(SpecError::UnsupportedVersion(format!(
                "Swagger {version}; convert the document to OpenAPI 3 first"
            )));
        }
        let Some(version) = document.get("openapi").and_then(Value::as_str) else {
            return Err(SpecError::Parse("Missing \"openapi\" version field".into()));
        };
        if version.starts_with("3.0") {
            Ok(Self::V3_0)
        } else if version.starts_with("3.1") {
            Ok(Self::V3_1)
        } else {
            Err(SpecError::UnsupportedVersion(format!("OpenAPI {version}")))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unsupported spec version: {0}")]
    UnsupportedVersion(String),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Parse an OpenAPI document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing (leading `{` → JSON, otherwise YAML).
///
/// # Errors
///
/// Returns [`SpecError::Parse`] for malformed content.
pub fn parse_document(path: Option<&Path>, content: &str) -> Result<Value, SpecError> {
    let ext = path
        .and_then(Path::extension)
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "json" => parse_json(content),
        _ => {
            // Content sniffing: trimmed first char
            if content.trim_start().starts_with('{') {
                parse_json(content)
            } else {
                parse_yaml(content)
            }
        }
    }
}

fn parse_json(content: &str) -> Result<Value, SpecError> {
    serde_json::from_str(content).map_err(|e| SpecError::Parse(format!("Invalid JSON: {e}")))
}

fn parse_yaml(content: &str) -> Result<Value, SpecError> {
    serde_yml::from_str(content).map_err(|e| SpecError::Parse(format!("Invalid YAML: {e}")))
}

/// Follow a local reference (`#/components/schemas/Pet`) into `document`.
#[must_use]
pub fn resolve_ref<'a>(document: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    document.pointer(pointer)
}

/// Last path segment of a reference: the component name.
#[must_use]
pub fn component_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// Resolve `value` when it is a `$ref` object, otherwise return it as is.
///
/// # Errors
///
/// Returns [`ContractError::UnresolvedReference`] for dangling references.
pub fn deref<'a>(document: &'a Value, value: &'a Value, breadcrumb: &str) -> Result<&'a Value, ContractError> {
    let mut current = value;
    // Parameters, responses and request bodies may chain references.
    for _ in 0..8 {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            return Ok(current);
        };
        current = resolve_ref(document, reference).ok_or_else(|| ContractError::UnresolvedReference {
            breadcrumb: breadcrumb.to_string(),
            reference: reference.to_string(),
        })?;
    }
    Err(ContractError::compilation(breadcrumb, "reference chain is too long"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_document_json_by_extension() {
        let json = r#"{"openapi": "3.1.0", "info": {"title": "T", "version": "1"}}"#;
        let v = parse_document(Some(Path::new("spec.json")), json).unwrap();
        assert_eq!(v["openapi"], "3.1.0");
    }

    #[test]
    fn parse_document_yaml_by_extension() {
        let yaml = "openapi: '3.0.3'\ninfo:\n  title: T\n  version: '1'\n";
        let v = parse_document(Some(Path::new("spec.yml")), yaml).unwrap();
        assert_eq!(v["openapi"], "3.0.3");
    }

    #[test]
    fn parse_document_sniffs_content() {
        let json = parse_document(None, r#"{"openapi": "3.1.0"}"#).unwrap();
        assert_eq!(json["openapi"], "3.1.0");
        let yaml = parse_document(Some(Path::new("spec.txt")), "openapi: '3.1.0'\n").unwrap();
        assert_eq!(yaml["openapi"], "3.1.0");
    }

    #[test]
    fn parse_document_reports_format() {
        let err = parse_document(Some(Path::new("spec.json")), "{ invalid json").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
        let err = parse_document(Some(Path::new("spec.yaml")), ":\n  :\n    - [invalid").unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }

    #[test]
    fn versions_are_detected() {
        assert_eq!(SpecVersion::detect(&json!({"openapi": "3.0.3"})).unwrap(), SpecVersion::V3_0);
        assert_eq!(SpecVersion::detect(&json!({"openapi": "3.1.0"})).unwrap(), SpecVersion::V3_1);
        let err = SpecVersion::detect(&json!({"swagger": "2.0"})).unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedVersion(_)));
        assert!(err.to_string().contains("Swagger 2.0"));
        assert!(SpecVersion::detect(&json!({"openapi": "4.0.0"})).is_err());
        assert!(SpecVersion::detect(&json!({"info": {}})).is_err());
    }

    #[test]
    fn references_resolve_through_chains() {
        let doc = json!({
            "components": {
                "parameters": {
                    "Limit": {"$ref": "#/components/parameters/PageSize"},
                    "PageSize": {"name": "limit", "in": "query"}
                }
            }
        });
        let param = json!({"$ref": "#/components/parameters/Limit"});
        assert_eq!(deref(&doc, &param, "p").unwrap()["name"], "limit");
        let dangling = json!({"$ref": "#/components/parameters/Nope"});
        assert!(matches!(
            deref(&doc, &dangling, "p"),
            Err(ContractError::UnresolvedReference { .. })
        ));
        assert_eq!(component_name("#/components/schemas/Pet"), "Pet");
    }
}
