//! Schema → pattern compiler
//!
//! One [`SchemaCompiler`] owns the registry for one document. Named
//! components are compiled once and registered under their name; a `$ref`
//! to a component compiles to [`Pattern::Deferred`], and a component that is
//! still on the type stack is not entered again, which is what makes
//! recursive schemas terminate.

mod composed;
mod scalar;
mod schema_node;

use std::collections::{BTreeMap, BTreeSet};

use apicontract_core::keys::optional_key;
use apicontract_core::lint::{LintLog, LintRule, LintViolation};
use apicontract_core::pattern::{AdditionalProperties, AnyPattern, EnumPattern, ListPattern, ObjectPattern};
use apicontract_core::value::parse_number;
use apicontract_core::{CompilerOptions, ContractError, Pattern, Registry, Result};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{SpecVersion, resolve_ref};
use schema_node::{SchemaKind, classify, declared_types, is_nullable};

pub(crate) const COMPONENT_PREFIX: &str = "#/components/schemas/";

/// Keywords that may sit next to `$ref` without changing its meaning.
const ANNOTATIONS: &[&str] = &[
    "$ref",
    "description",
    "summary",
    "title",
    "example",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "externalDocs",
];

/// Component name of a `#/components/schemas/Name` reference.
pub(crate) fn schema_component(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(COMPONENT_PREFIX)
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

pub struct SchemaCompiler<'doc> {
    document: &'doc Value,
    version: SpecVersion,
    options: CompilerOptions,
    registry: Registry,
    lints: LintLog,
    /// Components (or non-component references) currently being compiled
    type_stack: Vec<String>,
}

impl<'doc> SchemaCompiler<'doc> {
    #[must_use]
    pub fn new(document: &'doc Value, version: SpecVersion, options: CompilerOptions) -> Self {
        Self {
            document,
            version,
            options,
            registry: Registry::new(),
            lints: LintLog::new(),
            type_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn lints(&self) -> &LintLog {
        &self.lints
    }

    pub(crate) fn record(&mut self, violation: LintViolation) {
        self.lints.record(violation);
    }

    #[must_use]
    pub fn into_parts(self) -> (Registry, LintLog) {
        (self.registry, self.lints)
    }

    /// Compile every schema under `components.schemas`.
    ///
    /// # Errors
    ///
    /// Stops at the first component that fails to compile.
    pub fn compile_components(&mut self) -> Result<()> {
        let names: Vec<String> = self
            .document
            .pointer("/components/schemas")
            .and_then(Value::as_object)
            .map(|schemas| schemas.keys().cloned().collect())
            .unwrap_or_default();
        for name in names {
            self.compile_component(&name)?;
        }
        Ok(())
    }

    /// Compiled pattern of a named component, compiling and registering it
    /// on first request.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::UnresolvedReference`] when no such component
    /// exists, or the component's own compilation error.
    pub fn compile_component(&mut self, name: &str) -> Result<Pattern> {
        if let Some(pattern) = self.registry.get(name) {
            return Ok(pattern.clone());
        }
        if self.type_stack.iter().any(|n| n == name) {
            debug!(name, "component is already being compiled; deferring");
            return Ok(Pattern::deferred(name));
        }
        let document = self.document;
        let schema = component_schema(document, name).ok_or_else(|| ContractError::UnresolvedReference {
            breadcrumb: name.to_string(),
            reference: format!("{COMPONENT_PREFIX}{name}"),
        })?;

        self.type_stack.push(name.to_string());
        let compiled = self.compile(schema, Some(name), name);
        self.type_stack.pop();

        let pattern = compiled?.with_type_alias(name);
        self.registry.register(name, pattern.clone());
        Ok(pattern)
    }

    /// Compile one schema node.
    ///
    /// `pattern_name` is the component being compiled when `schema` is its
    /// root; subtypes use it to pin their discriminator value.
    ///
    /// # Errors
    ///
    /// Returns a [`ContractError`] carrying `breadcrumb` for structurally
    /// broken schemas, dangling references and unusable constraints.
    pub fn compile(&mut self, schema: &Value, pattern_name: Option<&str>, breadcrumb: &str) -> Result<Pattern> {
        let kind = classify(schema);
        let nullable = !matches!(kind, SchemaKind::Ref(_)) && is_nullable(schema);
        let pattern = self.compile_kind(kind, schema, pattern_name, breadcrumb)?;
        Ok(if nullable { pattern.nullable() } else { pattern })
    }

    fn compile_kind(
        &mut self,
        kind: SchemaKind<'_>,
        schema: &Value,
        pattern_name: Option<&str>,
        breadcrumb: &str,
    ) -> Result<Pattern> {
        let empty = Map::new();
        let node = schema.as_object().unwrap_or(&empty);
        match kind {
            SchemaKind::Ref(reference) => self.compile_ref(reference, node, breadcrumb),
            SchemaKind::AllOf(_) => self.compile_all_of(schema, pattern_name, breadcrumb),
            SchemaKind::Union(branches) => self.compile_union(node, branches, breadcrumb),
            SchemaKind::Polymorphic => self.compile_polymorphic(node, pattern_name, breadcrumb),
            SchemaKind::Const(value) => Ok(Pattern::Exact(value.clone())),
            SchemaKind::Enum(values) => self.compile_enum(node, values, breadcrumb),
            SchemaKind::MultiType(types) => self.compile_multi_type(node, &types, breadcrumb),
            SchemaKind::String => self.compile_string(node, breadcrumb),
            SchemaKind::Number { integer } => Ok(self.compile_number(node, integer, breadcrumb)),
            SchemaKind::Boolean => Ok(Pattern::boolean()),
            SchemaKind::Null => Ok(Pattern::null()),
            SchemaKind::Object => self.compile_object(node, breadcrumb),
            SchemaKind::Array => self.compile_array(node, breadcrumb),
            SchemaKind::Unknown => {
                self.record(LintViolation::new(
                    LintRule::UnknownSchema,
                    breadcrumb,
                    "schema declares no type; accepting any value",
                ));
                Ok(Pattern::AnyValue)
            }
            SchemaKind::Never => Err(ContractError::compilation(breadcrumb, "schema `false` accepts no value")),
        }
    }

    fn compile_ref(&mut self, reference: &str, node: &Map<String, Value>, breadcrumb: &str) -> Result<Pattern> {
        let siblings: Map<String, Value> = node
            .iter()
            .filter(|(k, _)| !ANNOTATIONS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !siblings.is_empty() {
            match self.version {
                SpecVersion::V3_1 => {
                    let merged = serde_json::json!({
                        "allOf": [{"$ref": reference}, Value::Object(siblings)]
                    });
                    return self.compile(&merged, None, breadcrumb);
                }
                SpecVersion::V3_0 => {
                    let ignored: Vec<&String> = siblings.keys().collect();
                    debug!(breadcrumb = %breadcrumb, ?ignored, "ignoring keywords next to $ref");
                }
            }
        }

        if let Some(name) = schema_component(reference) {
            self.compile_component(name)?;
            return Ok(Pattern::deferred(name));
        }

        // Anything else (`#/components/schemas/Pet/properties/name`,
        // `#/paths/...`) is inlined.
        let document = self.document;
        let target = resolve_ref(document, reference).ok_or_else(|| ContractError::UnresolvedReference {
            breadcrumb: breadcrumb.to_string(),
            reference: reference.to_string(),
        })?;
        if self.type_stack.iter().any(|n| n == reference) {
            return Err(ContractError::compilation(
                breadcrumb,
                format!("{reference} refers back to itself"),
            ));
        }
        self.type_stack.push(reference.to_string());
        let compiled = self.compile(target, None, breadcrumb);
        self.type_stack.pop();
        compiled
    }

    fn compile_enum(&self, node: &Map<String, Value>, values: &[Value], breadcrumb: &str) -> Result<Pattern> {
        let types = declared_types(node);
        let nullable = node.get("nullable").and_then(Value::as_bool).unwrap_or(false) || types.contains(&"null");
        let mut converted = Vec::with_capacity(values.len());
        for value in values {
            if value.is_null() && !nullable && self.version == SpecVersion::V3_0 {
                return Err(ContractError::compilation(
                    breadcrumb,
                    "enum lists null but the schema is not nullable",
                ));
            }
            converted.push(convert_enum_value(value, &types));
        }
        Ok(Pattern::Enum(EnumPattern::new(converted)))
    }

    fn compile_multi_type(&mut self, node: &Map<String, Value>, types: &[&str], breadcrumb: &str) -> Result<Pattern> {
        let mut branches = Vec::with_capacity(types.len());
        for ty in types {
            if *ty == "null" {
                branches.push(Pattern::null());
                continue;
            }
            let mut single = node.clone();
            single.insert("type".into(), Value::String((*ty).to_string()));
            branches.push(self.compile(&Value::Object(single), None, breadcrumb)?);
        }
        Ok(Pattern::Any(AnyPattern::new(branches)))
    }

    fn compile_object(&mut self, node: &Map<String, Value>, breadcrumb: &str) -> Result<Pattern> {
        let required: BTreeSet<&str> = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut keys = BTreeMap::new();
        if let Some(properties) = node.get("properties").and_then(Value::as_object) {
            for (name, schema) in properties {
                let pattern = self.compile(schema, None, &format!("{breadcrumb}.{name}"))?;
                let key = if required.contains(name.as_str()) {
                    name.clone()
                } else {
                    optional_key(name)
                };
                keys.insert(key, pattern);
            }
        }
        for name in required {
            if !keys.contains_key(name) {
                debug!(breadcrumb = %breadcrumb, key = name, "required key has no property schema");
                keys.insert(name.to_string(), Pattern::AnyValue);
            }
        }

        let additional = match node.get("additionalProperties") {
            Some(Value::Bool(true)) => AdditionalProperties::FreeForm,
            Some(Value::Object(schema)) if schema.is_empty() => AdditionalProperties::FreeForm,
            Some(schema @ Value::Object(_)) => {
                let pattern = self.compile(schema, None, &format!("{breadcrumb}.(additionalProperties)"))?;
                AdditionalProperties::Constrained(Box::new(pattern))
            }
            _ if keys.is_empty() => AdditionalProperties::FreeForm,
            _ => AdditionalProperties::NoAdditional,
        };
        Ok(Pattern::Object(ObjectPattern::new(keys).with_additional(additional)))
    }

    fn compile_array(&mut self, node: &Map<String, Value>, breadcrumb: &str) -> Result<Pattern> {
        let element = match node.get("items") {
            Some(items) => self.compile(items, None, &format!("{breadcrumb}[]"))?,
            None => Pattern::AnyValue,
        };
        Ok(Pattern::List(ListPattern::new(element)))
    }

    fn component_exists(&self, name: &str) -> bool {
        component_schema(self.document, name).is_some()
    }
}

fn component_schema<'a>(document: &'a Value, name: &str) -> Option<&'a Value> {
    document.get("components")?.get("schemas")?.get(name)
}

/// Enum values written as strings for a numeric or boolean schema.
fn convert_enum_value(value: &Value, types: &[&str]) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    if types.contains(&"string") {
        return value.clone();
    }
    if types.iter().any(|t| matches!(*t, "integer" | "number")) {
        if let Some(n) = parse_number(text) {
            return Value::Number(n);
        }
    }
    if types.contains(&"boolean") {
        if let Ok(b) = text.trim().parse::<bool>() {
            return Value::Bool(b);
        }
    }
    value.clone()
}
