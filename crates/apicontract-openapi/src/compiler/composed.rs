//! allOf, oneOf/anyOf and discriminators

use std::collections::{BTreeMap, BTreeSet};

use apicontract_core::lint::{LintRule, LintViolation};
use apicontract_core::pattern::{AnyPattern, Discriminator};
use apicontract_core::{ContractError, Pattern, Result};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::schema_node::{is_null_branch, shape_descriptor};
use super::{SchemaCompiler, schema_component};
use crate::document::{component_name, resolve_ref};

/// Raw schemas reached by deep-flattening an allOf, in merge order.
#[derive(Default)]
struct Flattened<'v> {
    schemas: Vec<&'v Value>,
    /// Discriminators declared by referenced ancestors, outermost first
    ancestors: Vec<&'v Value>,
}

impl SchemaCompiler<'_> {
    pub(super) fn compile_all_of(&mut self, schema: &Value, pattern_name: Option<&str>, breadcrumb: &str) -> Result<Pattern> {
        let empty = Map::new();
        let node = schema.as_object().unwrap_or(&empty);
        let branches = node.get("allOf").and_then(Value::as_array).map_or(&[][..], Vec::as_slice);

        // `allOf: [$ref]` used as a wrapper, typically to add a description
        // or `nullable` next to a reference.
        if let [only] = branches {
            if !node.contains_key("properties") && !node.contains_key("required") && !node.contains_key("discriminator") {
                return self.compile(only, None, breadcrumb);
            }
        }

        let mut flattened = Flattened::default();
        let mut visited = Vec::new();
        flatten(self.document, schema, breadcrumb, &mut visited, &mut flattened)?;

        let mut merged = self.merge(&flattened, breadcrumb)?;

        if let (Some(name), Some(ancestor)) = (pattern_name, flattened.ancestors.last()) {
            pin_discriminator(&mut merged, ancestor, name);
        }

        match node.get("discriminator") {
            Some(discriminator) if has_mapping(discriminator) => {
                merged.insert("discriminator".into(), discriminator.clone());
                self.compile_polymorphic(&merged, pattern_name, breadcrumb)
            }
            _ => self.compile(&Value::Object(merged), None, breadcrumb),
        }
    }

    /// One object schema out of the flattened branches. Later branches
    /// override earlier ones; `required` accumulates. A property redeclared
    /// without a `type` narrows the earlier declaration instead.
    fn merge(&mut self, flattened: &Flattened<'_>, breadcrumb: &str) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        let mut properties = Map::new();
        let mut required = BTreeSet::new();
        let mut shapes: BTreeMap<String, &'static str> = BTreeMap::new();

        for part in &flattened.schemas {
            let Some(part) = part.as_object() else {
                continue;
            };
            for (keyword, value) in part {
                match keyword.as_str() {
                    "allOf" | "$ref" | "discriminator" => {}
                    "oneOf" | "anyOf" => {
                        debug!(breadcrumb = %breadcrumb, keyword = %keyword, "ignoring union inside allOf");
                    }
                    "properties" => {
                        for (name, property) in value.as_object().into_iter().flatten() {
                            if let Some(shape) = shape_descriptor(property) {
                                if let Some(previous) = shapes.insert(name.clone(), shape).filter(|p| *p != shape) {
                                    self.all_of_conflict(breadcrumb, name, previous, shape)?;
                                }
                            }
                            match (properties.get_mut(name), property.as_object()) {
                                (Some(Value::Object(earlier)), Some(later)) if narrows(earlier, later) => {
                                    earlier.extend(later.iter().map(|(k, v)| (k.clone(), v.clone())));
                                }
                                _ => {
                                    properties.insert(name.clone(), property.clone());
                                }
                            }
                        }
                    }
                    "required" => {
                        required.extend(value.as_array().into_iter().flatten().filter_map(Value::as_str).map(str::to_string));
                    }
                    other => {
                        merged.insert(other.to_string(), value.clone());
                    }
                }
            }
        }

        if !properties.is_empty() || !required.is_empty() {
            merged.entry("type").or_insert_with(|| json!("object"));
            merged.insert("properties".into(), Value::Object(properties));
        }
        if !required.is_empty() {
            merged.insert("required".into(), required.into_iter().map(Value::String).collect());
        }
        Ok(merged)
    }

    fn all_of_conflict(&mut self, breadcrumb: &str, name: &str, previous: &str, shape: &str) -> Result<()> {
        let at = format!("{breadcrumb}.{name}");
        if self.options.strict_all_of_conflicts {
            return Err(ContractError::compilation(
                at,
                format!("allOf branches declare {name} as both {previous} and {shape}"),
            ));
        }
        self.record(LintViolation::new(
            LintRule::AllOfTypeConflict,
            at,
            format!("allOf branches declare {name} as both {previous} and {shape}; using {shape}"),
        ));
        Ok(())
    }

    pub(super) fn compile_union(&mut self, node: &Map<String, Value>, branches: &[Value], breadcrumb: &str) -> Result<Pattern> {
        let mut patterns: Vec<Pattern> = Vec::with_capacity(branches.len());
        for (index, branch) in branches.iter().enumerate() {
            if is_null_branch(branch) {
                if !patterns.iter().any(Pattern::is_null_like) {
                    patterns.push(Pattern::null());
                }
                continue;
            }
            patterns.push(self.compile(branch, None, &format!("{breadcrumb}[{index}]"))?);
        }
        let any = AnyPattern::new(patterns);

        let Some(declared) = node.get("discriminator") else {
            return Ok(Pattern::Any(any));
        };
        let property = discriminator_property(declared, breadcrumb)?;
        let mut discriminator = Discriminator::new(property);
        for (value, target) in mapping(declared) {
            let name = component_name(target);
            if any.branch_named(name).is_none() {
                return Err(ContractError::Discriminator {
                    breadcrumb: breadcrumb.to_string(),
                    message: format!("mapping {value:?} points to {target}, which is not one of the branches"),
                });
            }
            discriminator = discriminator.with_mapping(value, name);
        }
        let implied: Vec<String> = any
            .branches
            .iter()
            .filter_map(Pattern::type_alias)
            .filter(|alias| discriminator.value_for(alias).is_none())
            .map(str::to_string)
            .collect();
        for alias in implied {
            discriminator = discriminator.with_mapping(alias.clone(), alias);
        }
        Ok(Pattern::Any(any.with_discriminator(discriminator)))
    }

    /// A base schema whose discriminator maps tag values onto subtypes that
    /// extend it. Compiles to a discriminated union of those subtypes.
    pub(super) fn compile_polymorphic(
        &mut self,
        node: &Map<String, Value>,
        pattern_name: Option<&str>,
        breadcrumb: &str,
    ) -> Result<Pattern> {
        let declared = node.get("discriminator").ok_or_else(|| ContractError::Discriminator {
            breadcrumb: breadcrumb.to_string(),
            message: "schema has no discriminator".into(),
        })?;
        let property = discriminator_property(declared, breadcrumb)?;
        let mut discriminator = Discriminator::new(property);
        let mut branches = Vec::new();

        for (value, target) in mapping(declared) {
            let name = component_name(target);
            if Some(name) == pattern_name {
                continue;
            }
            if !self.component_exists(name) {
                return Err(ContractError::Discriminator {
                    breadcrumb: breadcrumb.to_string(),
                    message: format!("mapping {value:?} points to {target}, which is not a schema component"),
                });
            }
            self.compile_component(name)?;
            let branch = Pattern::deferred(name);
            if !branches.contains(&branch) {
                branches.push(branch);
            }
            discriminator = discriminator.with_mapping(value, name);
        }

        if branches.is_empty() {
            // Only maps onto itself: an ordinary object.
            let mut plain = node.clone();
            plain.remove("discriminator");
            return self.compile(&Value::Object(plain), None, breadcrumb);
        }
        Ok(Pattern::Any(AnyPattern::new(branches).with_discriminator(discriminator)))
    }
}

/// Depth-first walk through `$ref`s and nested `allOf`s. Each referenced
/// schema is visited once.
fn flatten<'v>(
    document: &'v Value,
    schema: &'v Value,
    breadcrumb: &str,
    visited: &mut Vec<String>,
    out: &mut Flattened<'v>,
) -> Result<()> {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        if visited.iter().any(|v| v == reference) {
            return Ok(());
        }
        visited.push(reference.to_string());
        let target = resolve_ref(document, reference).ok_or_else(|| ContractError::UnresolvedReference {
            breadcrumb: breadcrumb.to_string(),
            reference: reference.to_string(),
        })?;
        if let Some(discriminator) = target.get("discriminator").filter(|_| schema_component(reference).is_some()) {
            out.ancestors.push(discriminator);
        }
        flatten(document, target, breadcrumb, visited, out)?;
        // 3.1 siblings of the reference
        out.schemas.push(schema);
        return Ok(());
    }
    for branch in schema.get("allOf").and_then(Value::as_array).into_iter().flatten() {
        flatten(document, branch, breadcrumb, visited, out)?;
    }
    out.schemas.push(schema);
    Ok(())
}

/// Fix the ancestor's discriminator property to the tag this subtype is
/// mapped under (its own name when the mapping is implicit).
fn pin_discriminator(merged: &mut Map<String, Value>, ancestor: &Value, name: &str) {
    let Some(property) = ancestor.get("propertyName").and_then(Value::as_str) else {
        return;
    };
    let tag = mapping(ancestor)
        .find(|(_, target)| component_name(target) == name)
        .map_or(name, |(value, _)| value);

    let properties = merged
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(properties) = properties {
        properties.insert(property.to_string(), json!({"const": tag}));
    }
    let required = merged.entry("required").or_insert_with(|| json!([]));
    if let Value::Array(required) = required {
        if !required.iter().any(|r| r == property) {
            required.push(json!(property));
        }
    }
    merged.entry("type").or_insert_with(|| json!("object"));
}

/// Whether `later` only adds keywords to `earlier` rather than replacing it.
fn narrows(earlier: &Map<String, Value>, later: &Map<String, Value>) -> bool {
    !later.contains_key("type") && !later.contains_key("$ref") && !earlier.contains_key("$ref")
}

fn discriminator_property<'a>(discriminator: &'a Value, breadcrumb: &str) -> Result<&'a str> {
    discriminator
        .get("propertyName")
        .and_then(Value::as_str)
        .ok_or_else(|| ContractError::Discriminator {
            breadcrumb: breadcrumb.to_string(),
            message: "discriminator has no propertyName".into(),
        })
}

fn mapping(discriminator: &Value) -> impl Iterator<Item = (&str, &str)> {
    discriminator
        .get("mapping")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(value, target)| Some((value.as_str(), target.as_str()?)))
}

fn has_mapping(discriminator: &Value) -> bool {
    mapping(discriminator).next().is_some()
}
