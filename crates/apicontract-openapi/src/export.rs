//! Pattern → OpenAPI 3.1 schema
//!
//! Used to publish inferred patterns (see `apicontract infer`) and to
//! round-trip compiled components for inspection.

use apicontract_core::keys::{is_optional, key_name};
use apicontract_core::pattern::{AdditionalProperties, AnyPattern, NumberPattern, ObjectPattern, ScalarPattern};
use apicontract_core::{Pattern, Registry};
use serde_json::{Map, Value, json};

use crate::compiler::COMPONENT_PREFIX;

/// JSON Schema (OpenAPI 3.1 dialect) accepting what `pattern` accepts.
#[must_use]
pub fn to_schema(pattern: &Pattern) -> Value {
    match pattern {
        Pattern::Scalar(scalar) => scalar_schema(scalar),
        Pattern::Exact(Value::Null) => json!({"type": "null"}),
        Pattern::Exact(value) => json!({"const": value}),
        Pattern::Object(object) => object_schema(object),
        Pattern::List(list) => json!({"type": "array", "items": to_schema(&list.element)}),
        Pattern::Any(any) => any_schema(any),
        Pattern::Enum(values) => json!({"enum": values.values}),
        Pattern::Deferred(name) => json!({"$ref": format!("{COMPONENT_PREFIX}{name}")}),
        Pattern::AnyValue => json!({}),
    }
}

/// Minimal 3.1 document holding every registered pattern as a component.
#[must_use]
pub fn to_document(title: &str, registry: &Registry) -> Value {
    let schemas: Map<String, Value> = registry
        .iter()
        .map(|(name, pattern)| (name.to_string(), to_schema(pattern)))
        .collect();
    json!({
        "openapi": "3.1.0",
        "info": {"title": title, "version": "1.0.0"},
        "paths": {},
        "components": {"schemas": schemas},
    })
}

fn scalar_schema(scalar: &ScalarPattern) -> Value {
    match scalar {
        ScalarPattern::String(string) => {
            let mut schema = json!({"type": "string"});
            if let Some(min) = string.min_length {
                schema["minLength"] = json!(min);
            }
            if let Some(max) = string.max_length {
                schema["maxLength"] = json!(max);
            }
            if let Some(regex) = &string.regex {
                schema["pattern"] = json!(regex.as_str());
            }
            schema
        }
        ScalarPattern::Email => json!({"type": "string", "format": "email"}),
        ScalarPattern::Uuid => json!({"type": "string", "format": "uuid"}),
        ScalarPattern::Date => json!({"type": "string", "format": "date"}),
        ScalarPattern::DateTime => json!({"type": "string", "format": "date-time"}),
        ScalarPattern::Binary => json!({"type": "string", "format": "binary"}),
        ScalarPattern::Byte => json!({"type": "string", "format": "byte"}),
        ScalarPattern::Number(number) => number_schema(number),
        ScalarPattern::Boolean => json!({"type": "boolean"}),
    }
}

fn number_schema(number: &NumberPattern) -> Value {
    let bounds = &number.bounds;
    let mut schema = json!({"type": if number.integer { "integer" } else { "number" }});
    if let Some(min) = bounds.minimum {
        let key = if bounds.exclusive_minimum { "exclusiveMinimum" } else { "minimum" };
        schema[key] = json!(min);
    }
    if let Some(max) = bounds.maximum {
        let key = if bounds.exclusive_maximum { "exclusiveMaximum" } else { "maximum" };
        schema[key] = json!(max);
    }
    schema
}

fn object_schema(object: &ObjectPattern) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (key, pattern) in &object.keys {
        if !is_optional(key) {
            required.push(key.clone());
        }
        properties.insert(key_name(key).to_string(), to_schema(pattern));
    }

    let mut schema = json!({"type": "object"});
    if !properties.is_empty() {
        schema["properties"] = Value::Object(properties);
    }
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    match &object.additional {
        AdditionalProperties::NoAdditional => schema["additionalProperties"] = json!(false),
        AdditionalProperties::FreeForm => {}
        AdditionalProperties::Constrained(pattern) => schema["additionalProperties"] = to_schema(pattern),
    }
    schema
}

fn any_schema(any: &AnyPattern) -> Value {
    let branches: Vec<Value> = any.branches.iter().map(to_schema).collect();
    let Some(discriminator) = &any.discriminator else {
        return json!({"anyOf": branches});
    };
    let mapping: Map<String, Value> = discriminator
        .mapping
        .iter()
        .map(|(value, target)| (value.clone(), json!(format!("{COMPONENT_PREFIX}{target}"))))
        .collect();
    let mut schema = json!({
        "oneOf": branches,
        "discriminator": {"propertyName": discriminator.property_name},
    });
    if !mapping.is_empty() {
        schema["discriminator"]["mapping"] = Value::Object(mapping);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicontract_core::convergence::converge_values;
    use apicontract_core::keys::optional_key;
    use apicontract_core::pattern::Discriminator;
    use std::collections::BTreeMap;

    #[test]
    fn objects_export_required_and_optional_keys() {
        let pattern = Pattern::Object(ObjectPattern::new(BTreeMap::from([
            ("id".to_string(), Pattern::integer()),
            (optional_key("tag"), Pattern::string().nullable()),
        ])));
        let schema = to_schema(&pattern);
        assert_eq!(schema["required"], json!(["id"]));
        assert_eq!(schema["properties"]["id"], json!({"type": "integer"}));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert!(schema["properties"]["tag"]["anyOf"].as_array().is_some_and(|b| b.len() == 2));
    }

    #[test]
    fn discriminated_unions_keep_their_mapping() {
        let any = AnyPattern::new(vec![Pattern::deferred("Cat"), Pattern::deferred("Dog")])
            .with_discriminator(Discriminator::new("kind").with_mapping("dog", "Dog"));
        let schema = to_schema(&Pattern::Any(any));
        assert_eq!(schema["oneOf"][1], json!({"$ref": "#/components/schemas/Dog"}));
        assert_eq!(schema["discriminator"]["mapping"]["dog"], json!("#/components/schemas/Dog"));
    }

    #[test]
    fn inferred_patterns_export_as_components() {
        let samples = [json!({"id": 1, "name": "a"}), json!({"id": 2})];
        let pattern = converge_values(samples.iter(), "samples").unwrap();
        let mut registry = Registry::new();
        registry.register("Sample", pattern);
        let document = to_document("Inferred", &registry);
        insta::with_settings!({sort_maps => true}, {
            insta::assert_json_snapshot!(document["components"]["schemas"]["Sample"], @r#"
            {
              "additionalProperties": false,
              "properties": {
                "id": {
                  "type": "integer"
                },
                "name": {
                  "type": "string"
                }
              },
              "required": [
                "id"
              ],
              "type": "object"
            }
            "#);
        });
    }
}
