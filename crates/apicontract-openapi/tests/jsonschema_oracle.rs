//! Generated values are checked against the source schema with an
//! independent JSON Schema validator.

use std::sync::Arc;

use apicontract_core::{CompilerOptions, Pattern, Resolver};
use apicontract_openapi::{SchemaCompiler, SpecVersion, to_schema};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::{Value, json};

fn schemas() -> Vec<(&'static str, Value)> {
    vec![
        (
            "user",
            json!({
                "type": "object",
                "required": ["id", "name", "status"],
                "properties": {
                    "id": {"type": "integer", "minimum": 1, "maximum": 100},
                    "name": {"type": "string", "minLength": 1, "maxLength": 10},
                    "status": {"enum": ["active", "banned"]},
                    "score": {"type": "number", "exclusiveMinimum": 0, "maximum": 5},
                    "nickname": {"type": ["string", "null"]},
                    "tags": {"type": "array", "items": {"type": "string", "maxLength": 3}},
                    "address": {
                        "type": "object",
                        "required": ["city"],
                        "properties": {"city": {"type": "string"}},
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            }),
        ),
        (
            "union",
            json!({"oneOf": [{"type": "string", "minLength": 2}, {"type": "integer", "maximum": -1}]}),
        ),
        (
            "composed",
            json!({"allOf": [
                {"type": "object", "required": ["a"], "properties": {"a": {"type": "boolean"}}},
                {"type": "object", "required": ["b"], "properties": {"b": {"type": "string", "minLength": 4}}}
            ]}),
        ),
        (
            "map",
            json!({"type": "object", "additionalProperties": {"type": "integer", "minimum": 0}}),
        ),
        ("constant", json!({"const": "fixed"})),
    ]
}

fn compile(schema: &Value) -> (Pattern, Resolver) {
    let document = json!({"openapi": "3.1.0"});
    let mut compiler = SchemaCompiler::new(&document, SpecVersion::V3_1, CompilerOptions::default());
    let pattern = compiler.compile(schema, None, "root").unwrap();
    let (registry, _) = compiler.into_parts();
    (pattern, Resolver::new(Arc::new(registry)))
}

proptest! {
    #[test]
    fn generated_values_satisfy_the_source_schema(seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        for (name, schema) in schemas() {
            let (pattern, resolver) = compile(&schema);
            let validator = jsonschema::validator_for(&schema).unwrap();
            let value = pattern.generate(&resolver, &mut rng);
            prop_assert!(validator.is_valid(&value), "{name}: {value}");
            prop_assert!(pattern.matches(&value, &resolver).is_success(), "{name}: {value}");
        }
    }

    #[test]
    fn exported_schemas_accept_generated_values(seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        for (name, schema) in schemas() {
            let (pattern, resolver) = compile(&schema);
            let exported = to_schema(&pattern);
            let validator = jsonschema::validator_for(&exported).unwrap();
            let value = pattern.generate(&resolver, &mut rng);
            prop_assert!(validator.is_valid(&value), "{name}: {value} against {exported}");
        }
    }
}

#[test]
fn values_the_schema_rejects_are_rejected() {
    let (_, schema) = &schemas()[0];
    let (pattern, resolver) = compile(schema);
    let validator = jsonschema::validator_for(schema).unwrap();
    for value in [
        json!({"id": 0, "name": "a", "status": "active"}),
        json!({"id": 1, "name": "", "status": "active"}),
        json!({"id": 1, "name": "a", "status": "gone"}),
        json!({"id": 1, "name": "a", "status": "active", "score": 0}),
        json!({"id": 1, "name": "a", "status": "active", "address": {}}),
    ] {
        assert!(!validator.is_valid(&value), "{value}");
        assert!(!pattern.matches(&value, &resolver).is_success(), "{value}");
    }
}
