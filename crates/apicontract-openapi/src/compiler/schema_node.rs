//! Classification of raw schema nodes

use serde_json::{Map, Value};

/// What a schema node is, decided once before compiling it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SchemaKind<'a> {
    Ref(&'a str),
    AllOf(&'a [Value]),
    /// `oneOf` or `anyOf`
    Union(&'a [Value]),
    /// Object carrying a discriminator mapping to subtypes (the subtypes
    /// reach it through `allOf`)
    Polymorphic,
    Const(&'a Value),
    Enum(&'a [Value]),
    /// 3.1 `type: [...]` with more than one entry
    MultiType(Vec<&'a str>),
    String,
    Number { integer: bool },
    Boolean,
    Null,
    Object,
    Array,
    /// `true`, `{}` or a node with no recognisable keyword
    Unknown,
    /// `false`: nothing matches
    Never,
}

pub(crate) fn classify(schema: &Value) -> SchemaKind<'_> {
    let node = match schema {
        Value::Object(node) => node,
        Value::Bool(false) => return SchemaKind::Never,
        _ => return SchemaKind::Unknown,
    };
    if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        return SchemaKind::Ref(reference);
    }
    if let Some(branches) = node.get("allOf").and_then(Value::as_array) {
        return SchemaKind::AllOf(branches);
    }
    if let Some(branches) = node
        .get("oneOf")
        .or_else(|| node.get("anyOf"))
        .and_then(Value::as_array)
    {
        return SchemaKind::Union(branches);
    }
    if has_subtype_mapping(node) {
        return SchemaKind::Polymorphic;
    }
    if let Some(value) = node.get("const") {
        return SchemaKind::Const(value);
    }
    if let Some(values) = node.get("enum").and_then(Value::as_array) {
        return SchemaKind::Enum(values);
    }

    let types = declared_types(node);
    match types.as_slice() {
        [] => {}
        [single] => return primitive_kind(single),
        many => return SchemaKind::MultiType(many.to_vec()),
    }

    if node.contains_key("properties") || node.contains_key("additionalProperties") || node.contains_key("required") {
        SchemaKind::Object
    } else if node.contains_key("items") {
        SchemaKind::Array
    } else {
        SchemaKind::Unknown
    }
}

fn primitive_kind(name: &str) -> SchemaKind<'static> {
    match name {
        "string" => SchemaKind::String,
        "integer" => SchemaKind::Number { integer: true },
        "number" => SchemaKind::Number { integer: false },
        "boolean" => SchemaKind::Boolean,
        "null" => SchemaKind::Null,
        "object" => SchemaKind::Object,
        "array" => SchemaKind::Array,
        _ => SchemaKind::Unknown,
    }
}

/// `type` as a list: a single string or a 3.1 array.
pub(crate) fn declared_types(node: &Map<String, Value>) -> Vec<&str> {
    match node.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn has_subtype_mapping(node: &Map<String, Value>) -> bool {
    node.get("discriminator")
        .and_then(|d| d.get("mapping"))
        .and_then(Value::as_object)
        .is_some_and(|m| !m.is_empty())
}

/// 3.0 `nullable: true`.
pub(crate) fn is_nullable(schema: &Value) -> bool {
    schema.get("nullable").and_then(Value::as_bool).unwrap_or(false)
}

/// Primitive shape used to detect allOf branches redeclaring a property
/// with another type. References and compositions have none.
pub(crate) fn shape_descriptor(schema: &Value) -> Option<&'static str> {
    match classify(schema) {
        SchemaKind::String => Some("string"),
        SchemaKind::Number { .. } => Some("number"),
        SchemaKind::Boolean => Some("boolean"),
        SchemaKind::Object => Some("object"),
        SchemaKind::Array => Some("array"),
        SchemaKind::Null => Some("null"),
        _ => None,
    }
}

/// `{"type": "null"}`, or an empty object schema marked nullable: the
/// explicit null option of a union.
pub(crate) fn is_null_branch(schema: &Value) -> bool {
    if classify(schema) == SchemaKind::Null {
        return true;
    }
    let Some(node) = schema.as_object() else {
        return false;
    };
    is_nullable(schema)
        && node.iter().all(|(k, v)| match k.as_str() {
            "nullable" => true,
            "type" => v == "object",
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keywords_take_precedence_over_type() {
        assert!(matches!(classify(&json!({"$ref": "#/x", "type": "string"})), SchemaKind::Ref("#/x")));
        assert!(matches!(classify(&json!({"allOf": [], "type": "object"})), SchemaKind::AllOf(_)));
        assert!(matches!(classify(&json!({"anyOf": [{}]})), SchemaKind::Union(_)));
        assert!(matches!(
            classify(&json!({"type": "string", "enum": ["a"]})),
            SchemaKind::Enum(_)
        ));
    }

    #[test]
    fn types_and_implicit_shapes() {
        assert_eq!(classify(&json!({"type": "integer"})), SchemaKind::Number { integer: true });
        assert_eq!(classify(&json!({"type": ["string"]})), SchemaKind::String);
        assert_eq!(
            classify(&json!({"type": ["string", "null"]})),
            SchemaKind::MultiType(vec!["string", "null"])
        );
        assert_eq!(classify(&json!({"properties": {}})), SchemaKind::Object);
        assert_eq!(classify(&json!({"items": {}})), SchemaKind::Array);
        assert_eq!(classify(&json!({})), SchemaKind::Unknown);
        assert_eq!(classify(&json!(true)), SchemaKind::Unknown);
        assert_eq!(classify(&json!(false)), SchemaKind::Never);
    }

    #[test]
    fn discriminator_mapping_marks_polymorphic_bases() {
        let base = json!({
            "type": "object",
            "discriminator": {"propertyName": "kind", "mapping": {"dog": "#/components/schemas/Dog"}},
            "properties": {"kind": {"type": "string"}}
        });
        assert_eq!(classify(&base), SchemaKind::Polymorphic);
        let unmapped = json!({"type": "object", "discriminator": {"propertyName": "kind"}});
        assert_eq!(classify(&unmapped), SchemaKind::Object);
    }

    #[test]
    fn null_branches() {
        assert!(is_null_branch(&json!({"type": "null"})));
        assert!(is_null_branch(&json!({"nullable": true})));
        assert!(is_null_branch(&json!({"type": "object", "nullable": true})));
        assert!(!is_null_branch(&json!({"type": "string", "nullable": true})));
        assert!(!is_null_branch(&json!({})));
    }
}
