use std::iter;

use serde_json::Value;

use super::{Variant, Variants, base_object, prefix_comment};
use crate::keys::{is_optional, key_name};
use crate::pattern::{EnumPattern, ListPattern, ObjectPattern, Pattern};
use crate::resolver::Resolver;
use crate::row::Row;
use crate::value::ValueExt;

pub(crate) fn variants(pattern: &Pattern, row: &Row, resolver: &Resolver) -> Variants {
    match pattern {
        Pattern::Object(object) => object_negatives(object, row, resolver),
        Pattern::List(list) => {
            let alias = list.type_alias.clone();
            Box::new(variants(&list.element, row, resolver).map(move |v| Variant {
                pattern: Pattern::List(ListPattern {
                    element: Box::new(v.pattern),
                    type_alias: alias.clone(),
                }),
                comment: v.comment,
            }))
        }
        Pattern::Any(any) => {
            let row = row.clone();
            let resolver = resolver.clone();
            Box::new(
                any.branches
                    .clone()
                    .into_iter()
                    .flat_map(move |branch| variants(&branch, &row, &resolver)),
            )
        }
        Pattern::Scalar(scalar) => Box::new(
            scalar
                .negative_values()
                .into_iter()
                .map(|(value, comment)| Variant::with_comment(Pattern::Exact(value), comment)),
        ),
        Pattern::Enum(e) => Box::new(enum_negatives(e).into_iter()),
        Pattern::Exact(value) => Box::new(exact_negatives(value).into_iter()),
        Pattern::Deferred(name) if !resolver.is_in_flight(name) => match resolver.resolve(name) {
            Ok(resolved) => variants(&resolved.clone(), row, &resolver.entering(name)),
            Err(_) => Box::new(iter::empty()),
        },
        Pattern::Deferred(_) | Pattern::AnyValue => Box::new(iter::empty()),
    }
}

fn enum_negatives(e: &EnumPattern) -> Vec<Variant> {
    let mut out = Vec::new();
    if let Some(outside) = e.value_outside() {
        out.push(Variant::with_comment(
            Pattern::Exact(outside),
            "value outside the enum",
        ));
    }
    if e.values.iter().all(Value::is_string) {
        out.push(Variant::with_comment(Pattern::Exact(Value::from(12345)), "enum mutated to number"));
    } else {
        out.push(Variant::with_comment(
            Pattern::Exact(Value::String("abc".into())),
            "enum mutated to string",
        ));
    }
    if !e.contains(&Value::Null) {
        out.push(Variant::with_comment(Pattern::null(), "enum mutated to null"));
    }
    out
}

fn exact_negatives(value: &Value) -> Vec<Variant> {
    let mismatched = match value {
        Value::String(s) => Value::String(format!("{s}_mismatch")),
        Value::Number(n) => n
            .as_f64()
            .map_or(Value::Null, |f| crate::pattern::scalar::number_value(f.floor() + 1.0)),
        Value::Bool(b) => Value::Bool(!b),
        Value::Null => Value::String("not-null".into()),
        Value::Array(_) | Value::Object(_) => Value::String("abc".into()),
    };
    let mut out = vec![Variant::with_comment(
        Pattern::Exact(mismatched),
        format!("{} mutated to a different value", value.type_name()),
    )];
    if !value.is_null() {
        out.push(Variant::with_comment(
            Pattern::null(),
            format!("{} mutated to null", value.type_name()),
        ));
    }
    out
}

/// Whole-value mutations for keys holding objects or lists.
fn container_negatives(pattern: &Pattern, resolver: &Resolver) -> Vec<Variant> {
    let kind = match pattern.resolved(resolver) {
        Ok(Pattern::Object(_)) => "object",
        Ok(Pattern::List(_)) => "list",
        _ => return Vec::new(),
    };
    vec![
        Variant::with_comment(Pattern::null(), format!("{kind} mutated to null")),
        Variant::with_comment(
            Pattern::Exact(Value::String("abc".into())),
            format!("{kind} mutated to string"),
        ),
    ]
}

fn object_negatives(object: &ObjectPattern, row: &Row, resolver: &Resolver) -> Variants {
    let base = base_object(object, row, resolver);
    let keys: Vec<(String, Pattern)> = object
        .keys
        .iter()
        .map(|(k, p)| (k.clone(), p.clone()))
        .collect();
    let mandatory: Vec<String> = object
        .keys
        .keys()
        .filter(|k| !is_optional(k))
        .cloned()
        .collect();

    let mutated = {
        let base = base.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        keys.into_iter().flat_map(move |(key, pattern)| {
            let base = base.clone();
            let containers = container_negatives(&pattern, &resolver);
            variants(&pattern, &row, &resolver)
                .chain(containers)
                .map(move |v| {
                    let name = key_name(&key);
                    let mut object = base.clone();
                    object.keys.remove(&key);
                    object.keys.remove(name);
                    object.keys.insert(name.to_string(), v.pattern);
                    let comment = v
                        .comment
                        .map_or_else(|| format!("{name} mutated"), |c| prefix_comment(name, &c));
                    Variant::with_comment(Pattern::Object(object), comment)
                })
        })
    };

    let omitted = mandatory.into_iter().map(move |key| {
        let mut object = base.clone();
        object.keys.remove(&key);
        Variant::with_comment(Pattern::Object(object), format!("{key}: mandatory key omitted"))
    });

    Box::new(mutated.chain(omitted))
}
