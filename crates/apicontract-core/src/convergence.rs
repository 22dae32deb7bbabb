//! Pattern convergence: merge shapes observed across examples into one
//!
//! Convergence is used when patterns are inferred from traffic or example
//! payloads. Two observations of the same endpoint rarely carry identical
//! keys, so one-sided keys become optional and `null` observations make the
//! other side nullable.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ContractError, Result};
use crate::keys::{is_optional, key_name, optional_key};
use crate::pattern::{
    AdditionalProperties, AnyPattern, EnumPattern, ListPattern, NumberPattern, ObjectPattern,
    Pattern, ScalarPattern,
};
use crate::value::is_integral;

/// Merge `new` into `base`.
///
/// # Errors
///
/// Returns [`ContractError::Unconvergeable`] when the two top-level shapes
/// have nothing in common, e.g. an object and a string. Conflicts below an
/// object key are logged and resolved in favour of `base`.
pub fn converge(base: &Pattern, new: &Pattern, scenario: &str) -> Result<Pattern> {
    if base == new {
        return Ok(base.clone());
    }
    match (base, new) {
        (_, Pattern::AnyValue) => return Ok(base.clone()),
        (Pattern::AnyValue, _) => return Ok(new.clone()),
        (b, n) if b.is_null_like() => return Ok(n.clone().nullable()),
        (b, n) if n.is_null_like() => return Ok(b.clone().nullable()),
        _ => {}
    }

    let (base_core, base_nullable) = split_nullable(base);
    let (new_core, new_nullable) = split_nullable(new);
    if base_nullable || new_nullable {
        let merged = converge(base_core, new_core, scenario)?;
        return Ok(merged.nullable());
    }

    match (base, new) {
        (Pattern::Object(b), Pattern::Object(n)) => Ok(Pattern::Object(converge_objects(b, n, scenario))),
        (Pattern::List(b), Pattern::List(n)) => {
            let element = converge(&b.element, &n.element, scenario)?;
            Ok(Pattern::List(ListPattern {
                element: Box::new(element),
                type_alias: b.type_alias.clone().or_else(|| n.type_alias.clone()),
            }))
        }
        (Pattern::Scalar(b), Pattern::Scalar(n)) => {
            converge_scalars(b, n).ok_or_else(|| unconvergeable(base, new, scenario))
        }
        (Pattern::Exact(b), Pattern::Exact(n)) => converge(&infer_pattern(b), &infer_pattern(n), scenario),
        (Pattern::Enum(e), Pattern::Enum(other)) => {
            let mut values = e.values.clone();
            values.extend(other.values.iter().filter(|v| !e.contains(v)).cloned());
            Ok(Pattern::Enum(EnumPattern {
                values,
                type_alias: e.type_alias.clone(),
            }))
        }
        (Pattern::Enum(e), Pattern::Exact(v)) => {
            let mut values = e.values.clone();
            if !e.contains(v) {
                values.push(v.clone());
            }
            Ok(Pattern::Enum(EnumPattern {
                values,
                type_alias: e.type_alias.clone(),
            }))
        }
        (Pattern::Exact(v), other) | (other, Pattern::Exact(v)) => {
            let observed = infer_pattern(v);
            if observed.type_name() == other.type_name() {
                Ok(other.clone())
            } else {
                converge(other, &observed, scenario)
            }
        }
        (Pattern::Any(any), other) | (other, Pattern::Any(any)) if any.discriminator.is_none() => {
            Ok(Pattern::Any(absorb(any, other, scenario)))
        }
        _ => Err(unconvergeable(base, new, scenario)),
    }
}

/// Fold `new` into an undiscriminated union: each incoming shape converges
/// with the first compatible branch, or becomes a branch of its own.
fn absorb(any: &AnyPattern, new: &Pattern, scenario: &str) -> AnyPattern {
    let incoming = match new {
        Pattern::Any(other) if other.discriminator.is_none() => other.branches.clone(),
        other => vec![other.clone()],
    };
    let mut merged = any.clone();
    for pattern in incoming {
        let converged = merged.branches.iter().enumerate().find_map(|(i, branch)| {
            if branch.is_null_like() || pattern.is_null_like() {
                return None;
            }
            converge(branch, &pattern, scenario)
                .ok()
                .filter(|p| !matches!(p, Pattern::Any(_)))
                .map(|p| (i, p))
        });
        match converged {
            Some((i, p)) => merged.branches[i] = p,
            None if !merged.branches.contains(&pattern) => {
                debug!(scenario, new_type = %pattern.type_name(), "adding a union branch");
                merged.branches.push(pattern);
            }
            None => {}
        }
    }
    merged
}

fn unconvergeable(base: &Pattern, new: &Pattern, scenario: &str) -> ContractError {
    ContractError::Unconvergeable {
        scenario: scenario.to_string(),
        base_type: base.type_name(),
        new_type: new.type_name(),
    }
}

/// `(X, true)` for an undiscriminated `X | null`.
fn split_nullable(pattern: &Pattern) -> (&Pattern, bool) {
    if let Pattern::Any(AnyPattern {
        branches,
        discriminator: None,
        ..
    }) = pattern
    {
        if let [a, b] = branches.as_slice() {
            if b.is_null_like() {
                return (a, true);
            }
            if a.is_null_like() {
                return (b, true);
            }
        }
    }
    (pattern, false)
}

fn converge_scalars(base: &ScalarPattern, new: &ScalarPattern) -> Option<Pattern> {
    if base.encompasses(new) {
        return Some(Pattern::Scalar(base.clone()));
    }
    if new.encompasses(base) {
        return Some(Pattern::Scalar(new.clone()));
    }
    match (base, new) {
        (ScalarPattern::Number(b), ScalarPattern::Number(n)) => {
            let bounds = if b.bounds == n.bounds { b.bounds } else { Default::default() };
            Some(Pattern::Scalar(ScalarPattern::Number(NumberPattern {
                bounds,
                integer: b.integer && n.integer,
            })))
        }
        (b, n) if b.is_string_like() && n.is_string_like() => Some(Pattern::string()),
        _ => None,
    }
}

fn converge_objects(base: &ObjectPattern, new: &ObjectPattern, scenario: &str) -> ObjectPattern {
    let mut keys = BTreeMap::new();

    for (base_key, base_pattern) in &base.keys {
        let name = key_name(base_key);
        let Some((new_key, new_pattern)) = new.get(name) else {
            debug!(scenario, key = name, "key seen on one side only; marking optional");
            keys.insert(optional_key(name), base_pattern.clone());
            continue;
        };
        let merged = converge(base_pattern, new_pattern, scenario).unwrap_or_else(|err| {
            warn!(
                scenario,
                key = name,
                base_type = %base_pattern.type_name(),
                new_type = %new_pattern.type_name(),
                error = %err,
                "conflicting types for key; keeping the first seen"
            );
            base_pattern.clone()
        });
        let key = if is_optional(base_key) || is_optional(new_key) {
            optional_key(name)
        } else {
            name.to_string()
        };
        keys.insert(key, merged);
    }

    for (new_key, new_pattern) in &new.keys {
        let name = key_name(new_key);
        if base.get(name).is_none() {
            debug!(scenario, key = name, "key seen on one side only; marking optional");
            keys.insert(optional_key(name), new_pattern.clone());
        }
    }

    let additional = match (&base.additional, &new.additional) {
        (AdditionalProperties::FreeForm, _) | (_, AdditionalProperties::FreeForm) => {
            AdditionalProperties::FreeForm
        }
        (b, _) => b.clone(),
    };

    ObjectPattern {
        keys,
        additional,
        type_alias: base.type_alias.clone().or_else(|| new.type_alias.clone()),
    }
}

/// Pattern describing the shape of an observed value. Every observed key is
/// mandatory; convergence relaxes what later observations leave out.
#[must_use]
pub fn infer_pattern(value: &Value) -> Pattern {
    match value {
        Value::Null => Pattern::null(),
        Value::Bool(_) => Pattern::boolean(),
        Value::Number(n) if is_integral(n) => Pattern::integer(),
        Value::Number(_) => Pattern::number(),
        Value::String(_) => Pattern::string(),
        Value::Array(items) => {
            let element = items
                .iter()
                .map(infer_pattern)
                .reduce(|acc, next| {
                    converge(&acc, &next, "array elements").unwrap_or_else(|err| {
                        debug!(error = %err, "heterogeneous array; widening to a union");
                        widen(acc, next)
                    })
                })
                .unwrap_or(Pattern::AnyValue);
            Pattern::List(ListPattern::new(element))
        }
        Value::Object(map) => Pattern::Object(ObjectPattern::new(
            map.iter().map(|(k, v)| (k.clone(), infer_pattern(v))).collect(),
        )),
    }
}

/// Union of `acc` and `next` for array elements of unrelated shapes.
fn widen(acc: Pattern, next: Pattern) -> Pattern {
    match acc {
        Pattern::Any(mut any) if any.discriminator.is_none() => {
            if !any.branches.contains(&next) {
                any.branches.push(next);
            }
            Pattern::Any(any)
        }
        other => Pattern::Any(AnyPattern::new(vec![other, next])),
    }
}

/// Infer and converge a sequence of observed values.
///
/// # Errors
///
/// Returns [`ContractError::Unconvergeable`] when two observations have
/// incompatible top-level shapes.
pub fn converge_values<'a>(values: impl IntoIterator<Item = &'a Value>, scenario: &str) -> Result<Pattern> {
    let mut merged: Option<Pattern> = None;
    for value in values {
        let observed = infer_pattern(value);
        merged = Some(match merged {
            None => observed,
            Some(acc) => converge(&acc, &observed, scenario)?,
        });
    }
    Ok(merged.unwrap_or(Pattern::AnyValue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::from),
            (-1000.0f64..1000.0).prop_map(|f| serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    #[test]
    fn one_sided_keys_become_optional() {
        let a = infer_pattern(&json!({"id": 1, "name": "Rex"}));
        let b = infer_pattern(&json!({"id": 2, "tag": "good"}));
        let Pattern::Object(merged) = converge(&a, &b, "GET /pets").unwrap() else {
            panic!("expected object");
        };
        let keys: Vec<&str> = merged.keys.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name?", "tag?"]);
    }

    #[test]
    fn null_observations_make_keys_nullable() {
        let a = infer_pattern(&json!({"owner": "ann"}));
        let b = infer_pattern(&json!({"owner": null}));
        let Pattern::Object(merged) = converge(&a, &b, "s").unwrap() else {
            panic!("expected object");
        };
        assert_eq!(merged.keys["owner"], Pattern::string().nullable());
        let resolver = Resolver::default();
        assert!(Pattern::Object(merged.clone()).matches(&json!({"owner": null}), &resolver).is_success());
        assert!(Pattern::Object(merged).matches(&json!({"owner": "bob"}), &resolver).is_success());
    }

    #[test]
    fn integer_widens_to_number() {
        let merged = converge(&Pattern::integer(), &Pattern::number(), "s").unwrap();
        assert_eq!(merged, Pattern::number());
        let merged = converge(&infer_pattern(&json!(1)), &infer_pattern(&json!(1.5)), "s").unwrap();
        assert_eq!(merged, Pattern::number());
    }

    #[test]
    fn key_conflicts_keep_the_first_seen_type() {
        let a = infer_pattern(&json!({"id": 1}));
        let b = infer_pattern(&json!({"id": "one"}));
        let Pattern::Object(merged) = converge(&a, &b, "s").unwrap() else {
            panic!("expected object");
        };
        assert_eq!(merged.keys["id"], Pattern::integer());
    }

    #[test]
    fn incompatible_top_level_shapes_are_errors() {
        let err = converge(&infer_pattern(&json!({"a": 1})), &Pattern::string(), "POST /orders").unwrap_err();
        assert_eq!(
            err,
            ContractError::Unconvergeable {
                scenario: "POST /orders".into(),
                base_type: "object".into(),
                new_type: "string".into(),
            }
        );
    }

    #[test]
    fn empty_lists_take_the_observed_element() {
        let empty = infer_pattern(&json!([]));
        let pets = infer_pattern(&json!([{"id": 1}]));
        let merged = converge(&empty, &pets, "s").unwrap();
        assert_eq!(merged, pets);
        let aliased = Pattern::List(ListPattern::new(Pattern::AnyValue)).with_type_alias("Pets");
        assert_eq!(converge(&empty, &aliased, "s").unwrap().type_alias(), Some("Pets"));
    }

    #[test]
    fn converged_values_all_match() {
        let samples = [json!({"id": 1, "tags": ["a"]}), json!({"id": 2.5, "tags": [], "note": null})];
        let pattern = converge_values(&samples, "s").unwrap();
        let resolver = Resolver::default();
        for sample in &samples {
            assert!(pattern.matches(sample, &resolver).is_success(), "{sample}");
        }
    }

    #[test]
    fn heterogeneous_arrays_widen_to_unions() {
        let value = json!([1, "a", null, 2]);
        let pattern = infer_pattern(&value);
        assert!(pattern.matches(&value, &Resolver::default()).is_success());
    }

    #[test]
    fn unions_absorb_new_element_types() {
        let base = infer_pattern(&json!([1, "a", true]));
        let observed = infer_pattern(&json!([{"id": 1}]));
        let merged = converge(&base, &observed, "GET /feed").unwrap();
        let Pattern::List(list) = &merged else {
            panic!("expected list");
        };
        let Pattern::Any(any) = list.element.as_ref() else {
            panic!("expected union element");
        };
        assert_eq!(any.branches.len(), 4);
        assert!(merged.matches(&json!([2, "b", false, {"id": 2}]), &Resolver::default()).is_success());

        let widened = converge(&base, &infer_pattern(&json!([1.5])), "GET /feed").unwrap();
        let Pattern::List(list) = &widened else {
            panic!("expected list");
        };
        let Pattern::Any(any) = list.element.as_ref() else {
            panic!("expected union element");
        };
        assert_eq!(any.branches.len(), 3);
        assert!(any.branches.contains(&Pattern::number()));
    }

    proptest! {
        #[test]
        fn convergence_is_idempotent(value in arb_json()) {
            let pattern = infer_pattern(&value);
            prop_assert_eq!(converge(&pattern, &pattern, "p").unwrap(), pattern.clone());
            let twice = converge(&pattern, &infer_pattern(&value), "p").unwrap();
            prop_assert_eq!(twice, pattern);
        }
    }
}
