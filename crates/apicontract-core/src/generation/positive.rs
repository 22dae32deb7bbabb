use std::iter;

use super::{Variant, Variants, prefix_comment, row_value_pattern};
use crate::keys::{is_optional, key_name};
use crate::pattern::{ListPattern, ObjectPattern, Pattern};
use crate::resolver::Resolver;
use crate::row::Row;

pub(crate) fn variants(pattern: &Pattern, row: &Row, resolver: &Resolver) -> Variants {
    match pattern {
        Pattern::Object(object) => object_variants(object, row, resolver),
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
        Pattern::Scalar(scalar) if resolver.is_generative() => {
            let boundaries = scalar
                .boundary_values()
                .into_iter()
                .map(|(value, comment)| Variant::with_comment(Pattern::Exact(value), comment));
            Box::new(iter::once(Variant::new(pattern.clone())).chain(boundaries.collect::<Vec<_>>()))
        }
        Pattern::Enum(e) if resolver.is_generative() => Box::new(
            e.values
                .clone()
                .into_iter()
                .map(|value| {
                    let comment = format!("enum value {value}");
                    Variant::with_comment(Pattern::Exact(value), comment)
                }),
        ),
        Pattern::Deferred(name) if !resolver.is_in_flight(name) => match resolver.resolve(name) {
            Ok(resolved) => variants(&resolved.clone(), row, &resolver.entering(name)),
            Err(_) => Box::new(iter::once(Variant::new(pattern.clone()))),
        },
        _ => Box::new(iter::once(Variant::new(pattern.clone()))),
    }
}

/// `pattern` with row values substituted for every key the row names.
pub(crate) fn base_pattern(pattern: &Pattern, row: &Row, resolver: &Resolver) -> Pattern {
    match pattern {
        Pattern::Object(object) => Pattern::Object(base_object(object, row, resolver)),
        Pattern::List(list) => Pattern::List(ListPattern {
            element: Box::new(base_pattern(&list.element, row, resolver)),
            type_alias: list.type_alias.clone(),
        }),
        _ => pattern.clone(),
    }
}

/// Object with row-pinned keys made mandatory and set to the row's value.
pub(crate) fn base_object(object: &ObjectPattern, row: &Row, resolver: &Resolver) -> ObjectPattern {
    let keys = object
        .keys
        .iter()
        .map(|(key, pattern)| {
            let name = key_name(key);
            match row.get(name) {
                Some(literal) => (name.to_string(), row_value_pattern(pattern, literal, resolver)),
                None => (key.clone(), base_pattern(pattern, row, resolver)),
            }
        })
        .collect();
    ObjectPattern {
        keys,
        ..object.clone()
    }
}

fn without_optional(object: &ObjectPattern) -> ObjectPattern {
    ObjectPattern {
        keys: object
            .keys
            .iter()
            .filter(|(k, _)| !is_optional(k))
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect(),
        ..object.clone()
    }
}

/// `base` with `key` replaced (as a mandatory key) by the variant's pattern.
fn replace_key(base: &ObjectPattern, key: &str, variant: Variant) -> Variant {
    let name = key_name(key);
    let mut object = base.clone();
    object.keys.remove(key);
    object.keys.insert(name.to_string(), variant.pattern);
    let comment = variant
        .comment
        .map_or_else(|| format!("{name} varied"), |c| prefix_comment(name, &c));
    Variant::with_comment(Pattern::Object(object), comment)
}

fn object_variants(object: &ObjectPattern, row: &Row, resolver: &Resolver) -> Variants {
    let base = base_object(object, row, resolver);
    let mandatory_only = without_optional(&base);

    let mut head = vec![Variant::new(Pattern::Object(base.clone()))];
    if mandatory_only.keys.len() != base.keys.len() {
        head.push(Variant::with_comment(
            Pattern::Object(mandatory_only),
            "optional keys omitted",
        ));
    }
    if !resolver.is_generative() {
        return Box::new(head.into_iter());
    }

    let free_keys: Vec<(String, Pattern)> = object
        .keys
        .iter()
        .filter(|(k, _)| !row.contains(key_name(k)))
        .map(|(k, p)| (k.clone(), p.clone()))
        .collect();
    let optional_keys: Vec<String> = free_keys
        .iter()
        .filter(|(k, _)| is_optional(k))
        .map(|(k, _)| k.clone())
        .collect();

    let varied = {
        let base = base.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        free_keys.into_iter().flat_map(move |(key, pattern)| {
            let current = base.keys.get(&key).cloned();
            let base = base.clone();
            variants(&pattern, &row, &resolver)
                .filter(move |v| Some(&v.pattern) != current.as_ref())
                .map(move |v| replace_key(&base, &key, v))
        })
    };

    let omitted = optional_keys.into_iter().map(move |key| {
        let mut object = base.clone();
        object.keys.remove(&key);
        Variant::with_comment(Pattern::Object(object), format!("{} omitted", key_name(&key)))
    });

    let mut seen: Vec<Pattern> = Vec::new();
    Box::new(head.into_iter().chain(varied).chain(omitted).filter(move |v| {
        if seen.contains(&v.pattern) {
            false
        } else {
            seen.push(v.pattern.clone());
            true
        }
    }))
}
