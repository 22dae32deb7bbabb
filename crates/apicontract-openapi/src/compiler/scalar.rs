//! Primitive leaves: strings by format, numbers, booleans

use apicontract_core::Result;
use apicontract_core::constraints::{NumericBounds, normalize_length, normalize_numeric};
use apicontract_core::pattern::{NumberPattern, PatternRegex, ScalarPattern, StringPattern};
use apicontract_core::{LintLog, Pattern};
use serde_json::{Map, Value};
use tracing::warn;

use super::SchemaCompiler;

impl SchemaCompiler<'_> {
    pub(super) fn compile_string(&mut self, node: &Map<String, Value>, breadcrumb: &str) -> Result<Pattern> {
        let format = node.get("format").and_then(Value::as_str);
        let scalar = match format {
            Some("date") => ScalarPattern::Date,
            Some("date-time") => ScalarPattern::DateTime,
            Some("uuid") => ScalarPattern::Uuid,
            Some("email") => ScalarPattern::Email,
            Some("binary") => ScalarPattern::Binary,
            Some("byte") => ScalarPattern::Byte,
            _ => ScalarPattern::String(string_pattern(
                node,
                self.options.max_string_length,
                breadcrumb,
                &mut self.lints,
            )?),
        };
        Ok(Pattern::Scalar(scalar))
    }

    pub(super) fn compile_number(&mut self, node: &Map<String, Value>, integer: bool, breadcrumb: &str) -> Pattern {
        let bounds = normalize_numeric(numeric_bounds(node), breadcrumb, &mut self.lints);
        Pattern::Scalar(ScalarPattern::Number(NumberPattern { bounds, integer }))
    }
}

fn string_pattern(
    node: &Map<String, Value>,
    ceiling: usize,
    breadcrumb: &str,
    lints: &mut LintLog,
) -> Result<StringPattern> {
    let bounds = normalize_length(
        length(node, "minLength"),
        length(node, "maxLength"),
        ceiling,
        breadcrumb,
        lints,
    )?;
    let regex = node.get("pattern").and_then(Value::as_str).and_then(|source| {
        PatternRegex::new(source)
            .inspect_err(|e| warn!(breadcrumb = %breadcrumb, pattern = source, error = %e, "ignoring invalid regex"))
            .ok()
    });
    Ok(StringPattern {
        min_length: bounds.min,
        max_length: bounds.max,
        regex,
    })
}

/// Length keywords as signed integers so negative values reach the
/// normalizer instead of vanishing.
fn length(node: &Map<String, Value>, keyword: &str) -> Option<i64> {
    let value = node.get(keyword)?;
    #[allow(clippy::cast_possible_truncation)]
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

/// 3.0 spells exclusivity as booleans next to `minimum`/`maximum`; 3.1 gives
/// the exclusive bound itself as a number.
fn numeric_bounds(node: &Map<String, Value>) -> NumericBounds {
    let (minimum, exclusive_minimum) = bound(node, "minimum", "exclusiveMinimum", f64::max);
    let (maximum, exclusive_maximum) = bound(node, "maximum", "exclusiveMaximum", f64::min);
    NumericBounds {
        minimum,
        maximum,
        exclusive_minimum,
        exclusive_maximum,
    }
}

fn bound(
    node: &Map<String, Value>,
    inclusive_key: &str,
    exclusive_key: &str,
    tighter: fn(f64, f64) -> f64,
) -> (Option<f64>, bool) {
    let inclusive = node.get(inclusive_key).and_then(Value::as_f64);
    match node.get(exclusive_key) {
        Some(Value::Bool(flag)) => (inclusive, *flag && inclusive.is_some()),
        Some(Value::Number(n)) => match (inclusive, n.as_f64()) {
            (Some(i), Some(e)) if tighter(i, e) == i && i != e => (Some(i), false),
            (_, Some(e)) => (Some(e), true),
            (i, None) => (i, false),
        },
        _ => (inclusive, false),
    }
}
