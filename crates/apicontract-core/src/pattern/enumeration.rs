//! Closed sets of literal values

use rand::Rng;
use serde_json::Value;

use crate::error::{ContractError, Result};
use crate::result::{Failure, MatchResult, MismatchKind};
use crate::value::{ValueExt, parse_literal, values_equal};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumPattern {
    pub values: Vec<Value>,
    pub type_alias: Option<String>,
}

impl EnumPattern {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            type_alias: None,
        }
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| values_equal(v, value))
    }

    fn rendered(&self) -> String {
        self.values
            .iter()
            .map(ValueExt::display_short)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn matches(&self, value: &Value) -> MatchResult {
        if self.contains(value) {
            return MatchResult::Success;
        }
        MatchResult::failure(Failure::new(
            MismatchKind::ValueMismatch,
            format!(
                "Expected one of [{}], actual was {}",
                self.rendered(),
                value.display_short()
            ),
        ))
    }

    pub fn generate(&self, rng: &mut impl Rng) -> Value {
        match self.values.len() {
            0 => Value::Null,
            n => self.values[rng.gen_range(0..n)].clone(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ContractError::Parse`] when the literal is not one of the
    /// declared values.
    pub fn parse(&self, literal: &str) -> Result<Value> {
        let as_string = Value::String(literal.to_string());
        if self.contains(&as_string) {
            return Ok(as_string);
        }
        let parsed = parse_literal(literal);
        self.values
            .iter()
            .find(|v| values_equal(v, &parsed))
            .cloned()
            .ok_or_else(|| ContractError::parse("", literal, format!("one of [{}]", self.rendered())))
    }

    /// A value of a declared type that is not in the set.
    #[must_use]
    pub fn value_outside(&self) -> Option<Value> {
        if let Some(Value::String(first)) = self.values.iter().find(|v| v.is_string()) {
            let mut candidate = format!("{first}_not_in_enum");
            while self.contains(&Value::String(candidate.clone())) {
                candidate.push('_');
            }
            return Some(Value::String(candidate));
        }
        let max = self
            .values
            .iter()
            .filter_map(Value::as_f64)
            .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.max(n))))?;
        Some(super::scalar::number_value(max.floor() + 1.0))
    }
}
