//! Example rows: flat column → literal data seeding generation

use serde::{Deserialize, Serialize};

use crate::http::{HttpRequest, HttpResponse};

/// Column holding a whole request body literal.
pub const REQUEST_BODY_COLUMN: &str = "(REQUEST-BODY)";

/// One example instance.
///
/// Columns are looked up by bare key name at any depth of a pattern, so a
/// `name` column pins every `name` key the pattern declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    columns: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_example: Option<HttpRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_example: Option<HttpResponse>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a row from a header line and one line of values.
    #[must_use]
    pub fn from_columns(headers: &[String], values: &[String]) -> Self {
        let mut row = Self::new();
        for (header, value) in headers.iter().zip(values) {
            row = row.with_column(header.clone(), value.clone());
        }
        row
    }

    /// Add or replace a column. The request-body column is stored apart.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == REQUEST_BODY_COLUMN {
            self.request_body = Some(value);
            return self;
        }
        match self.columns.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn with_request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_exchange(mut self, request: HttpRequest, response: HttpResponse) -> Self {
        self.request_example = Some(request);
        self.response_example = Some(response);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.request_body.is_none()
    }
}
