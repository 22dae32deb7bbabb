//! Media types compared by type/subtype, ignoring parameters

use crate::result::{Failure, FailureReason, MismatchKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub kind: String,
    pub subtype: String,
}

impl MediaType {
    /// Parse `type/subtype; params`. Returns `None` without a `/`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let essence = text.split(';').next()?.trim();
        let (kind, subtype) = essence.split_once('/')?;
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if kind.is_empty() || subtype.is_empty() {
            return None;
        }
        Some(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
        })
    }

    /// Whether `other` falls under this (possibly wildcard) media type.
    #[must_use]
    pub fn accepts(&self, other: &MediaType) -> bool {
        let kind_ok = self.kind == "*" || self.kind == other.kind;
        let subtype_ok = self.subtype == "*" || self.subtype == other.subtype;
        kind_ok && subtype_ok
    }

    /// `application/json` and structured-syntax `+json` types.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.subtype == "json" || self.subtype.ends_with("+json")
    }

    #[must_use]
    pub fn is_xml(&self) -> bool {
        self.subtype == "xml" || self.subtype.ends_with("+xml")
    }

    #[must_use]
    pub fn is_form(&self) -> bool {
        self.kind == "application" && self.subtype == "x-www-form-urlencoded"
            || self.kind == "multipart"
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

/// Compare a declared content type against the one sent. Unparseable
/// declarations fall back to a case-insensitive comparison.
#[must_use]
pub fn check(expected: &str, actual: Option<&str>) -> Option<Failure> {
    let Some(actual) = actual else {
        return Some(
            Failure::new(
                MismatchKind::MissingKey,
                format!("Expected content type {expected}, but no Content-Type header was sent"),
            )
            .with_reason(FailureReason::ContentTypeMismatch),
        );
    };
    let matched = match (MediaType::parse(expected), MediaType::parse(actual)) {
        (Some(e), Some(a)) => e.accepts(&a),
        _ => expected.trim().eq_ignore_ascii_case(actual.trim()),
    };
    (!matched).then(|| {
        Failure::new(
            MismatchKind::ValueMismatch,
            format!("Expected content type {expected}, actual was {actual}"),
        )
        .with_reason(FailureReason::ContentTypeMismatch)
    })
}
