//! Security schemes as required request fields

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::HttpRequest;
use crate::result::{Failure, MismatchKind};

pub const AUTHORIZATION: &str = "Authorization";

/// How a request proves who it is. Only the shape of the credential is
/// checked; tokens are never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityScheme {
    ApiKeyHeader { name: String },
    ApiKeyQuery { name: String },
    Bearer,
    Basic,
}

impl SecurityScheme {
    /// Header carrying the credential, if any.
    #[must_use]
    pub fn header_name(&self) -> Option<&str> {
        match self {
            Self::ApiKeyHeader { name } => Some(name.as_str()),
            Self::Bearer | Self::Basic => Some(AUTHORIZATION),
            Self::ApiKeyQuery { .. } => None,
        }
    }

    /// Query parameter carrying the credential, if any.
    #[must_use]
    pub fn query_name(&self) -> Option<&str> {
        match self {
            Self::ApiKeyQuery { name } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Failure when `request` does not carry a credential of this scheme.
    #[must_use]
    pub fn check(&self, request: &HttpRequest) -> Option<Failure> {
        match self {
            Self::ApiKeyHeader { name } => match request.header(name) {
                Some(value) if !value.trim().is_empty() => None,
                _ => Some(Failure::missing_key(name).under(name.as_str())),
            },
            Self::ApiKeyQuery { name } => match request.query.get(name) {
                Some(value) if !value.trim().is_empty() => None,
                _ => Some(Failure::missing_key(name).under(name.as_str())),
            },
            Self::Bearer => check_authorization(request, "Bearer", |token| !token.is_empty()),
            Self::Basic => check_authorization(request, "Basic", |encoded| {
                STANDARD
                    .decode(encoded)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .is_some_and(|pair| pair.contains(':'))
            }),
        }
    }

    /// Add a well-formed credential of this scheme to `request`.
    pub fn apply(&self, request: &mut HttpRequest, rng: &mut impl Rng) {
        let secret = format!("secret{}", rng.gen_range(1000..10000_u32));
        match self {
            Self::ApiKeyHeader { name } => {
                request.headers.insert(name.clone(), secret);
            }
            Self::ApiKeyQuery { name } => {
                request.query.insert(name.clone(), secret);
            }
            Self::Bearer => {
                request.headers.insert(AUTHORIZATION.into(), format!("Bearer {secret}"));
            }
            Self::Basic => {
                let encoded = STANDARD.encode(format!("user:{secret}"));
                request.headers.insert(AUTHORIZATION.into(), format!("Basic {encoded}"));
            }
        }
    }
}

fn check_authorization(request: &HttpRequest, scheme: &str, valid: impl Fn(&str) -> bool) -> Option<Failure> {
    let Some(value) = request.header(AUTHORIZATION) else {
        return Some(Failure::missing_key(AUTHORIZATION).under(AUTHORIZATION));
    };
    let credential = value
        .split_once(' ')
        .filter(|(prefix, _)| prefix.eq_ignore_ascii_case(scheme))
        .map(|(_, rest)| rest.trim());
    match credential {
        Some(credential) if valid(credential) => None,
        _ => Some(
            Failure::new(
                MismatchKind::ValueMismatch,
                format!("Expected {scheme} credentials, actual was \"{value}\""),
            )
            .under(AUTHORIZATION),
        ),
    }
}
