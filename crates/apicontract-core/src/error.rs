//! Error types for compilation, parsing and convergence
//!
//! Match failures are *not* errors: they are [`crate::MatchResult`] values.
//! Everything here is fatal for the schema node, row or scenario it names.

use thiserror::Error;

/// Result type for contract operations
pub type Result<T> = std::result::Result<T, ContractError>;

/// Fatal contract errors, each carrying the breadcrumb of the offending node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    /// Structurally broken schema node
    #[error("{breadcrumb}: {message}")]
    Compilation { breadcrumb: String, message: String },

    /// `$ref` that does not point at a component
    #[error("{breadcrumb}: cannot resolve reference {reference}")]
    UnresolvedReference {
        breadcrumb: String,
        reference: String,
    },

    /// Constraint value that cannot be repaired (lint rule `BAD_VALUE`)
    #[error("{breadcrumb}: BAD_VALUE: {message}")]
    BadValue { breadcrumb: String, message: String },

    /// Discriminator mapping that points outside the union
    #[error("{breadcrumb}: invalid discriminator: {message}")]
    Discriminator { breadcrumb: String, message: String },

    /// Literal that does not parse under the expected pattern
    #[error("{breadcrumb}: cannot parse {literal:?} as {expected}")]
    Parse {
        breadcrumb: String,
        literal: String,
        expected: String,
    },

    /// Unknown or malformed pattern token such as `(Strnig)`
    #[error("invalid pattern token {0:?}")]
    InvalidPatternToken(String),

    /// Name requested from the registry that was never compiled
    #[error("pattern {0:?} is not registered")]
    UnknownPattern(String),

    /// Two observed shapes that cannot be merged into one pattern
    #[error(
        "scenario {scenario:?}: cannot converge {base_type} with {new_type}; \
         the observed shapes are incompatible"
    )]
    Unconvergeable {
        scenario: String,
        base_type: String,
        new_type: String,
    },

    /// Example row that contradicts the pattern it seeds
    #[error("example {example:?}: {message}")]
    InvalidExample { example: String, message: String },

    /// Malformed DSL step
    #[error("step {step:?}: {message}")]
    Dsl { step: String, message: String },
}

impl ContractError {
    pub fn compilation(breadcrumb: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compilation {
            breadcrumb: breadcrumb.into(),
            message: message.into(),
        }
    }

    pub fn parse(
        breadcrumb: impl Into<String>,
        literal: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Parse {
            breadcrumb: breadcrumb.into(),
            literal: literal.into(),
            expected: expected.into(),
        }
    }
}
