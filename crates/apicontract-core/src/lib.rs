//! apicontract-core: pattern model, matching, generation and convergence
//!
//! Compiled API contracts are [`Pattern`] trees. This crate matches concrete
//! values and HTTP exchanges against them with breadcrumbed diagnostics,
//! expands them into positive and negative test variants, converges
//! patterns observed across examples, and stubs responses for mocks.

pub mod config;
pub mod constraints;
pub mod convergence;
pub mod dsl;
pub mod error;
pub mod generation;
pub mod http;
pub mod keys;
pub mod lint;
pub mod pattern;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod result;
pub mod row;
pub mod scenario;
pub mod value;

pub use config::{CompilerOptions, Config, ConfigError};
pub use convergence::{converge, converge_values, infer_pattern};
pub use dsl::{DslFeature, DslScenario, Step, compile_feature};
pub use error::{ContractError, Result};
pub use generation::{Variant, Variants};
pub use http::{HttpRequest, HttpRequestPattern, HttpResponse, HttpResponsePattern, SecurityScheme};
pub use lint::{LintLog, LintRule, LintSeverity, LintViolation};
pub use pattern::Pattern;
pub use registry::Registry;
pub use report::{ContractReport, GeneratedTest, LintReport, MatchReport};
pub use resolver::{GenerationStrategy, KeyCheck, Resolver, ResolverSettings};
pub use result::{Failure, FailureReason, MatchResult, MismatchKind, Results};
pub use row::Row;
pub use scenario::{Feature, Scenario, TestCase, TestKind};
