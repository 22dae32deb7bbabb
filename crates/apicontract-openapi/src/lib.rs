//! apicontract-openapi: OpenAPI 3.0/3.1 front-end for contract testing
//!
//! Compiles schemas into `apicontract-core` patterns and operations into
//! request/response scenarios, then attaches recorded examples.

pub mod compiler;
pub mod document;
pub mod examples;
pub mod export;
mod operation;
pub mod specification;

pub use compiler::SchemaCompiler;
pub use document::{SpecError, SpecVersion};
pub use examples::{ExternalExample, attach_examples, load_examples};
pub use export::{to_document, to_schema};
pub use specification::{CompiledContract, OpenApiSpecification};
