//! OpenAPI document → [`Feature`]

use std::path::Path;
use std::str::FromStr;

use apicontract_core::{CompilerOptions, Feature, LintReport, LintViolation, Registry, ResolverSettings};
use serde_json::Value;
use tracing::{debug, info};

use crate::compiler::SchemaCompiler;
use crate::document::{SpecError, SpecVersion, deref, parse_document};
use crate::operation::{METHODS, Operation};

/// A parsed, version-checked OpenAPI 3 document.
#[derive(Debug, Clone)]
pub struct OpenApiSpecification {
    document: Value,
    version: SpecVersion,
    options: CompilerOptions,
    settings: ResolverSettings,
}

/// Output of compiling a specification.
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub feature: Feature,
    pub lints: Vec<LintViolation>,
}

impl CompiledContract {
    #[must_use]
    pub fn lint_report(&self) -> LintReport {
        LintReport::new(&self.lints)
    }
}

impl FromStr for OpenApiSpecification {
    type Err = SpecError;

    /// Parse JSON or YAML content, sniffed from its first character.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::from_document(parse_document(None, content)?)
    }
}

impl OpenApiSpecification {
    /// Load and parse a spec file; the extension decides the format.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Io`] when the file cannot be read, and the
    /// parse or version errors of [`Self::from_document`].
    pub fn from_path(path: &Path) -> Result<Self, SpecError> {
        let content = std::fs::read_to_string(path).map_err(|e| SpecError::Io(path.to_path_buf(), e.to_string()))?;
        Self::from_document(parse_document(Some(path), &content)?)
    }

    /// # Errors
    ///
    /// Swagger 2.0 and unknown versions are rejected.
    pub fn from_document(document: Value) -> Result<Self, SpecError> {
        let version = SpecVersion::detect(&document)?;
        Ok(Self {
            document,
            version,
            options: CompilerOptions::default(),
            settings: ResolverSettings::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolver policy of the compiled feature.
    #[must_use]
    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn version(&self) -> SpecVersion {
        self.version
    }

    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .unwrap_or("openapi")
    }

    /// Compile only `components.schemas`.
    ///
    /// # Errors
    ///
    /// Returns the first component compilation error.
    pub fn compile_schemas(&self) -> Result<(Registry, Vec<LintViolation>), SpecError> {
        let mut compiler = SchemaCompiler::new(&self.document, self.version, self.options);
        compiler.compile_components()?;
        let (registry, lints) = compiler.into_parts();
        Ok((registry, lints.into_vec()))
    }

    /// Compile components and every operation into a feature with one
    /// scenario per operation and response status.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Contract`] for compilation errors, dangling
    /// references and unusable constraints.
    pub fn compile(&self) -> Result<CompiledContract, SpecError> {
        let mut compiler = SchemaCompiler::new(&self.document, self.version, self.options);
        compiler.compile_components()?;

        let mut scenarios = Vec::new();
        for (path, raw) in self.document.get("paths").and_then(Value::as_object).into_iter().flatten() {
            let item = deref(&self.document, raw, path)?;
            for method in METHODS {
                let Some(operation) = item.get(*method) else {
                    continue;
                };
                let compiled = Operation::new(&self.document, path, method, item, operation).scenarios(&mut compiler)?;
                debug!(path = %path, method, scenarios = compiled.len(), "compiled operation");
                scenarios.extend(compiled);
            }
        }

        let (registry, lints) = compiler.into_parts();
        info!(
            title = self.title(),
            scenarios = scenarios.len(),
            patterns = registry.len(),
            lints = lints.violations().len(),
            "compiled specification"
        );
        Ok(CompiledContract {
            feature: Feature::new(self.title(), scenarios, registry).with_settings(self.settings),
            lints: lints.into_vec(),
        })
    }
}
