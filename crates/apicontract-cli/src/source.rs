//! Loading the contract under test: an OpenAPI spec or a DSL feature file

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use apicontract_core::{Config, DslFeature, Feature, LintViolation, compile_feature};
use apicontract_openapi::{OpenApiSpecification, attach_examples, load_examples};

/// A compiled contract plus what it was compiled from.
pub struct Contract {
    pub source: String,
    pub feature: Feature,
    pub lints: Vec<LintViolation>,
}

/// Compile `feature_file` when given, otherwise the configured spec.
/// External examples are attached in both cases.
pub fn load(cfg: &Config, feature_file: Option<&Path>) -> Result<Contract> {
    let mut contract = match feature_file {
        Some(path) => load_dsl(cfg, path)?,
        None => load_spec(cfg)?,
    };

    if let Some(dir) = &cfg.examples_dir {
        let examples = load_examples(dir).with_context(|| format!("loading examples from {}", dir.display()))?;
        let total = examples.len();
        let unmatched = attach_examples(&mut contract.feature, examples)?;
        for name in &unmatched {
            warn!(example = %name, "example matches no scenario");
        }
        info!(attached = total - unmatched.len(), unmatched = unmatched.len(), "loaded external examples");
    }
    Ok(contract)
}

fn load_spec(cfg: &Config) -> Result<Contract> {
    let compiled = OpenApiSpecification::from_path(&cfg.spec)
        .with_context(|| format!("loading spec {}", cfg.spec.display()))?
        .with_options(cfg.compiler_options())
        .with_settings(cfg.resolver_settings())
        .compile()?;
    Ok(Contract {
        source: cfg.spec.display().to_string(),
        feature: compiled.feature,
        lints: compiled.lints,
    })
}

fn load_dsl(cfg: &Config, path: &Path) -> Result<Contract> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let dsl: DslFeature =
        serde_json::from_str(&content).with_context(|| format!("parsing feature {}", path.display()))?;
    let feature = compile_feature(&dsl)?.with_settings(cfg.resolver_settings());
    Ok(Contract {
        source: path.display().to_string(),
        feature,
        lints: Vec::new(),
    })
}
