//! Project configuration for contract testing

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constraints::DEFAULT_MAX_STRING_LENGTH;
use crate::resolver::{DEFAULT_CYCLE_DEPTH, GenerationStrategy, KeyCheck, ResolverSettings};

/// Project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI spec path (JSON or YAML)
    #[serde(default = "default_spec")]
    pub spec: PathBuf,

    /// Directory of external example files (`*.json`, one exchange each)
    #[serde(default)]
    pub examples_dir: Option<PathBuf>,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_spec() -> PathBuf {
    PathBuf::from("openapi.yaml")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCheckMode {
    #[default]
    Strict,
    Extensible,
    Fuzzy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// How undeclared object keys are treated
    #[serde(default)]
    pub key_check: KeyCheckMode,

    /// In fuzzy mode, report misspelt optional keys as warnings only
    #[serde(default)]
    pub fuzzy_optional_as_warning: bool,

    /// Relax required-field checks and accept pattern tokens as values
    #[serde(default)]
    pub mock_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// One test per example
    #[default]
    NonGenerative,
    PositiveOnly,
    PositiveAndNegative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub mode: GenerationMode,

    /// Stop after this many test cases (unbounded when absent)
    #[serde(default)]
    pub max_tests: Option<usize>,

    /// Times a named pattern may recurse into itself during generation
    #[serde(default = "default_cycle_depth")]
    pub cycle_depth: usize,
}

fn default_cycle_depth() -> usize {
    DEFAULT_CYCLE_DEPTH
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::default(),
            max_tests: None,
            cycle_depth: DEFAULT_CYCLE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Ceiling for declared string lengths; larger bounds are downsampled
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,

    /// Reject allOf branches that redeclare a key with an incompatible type
    /// instead of letting the later branch win
    #[serde(default)]
    pub strict_all_of_conflicts: bool,
}

fn default_max_string_length() -> usize {
    DEFAULT_MAX_STRING_LENGTH
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            strict_all_of_conflicts: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: default_spec(),
            examples_dir: None,
            matching: MatchingConfig::default(),
            generation: GenerationConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Options read by the schema compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    pub max_string_length: usize,
    pub strict_all_of_conflicts: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            strict_all_of_conflicts: false,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from the first default location found in `dir`
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".apicontract.toml", ".apicontract.json", "apicontract.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Load from default location (.apicontract.toml) in the working directory
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."))
    }

    /// Resolver policy for matching and generation.
    #[must_use]
    pub fn resolver_settings(&self) -> ResolverSettings {
        let key_check = match self.matching.key_check {
            KeyCheckMode::Strict => KeyCheck::Strict,
            KeyCheckMode::Extensible => KeyCheck::Extensible,
            KeyCheckMode::Fuzzy => KeyCheck::Fuzzy {
                optional_as_warning: self.matching.fuzzy_optional_as_warning,
            },
        };
        let strategy = match self.generation.mode {
            GenerationMode::NonGenerative => GenerationStrategy::NonGenerativeTests,
            GenerationMode::PositiveOnly => GenerationStrategy::GenerativeTestsEnabled { positive_only: true },
            GenerationMode::PositiveAndNegative => {
                GenerationStrategy::GenerativeTestsEnabled { positive_only: false }
            }
        };
        ResolverSettings {
            key_check,
            strategy,
            mock_mode: self.matching.mock_mode,
            cycle_depth: self.generation.cycle_depth,
        }
    }

    #[must_use]
    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            max_string_length: self.limits.max_string_length,
            strict_all_of_conflicts: self.limits.strict_all_of_conflicts,
        }
    }

    /// Create example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# apicontract configuration

# OpenAPI spec (JSON or YAML)
spec = "openapi.yaml"

# External example files, one request/response exchange per JSON file
# examples_dir = "examples"

[matching]
# strict | extensible | fuzzy
key_check = "strict"
# fuzzy_optional_as_warning = true
# mock_mode = false

[generation]
# non_generative | positive_only | positive_and_negative
mode = "positive_and_negative"
# max_tests = 500
cycle_depth = 2

[limits]
# Declared string lengths above this are downsampled (bytes, default 4 MiB)
max_string_length = 4194304
# Fail on allOf branches that redeclare a key with another type
strict_all_of_conflicts = false
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
