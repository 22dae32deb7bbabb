//! apicontract CLI - contract tests and stubs from OpenAPI specs

mod source;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use apicontract_core::config::GenerationMode;
use apicontract_core::report::generate_schema;
use apicontract_core::{
    Config, ContractReport, Failure, GeneratedTest, HttpRequest, LintReport, MatchReport, MatchResult, MismatchKind,
    Registry, Results, TestKind, converge_values,
};
use apicontract_openapi::{ExternalExample, to_document};

const CONFIG_FILE: &str = ".apicontract.toml";

#[derive(Parser)]
#[command(name = "apicontract")]
#[command(about = "Contract tests and stubs from OpenAPI specs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Config file (default: .apicontract.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Spec to use instead of the configured one
    #[arg(long, global = true)]
    spec: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the spec and report lint violations
    Compile {
        /// DSL feature file (JSON) to compile instead of the spec
        #[arg(long)]
        feature: Option<PathBuf>,
    },

    /// Check recorded exchanges against the contract
    Validate {
        /// Exchange files: `{"request": ..., "response": ...}`
        #[arg(required = true)]
        exchanges: Vec<PathBuf>,

        #[arg(long)]
        feature: Option<PathBuf>,
    },

    /// Generate contract test requests
    Generate {
        /// Include negative tests
        #[arg(long)]
        negative: bool,

        /// Stop after this many tests
        #[arg(long)]
        max: Option<usize>,

        /// Seed for reproducible values
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        feature: Option<PathBuf>,
    },

    /// Answer one request the way a mock server would
    Stub {
        /// Request file: `{"method": ..., "path": ..., "body": ...}`
        request: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        feature: Option<PathBuf>,
    },

    /// Infer a schema from sample JSON documents
    Infer {
        #[arg(required = true)]
        samples: Vec<PathBuf>,

        /// Component name for the inferred schema
        #[arg(long, default_value = "Inferred")]
        name: String,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the report format
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(spec) = &cli.spec {
        cfg.spec.clone_from(spec);
    }
    Ok(cfg)
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    SmallRng::seed_from_u64(seed.unwrap_or_else(rand::random))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// The passing scenario, or the failure of the closest one.
fn best_result(results: &Results) -> MatchResult {
    if results.has_success() {
        return MatchResult::Success;
    }
    match results.most_relevant() {
        Some(failure) => MatchResult::failure(failure.clone()),
        None => MatchResult::failure(Failure::new(MismatchKind::Nested, "No scenario matched the exchange")),
    }
}

fn print_lints(report: &LintReport) {
    for entry in &report.violations {
        println!("  [{:?}] {} at {}: {}", entry.severity, entry.rule, entry.breadcrumb, entry.message);
    }
}

fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Compile { feature } => {
            let cfg = load_config(&cli)?;
            let contract = source::load(&cfg, feature.as_deref())?;
            let lint = LintReport::new(&contract.lints);
            match cli.output {
                OutputFormat::Terminal => {
                    println!("{}: {} scenarios", contract.source, contract.feature.scenarios.len());
                    for scenario in &contract.feature.scenarios {
                        println!("  {} ({} examples)", scenario.name, scenario.examples.len());
                    }
                    if !lint.is_clean() {
                        println!("\nLint ({} errors, {} warnings):", lint.errors, lint.warnings);
                        print_lints(&lint);
                    }
                }
                OutputFormat::Json => print_json(&ContractReport {
                    spec: contract.source,
                    lint: lint.clone(),
                    ..ContractReport::default()
                })?,
                OutputFormat::Silent => {}
            }
            Ok(i32::from(lint.errors > 0))
        }

        Commands::Validate { exchanges, feature } => {
            let cfg = load_config(&cli)?;
            let contract = source::load(&cfg, feature.as_deref())?;
            let mut matches = Vec::with_capacity(exchanges.len());
            for path in exchanges {
                let exchange: ExternalExample = read_json(path)?;
                let results = contract.feature.matches(&exchange.request, &exchange.response);
                let result = best_result(&results);
                matches.push(MatchReport::new(path.display().to_string(), &result));
            }
            let failed = matches.iter().filter(|m| !m.success).count();
            match cli.output {
                OutputFormat::Terminal => {
                    for m in &matches {
                        if m.success {
                            println!("PASS: {}", m.subject);
                        } else {
                            println!("FAIL: {}\n\n{}\n", m.subject, m.report);
                        }
                    }
                    println!("\n{} exchanges, {failed} failed", matches.len());
                }
                OutputFormat::Json => print_json(&ContractReport {
                    spec: contract.source,
                    lint: LintReport::new(&contract.lints),
                    matches,
                    ..ContractReport::default()
                })?,
                OutputFormat::Silent => {}
            }
            Ok(i32::from(failed > 0))
        }

        Commands::Generate {
            negative,
            max,
            seed,
            feature,
        } => {
            let mut cfg = load_config(&cli)?;
            if *negative {
                cfg.generation.mode = GenerationMode::PositiveAndNegative;
            }
            let limit = max.or(cfg.generation.max_tests).unwrap_or(usize::MAX);
            let contract = source::load(&cfg, feature.as_deref())?;
            let resolver = contract.feature.resolver();
            let mut rng = seeded_rng(*seed);
            let tests: Vec<GeneratedTest> = contract
                .feature
                .generate_tests()?
                .take(limit)
                .map(|test| GeneratedTest::new(&test, &resolver, &mut rng))
                .collect();
            match cli.output {
                OutputFormat::Terminal => {
                    for test in &tests {
                        let sign = match test.kind {
                            TestKind::Positive => "+",
                            TestKind::Negative => "-",
                        };
                        println!("[{sign}] {} -> {}", test.name, test.expected_status);
                        println!("    {}", test.request.summary());
                        if let Some(body) = &test.request.body {
                            println!("    {body}");
                        }
                    }
                    let negatives = tests.iter().filter(|t| t.kind == TestKind::Negative).count();
                    println!("\n{} tests ({negatives} negative)", tests.len());
                }
                OutputFormat::Json => print_json(&ContractReport {
                    spec: contract.source,
                    lint: LintReport::new(&contract.lints),
                    tests,
                    ..ContractReport::default()
                })?,
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Stub { request, seed, feature } => {
            let cfg = load_config(&cli)?;
            let contract = source::load(&cfg, feature.as_deref())?;
            let request: HttpRequest = read_json(request)?;
            match contract.feature.stub_response(&request, &mut seeded_rng(*seed)) {
                Ok(response) => {
                    if cli.output != OutputFormat::Silent {
                        print_json(&response)?;
                    }
                    Ok(0)
                }
                Err(failure) => {
                    if cli.output != OutputFormat::Silent {
                        eprintln!("No scenario accepts {}\n\n{}", request.summary(), failure.report());
                    }
                    Ok(1)
                }
            }
        }

        Commands::Infer { samples, name } => {
            let values = samples.iter().map(|path| read_json::<Value>(path)).collect::<Result<Vec<_>>>()?;
            let pattern = converge_values(values.iter(), name)?;
            let mut registry = Registry::new();
            registry.register(name.as_str(), pattern);
            if cli.output != OutputFormat::Silent {
                print_json(&to_document(name, &registry))?;
            }
            Ok(0)
        }

        Commands::Init => {
            if Path::new(CONFIG_FILE).exists() {
                eprintln!("{CONFIG_FILE} already exists");
                return Ok(1);
            }

            std::fs::write(CONFIG_FILE, Config::example())?;
            println!("Created {CONFIG_FILE}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI spec");
            println!("  - examples_dir: recorded exchanges to seed tests and stubs");
            println!("  - matching.key_check: strict, extensible or fuzzy");
            println!("  - generation.mode: non_generative, positive_only or positive_and_negative");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", generate_schema());
            Ok(0)
        }
    }
}
