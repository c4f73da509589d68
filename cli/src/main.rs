use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uidl_core::{
    CommandTree, Position, SchemaCatalog, SchemaRegistry, ValidationMode, ValidationReport,
    Validator, builtin,
};
use uidl_parser::{ParseErrors, parse_json, parse_uidl, render};

/// Environment variable holding the default log filter.
const LOG_ENV: &str = "UIDL_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Extensions picked up when a directory is given as input.
const DOCUMENT_EXTENSIONS: &[&str] = &["uidl", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum InputFormat {
    /// `.json` files are relaxed JSON, everything else is UIDL text.
    Auto,
    Uidl,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "uidl")]
#[command(about = "Check, format and inspect UIDL dialog descriptions")]
struct Cli {
    /// Log filter directives (default: $UIDL_LOG, then "warn").
    #[arg(long, global = true)]
    log: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse and validate documents against the schema registry.
    Check(CheckArgs),
    /// Print a document in canonical UIDL form.
    Fmt(FmtArgs),
    /// Print a document's canonical tree as JSON.
    Dump(DumpArgs),
    /// List the registered schemas.
    Schemas(SchemasArgs),
}

#[derive(Debug, Args)]
struct RegistryArgs {
    /// Additional schema catalog (YAML or JSON); may be repeated.
    #[arg(long = "schemas", value_name = "CATALOG")]
    catalogs: Vec<PathBuf>,
    /// Do not register the built-in dialog, window, action and link schemas.
    #[arg(long)]
    no_builtin: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Document files and/or directories containing `.uidl` / `.json` files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Treat undeclared attributes as errors instead of warnings.
    #[arg(long)]
    strict: bool,
    #[arg(long, value_enum, default_value = "auto")]
    input_format: InputFormat,
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
    /// Number of parallel jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
    #[command(flatten)]
    registry: RegistryArgs,
}

#[derive(Debug, Args)]
struct FmtArgs {
    input: PathBuf,
    #[arg(long, value_enum, default_value = "auto")]
    input_format: InputFormat,
}

#[derive(Debug, Args)]
struct DumpArgs {
    input: PathBuf,
    #[arg(long, value_enum, default_value = "auto")]
    input_format: InputFormat,
}

#[derive(Debug, Args)]
struct SchemasArgs {
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
    #[command(flatten)]
    registry: RegistryArgs,
}

/// Failing phase of a run. Earlier phases sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Read,
    Parse,
    Validation,
    Config,
}

impl Phase {
    fn exit_code(self) -> i32 {
        match self {
            Phase::Read => 3,
            Phase::Parse => 4,
            Phase::Validation => 5,
            Phase::Config => 6,
        }
    }
}

#[derive(Debug)]
struct CliError {
    phase: Phase,
    message: String,
}

impl CliError {
    fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Fmt(args) => run_fmt(args),
        Command::Dump(args) => run_dump(args),
        Command::Schemas(args) => run_schemas(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.phase.exit_code());
    }
}

fn init_logging(directives: Option<&str>) {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_env(LOG_ENV).ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_registry(args: &RegistryArgs) -> Result<SchemaRegistry, CliError> {
    let mut registry = SchemaRegistry::new();
    if !args.no_builtin {
        builtin::register_all(&mut registry)
            .map_err(|err| CliError::new(Phase::Config, format!("built-in schemas: {err}")))?;
    }
    for path in &args.catalogs {
        let added = SchemaCatalog::load(path)
            .and_then(|catalog| catalog.register_into(&mut registry))
            .map_err(|err| {
                CliError::new(
                    Phase::Config,
                    format!("schema catalog '{}': {err}", path.display()),
                )
            })?;
        debug!(catalog = %path.display(), schemas = added, "loaded schema catalog");
    }
    registry.freeze();
    Ok(registry)
}

/// Expands directories (one level) into their documents, sorted and
/// deduplicated. Explicit files are taken as given.
fn collect_document_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut paths = BTreeSet::new();

    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input).map_err(|err| {
                CliError::new(
                    Phase::Read,
                    format!("failed to read directory '{}': {err}", input.display()),
                )
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|err| {
                        CliError::new(
                            Phase::Read,
                            format!("failed to read directory '{}': {err}", input.display()),
                        )
                    })?
                    .path();
                let is_document = path
                    .extension()
                    .and_then(OsStr::to_str)
                    .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext));
                if is_document && path.is_file() {
                    paths.insert(path);
                }
            }
            continue;
        }

        // Missing files are reported per document by the reader.
        paths.insert(input.clone());
    }

    if paths.is_empty() {
        return Err(CliError::new(
            Phase::Read,
            "no .uidl or .json documents found in the given inputs",
        ));
    }

    Ok(paths.into_iter().collect())
}

enum LoadError {
    Read(String),
    Parse(ParseErrors),
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Read(message) => CliError::new(Phase::Read, message),
            LoadError::Parse(errors) => CliError::new(Phase::Parse, errors.to_string()),
        }
    }
}

fn load_document(path: &Path, format: InputFormat) -> Result<CommandTree, LoadError> {
    let source = fs::read_to_string(path)
        .map_err(|err| LoadError::Read(format!("failed to read '{}': {err}", path.display())))?;
    let document = path.display().to_string();

    let is_json = match format {
        InputFormat::Json => true,
        InputFormat::Uidl => false,
        InputFormat::Auto => path.extension() == Some(OsStr::new("json")),
    };
    let parsed = if is_json {
        parse_json(&source, &document)
    } else {
        parse_uidl(&source, &document)
    };
    parsed.map_err(LoadError::Parse)
}

/// Result of checking one document.
enum Outcome {
    Unreadable(String),
    Unparsable(ParseErrors),
    Checked(ValidationReport),
}

impl Outcome {
    fn failed_phase(&self) -> Option<Phase> {
        match self {
            Outcome::Unreadable(_) => Some(Phase::Read),
            Outcome::Unparsable(_) => Some(Phase::Parse),
            Outcome::Checked(report) if !report.is_ok() => Some(Phase::Validation),
            Outcome::Checked(_) => None,
        }
    }
}

struct DocumentOutcome {
    document: String,
    outcome: Outcome,
}

fn check_document(
    path: &Path,
    format: InputFormat,
    validator: &Validator<'_>,
) -> DocumentOutcome {
    let document = path.display().to_string();
    let outcome = match load_document(path, format) {
        Ok(tree) => Outcome::Checked(validator.validate(&tree)),
        Err(LoadError::Read(message)) => Outcome::Unreadable(message),
        Err(LoadError::Parse(errors)) => Outcome::Unparsable(errors),
    };
    DocumentOutcome { document, outcome }
}

fn run_check(args: CheckArgs) -> Result<(), CliError> {
    let registry = build_registry(&args.registry)?;
    let paths = collect_document_paths(&args.inputs)?;
    let validator = Validator::new(&registry, ValidationMode::from_strict(args.strict));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
        .map_err(|e| CliError::new(Phase::Config, format!("failed to create thread pool: {e}")))?;

    info!(
        documents = paths.len(),
        schemas = registry.len(),
        strict = args.strict,
        "checking documents"
    );

    let outcomes: Vec<DocumentOutcome> = pool.install(|| {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|path| check_document(path, args.input_format, &validator))
            .collect()
    });

    match args.format {
        OutputFormat::Text => print_text_outcomes(&outcomes),
        OutputFormat::Json => print_json_outcomes(&outcomes)?,
    }

    let failed: Vec<Phase> = outcomes
        .iter()
        .filter_map(|outcome| outcome.outcome.failed_phase())
        .collect();
    match failed.iter().min() {
        Some(&phase) => Err(CliError::new(
            phase,
            format!(
                "{} of {} document(s) failed",
                failed.len(),
                outcomes.len()
            ),
        )),
        None => Ok(()),
    }
}

fn located(document: &str, position: Option<Position>, message: impl fmt::Display) -> String {
    match position {
        Some(pos) => format!("{document}:{pos}: {message}"),
        None => format!("{document}: {message}"),
    }
}

fn print_text_outcomes(outcomes: &[DocumentOutcome]) {
    for DocumentOutcome { document, outcome } in outcomes {
        match outcome {
            Outcome::Unreadable(message) => println!("{message}"),
            Outcome::Unparsable(errors) => println!("{errors}"),
            Outcome::Checked(report) => {
                for error in &report.errors {
                    println!("{}", located(document, error.position(), error));
                }
                for warning in &report.warnings {
                    eprintln!("warning: {}", located(document, warning.position, warning));
                }
                if report.is_ok() {
                    println!("{document}: ok");
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonDiagnostic {
    line: Option<usize>,
    column: Option<usize>,
    message: String,
}

impl JsonDiagnostic {
    fn new(position: Option<Position>, message: impl fmt::Display) -> Self {
        Self {
            line: position.map(|pos| pos.line),
            column: position.map(|pos| pos.column),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonDocumentReport<'a> {
    document: &'a str,
    status: &'static str,
    errors: Vec<JsonDiagnostic>,
    warnings: Vec<JsonDiagnostic>,
}

fn print_json_outcomes(outcomes: &[DocumentOutcome]) -> Result<(), CliError> {
    let reports: Vec<JsonDocumentReport<'_>> = outcomes
        .iter()
        .map(|DocumentOutcome { document, outcome }| {
            let (status, errors, warnings) = match outcome {
                Outcome::Unreadable(message) => (
                    "unreadable",
                    vec![JsonDiagnostic::new(None, message)],
                    Vec::new(),
                ),
                Outcome::Unparsable(errors) => (
                    "parse_error",
                    errors
                        .iter()
                        .map(|err| JsonDiagnostic::new(err.position(), err))
                        .collect(),
                    Vec::new(),
                ),
                Outcome::Checked(report) => (
                    if report.is_ok() { "ok" } else { "invalid" },
                    report
                        .errors
                        .iter()
                        .map(|err| JsonDiagnostic::new(err.position(), err))
                        .collect(),
                    report
                        .warnings
                        .iter()
                        .map(|warning| JsonDiagnostic::new(warning.position, warning))
                        .collect(),
                ),
            };
            JsonDocumentReport {
                document,
                status,
                errors,
                warnings,
            }
        })
        .collect();

    let raw = serde_json::to_string_pretty(&reports)
        .map_err(|err| CliError::new(Phase::Config, format!("failed to serialize report: {err}")))?;
    println!("{raw}");
    Ok(())
}

fn run_fmt(args: FmtArgs) -> Result<(), CliError> {
    let tree = load_document(&args.input, args.input_format)?;
    print!("{}", render(&tree));
    Ok(())
}

fn run_dump(args: DumpArgs) -> Result<(), CliError> {
    let tree = load_document(&args.input, args.input_format)?;
    let raw = serde_json::to_string_pretty(&tree)
        .map_err(|err| CliError::new(Phase::Parse, format!("failed to serialize tree: {err}")))?;
    println!("{raw}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonAttribute<'a> {
    name: &'a str,
    required: bool,
    rule: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonSchema<'a> {
    keyword: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    attributes: Vec<JsonAttribute<'a>>,
    children: Option<String>,
}

fn run_schemas(args: SchemasArgs) -> Result<(), CliError> {
    let registry = build_registry(&args.registry)?;

    match args.format {
        OutputFormat::Text => {
            for (key, schema) in registry.iter() {
                println!("{key}");
                for attr in schema.attributes() {
                    let presence = if attr.required { "required" } else { "optional" };
                    println!("  {:<12} {presence:<8} {}", attr.name, attr.checker.label());
                }
                if let Some(bounds) = schema.child_bounds() {
                    println!("  children: {bounds}");
                }
            }
            println!("{} schema(s) registered.", registry.len());
        }
        OutputFormat::Json => {
            let schemas: Vec<JsonSchema<'_>> = registry
                .iter()
                .map(|(key, schema)| JsonSchema {
                    keyword: &key.keyword,
                    kind: &key.kind,
                    attributes: schema
                        .attributes()
                        .iter()
                        .map(|attr| JsonAttribute {
                            name: &attr.name,
                            required: attr.required,
                            rule: attr.checker.label(),
                        })
                        .collect(),
                    children: schema.child_bounds().map(|bounds| bounds.to_string()),
                })
                .collect();
            let raw = serde_json::to_string_pretty(&schemas).map_err(|err| {
                CliError::new(Phase::Config, format!("failed to serialize schemas: {err}"))
            })?;
            println!("{raw}");
        }
    }

    Ok(())
}
