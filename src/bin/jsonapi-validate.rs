//! JSON:API validation CLI
//!
//! Command-line interface for validating documents against a type schema
//! definition and building query strings.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use jsonapi_validate::{
    lint, load_document, load_type_schema, parse_fields_args, parse_include_arg, Engine,
    FileStatus, Fieldsets, IncludeTree, LintResult, LoadError, Severity, Top,
};

#[derive(Parser)]
#[command(name = "jsonapi-validate")]
#[command(about = "Validate and normalize JSON:API documents against a type schema")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Include tree and sparse fieldsets shared by `validate` and `query`.
#[derive(Args)]
struct Selection {
    /// Relationships that must be included, e.g. author.articles,comments
    #[arg(long, short)]
    include: Option<String>,

    /// Sparse fieldset as TYPE=FIELD,FIELD (repeatable)
    #[arg(long = "fields", short = 'f')]
    fields: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document and print its normalized form
    Validate {
        /// Document file to validate
        document: PathBuf,

        /// Type schema definition file
        #[arg(long, short)]
        schema: PathBuf,

        /// Primary data is a single resource of this type
        #[arg(long, conflicts_with = "top_many", required_unless_present = "top_many")]
        top: Option<String>,

        /// Primary data is a list of resources of these types (comma-separated)
        #[arg(long, value_delimiter = ',', conflicts_with = "top")]
        top_many: Vec<String>,

        #[command(flatten)]
        selection: Selection,

        /// Keep unresolvable references outside the include tree as identifiers
        #[arg(long)]
        lenient_references: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Print only a JSON verdict instead of the normalized document
        #[arg(long)]
        json: bool,
    },

    /// Print the query string for an include tree and sparse fieldsets
    Query {
        #[command(flatten)]
        selection: Selection,
    },

    /// Lint schema definition files (syntax, structure, undefined types)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("JSONAPI_VALIDATE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Validate {
            document,
            schema,
            top,
            top_many,
            selection,
            lenient_references,
            output,
            pretty,
            json,
        } => {
            let top = match top {
                Some(type_name) => Top::One(type_name),
                None => Top::Many(top_many),
            };
            run_validate(ValidateArgs {
                document,
                schema,
                top,
                selection,
                lenient_references,
                output,
                pretty,
                json_output: json,
            })
        }

        Commands::Query { selection } => run_query(&selection),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

impl Selection {
    fn build(&self) -> Result<(IncludeTree, Fieldsets), LoadError> {
        let include = self
            .include
            .as_deref()
            .map(parse_include_arg)
            .unwrap_or_default();
        let fields = parse_fields_args(&self.fields)?;
        Ok((include, fields))
    }
}

struct ValidateArgs {
    document: PathBuf,
    schema: PathBuf,
    top: Top,
    selection: Selection,
    lenient_references: bool,
    output: Option<PathBuf>,
    pretty: bool,
    json_output: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let ValidateArgs {
        document: document_path,
        schema: schema_path,
        top,
        selection,
        lenient_references,
        output,
        pretty,
        json_output,
    } = args;

    let schema = load_type_schema(&schema_path).map_err(|e| {
        report_load_error(json_output, "loading schema", &e);
        e.exit_code() as u8
    })?;
    let (include, fields) = selection.build().map_err(|e| {
        report_load_error(json_output, "parsing arguments", &e);
        e.exit_code() as u8
    })?;
    let document = load_document(&document_path).map_err(|e| {
        report_load_error(json_output, "loading document", &e);
        e.exit_code() as u8
    })?;

    let engine = Engine::new(top, schema)
        .include(include)
        .fields(fields)
        .lenient_references(lenient_references);

    let normalized = match engine.validate(&document) {
        Ok(normalized) => normalized,
        Err(e) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "error": { "path": e.path(), "message": e.to_string() }
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                eprintln!("  {}", e);
            }
            return Err(1);
        }
    };

    if json_output {
        println!(r#"{{"valid":true}}"#);
        return Ok(());
    }

    let rendered = if pretty {
        serde_json::to_string_pretty(&normalized)
    } else {
        serde_json::to_string(&normalized)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", rendered);
        }
    }

    Ok(())
}

/// Output a load error in plain text or JSON format.
fn report_load_error(json_output: bool, context: &str, error: &LoadError) {
    let mut message = format!("{}: {}", context, error);
    if let LoadError::InvalidDefinition { errors } = error {
        for detail in errors {
            message.push_str(&format!("\n  {}", detail));
        }
    }
    if json_output {
        let output = serde_json::json!({ "valid": false, "error": { "message": message } });
        println!("{}", output);
    } else {
        eprintln!("Error: {}", message);
    }
}

fn run_query(selection: &Selection) -> Result<(), u8> {
    let (include, fields) = selection.build().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    println!("{}", jsonapi_validate::query_string(&include, &fields));
    Ok(())
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);
    if format == "json" {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", rendered);
    } else {
        print_lint_report(path, &result, strict, quiet);
    }

    if result.passes(strict) {
        Ok(())
    } else {
        Err(1)
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn print_lint_report(path: &Path, result: &LintResult, strict: bool, quiet: bool) {
    if !quiet {
        println!("Linting {} ...\n", path.display());
    }

    for file_result in &result.results {
        if quiet && file_result.status == FileStatus::Ok {
            continue;
        }
        let (color, icon) = match file_result.status {
            FileStatus::Ok => (GREEN, "✓"),
            FileStatus::Warning => (YELLOW, "⚠"),
            FileStatus::Error => (RED, "✗"),
        };
        println!("  {color}{icon}{RESET} {}", file_result.file.display());

        let shown = file_result
            .diagnostics
            .iter()
            .filter(|d| !quiet || d.severity == Severity::Error);
        for diag in shown {
            let (color, label) = match diag.severity {
                Severity::Error => (RED, "error"),
                Severity::Warning => (YELLOW, "warning"),
            };
            println!(
                "    {color}{label}[{}]{RESET}: {} - {}",
                diag.code, diag.path, diag.message
            );
        }
    }

    println!();
    if result.passes(strict) {
        println!(
            "{GREEN}✓ {} files checked, all passed{RESET}",
            result.files_checked
        );
    } else {
        println!(
            "{RED}✗ {} files checked: {} passed, {} failed ({} errors, {} warnings){RESET}",
            result.files_checked, result.passed, result.failed, result.errors, result.warnings
        );
    }
}
