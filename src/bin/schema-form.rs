//! Schema Form CLI
//!
//! Command-line interface for inspecting how a JSON Schema form resolves.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_form::{
    load_document, load_form_document, to_id_schema, FormDocument, FormOptions, FormState,
    IdConfig, JsonSchemaValidator, SchemaResolver, SubmitError,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-form")]
#[command(about = "Resolve JSON Schema forms: defaults, field trees and validation")]
#[command(version)]
struct Cli {
    /// Log resolution decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every subcommand.
#[derive(clap::Args)]
struct FormArgs {
    /// Schema file, or a form document with schema, uiSchema and formData
    form: PathBuf,

    /// Form data file (overrides formData of the form document)
    #[arg(long)]
    data: Option<PathBuf>,

    /// uiSchema file (overrides uiSchema of the form document)
    #[arg(long)]
    ui: Option<PathBuf>,

    /// Form options as JSON (idPrefix, liveValidate, defaults, ...)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the initial form data: schema defaults merged with the data
    Defaults {
        #[command(flatten)]
        form: FormArgs,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the field descriptor tree of the form
    Describe {
        #[command(flatten)]
        form: FormArgs,

        /// Print the id schema instead of the field tree
        #[arg(long)]
        ids: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate the form data as a submit would
    Validate {
        #[command(flatten)]
        form: FormArgs,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Defaults {
            form,
            output,
            pretty,
        } => run_defaults(&form, output, pretty),
        Commands::Describe {
            form,
            ids,
            output,
            pretty,
        } => run_describe(&form, ids, output, pretty),
        Commands::Validate { form, json } => run_validate(&form, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "schema_form=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_inputs(args: &FormArgs) -> Result<(FormDocument, FormOptions), u8> {
    let mut document = load_form_document(&args.form).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    if let Some(path) = &args.data {
        document.form_data = Some(load_json(path)?);
    }
    if let Some(path) = &args.ui {
        document.ui_schema = load_json(path)?;
    }

    let options = match &args.config {
        Some(path) => serde_json::from_value(load_json(path)?).map_err(|e| {
            eprintln!("Error: invalid config {}: {}", path.display(), e);
            2u8
        })?,
        None => FormOptions::default(),
    };
    Ok((document, options))
}

fn load_json(path: &Path) -> Result<Value, u8> {
    load_document(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn build_form(args: &FormArgs) -> Result<FormState, u8> {
    let (document, options) = load_inputs(args)?;
    FormState::new(document.schema, document.ui_schema, document.form_data, options).map_err(
        |e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        },
    )
}

fn write_output(
    value: &impl serde::Serialize,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }
    Ok(())
}

fn run_defaults(args: &FormArgs, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let form = build_form(args)?;
    let data = form.form_data().cloned().unwrap_or(Value::Null);
    write_output(&data, output, pretty)
}

fn run_describe(
    args: &FormArgs,
    ids: bool,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let mut form = build_form(args)?;
    if ids {
        let options = form.options();
        let config = IdConfig {
            prefix: &options.id_prefix,
            separator: &options.id_separator,
        };
        let validator = JsonSchemaValidator::new();
        let resolver = SchemaResolver::new(form.schema(), &validator);
        let id_schema = to_id_schema(&resolver, form.schema(), None, form.form_data(), config)
            .map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
        return write_output(&id_schema, output, pretty);
    }

    let view = form.render().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    write_output(&view, output, pretty)
}

fn run_validate(args: &FormArgs, json_output: bool) -> Result<(), u8> {
    let mut form = build_form(args)?;

    match form.submit() {
        Ok(_) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(SubmitError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in &errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
