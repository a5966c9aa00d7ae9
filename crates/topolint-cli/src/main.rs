// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use topolint_ingest::{build_model, load_rules};
use topolint_policies::{lint, LintOptions, Report, RuleDoc, RunInfo};
use tracing_subscriber::EnvFilter;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

#[derive(Parser, Debug)]
#[command(name = "topolint")]
#[command(about = "Sanity check a deployment snapshot against site policies")]
struct Cli {
    /// Snapshot file to lint (live status, exported bundle, or remote
    /// session dump).
    snapshot: PathBuf,

    /// Rule files, merged in order by top-level key.
    #[arg(
        short = 'c',
        long = "rules",
        value_delimiter = ',',
        default_value = "lint-rules.yaml"
    )]
    rules: Vec<PathBuf>,

    /// Cloud type; inferred from the deployed charms when omitted.
    #[arg(short = 't', long = "cloud-type")]
    cloud_type: Option<String>,

    #[arg(short = 'F', long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log level for the annotated output; beats RUST_LOG when given.
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,

    /// Subordinate placement overrides, e.g. "ntp:all#nrpe:host only".
    #[arg(short = 'o', long = "override-subordinate")]
    override_subordinate: Option<String>,

    /// Minimum number of distinct availability zones expected.
    #[arg(long = "min-azs", default_value_t = 3)]
    min_azs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    match run(&cli) {
        Ok(report) => {
            if cli.format == OutputFormat::Json {
                match report.to_json() {
                    Ok(rendered) => println!("{rendered}"),
                    Err(error) => {
                        eprintln!("cannot render report: {error}");
                        return exit_with(ExitCode::Internal);
                    }
                }
            }
            if report.has_errors() {
                exit_with(ExitCode::Validation)
            } else {
                exit_with(ExitCode::Success)
            }
        }
        Err(error) => {
            eprintln!("{}", error.message);
            exit_with(error.code)
        }
    }
}

#[derive(Debug)]
struct RunError {
    code: ExitCode,
    message: String,
}

impl RunError {
    fn new(code: ExitCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn run(cli: &Cli) -> Result<Report, RunError> {
    // A malformed rule document is fatal before any model building.
    let raw_rules = load_rules(&cli.rules, cli.override_subordinate.as_deref())
        .map_err(|error| RunError::new(ExitCode::DependencyFailure, error.to_string()))?;
    let rules = RuleDoc::from_value(raw_rules)
        .map_err(|error| RunError::new(ExitCode::DependencyFailure, error.to_string()))?;

    let snapshot = fs::read_to_string(&cli.snapshot).map_err(|error| {
        RunError::new(
            ExitCode::Internal,
            format!("cannot read snapshot {}: {error}", cli.snapshot.display()),
        )
    })?;
    let model = build_model(&snapshot)
        .map_err(|error| RunError::new(ExitCode::Internal, error.to_string()))?;

    let options = LintOptions {
        cloud_type: cli.cloud_type.clone(),
        min_azs: cli.min_azs,
    };
    let run = RunInfo {
        name: cli.snapshot.display().to_string(),
        controller: "manual".to_string(),
        model: "manual".to_string(),
        rules: cli
            .rules
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(","),
    };
    Ok(lint(&model, &rules, &options, run))
}

/// An explicit level beats RUST_LOG; JSON output suppresses the log sink
/// below errors so stdout stays machine-readable.
fn init_tracing(cli: &Cli) {
    let filter = if cli.format == OutputFormat::Json {
        EnvFilter::new("error")
    } else {
        match &cli.log_level {
            Some(level) => {
                EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
            }
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_with(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code as u8)
}
