use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use store_api::compose::{Severity, ValidationContext};

/// Checks a docker-compose descriptor for wiring mistakes.
#[derive(Parser, Debug)]
#[command(name = "compose-check", version)]
struct Args {
    /// Compose file to check
    #[arg(short, long, default_value = "docker-compose.yml")]
    file: PathBuf,

    /// Directory env files are resolved from (defaults to the file's directory)
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Print the report as JSON instead of log lines
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    store_api::logging::init(args.verbose);

    let project_dir = match &args.project_dir {
        Some(dir) => dir.clone(),
        None => args
            .file
            .parent()
            .map(|p| if p.as_os_str().is_empty() { PathBuf::from(".") } else { p.to_path_buf() })
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let report = ValidationContext::new(&project_dir)
        .validate_file(&args.file)
        .with_context(|| format!("Failed to check {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for finding in &report.findings {
            match finding.severity {
                Severity::Error => error!("{}", finding),
                Severity::Warning => warn!("{}", finding),
            }
        }
        info!(
            errors = report.errors().count(),
            warnings = report.warnings().count(),
            "Checked {}",
            args.file.display()
        );
    }

    Ok(if report.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
