//! shipcheck - run the workspace verification pipeline.
//!
//! One command that runs the declared quality gates in order — compile
//! checks (native and web target), formatting, linting, tests, web
//! bundle — and exits with a status automation can trust: 0 only when
//! every attempted stage passed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use shipcheck_core::{
    default_pipeline, Pipeline, PipelineReport, PipelineResult, PipelineStatus, Stage,
};

#[derive(Parser)]
#[command(name = "shipcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the workspace quality gates in order, fail-fast", long_about = None)]
struct Cli {
    /// Workspace to verify (default: current directory)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Subset of stages to run (comma-separated: check,check_web,fmt,clippy,test,doc_test,build_web)
    #[arg(short, long)]
    stages: Option<String>,

    /// Load the stage list from a JSON file instead of the builtin catalog
    #[arg(long, conflicts_with = "stages")]
    config: Option<PathBuf>,

    /// Print a JSON report to stdout after the run
    #[arg(long)]
    report: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let stages = match (&cli.config, &cli.stages) {
        (Some(path), _) => load_stages(path)?,
        (None, Some(selection)) => select_stages(selection)?,
        (None, None) => default_pipeline(),
    };

    info!(
        workspace = %cli.workspace.display(),
        stages = stages.len(),
        "starting verification pipeline"
    );

    let started_at = Utc::now();
    let result = Pipeline::run(&stages, &cli.workspace).await;

    print_summary(&result);

    if cli.report {
        let report = PipelineReport::new(env!("CARGO_PKG_VERSION"), started_at, &stages, &result);
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    }

    Ok(ExitCode::from(result.exit_code()))
}

/// Initialise the global tracing subscriber: stderr-friendly fmt layer,
/// `RUST_LOG` filtering, optional JSON lines. Only the first call per
/// process takes effect.
fn init_tracing(json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    let fmt_layer = fmt::layer().with_target(false);

    if json {
        registry.with(fmt_layer.json()).try_init().ok();
    } else {
        registry.with(fmt_layer).try_init().ok();
    }
}

/// Resolve a comma-separated `--stages` selection against the builtin
/// catalog, preserving catalog order. Naming a default-disabled stage
/// (doc_test) enables it for this run.
fn select_stages(selection: &str) -> Result<Vec<Stage>> {
    let catalog = default_pipeline();
    let known: Vec<&str> = catalog.iter().map(|s| s.name.as_str()).collect();

    let mut wanted: Vec<String> = Vec::new();
    for raw in selection.split(',') {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        if !known.contains(&name.as_str()) {
            anyhow::bail!("unknown stage `{}` (known stages: {})", name, known.join(", "));
        }
        if !wanted.contains(&name) {
            wanted.push(name);
        }
    }

    if wanted.is_empty() {
        anyhow::bail!("no stages selected");
    }

    Ok(catalog
        .into_iter()
        .filter(|stage| wanted.contains(&stage.name))
        .map(|mut stage| {
            stage.enabled = true;
            stage
        })
        .collect())
}

/// Load a stage list from a JSON config file (an array of stage records).
fn load_stages(path: &Path) -> Result<Vec<Stage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read stage config {}", path.display()))?;
    let stages: Vec<Stage> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse stage config {}", path.display()))?;
    if stages.is_empty() {
        anyhow::bail!("stage config {} declares no stages", path.display());
    }
    Ok(stages)
}

fn print_summary(result: &PipelineResult) {
    println!();
    for report in &result.stages {
        let mark = if report.passed() { "✓" } else { "✗" };
        println!("  {} {} ({}ms)", mark, report.name, report.duration_ms);
    }
    println!();
    println!(
        "Summary: {}/{} stages passed",
        result.passed_count(),
        result.stages.len()
    );

    match &result.status {
        PipelineStatus::Success => println!("✓ All checks passed"),
        PipelineStatus::FailedAt(name) => println!("✗ Pipeline failed at stage `{name}`"),
    }
}
