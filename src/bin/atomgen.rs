//! atomgen CLI - C# extension generation from `.atomic` files
//!
//! Drives the orchestrator with filesystem-backed collaborators. Types are
//! not checked against real assemblies here; only the syntactic validation
//! applies.

use atomgen::analysis::change_analyzer::{changed_fields, should_regenerate, TRIGGER_FIELDS};
use atomgen::codegen::project_config::SETTINGS_FILE_NAME;
use atomgen::services::local::{
    LocalFileWriter, LocalProjectLocator, OfflineTypeOracle, TextUsageFinder,
};
use atomgen::services::{GeneratedFileTracker, ProjectContext};
use atomgen::{
    AtomicError, AtomicSettings, Collaborators, GenerationMode, GenerationOutcome, Orchestrator,
    RenameKind, RenameRequest, Result,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "atomgen")]
#[command(version, about = "C# extension generation from .atomic entity files", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./atomgen.yaml when present)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate C# sources for one or more .atomic files
    Generate {
        /// .atomic files to generate from
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate .atomic files without generating
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Report whether going from one version of a file to another needs regeneration
    CheckChange {
        /// Previous version of the file
        previous: PathBuf,
        /// Current version of the file
        current: PathBuf,
    },

    /// Rename a tag or value and update its call sites
    Rename {
        /// The .atomic file declaring the name
        file: PathBuf,
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        #[arg(long, value_enum, default_value = "value")]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Value,
    Tag,
}

impl From<KindArg> for RenameKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Value => RenameKind::Value,
            KindArg::Tag => RenameKind::Tag,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { files } => generate(cli.settings, files).await,
        Commands::Validate { files } => validate(cli.settings, files).await,
        Commands::CheckChange { previous, current } => check_change(previous, current).await,
        Commands::Rename { file, old, new, kind } => {
            rename(cli.settings, file, RenameRequest::new(old, new, kind.into())).await
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<AtomicSettings> {
    match path {
        Some(path) => AtomicSettings::from_file(path),
        None if Path::new(SETTINGS_FILE_NAME).is_file() => AtomicSettings::from_file(SETTINGS_FILE_NAME),
        None => Ok(AtomicSettings::default()),
    }
}

async fn build_orchestrator(settings_path: Option<PathBuf>) -> Result<Orchestrator> {
    let settings = load_settings(settings_path)?;
    let tracker = match &settings.tracker_file {
        Some(path) => GeneratedFileTracker::load(path).await?,
        None => GeneratedFileTracker::in_memory(),
    };

    let collaborators = Collaborators {
        oracle: Arc::new(OfflineTypeOracle),
        usage_finder: Arc::new(TextUsageFinder),
        writer: Arc::new(LocalFileWriter),
        locator: Arc::new(LocalProjectLocator),
    };

    // Events are reported through return values here
    let (orchestrator, _events) = Orchestrator::new(settings, collaborators, tracker);
    orchestrator
        .oracle()
        .probe_until_ready(&ProjectContext::default())
        .await;

    for source in orchestrator.cleanup_orphans().await? {
        println!("  ℹ Dropped output of removed {}", source.display());
    }
    Ok(orchestrator)
}

async fn read_source(path: &Path) -> Result<(PathBuf, String)> {
    let path = tokio::fs::canonicalize(path).await?;
    let content = tokio::fs::read_to_string(&path).await?;
    Ok((path, content))
}

async fn generate(settings: Option<PathBuf>, files: Vec<PathBuf>) -> Result<bool> {
    let orchestrator = build_orchestrator(settings).await?;
    let mut all_ok = true;

    for file in files {
        let (path, content) = read_source(&file).await?;
        match orchestrator.generate(&path, &content, GenerationMode::Manual).await {
            Ok(GenerationOutcome::Written(output)) => println!("  ✓ Generated {}", output.display()),
            Ok(GenerationOutcome::Unchanged(output)) => println!("  ✓ Up to date {}", output.display()),
            Ok(GenerationOutcome::Skipped(reason)) => {
                println!("  ℹ Skipped {}: {:?}", file.display(), reason)
            }
            Err(e) => {
                eprintln!("  ✗ {}: {}", file.display(), e);
                all_ok = false;
            }
        }
    }

    Ok(all_ok)
}

async fn validate(settings: Option<PathBuf>, files: Vec<PathBuf>) -> Result<bool> {
    let orchestrator = build_orchestrator(settings).await?;
    let mut all_ok = true;

    for file in files {
        let (path, content) = read_source(&file).await?;
        let report = match orchestrator.validate(&path, &content).await {
            Ok(report) => report,
            Err(e) => {
                eprintln!("  ✗ {}: {}", file.display(), e);
                all_ok = false;
                continue;
            }
        };

        if !report.missing_fields.is_empty() {
            let err = AtomicError::MissingFields(report.missing_fields.clone());
            println!("{}: error: {}", file.display(), err);
        }
        for diagnostic in &report.diagnostics {
            println!("{}: {}", file.display(), diagnostic);
        }

        if report.is_blocking() {
            all_ok = false;
        } else {
            println!("  ✓ {} is valid", file.display());
        }
    }

    Ok(all_ok)
}

async fn check_change(previous: PathBuf, current: PathBuf) -> Result<bool> {
    let before = tokio::fs::read_to_string(&previous).await?;
    let after = tokio::fs::read_to_string(&current).await?;

    if let Ok(fields) = changed_fields(&before, &after) {
        for field in fields {
            let marker = if TRIGGER_FIELDS.contains(&field.as_str()) { "*" } else { " " };
            println!("  {} {}", marker, field);
        }
    }

    if should_regenerate(Some(&before), &after) {
        println!("regenerate");
    } else {
        println!("no regeneration needed");
    }
    Ok(true)
}

async fn rename(settings: Option<PathBuf>, file: PathBuf, request: RenameRequest) -> Result<bool> {
    let orchestrator = build_orchestrator(settings).await?;
    let (path, content) = read_source(&file).await?;

    let outcome = orchestrator.rename(&path, &content, &request).await?;

    for usage in &outcome.updated {
        println!("  ✓ {}:{}", usage.file_path.display(), usage.line);
    }
    for failed in &outcome.failed {
        eprintln!(
            "  ✗ {}:{}: {}",
            failed.usage.file_path.display(),
            failed.usage.line,
            failed.reason
        );
    }
    if let Some(path) = &outcome.regenerated_path {
        println!("  ✓ Regenerated {}", path.display());
    }
    if let Some(message) = &outcome.error_message {
        eprintln!("Error: {}", message);
    }

    Ok(outcome.success)
}
