use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use quilldb::storage::StoreEngine;
use quilldb::{Container, ContainerConfig, FileEngine, SchemaVersion, todo};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill-tool")]
#[command(about = "Developer tooling for QuillDB stores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the schema tag and per-collection record counts of a store
    Inspect {
        #[arg(long)]
        path: PathBuf,
    },
    /// Create a store at one Todo schema version and insert its mock record
    Seed {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value = "1.0.0")]
        schema: String,
    },
    /// Open a store against the latest Todo schema, migrating it if needed
    Migrate {
        #[arg(long)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,quilldb=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { path } => inspect(&path).await,
        Command::Seed { path, schema } => seed(&path, &schema).await,
        Command::Migrate { path } => migrate(&path).await,
    }
}

async fn inspect(path: &Path) -> Result<()> {
    let engine = FileEngine::open(path)
        .await
        .with_context(|| format!("Failed to open store '{}'", path.display()))?;

    match engine.schema_version()? {
        Some(version) => println!("Schema version: {}", version),
        None => println!("Schema version: (fresh store)"),
    }

    let collections = engine.collections()?;
    if collections.is_empty() {
        println!("No records");
    }
    for info in collections {
        println!(
            "  {}@{}: {} record(s)",
            info.collection, info.schema_version, info.record_count
        );
    }
    Ok(())
}

async fn seed(path: &Path, schema: &str) -> Result<()> {
    let version: SchemaVersion = schema.parse()?;
    let schema = todo::schemas()
        .into_iter()
        .find(|candidate| candidate.version() == version)
        .ok_or_else(|| anyhow!("Unknown Todo schema version {}", version))?;

    let container = Container::open(ContainerConfig::at_path(path), schema.clone(), None)
        .await
        .with_context(|| format!("Failed to open store '{}' at {}", path.display(), version))?;
    let mut context = container.context()?;
    schema
        .insert_mocks(&mut context)
        .context("Failed to insert mock record")?;

    println!("Seeded {} with Todo schema {}", path.display(), version);
    Ok(())
}

async fn migrate(path: &Path) -> Result<()> {
    let container = Container::open(
        ContainerConfig::at_path(path),
        todo::latest_schema(),
        Some(todo::migration_plan()?),
    )
    .await
    .with_context(|| format!("Failed to migrate store '{}'", path.display()))?;

    let report = container.migration_report();
    if report.is_empty() {
        println!("Store already at {}", container.schema_version());
        return Ok(());
    }
    for stage in &report.stages {
        println!(
            "  {} -> {}: {} ({} retained, {} inserted)",
            stage.from_version, stage.to_version, stage.state, stage.retained, stage.inserted
        );
    }
    println!(
        "Migrated {} record(s) to {}",
        report.migrated_records(),
        container.schema_version()
    );
    Ok(())
}
