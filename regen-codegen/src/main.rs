//! CLI entry point for regen

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use regen_codegen::codegen::RunReport;
use regen_codegen::config::GenConfig;

#[derive(Parser)]
#[command(name = "regen")]
#[command(about = "Generate projects and entities from templates, keeping hand-written code")]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Templates root (overrides config)
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Output root (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to SQL schema file (overrides config)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Dry run - show what would be generated without writing files
    #[arg(long)]
    dry_run: bool,

    /// Keep existing files instead of merging or overwriting them
    #[arg(long)]
    no_replace: bool,

    /// Delete generated files instead of writing them
    #[arg(long)]
    delete: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the system skeleton
    System,
    /// Generate a project and register it in the workspace
    Project {
        /// Project name
        name: String,
        /// Frontend template set to add
        #[arg(long)]
        web_type: Option<String>,
    },
    /// Add a frontend to an existing project without regenerating the project
    Client {
        /// Project folder under the output root
        project: String,
        /// Frontend template set to render
        web_type: String,
    },
    /// Generate entity files for tables (all included tables when none are given)
    Entity { tables: Vec<String> },
    /// Inspect schema (show parsed models for debugging)
    Inspect { tables: Vec<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (before logging, so we can use config.log_level)
    let mut config = match &cli.config {
        Some(path) => GenConfig::from_file(path)?,
        None => GenConfig::load(None)?,
    };

    // Initialize logging
    // Priority: RUST_LOG env var > config.log_level > default (debug for dev, info for release)
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let log_level = config.log_level.as_deref().unwrap_or(default_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    // Apply CLI overrides
    if let Some(templates) = cli.templates {
        config.templates_root = templates;
    }
    if let Some(output) = cli.output {
        config.output_root = output;
    }
    if let Some(schema) = cli.schema {
        config.schema_file = Some(schema);
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.no_replace {
        config.replace_file = false;
    }
    if cli.delete {
        config.delete_generated = true;
    }

    let report = match &cli.command {
        Commands::System => regen_codegen::run_system(&config)?,
        Commands::Project { name, web_type } => {
            regen_codegen::run_project(&config, name, web_type.as_deref())?
        }
        Commands::Client { project, web_type } => {
            regen_codegen::run_client(&config, project, web_type)?
        }
        Commands::Entity { tables } => regen_codegen::generate_entities(&config, tables)?,
        Commands::Inspect { tables } => return inspect(&config, tables),
    };

    finish(&config, &report)
}

fn finish(config: &GenConfig, report: &RunReport) -> Result<()> {
    if config.dry_run {
        println!("Dry run mode - planned outputs:");
        for entry in report.manifest.entries() {
            println!("  {:?} {}", entry.outcome, entry.path.display());
        }
    }

    if !report.is_success() {
        bail!("{} file(s) failed", report.failures.len());
    }
    info!("Generation completed successfully");
    Ok(())
}

fn inspect(config: &GenConfig, tables: &[String]) -> Result<()> {
    let models = regen_codegen::inspect(config, tables)?;

    println!("Parsed {} entities:\n", models.len());
    for model in &models {
        println!("Entity: {} ({})", model.name, model.struct_name);
        println!("  Columns:");
        for col in &model.columns {
            let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
            let key = if col.is_key { " KEY" } else { "" };
            println!(
                "    - {} -> {}: {} {}{}",
                col.name, col.field_name, col.rust_type, nullable, key
            );
            if let Some(enum_values) = &col.enum_values {
                println!("      ENUM values: {:?}", enum_values);
            }
        }
        if !model.sqls.is_empty() {
            println!("  Queries:");
            for sql in &model.sqls {
                let params: Vec<_> = sql.params.iter().map(|p| p.param_name.as_str()).collect();
                println!("    - {}({})", sql.name, params.join(", "));
            }
        }
        println!();
    }

    Ok(())
}
