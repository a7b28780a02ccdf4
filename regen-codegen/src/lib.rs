//! regen-codegen: template-driven project generator that keeps hand-written code
//!
//! Template sets are directory trees rendered with Tera. Path segments are
//! templates too (`src/models/{{ tableName }}.rs.tera`), and files ending in
//! `.tera` are rendered while everything else is copied. Re-running a set over
//! a project that has since been edited does not lose the edits:
//!
//! - Rust sources and mapper XML documents are merged member by member. Struct
//!   fields, impl and trait items, top-level items and mapper statements the
//!   templates no longer produce are carried into the new file verbatim.
//! - Files ending with the protected suffix (`_dto.rs` by default) are written
//!   once and never touched again.
//! - Fields renamed by a naming-convention change are matched by their column
//!   identity, and carried code is updated to the new names.
//!
//! # Commands
//!
//! - [`run_system`] renders the system template set
//! - [`run_project`] renders a project (and optionally a frontend) and
//!   registers it in the output root's Cargo workspace
//! - [`run_client`] adds a frontend to a project generated earlier
//! - [`generate_entities`] renders the entity template set once per table of
//!   the schema file
//!
//! # Programmatic use
//!
//! ```rust,ignore
//! let report = regen_codegen::GeneratorBuilder::new("templates", "workspace")
//!     .schema_file("schema.sql")
//!     .package_name("com.example.shop")
//!     .entities(&[])?;
//! report.log_summary();
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! regen --templates ./templates --output ./shop --schema schema.sql entity user orders
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod parser;
pub mod render;
pub mod structure;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use codegen::{append_fragment, register_member, Dialect, NamingConvention, RunDriver, RunReport};
use config::defaults;
use parser::{DdlSchemaProvider, SchemaModel, SchemaProvider};
use render::RenderContext;

pub use config::GenConfig;
pub use error::{CodegenError, Result};

/// Render the system template set
pub fn run_system(config: &GenConfig) -> Result<RunReport> {
    config.validate()?;
    let driver = RunDriver::new(config);
    let ctx = driver.base_context();
    let template_root = existing_set(config, &config.system_template)?;

    let mut report = RunReport::default();
    info!("Generating system from {}", template_root.display());
    let result = driver
        .run_set(&template_root, &ctx, &mut report)
        .map(|folder| report.project_folder = folder);
    finish(report, result)
}

/// Render the project template set for `name`.
///
/// The first directory the set produces is the project folder; it is added to
/// the output root's Cargo workspace. With a `web_type`, the matching frontend
/// set is rendered afterwards.
pub fn run_project(config: &GenConfig, name: &str, web_type: Option<&str>) -> Result<RunReport> {
    config.validate()?;
    if name.trim().is_empty() {
        return Err(CodegenError::ValidationError(
            "project name must not be empty".into(),
        ));
    }
    let web_type = web_type.map(str::trim).filter(|w| !w.is_empty());

    // fail before anything is written
    let frontend = web_type
        .map(|web| frontend_set(config, web))
        .transpose()?;
    let project_root = existing_set(config, &config.project_template)?;

    let driver = RunDriver::new(config);
    let ctx = project_context(&driver, name, web_type);
    let mut report = RunReport::default();
    let result = project_into(&driver, &ctx, &project_root, &mut report).and_then(|()| {
        match (frontend, web_type) {
            (Some(set), Some(web)) => frontend_into(&driver, &ctx, &set, name, web, &mut report),
            _ => Ok(()),
        }
    });
    finish(report, result)
}

/// Render the `web_type` frontend set into the existing project `name`.
///
/// The project set is not rendered again. A frontend generated for the first
/// time adds its manifest fragment to the project's `Cargo.toml`.
pub fn run_client(config: &GenConfig, name: &str, web_type: &str) -> Result<RunReport> {
    config.validate()?;
    let name = name.trim();
    let web_type = web_type.trim();
    if name.is_empty() || web_type.is_empty() {
        return Err(CodegenError::ValidationError(
            "client needs a project name and a web type".into(),
        ));
    }
    let project = config.output_root.join(name);
    if !project.is_dir() {
        return Err(CodegenError::ValidationError(format!(
            "Project not found: {}",
            project.display()
        )));
    }
    let frontend = frontend_set(config, web_type)?;

    let driver = RunDriver::new(config);
    let ctx = project_context(&driver, name, Some(web_type));
    let mut report = RunReport {
        project_folder: Some(name.to_string()),
        ..RunReport::default()
    };
    let result = frontend_into(&driver, &ctx, &frontend, name, web_type, &mut report);
    finish(report, result)
}

/// Render the entity template set once per table.
///
/// `tables` selects the tables explicitly; when empty, the configured
/// include/exclude patterns apply. Every model is loaded before the first
/// file is rendered, so an unknown table fails the command up front.
pub fn generate_entities(config: &GenConfig, tables: &[String]) -> Result<RunReport> {
    let schemas = inspect(config, tables)?;
    let driver = RunDriver::new(config);
    let ctx = driver.base_context();
    let template_root = existing_set(config, &config.entity_template)?;

    let mut report = RunReport::default();
    let result = schemas.into_iter().try_for_each(|schema| {
        driver
            .run_entity(&template_root, &ctx, schema, &mut report)
            .map(drop)
    });
    finish(report, result)
}

/// Load the schema models entity generation would use, without rendering
pub fn inspect(config: &GenConfig, tables: &[String]) -> Result<Vec<SchemaModel>> {
    let provider = load_provider(config)?;
    let entities = select_entities(config, &provider, tables);
    debug!("Entities: {:?}", entities);
    entities
        .iter()
        .map(|entity| provider.load(entity))
        .collect()
}

/// Log the summary of whatever ran, then hand back the report or the error
/// that stopped the command
fn finish(report: RunReport, result: Result<()>) -> Result<RunReport> {
    report.log_summary();
    result.map(|()| report)
}

fn project_context(driver: &RunDriver<'_>, name: &str, web_type: Option<&str>) -> RenderContext {
    let mut ctx = driver.base_context();
    ctx.insert("projectName", name);
    ctx.insert("webType", web_type.unwrap_or_default());
    ctx.insert("hasClient", web_type.is_some());
    if let Some(web) = web_type {
        ctx.insert("frontendName", format!("{}_frontend_{}", name, web));
    }
    ctx
}

fn project_into(
    driver: &RunDriver<'_>,
    ctx: &RenderContext,
    project_root: &Path,
    report: &mut RunReport,
) -> Result<()> {
    let config = driver.config();
    info!("Generating project from {}", project_root.display());
    report.project_folder = driver.run_set(project_root, ctx, report)?;
    if let Some(folder) = &report.project_folder {
        if !config.dry_run && !config.delete_generated {
            register_member(&config.output_root, folder)?;
        }
    }
    Ok(())
}

/// Render a frontend set for project `name`; a fragment the run created is
/// added to the project manifest
fn frontend_into(
    driver: &RunDriver<'_>,
    ctx: &RenderContext,
    frontend: &Path,
    name: &str,
    web_type: &str,
    report: &mut RunReport,
) -> Result<()> {
    let config = driver.config();
    let project = config.output_root.join(name);
    let fragment = project
        .join(format!("{}_frontend_{}", name, web_type))
        .join(defaults::MANIFEST_FRAGMENT);
    let had_fragment = fragment.is_file();

    info!("Generating frontend from {}", frontend.display());
    driver.run_set(frontend, ctx, report)?;

    if !had_fragment && fragment.is_file() && !config.dry_run && !config.delete_generated {
        let text = std::fs::read_to_string(&fragment)?;
        append_fragment(&project, &text)?;
    }
    Ok(())
}

fn frontend_set(config: &GenConfig, web_type: &str) -> Result<PathBuf> {
    existing_set(config, &format!("{}/{}", config.frontend_template, web_type))
}

fn load_provider(config: &GenConfig) -> Result<DdlSchemaProvider> {
    let schema_file = config.validate_for_entities()?;
    DdlSchemaProvider::from_files(schema_file, config.queries_file.as_deref(), config.naming)
}

fn select_entities(
    config: &GenConfig,
    provider: &DdlSchemaProvider,
    tables: &[String],
) -> Vec<String> {
    if tables.is_empty() {
        provider.filter_tables(&config.include_tables, &config.exclude_tables)
    } else {
        tables.to_vec()
    }
}

fn existing_set(config: &GenConfig, set: &str) -> Result<PathBuf> {
    let dir = config.template_dir(set);
    if !dir.is_dir() {
        return Err(CodegenError::ValidationError(format!(
            "Template set not found: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

/// Builder for programmatic runs
pub struct GeneratorBuilder {
    config: GenConfig,
}

impl GeneratorBuilder {
    /// Create a builder for the given template and output roots
    pub fn new(templates_root: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Self {
        Self {
            config: GenConfig::with_roots(
                templates_root.as_ref().to_path_buf(),
                output_root.as_ref().to_path_buf(),
            ),
        }
    }

    /// Set the SQL schema file used for entity generation
    pub fn schema_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.schema_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the query definitions file
    pub fn queries_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.queries_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set tables to include
    pub fn include_tables(mut self, tables: &[&str]) -> Self {
        self.config.include_tables = tables.join(",");
        self
    }

    /// Set tables to exclude
    pub fn exclude_tables(mut self, tables: &[&str]) -> Self {
        self.config.exclude_tables = tables.join(",");
        self
    }

    pub fn naming(mut self, naming: NamingConvention) -> Self {
        self.config.naming = naming;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn system_name(mut self, name: &str) -> Self {
        self.config.system_name = name.to_string();
        self
    }

    pub fn package_name(mut self, name: &str) -> Self {
        self.config.package_name = name.to_string();
        self
    }

    /// Add a template variable
    pub fn variable(mut self, key: &str, value: &str) -> Self {
        self.config
            .variables
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Keep existing files instead of merging or overwriting them
    pub fn keep_existing(mut self) -> Self {
        self.config.replace_file = false;
        self
    }

    /// Delete generated files instead of writing them
    pub fn delete_generated(mut self) -> Self {
        self.config.delete_generated = true;
        self
    }

    /// Enable dry run mode (plan without writing files)
    pub fn dry_run(mut self) -> Self {
        self.config.dry_run = true;
        self
    }

    /// The configuration built so far
    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    pub fn system(self) -> Result<RunReport> {
        run_system(&self.config)
    }

    pub fn project(self, name: &str, web_type: Option<&str>) -> Result<RunReport> {
        run_project(&self.config, name, web_type)
    }

    pub fn client(self, name: &str, web_type: &str) -> Result<RunReport> {
        run_client(&self.config, name, web_type)
    }

    pub fn entities(self, tables: &[String]) -> Result<RunReport> {
        generate_entities(&self.config, tables)
    }
}
