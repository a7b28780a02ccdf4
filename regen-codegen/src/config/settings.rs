//! Configuration settings for regen-codegen

use config::{Config, Environment, File};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::defaults;
use crate::codegen::{Dialect, NamingConvention, OutputPolicy};
use crate::error::{CodegenError, Result};

/// Main configuration struct for a generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenConfig {
    /// Root directory holding the template sets
    #[serde(default = "default_templates_root")]
    pub templates_root: PathBuf,

    /// Directory generated output is written into
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Path to the SQL schema (DDL) file used by entity generation
    #[serde(default)]
    pub schema_file: Option<PathBuf>,

    /// Optional TOML file with per-table query definitions
    #[serde(default)]
    pub queries_file: Option<PathBuf>,

    /// Template set for the `system` command
    #[serde(default = "default_system_template")]
    pub system_template: String,

    /// Template set for the `project` command
    #[serde(default = "default_project_template")]
    pub project_template: String,

    /// Template set rendered once per table
    #[serde(default = "default_entity_template")]
    pub entity_template: String,

    /// Parent directory of the frontend template sets, one per web type
    #[serde(default = "default_frontend_template")]
    pub frontend_template: String,

    /// Replace existing files (merge or overwrite). When false, existing files are kept.
    #[serde(default = "default_replace_file")]
    pub replace_file: bool,

    /// Delete previously generated files instead of generating them
    #[serde(default = "default_delete_generated")]
    pub delete_generated: bool,

    /// Dry run mode - plan without writing files
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Files ending with this suffix are never overwritten once they exist
    #[serde(default = "default_protected_suffix")]
    pub protected_suffix: String,

    /// Directory names whose `.rs` files are entity models
    #[serde(default = "default_entity_dirs")]
    pub entity_dirs: Vec<String>,

    /// Naming convention for generated field names
    #[serde(default)]
    pub naming: NamingConvention,

    /// Target mapper dialect
    #[serde(default)]
    pub dialect: Dialect,

    /// Template entries to skip while walking a template set
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Tables to include (comma-separated, or "*" for all)
    #[serde(default = "default_include_tables")]
    pub include_tables: String,

    /// Tables to exclude (comma-separated)
    #[serde(default = "default_exclude_tables")]
    pub exclude_tables: String,

    /// System name exposed to templates as `systemName`
    #[serde(default)]
    pub system_name: String,

    /// Package name exposed to templates as `packageName`
    #[serde(default)]
    pub package_name: String,

    /// Extra template variables
    #[serde(default)]
    pub variables: IndexMap<String, String>,

    /// Log level (trace, debug, info, warn, error)
    /// Can be overridden by RUST_LOG env var
    #[serde(default)]
    pub log_level: Option<String>,
}

// Default value functions for serde
fn default_templates_root() -> PathBuf {
    PathBuf::from(defaults::TEMPLATES_ROOT)
}
fn default_output_root() -> PathBuf {
    PathBuf::from(defaults::OUTPUT_ROOT)
}
fn default_system_template() -> String {
    defaults::SYSTEM_TEMPLATE.to_string()
}
fn default_project_template() -> String {
    defaults::PROJECT_TEMPLATE.to_string()
}
fn default_entity_template() -> String {
    defaults::ENTITY_TEMPLATE.to_string()
}
fn default_frontend_template() -> String {
    defaults::FRONTEND_TEMPLATE.to_string()
}
fn default_replace_file() -> bool {
    defaults::REPLACE_FILE
}
fn default_delete_generated() -> bool {
    defaults::DELETE_GENERATED
}
fn default_dry_run() -> bool {
    defaults::DRY_RUN
}
fn default_protected_suffix() -> String {
    defaults::PROTECTED_SUFFIX.to_string()
}
fn default_entity_dirs() -> Vec<String> {
    defaults::ENTITY_DIRS.iter().map(|s| s.to_string()).collect()
}
fn default_ignore() -> Vec<String> {
    defaults::IGNORE.iter().map(|s| s.to_string()).collect()
}
fn default_include_tables() -> String {
    defaults::INCLUDE_TABLES.to_string()
}
fn default_exclude_tables() -> String {
    defaults::EXCLUDE_TABLES.to_string()
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            templates_root: default_templates_root(),
            output_root: default_output_root(),
            schema_file: None,
            queries_file: None,
            system_template: default_system_template(),
            project_template: default_project_template(),
            entity_template: default_entity_template(),
            frontend_template: default_frontend_template(),
            replace_file: default_replace_file(),
            delete_generated: default_delete_generated(),
            dry_run: default_dry_run(),
            protected_suffix: default_protected_suffix(),
            entity_dirs: default_entity_dirs(),
            naming: NamingConvention::default(),
            dialect: Dialect::default(),
            ignore: default_ignore(),
            include_tables: default_include_tables(),
            exclude_tables: default_exclude_tables(),
            system_name: String::new(),
            package_name: String::new(),
            variables: IndexMap::new(),
            log_level: None,
        }
    }
}

impl GenConfig {
    /// Create a default config rooted at the given template and output directories
    pub fn with_roots(templates_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            templates_root: templates_root.into(),
            output_root: output_root.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GenConfig = toml::from_str(&content).map_err(|e| {
            CodegenError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(config)
    }

    /// Load configuration using config-rs (file + environment variables)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        } else {
            builder = builder.add_source(File::with_name("regen").required(false));
        }

        // Override with environment variables (REGEN_OUTPUT_ROOT, REGEN_REPLACE_FILE, ...)
        builder = builder.add_source(
            Environment::with_prefix("REGEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: GenConfig = builder.build()?.try_deserialize()?;

        Ok(config)
    }

    /// The output policy the planner applies to every file of a run
    pub fn policy(&self) -> OutputPolicy {
        OutputPolicy {
            replace_file: self.replace_file,
            protected_suffix: self.protected_suffix.clone(),
            entity_dirs: self.entity_dirs.clone(),
        }
    }

    /// Resolve a template set name against the templates root
    pub fn template_dir(&self, set: &str) -> PathBuf {
        self.templates_root.join(set)
    }

    /// Validate the configuration shared by every command
    pub fn validate(&self) -> Result<()> {
        if self.templates_root.as_os_str().is_empty() {
            return Err(CodegenError::ValidationError(
                "templates_root is required".into(),
            ));
        }

        if !self.templates_root.is_dir() {
            return Err(CodegenError::ValidationError(format!(
                "Templates root not found: {}",
                self.templates_root.display()
            )));
        }

        if self.output_root.as_os_str().is_empty() {
            return Err(CodegenError::ValidationError(
                "output_root is required".into(),
            ));
        }

        if self.protected_suffix.is_empty() {
            return Err(CodegenError::ValidationError(
                "protected_suffix must not be empty".into(),
            ));
        }

        if self.delete_generated && self.dry_run {
            return Err(CodegenError::ValidationError(
                "delete_generated and dry_run cannot be combined".into(),
            ));
        }

        Ok(())
    }

    /// Validate the inputs entity generation additionally needs
    pub fn validate_for_entities(&self) -> Result<&Path> {
        self.validate()?;

        let schema_file = self.schema_file.as_deref().ok_or_else(|| {
            CodegenError::ValidationError("schema_file is required for entity generation".into())
        })?;

        if !schema_file.exists() {
            return Err(CodegenError::ValidationError(format!(
                "Schema file not found: {}",
                schema_file.display()
            )));
        }

        if let Some(queries) = &self.queries_file {
            if !queries.exists() {
                return Err(CodegenError::ValidationError(format!(
                    "Queries file not found: {}",
                    queries.display()
                )));
            }
        }

        Ok(schema_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenConfig::default();
        assert_eq!(config.include_tables, "*");
        assert!(config.replace_file);
        assert!(!config.delete_generated);
        assert_eq!(config.protected_suffix, "_dto.rs");
        assert_eq!(config.naming, NamingConvention::Snake);
        assert_eq!(config.dialect, Dialect::Mybatis);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_validation_missing_templates_root() {
        let config = GenConfig::with_roots("/definitely/not/here", ".");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_requires_schema_for_entities() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenConfig::with_roots(dir.path(), dir.path());
        assert!(config.validate().is_ok());
        assert!(config.validate_for_entities().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            templates_root = "tpl"
            replace_file = false
            naming = "camel"
            dialect = "ibatis"
            log_level = "debug"

            [variables]
            author = "dev"
        "#;
        let config: GenConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.templates_root, PathBuf::from("tpl"));
        assert!(!config.replace_file);
        assert_eq!(config.naming, NamingConvention::Camel);
        assert_eq!(config.dialect, Dialect::Ibatis);
        assert_eq!(config.log_level, Some("debug".to_string()));
        assert_eq!(config.variables.get("author").map(String::as_str), Some("dev"));
    }

    #[test]
    fn test_policy_reflects_config() {
        let mut config = GenConfig::default();
        config.replace_file = false;
        config.protected_suffix = "Dto.rs".into();
        let policy = config.policy();
        assert!(!policy.replace_file);
        assert_eq!(policy.protected_suffix, "Dto.rs");
    }
}
