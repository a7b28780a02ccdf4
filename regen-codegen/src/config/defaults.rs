//! Default configuration values - single source of truth

/// Default root directory holding the template sets
pub const TEMPLATES_ROOT: &str = "./templates";

/// Default directory generated projects are written into
pub const OUTPUT_ROOT: &str = ".";

/// Template set used by the `system` command (relative to the templates root)
pub const SYSTEM_TEMPLATE: &str = "system";

/// Template set used by the `project` command
pub const PROJECT_TEMPLATE: &str = "project";

/// Template set rendered once per table by the `entity` command
pub const ENTITY_TEMPLATE: &str = "entity";

/// Parent of the per-web-type frontend template sets
pub const FRONTEND_TEMPLATE: &str = "frontend";

/// Whether existing output files may be replaced (merged or overwritten)
pub const REPLACE_FILE: bool = true;

/// Whether the run deletes generated files instead of writing them
pub const DELETE_GENERATED: bool = false;

/// Whether to run in dry-run mode by default
pub const DRY_RUN: bool = false;

/// Files ending with this suffix are never overwritten once they exist
pub const PROTECTED_SUFFIX: &str = "_dto.rs";

/// Directory names whose `.rs` files are entity models
pub const ENTITY_DIRS: &[&str] = &["models", "entity"];

/// Template file suffix stripped from output names
pub const TEMPLATE_SUFFIX: &str = ".tera";

/// Marker in a template name meaning "never replace once generated"
pub const NO_REPLACE_MARKER: char = '@';

/// Comment tag marking where frontend fragments are added to a project's
/// `Cargo.toml`; matched as `# APPEND_TAG_DO_NOT_CHANGE` on its own line
pub const APPEND_MARKER: &str = "APPEND_TAG_DO_NOT_CHANGE";

/// File a frontend set renders into its frontend folder to be added to the
/// project manifest the first time the frontend is generated
pub const MANIFEST_FRAGMENT: &str = "manifest.fragment";

/// Template entries skipped while walking a template set
pub const IGNORE: &[&str] = &[".git", ".svn", "CVS", ".DS_Store", "Thumbs.db", ".gitkeep"];

/// Default include tables pattern (all tables)
pub const INCLUDE_TABLES: &str = "*";

/// Default exclude tables pattern (none)
pub const EXCLUDE_TABLES: &str = "";
