//! Template-set runs
//!
//! A run walks one template set, renders every relative path against the
//! context, and pushes each file through the output pipeline:
//! plan → render → (merge) → dialect → unchanged check → atomic write.
//! Every file ends up as one [`ManifestEntry`]; file-scoped failures are
//! recorded in the [`RunReport`] and the run moves on.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::artifact::ArtifactKind;
use super::compat::{resolve, CompatibilityTable};
use super::dialect;
use super::fs::{atomic_write, read_existing};
use super::merge::merge;
use super::planner::{plan, OutputDisposition, OutputPolicy};
use crate::config::{defaults, GenConfig};
use crate::error::{CodegenError, Result};
use crate::parser::SchemaModel;
use crate::render::{RenderContext, Rendered, Renderer, TeraRenderer};
use crate::structure::{self, field_map, Origin, StructuralUnit};

/// What happened to one output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Written,
    /// Final text equals the file on disk
    Unchanged,
    Skipped(String),
    Deleted,
    /// Dry run: would have been written
    Planned,
    Failed(String),
}

/// One output file of a run
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub disposition: Option<OutputDisposition>,
    pub outcome: Outcome,
    /// Custom members carried over by a merge
    pub carried: usize,
}

impl ManifestEntry {
    fn new(
        path: &Path,
        kind: ArtifactKind,
        disposition: Option<OutputDisposition>,
        outcome: Outcome,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            disposition,
            outcome,
            carried: 0,
        }
    }
}

/// Ordered entries of every file a run touched or considered
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputManifest {
    entries: Vec<ManifestEntry>,
}

impl OutputManifest {
    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for an output path
    pub fn get(&self, path: &Path) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Number of entries with the given outcome
    pub fn count(&self, outcome: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| outcome(&e.outcome)).count()
    }
}

/// Result of a command: the manifest plus the file-scoped failures
#[derive(Debug, Default)]
pub struct RunReport {
    pub manifest: OutputManifest,
    /// First directory generated by a project run
    pub project_folder: Option<String>,
    pub failures: Vec<CodegenError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Log counts per outcome, and every failure
    pub fn log_summary(&self) {
        let m = &self.manifest;
        info!(
            "{} files: {} written, {} unchanged, {} skipped, {} deleted, {} planned, {} failed",
            m.len(),
            m.count(|o| *o == Outcome::Written),
            m.count(|o| *o == Outcome::Unchanged),
            m.count(|o| matches!(o, Outcome::Skipped(_))),
            m.count(|o| *o == Outcome::Deleted),
            m.count(|o| *o == Outcome::Planned),
            m.count(|o| matches!(o, Outcome::Failed(_))),
        );
        for failure in &self.failures {
            error!("{}", failure);
        }
    }

    fn record_failure(&mut self, path: &Path, kind: ArtifactKind, err: CodegenError) {
        error!("{}", err);
        self.manifest.push(ManifestEntry::new(
            path,
            kind,
            None,
            Outcome::Failed(err.to_string()),
        ));
        self.failures.push(err);
    }
}

/// State of one entity pass: the (possibly renamed) model and the renames
/// found so far. A fresh pass starts for every entity.
#[derive(Debug, Clone)]
pub struct EntityPass {
    pub schema: SchemaModel,
    pub table: CompatibilityTable,
}

impl EntityPass {
    pub fn new(schema: SchemaModel) -> Self {
        Self {
            schema,
            table: CompatibilityTable::new(),
        }
    }

    /// Context for one template of this pass
    pub fn context(&self, base: &RenderContext) -> Result<RenderContext> {
        let mut ctx = base.clone();
        ctx.insert_serialize("entity", &self.schema)?;
        ctx.insert("className", self.schema.struct_name.clone());
        ctx.insert("tableName", self.schema.name.clone());
        Ok(ctx)
    }

    /// Pair the fields of an existing entity file with the current columns
    fn resolve(&mut self, existing: &StructuralUnit, path: &Path) -> Result<()> {
        let fields = field_map(existing, &self.schema.struct_name);
        if fields.is_empty() {
            return Ok(());
        }
        let resolution = resolve(&self.schema, &fields, path)?;
        if !resolution.table.is_empty() {
            info!(
                "{}: {} renamed field(s)",
                path.display(),
                resolution.table.len()
            );
        }
        self.schema = resolution.schema;
        self.table.extend(&resolution.table);
        Ok(())
    }
}

/// One file found in a template set
#[derive(Debug, Clone)]
struct TemplateFile {
    template: PathBuf,
    output: PathBuf,
    /// Kind derived from the output path alone
    kind: ArtifactKind,
    no_replace: bool,
    /// `.tera` files are rendered, anything else is copied
    is_template: bool,
}

/// Runs template sets against an output root
pub struct RunDriver<'a, R: Renderer = TeraRenderer> {
    config: &'a GenConfig,
    renderer: R,
    policy: OutputPolicy,
}

impl<'a> RunDriver<'a, TeraRenderer> {
    pub fn new(config: &'a GenConfig) -> Self {
        Self::with_renderer(config, TeraRenderer::new())
    }
}

impl<'a, R: Renderer> RunDriver<'a, R> {
    pub fn with_renderer(config: &'a GenConfig, renderer: R) -> Self {
        Self {
            config,
            renderer,
            policy: config.policy(),
        }
    }

    pub fn config(&self) -> &'a GenConfig {
        self.config
    }

    /// Variables shared by every template of a run
    pub fn base_context(&self) -> RenderContext {
        let mut ctx = RenderContext::new();
        ctx.insert("systemName", self.config.system_name.clone());
        ctx.insert("packageName", self.config.package_name.clone());
        for (key, value) in &self.config.variables {
            ctx.insert(key.clone(), value.clone());
        }
        ctx.add_dir_values();
        ctx
    }

    /// Run a template set; returns the first directory it generated
    pub fn run_set(
        &self,
        template_root: &Path,
        ctx: &RenderContext,
        report: &mut RunReport,
    ) -> Result<Option<String>> {
        self.run(template_root, ctx, None, report)
    }

    /// Run a template set for one entity
    pub fn run_entity(
        &self,
        template_root: &Path,
        ctx: &RenderContext,
        schema: SchemaModel,
        report: &mut RunReport,
    ) -> Result<EntityPass> {
        info!("Generating entity {}", schema.name);
        let mut pass = EntityPass::new(schema);
        self.run(template_root, ctx, Some(&mut pass), report)?;
        Ok(pass)
    }

    fn run(
        &self,
        template_root: &Path,
        base: &RenderContext,
        mut pass: Option<&mut EntityPass>,
        report: &mut RunReport,
    ) -> Result<Option<String>> {
        let path_ctx = match pass.as_deref() {
            Some(p) => p.context(base)?,
            None => base.clone(),
        };

        let mut project_folder = None;
        let mut files = Vec::new();

        let walker = WalkDir::new(template_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e.file_name().to_string_lossy().as_ref()));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(template_root)
                .unwrap_or(entry.path())
                .to_path_buf();
            let is_dir = entry.file_type().is_dir();

            let rendered = match self.output_path(entry.path(), &rel, is_dir, &path_ctx) {
                Ok(Some(rendered)) => rendered,
                Ok(None) => {
                    debug!("Skipping {}: a path segment rendered empty", rel.display());
                    continue;
                }
                Err(e) if e.is_file_scoped() => {
                    report.record_failure(entry.path(), ArtifactKind::Generic, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let output = self.config.output_root.join(&rendered);

            if is_dir {
                if project_folder.is_none() {
                    project_folder = Some(rendered.to_string_lossy().into_owned());
                }
                if !self.config.dry_run && !self.config.delete_generated {
                    fs::create_dir_all(&output).map_err(|source| CodegenError::WriteError {
                        path: output.clone(),
                        source,
                    })?;
                }
                continue;
            }

            let file_name = rel
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(TemplateFile {
                kind: ArtifactKind::classify(&output, None, &self.policy),
                template: entry.path().to_path_buf(),
                output,
                no_replace: rel
                    .to_string_lossy()
                    .contains(defaults::NO_REPLACE_MARKER),
                is_template: file_name.ends_with(defaults::TEMPLATE_SUFFIX),
            });
        }

        // entity models first, so later templates see the renamed model
        files.sort_by_key(|f| f.kind != ArtifactKind::Entity);

        for file in &files {
            match self.generate(file, base, pass.as_deref_mut()) {
                Ok(entry) => report.manifest.push(entry),
                Err(e) if e.is_file_scoped() => report.record_failure(&file.output, file.kind, e),
                Err(e) => return Err(e),
            }
        }

        Ok(project_folder)
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.config.ignore.iter().any(|i| i == name)
    }

    /// Render a template-relative path; `None` when a segment renders empty
    fn output_path(
        &self,
        template: &Path,
        rel: &Path,
        is_dir: bool,
        ctx: &RenderContext,
    ) -> Result<Option<PathBuf>> {
        let segments: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let last = segments.len().saturating_sub(1);

        let mut output = PathBuf::new();
        for (i, segment) in segments.iter().enumerate() {
            let mut segment = segment.replace(defaults::NO_REPLACE_MARKER, "");
            if i == last && !is_dir {
                if let Some(stripped) = segment.strip_suffix(defaults::TEMPLATE_SUFFIX) {
                    segment = stripped.to_string();
                }
            }
            let rendered = self.renderer.render_segment(template, &segment, ctx)?;
            let rendered = rendered.trim();
            if rendered.is_empty() {
                return Ok(None);
            }
            output.push(rendered);
        }
        Ok(Some(output))
    }

    fn generate(
        &self,
        file: &TemplateFile,
        base: &RenderContext,
        mut pass: Option<&mut EntityPass>,
    ) -> Result<ManifestEntry> {
        let path = file.output.as_path();
        if self.config.delete_generated {
            return self.delete(file);
        }

        let exists = |p: &Path| p.is_file();
        let disposition = plan(exists, path, file.kind, &self.policy, file.no_replace);
        if !disposition.renders() {
            info!("Keeping protected file {}", path.display());
            return Ok(ManifestEntry::new(
                path,
                file.kind,
                Some(disposition),
                Outcome::Skipped("protected".into()),
            ));
        }

        if !file.is_template {
            return self.copy_static(file, disposition);
        }

        let mut existing = None;
        let mut loaded_as = None;
        if disposition == OutputDisposition::MergeWithExisting {
            existing = self.load_existing(path, file.kind)?;
            loaded_as = Some(file.kind);
            if let (Some(pass), Some(unit)) = (pass.as_deref_mut(), &existing) {
                if file.kind == ArtifactKind::Entity {
                    pass.resolve(unit, path)?;
                }
            }
        }

        let ctx = match pass.as_deref() {
            Some(p) => p.context(base)?,
            None => base.clone(),
        };
        let Rendered {
            text: rendered,
            control,
        } = self.renderer.render_output(&file.template, path, &ctx)?;

        // XML mappers are only recognizable from their content
        let kind = ArtifactKind::classify(path, Some(&rendered), &self.policy);
        if control.ignore {
            info!("Template ignored output {}", path.display());
            return Ok(ManifestEntry::new(
                path,
                kind,
                Some(disposition),
                Outcome::Skipped("ignored".into()),
            ));
        }
        let policy = match control.replace {
            Some(replace_file) => OutputPolicy {
                replace_file,
                ..self.policy.clone()
            },
            None => self.policy.clone(),
        };
        let disposition = plan(exists, path, kind, &policy, file.no_replace);
        match disposition {
            OutputDisposition::SkipExists => {
                info!("Keeping existing file {}", path.display());
                return Ok(ManifestEntry::new(
                    path,
                    kind,
                    Some(disposition),
                    Outcome::Skipped("exists".into()),
                ));
            }
            OutputDisposition::SkipProtectedKind => {
                info!("Keeping protected file {}", path.display());
                return Ok(ManifestEntry::new(
                    path,
                    kind,
                    Some(disposition),
                    Outcome::Skipped("protected".into()),
                ));
            }
            _ => {}
        }

        let mut carried = 0;
        let text = if disposition == OutputDisposition::MergeWithExisting {
            if loaded_as != Some(kind) {
                existing = self.load_existing(path, kind)?;
            }
            match existing {
                Some(old) => {
                    let empty = CompatibilityTable::new();
                    let table = pass.as_deref().map(|p| &p.table).unwrap_or(&empty);
                    let outcome = merge(&rendered, &old, table, kind).map_err(|source| {
                        CodegenError::MergeError {
                            path: path.to_path_buf(),
                            source,
                        }
                    })?;
                    carried = outcome
                        .unit
                        .members
                        .iter()
                        .filter(|m| m.origin == Origin::Custom)
                        .count();
                    if carried > 0 {
                        debug!("{}: carried {} custom member(s)", path.display(), carried);
                    }
                    outcome.text
                }
                None => rendered,
            }
        } else {
            rendered
        };

        let text = if kind == ArtifactKind::Mapper {
            dialect::apply(self.config.dialect, &text)?
        } else {
            text
        };

        let mut entry = self.persist(path, kind, disposition, text.as_bytes())?;
        entry.carried = carried;
        Ok(entry)
    }

    /// Read and parse an existing output file.
    ///
    /// A read failure falls back to writing fresh; a parse failure leaves the
    /// file untouched.
    fn load_existing(
        &self,
        path: &Path,
        kind: ArtifactKind,
    ) -> Result<Option<StructuralUnit>> {
        let text = match read_existing(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Cannot read {} ({}), writing it fresh",
                    path.display(),
                    e
                );
                return Ok(None);
            }
        };
        let unit = structure::parse(&text, kind).map_err(|source| CodegenError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            "{}: {} existing member(s)",
            path.display(),
            structure::member_count(&unit)
        );
        Ok(Some(unit.with_origin(Origin::Generated)))
    }

    fn copy_static(
        &self,
        file: &TemplateFile,
        disposition: OutputDisposition,
    ) -> Result<ManifestEntry> {
        let path = file.output.as_path();
        if disposition == OutputDisposition::SkipExists {
            info!("Keeping existing file {}", path.display());
            return Ok(ManifestEntry::new(
                path,
                file.kind,
                Some(disposition),
                Outcome::Skipped("exists".into()),
            ));
        }
        let bytes = fs::read(&file.template).map_err(|e| CodegenError::RenderError {
            template: file.template.clone(),
            message: format!("cannot read static file: {}", e),
            line: None,
            variables: String::new(),
        })?;
        self.persist(path, file.kind, OutputDisposition::WriteFresh, &bytes)
    }

    fn persist(
        &self,
        path: &Path,
        kind: ArtifactKind,
        disposition: OutputDisposition,
        bytes: &[u8],
    ) -> Result<ManifestEntry> {
        let unchanged = path.is_file() && fs::read(path).is_ok_and(|old| old == bytes);
        let outcome = if unchanged {
            info!("Unchanged {}", path.display());
            Outcome::Unchanged
        } else if self.config.dry_run {
            info!("Would write {} ({:?})", path.display(), disposition);
            Outcome::Planned
        } else {
            atomic_write(path, bytes)?;
            info!("Generated {}", path.display());
            Outcome::Written
        };
        Ok(ManifestEntry::new(path, kind, Some(disposition), outcome))
    }

    fn delete(&self, file: &TemplateFile) -> Result<ManifestEntry> {
        let path = file.output.as_path();
        let outcome = if file.kind == ArtifactKind::Protected {
            Outcome::Skipped("protected".into())
        } else if !path.is_file() {
            Outcome::Skipped("absent".into())
        } else {
            fs::remove_file(path).map_err(|source| CodegenError::WriteError {
                path: path.to_path_buf(),
                source,
            })?;
            info!("Deleted {}", path.display());
            Outcome::Deleted
        };
        Ok(ManifestEntry::new(path, file.kind, None, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::NamingConvention;
    use crate::parser::{DdlSchemaProvider, SchemaProvider};
    use tempfile::TempDir;

    const MODEL: &str = "pub struct {{ className }} {
{%- for c in entity.columns %}
    pub {{ c.field_name }}: {{ c.rust_type }},
{%- endfor %}
}
";

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn setup() -> (TempDir, GenConfig) {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("templates");
        write(&templates, "app/src/models/{{ tableName }}.rs.tera", MODEL);
        write(&templates, "app/src/models/{{ tableName }}_dto.rs.tera", "pub struct Dto;\n");
        write(&templates, "app/README.md", "static\n");
        write(&templates, "app/.gitkeep", "");
        let config = GenConfig::with_roots(&templates, dir.path().join("out"));
        (dir, config)
    }

    fn user_schema(ddl: &str, naming: NamingConvention) -> SchemaModel {
        DdlSchemaProvider::from_sql(ddl, naming)
            .unwrap()
            .load("user")
            .unwrap()
    }

    #[test]
    fn test_entity_run_writes_and_is_idempotent() {
        let (_dir, config) = setup();
        let driver = RunDriver::new(&config);
        let ctx = driver.base_context();
        let schema = user_schema(
            "CREATE TABLE user (id INT PRIMARY KEY, email VARCHAR(255) NOT NULL);",
            NamingConvention::Snake,
        );

        let mut report = RunReport::default();
        driver
            .run_entity(&config.templates_root, &ctx, schema.clone(), &mut report)
            .unwrap();
        assert!(report.is_success());
        let model = config.output_root.join("app/src/models/user.rs");
        let text = fs::read_to_string(&model).unwrap();
        assert!(text.contains("pub email: String,"));
        assert!(config.output_root.join("app/README.md").is_file());
        assert!(!config.output_root.join("app/.gitkeep").exists());
        // entity templates run first
        assert_eq!(report.manifest.entries()[0].path, model);

        let mut again = RunReport::default();
        driver
            .run_entity(&config.templates_root, &ctx, schema, &mut again)
            .unwrap();
        assert_eq!(again.manifest.get(&model).unwrap().outcome, Outcome::Unchanged);
        assert_eq!(
            again.manifest.count(|o| *o == Outcome::Written),
            0,
            "second run rewrote files"
        );
    }

    #[test]
    fn test_rename_carries_custom_method() {
        let (_dir, config) = setup();
        let driver = RunDriver::new(&config);
        let ctx = driver.base_context();
        let ddl = "CREATE TABLE user (id INT PRIMARY KEY, userName VARCHAR(64) NOT NULL);";

        let mut report = RunReport::default();
        driver
            .run_entity(
                &config.templates_root,
                &ctx,
                user_schema(ddl, NamingConvention::Preserve),
                &mut report,
            )
            .unwrap();
        let model = config.output_root.join("app/src/models/user.rs");
        let mut text = fs::read_to_string(&model).unwrap();
        assert!(text.contains("pub userName: String,"));
        text.push_str("\nimpl User {\n    pub fn helper(&self) -> &str {\n        &self.userName\n    }\n}\n");
        fs::write(&model, &text).unwrap();

        let mut report = RunReport::default();
        let pass = driver
            .run_entity(
                &config.templates_root,
                &ctx,
                user_schema(ddl, NamingConvention::Snake),
                &mut report,
            )
            .unwrap();
        assert!(report.is_success());
        assert_eq!(pass.table.get("userName"), Some("user_name"));
        let text = fs::read_to_string(&model).unwrap();
        assert!(text.contains("pub user_name: String,"));
        assert!(text.contains("pub fn helper(&self) -> &str {\n        &self.user_name\n    }"));
        assert!(!text.contains("userName"));
        assert_eq!(report.manifest.get(&model).unwrap().carried, 1);
    }

    #[test]
    fn test_protected_file_is_not_rewritten() {
        let (_dir, config) = setup();
        let driver = RunDriver::new(&config);
        let ctx = driver.base_context();
        let schema = user_schema(
            "CREATE TABLE user (id INT PRIMARY KEY);",
            NamingConvention::Snake,
        );
        let dto = config.output_root.join("app/src/models/user_dto.rs");
        write(&config.output_root, "app/src/models/user_dto.rs", "// mine\n");

        let mut report = RunReport::default();
        driver
            .run_entity(&config.templates_root, &ctx, schema, &mut report)
            .unwrap();
        assert_eq!(fs::read_to_string(&dto).unwrap(), "// mine\n");
        let entry = report.manifest.get(&dto).unwrap();
        assert_eq!(entry.disposition, Some(OutputDisposition::SkipProtectedKind));
    }

    #[test]
    fn test_unparseable_existing_file_is_left_alone() {
        let (_dir, config) = setup();
        let driver = RunDriver::new(&config);
        let ctx = driver.base_context();
        let broken = "pub struct User {\n    pub id: i32\n    oops\n";
        write(&config.output_root, "app/src/models/user.rs", broken);

        let mut report = RunReport::default();
        driver
            .run_entity(
                &config.templates_root,
                &ctx,
                user_schema("CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake),
                &mut report,
            )
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], CodegenError::ParseError { .. }));
        let model = config.output_root.join("app/src/models/user.rs");
        assert_eq!(fs::read_to_string(model).unwrap(), broken);
        // the rest of the pass still ran
        assert!(config.output_root.join("app/README.md").is_file());
    }

    #[test]
    fn test_dry_run_and_delete() {
        let (_dir, mut config) = setup();
        config.dry_run = true;
        let schema = user_schema("CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake);
        {
            let driver = RunDriver::new(&config);
            let mut report = RunReport::default();
            driver
                .run_entity(&config.templates_root, &driver.base_context(), schema.clone(), &mut report)
                .unwrap();
            assert_eq!(report.manifest.count(|o| *o == Outcome::Planned), 3);
            assert!(!config.output_root.exists());
        }

        config.dry_run = false;
        {
            let driver = RunDriver::new(&config);
            let mut report = RunReport::default();
            driver
                .run_entity(&config.templates_root, &driver.base_context(), schema.clone(), &mut report)
                .unwrap();
        }

        config.delete_generated = true;
        let driver = RunDriver::new(&config);
        let mut report = RunReport::default();
        driver
            .run_entity(&config.templates_root, &driver.base_context(), schema, &mut report)
            .unwrap();
        assert!(!config.output_root.join("app/src/models/user.rs").exists());
        assert!(config.output_root.join("app/src/models/user_dto.rs").exists());
        assert_eq!(report.manifest.count(|o| *o == Outcome::Deleted), 2);
    }

    #[test]
    fn test_project_folder_and_no_replace_marker() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("project");
        write(&templates, "{{ projectName }}/Cargo.toml.tera", "[package]\nname = \"{{ projectName }}\"\n");
        write(&templates, "{{ projectName }}/config@.toml.tera", "port = 1\n");
        let config = GenConfig::with_roots(&templates, dir.path().join("out"));
        let driver = RunDriver::new(&config);
        let mut ctx = driver.base_context();
        ctx.insert("projectName", "shop");

        let mut report = RunReport::default();
        let folder = driver.run_set(&templates, &ctx, &mut report).unwrap();
        assert_eq!(folder.as_deref(), Some("shop"));
        let custom = config.output_root.join("shop/config.toml");
        fs::write(&custom, "port = 8080\n").unwrap();

        let mut report = RunReport::default();
        driver.run_set(&templates, &ctx, &mut report).unwrap();
        assert_eq!(fs::read_to_string(&custom).unwrap(), "port = 8080\n");
        assert_eq!(
            report.manifest.get(&custom).unwrap().disposition,
            Some(OutputDisposition::SkipExists)
        );
    }

    fn run_user(config: &GenConfig, ddl: &str, naming: NamingConvention) -> RunReport {
        let driver = RunDriver::new(config);
        let mut report = RunReport::default();
        driver
            .run_entity(
                &config.templates_root,
                &driver.base_context(),
                user_schema(ddl, naming),
                &mut report,
            )
            .unwrap();
        report
    }

    #[test]
    fn test_non_utf8_existing_file_is_written_fresh() {
        let (_dir, config) = setup();
        let model = config.output_root.join("app/src/models/user.rs");
        fs::create_dir_all(model.parent().unwrap()).unwrap();
        fs::write(&model, [0xff, 0xfe, b'{', 0x80]).unwrap();

        let report = run_user(&config, "CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake);
        assert!(report.is_success());
        let entry = report.manifest.get(&model).unwrap();
        assert_eq!(entry.outcome, Outcome::Written);
        assert_eq!(entry.disposition, Some(OutputDisposition::MergeWithExisting));
        assert_eq!(
            fs::read_to_string(&model).unwrap(),
            "pub struct User {\n    pub id: i32,\n}\n"
        );
    }

    #[test]
    fn test_merge_error_leaves_file_untouched() {
        let (_dir, config) = setup();
        write(
            &config.templates_root,
            "app/src/models/{{ tableName }}.rs.tera",
            "pub struct {{ className }} {\n    pub id: i32,\n",
        );
        let existing = "pub struct User {\n    pub id: i32,\n}\n";
        write(&config.output_root, "app/src/models/user.rs", existing);

        let report = run_user(&config, "CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake);
        let model = config.output_root.join("app/src/models/user.rs");
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], CodegenError::MergeError { .. }));
        assert!(matches!(
            report.manifest.get(&model).unwrap().outcome,
            Outcome::Failed(_)
        ));
        assert_eq!(fs::read_to_string(&model).unwrap(), existing);
        assert!(config.output_root.join("app/README.md").is_file());
    }

    #[test]
    fn test_other_structs_do_not_take_part_in_renames() {
        let (_dir, config) = setup();
        let ddl = "CREATE TABLE user (id INT PRIMARY KEY, user_name VARCHAR(64) NOT NULL);";
        run_user(&config, ddl, NamingConvention::Snake);
        let model = config.output_root.join("app/src/models/user.rs");
        let mut text = fs::read_to_string(&model).unwrap();
        text.push_str("\npub struct LegacyUser {\n    pub userName: String,\n}\n");
        fs::write(&model, &text).unwrap();

        let report = run_user(&config, ddl, NamingConvention::Snake);
        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.manifest.get(&model).unwrap().outcome, Outcome::Unchanged);
        assert_eq!(fs::read_to_string(&model).unwrap(), text);
    }

    #[test]
    fn test_custom_impl_before_generated_impl() {
        let (_dir, config) = setup();
        write(
            &config.templates_root,
            "app/src/models/{{ tableName }}.rs.tera",
            "pub struct {{ className }} {\n    pub id: i32,\n}\n\nimpl {{ className }} {\n    pub const TABLE: &'static str = \"{{ tableName | plural }}\";\n}\n",
        );
        write(
            &config.output_root,
            "app/src/models/user.rs",
            "pub struct User {\n    pub id: i32,\n}\n\nimpl User {\n    pub fn helper(&self) -> i32 {\n        self.id\n    }\n}\n\nimpl User {\n    pub const TABLE: &'static str = \"user\";\n}\n",
        );

        let report = run_user(&config, "CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake);
        assert!(report.is_success(), "{:?}", report.failures);
        let model = config.output_root.join("app/src/models/user.rs");
        let text = fs::read_to_string(&model).unwrap();
        assert_eq!(text.matches("const TABLE").count(), 1);
        assert!(text.contains("\"users\""));
        assert!(text.contains("pub fn helper(&self) -> i32"));
        assert_eq!(report.manifest.get(&model).unwrap().carried, 1);

        let again = run_user(&config, "CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake);
        assert_eq!(again.manifest.get(&model).unwrap().outcome, Outcome::Unchanged);
    }

    #[test]
    fn test_template_controls_its_output() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("set");
        write(&templates, "app/notes.txt.tera", "{{ replace_output() }}new\n");
        write(&templates, "app/kept.txt.tera", "new\n");
        write(&templates, "app/skipped.txt.tera", "{{ ignore_output() }}never\n");
        let mut config = GenConfig::with_roots(&templates, dir.path().join("out"));
        config.replace_file = false;
        write(&config.output_root, "app/notes.txt", "old\n");
        write(&config.output_root, "app/kept.txt", "old\n");

        let driver = RunDriver::new(&config);
        let mut report = RunReport::default();
        driver.run_set(&templates, &driver.base_context(), &mut report).unwrap();

        let out = &config.output_root;
        assert_eq!(fs::read_to_string(out.join("app/notes.txt")).unwrap(), "new\n");
        assert_eq!(fs::read_to_string(out.join("app/kept.txt")).unwrap(), "old\n");
        assert!(!out.join("app/skipped.txt").exists());
        assert_eq!(
            report.manifest.get(&out.join("app/skipped.txt")).unwrap().outcome,
            Outcome::Skipped("ignored".into())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_static_file_fails_only_that_file() {
        let (dir, config) = setup();
        std::os::unix::fs::symlink(
            dir.path().join("nowhere"),
            config.templates_root.join("app/LICENSE"),
        )
        .unwrap();

        let report = run_user(&config, "CREATE TABLE user (id INT PRIMARY KEY);", NamingConvention::Snake);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], CodegenError::RenderError { .. }));
        assert!(config.output_root.join("app/README.md").is_file());
        assert!(config.output_root.join("app/src/models/user.rs").is_file());
    }
}
