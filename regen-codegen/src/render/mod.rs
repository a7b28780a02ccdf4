//! Template rendering

mod context;
mod control;
mod engine;

use std::path::Path;

pub use context::RenderContext;
pub use control::{FileControl, Rendered};
pub use engine::TeraRenderer;

use crate::error::{CodegenError, Result};

/// Renders a template against a [`RenderContext`]
pub trait Renderer {
    /// Render template source; `name` identifies the template in errors
    fn render_str(&self, name: &Path, source: &str, ctx: &RenderContext) -> Result<String>;

    /// Read and render a template file
    fn render_file(&self, path: &Path, ctx: &RenderContext) -> Result<String> {
        let source = read_template(path, ctx)?;
        self.render_str(path, &source, ctx)
    }

    /// Render a template file for the output at `output`. Renderers that
    /// let templates look at and steer their output file override this.
    fn render_output(
        &self,
        template: &Path,
        _output: &Path,
        ctx: &RenderContext,
    ) -> Result<Rendered> {
        self.render_file(template, ctx).map(Rendered::new)
    }

    /// Render one path segment; segments without template syntax are returned as-is
    fn render_segment(&self, name: &Path, segment: &str, ctx: &RenderContext) -> Result<String> {
        if segment.contains("{{") || segment.contains("{%") {
            self.render_str(name, segment, ctx)
        } else {
            Ok(segment.to_string())
        }
    }
}

/// Read a template's source; a failure is scoped to that template
pub fn read_template(path: &Path, ctx: &RenderContext) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CodegenError::RenderError {
        template: path.to_path_buf(),
        message: format!("cannot read template: {}", e),
        line: None,
        variables: ctx.snapshot(),
    })
}
