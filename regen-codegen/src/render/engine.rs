//! Tera-backed renderer

use std::collections::HashMap;
use std::path::Path;

use heck::{ToLowerCamelCase, ToPascalCase, ToSnakeCase};
use regex::Regex;
use tera::{Tera, Value};
use tracing::debug;

use super::{control, read_template, RenderContext, Rendered, Renderer};
use crate::codegen::pluralize;
use crate::error::{CodegenError, Result};

/// Renders templates with Tera plus case-conversion filters:
/// `snake`, `pascal`, `camel`, `plural` and `path` (dots to slashes).
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraRenderer;

impl TeraRenderer {
    pub fn new() -> Self {
        Self
    }

    /// A fresh engine per render keeps renders independent of each other
    fn engine() -> Tera {
        let mut tera = Tera::default();
        tera.register_filter("snake", case_filter(|s| s.to_snake_case()));
        tera.register_filter("pascal", case_filter(|s| s.to_pascal_case()));
        tera.register_filter("camel", case_filter(|s| s.to_lower_camel_case()));
        tera.register_filter("plural", case_filter(pluralize));
        tera.register_filter("path", case_filter(|s| s.replace('.', "/")));
        tera
    }

    /// Clean up a Tera error chain, dropping the internal one-off template name
    fn format_tera_error(error: &tera::Error) -> String {
        use std::error::Error;

        let mut messages = Vec::new();
        let mut current: Option<&dyn Error> = Some(error);
        while let Some(err) = current {
            let cleaned = err
                .to_string()
                .replace("while rendering '__tera_one_off'", "")
                .replace("Failed to render '__tera_one_off'", "")
                .replace("Failed to parse '__tera_one_off'", "")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string();
            if !cleaned.is_empty() {
                messages.push(cleaned);
            }
            current = err.source();
        }

        if messages.is_empty() {
            "template syntax error".to_string()
        } else {
            messages.join("\n  -> ")
        }
    }

    /// Line number from a Tera error, when the parser reported one
    fn extract_line(error: &tera::Error) -> Option<usize> {
        let debug = format!("{:?}", error);
        let re = Regex::new(r"(\d+):(\d+)").ok()?;
        re.captures(&debug)?.get(1)?.as_str().parse().ok()
    }

    fn render_with(
        mut tera: Tera,
        name: &Path,
        source: &str,
        ctx: &RenderContext,
    ) -> Result<String> {
        debug!("Rendering {}", name.display());
        tera.render_str(source, &ctx.to_tera())
            .map_err(|e| CodegenError::RenderError {
                template: name.to_path_buf(),
                message: Self::format_tera_error(&e),
                line: Self::extract_line(&e),
                variables: ctx.snapshot(),
            })
    }
}

impl Renderer for TeraRenderer {
    fn render_str(&self, name: &Path, source: &str, ctx: &RenderContext) -> Result<String> {
        Self::render_with(Self::engine(), name, source, ctx)
    }

    /// Renders with the output functions bound to `output`
    fn render_output(
        &self,
        template: &Path,
        output: &Path,
        ctx: &RenderContext,
    ) -> Result<Rendered> {
        let source = read_template(template, ctx)?;
        let mut tera = Self::engine();
        let flags = control::register(&mut tera, output);
        let text = Self::render_with(tera, template, &source, ctx)?;
        Ok(Rendered {
            text,
            control: control::take(&flags),
        })
    }
}

fn case_filter(
    convert: fn(&str) -> String,
) -> impl Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync {
    move |value: &Value, _args: &HashMap<String, Value>| {
        let s = value
            .as_str()
            .ok_or_else(|| tera::Error::msg("case filters require a string"))?;
        Ok(Value::String(convert(s)))
    }
}
