//! Functions a template uses to inspect and steer its own output file

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use regex::Regex;
use tera::{Tera, Value};

/// Decisions a template made about its output while rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileControl {
    /// Discard the rendered text; the output file is left as it is
    pub ignore: bool,
    /// Replace an existing output regardless of the configured policy
    pub replace: Option<bool>,
}

/// Rendered text plus the template's [`FileControl`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub control: FileControl,
}

impl Rendered {
    pub fn new(text: String) -> Self {
        Self {
            text,
            control: FileControl::default(),
        }
    }
}

/// Register the output functions on `tera`, bound to `output`.
///
/// - `ignore_output()` and `replace_output(value=true)` set the control flags
/// - `output_exists()`, `output_contains(text=..)`, `output_matches(pattern=..)`
///   look at the file currently on disk
/// - `insert_after(anchor=.., text=..)`, `insert_before(anchor=.., text=..)`,
///   `append(text=..)`, `prepend(text=..)` return the current file with the
///   text spliced in, and fail when the file is missing or blank
pub(crate) fn register(tera: &mut Tera, output: &Path) -> Arc<Mutex<FileControl>> {
    let control = Arc::new(Mutex::new(FileControl::default()));

    let flags = Arc::clone(&control);
    tera.register_function("ignore_output", move |_: &HashMap<String, Value>| {
        update(&flags, |c| c.ignore = true)?;
        Ok(Value::String(String::new()))
    });

    let flags = Arc::clone(&control);
    tera.register_function("replace_output", move |args: &HashMap<String, Value>| {
        let value = args.get("value").and_then(Value::as_bool).unwrap_or(true);
        update(&flags, |c| c.replace = Some(value))?;
        Ok(Value::String(String::new()))
    });

    let path = output.to_path_buf();
    tera.register_function("output_exists", move |_: &HashMap<String, Value>| {
        Ok(Value::Bool(path.is_file()))
    });

    let path = output.to_path_buf();
    tera.register_function("output_contains", move |args: &HashMap<String, Value>| {
        let text = string_arg(args, "text", "output_contains")?;
        let found = fs::read_to_string(&path).is_ok_and(|content| content.contains(&text));
        Ok(Value::Bool(found))
    });

    let path = output.to_path_buf();
    tera.register_function("output_matches", move |args: &HashMap<String, Value>| {
        let pattern = string_arg(args, "pattern", "output_matches")?;
        let re = Regex::new(&pattern)
            .map_err(|e| tera::Error::msg(format!("`output_matches`: {}", e)))?;
        let found = fs::read_to_string(&path).is_ok_and(|content| re.is_match(&content));
        Ok(Value::Bool(found))
    });

    let path = output.to_path_buf();
    tera.register_function("insert_after", move |args: &HashMap<String, Value>| {
        let (content, anchor, text) = anchored(&path, args, "insert_after")?;
        let at = find(&content, &anchor, "insert_after")? + anchor.len();
        Ok(Value::String(splice(&content, at, &text)))
    });

    let path = output.to_path_buf();
    tera.register_function("insert_before", move |args: &HashMap<String, Value>| {
        let (content, anchor, text) = anchored(&path, args, "insert_before")?;
        let at = find(&content, &anchor, "insert_before")?;
        Ok(Value::String(splice(&content, at, &text)))
    });

    let path = output.to_path_buf();
    tera.register_function("append", move |args: &HashMap<String, Value>| {
        let content = current(&path, "append")?;
        let text = string_arg(args, "text", "append")?;
        Ok(Value::String(content + &text))
    });

    let path = output.to_path_buf();
    tera.register_function("prepend", move |args: &HashMap<String, Value>| {
        let content = current(&path, "prepend")?;
        let text = string_arg(args, "text", "prepend")?;
        Ok(Value::String(text + &content))
    });

    control
}

/// The flags set during a render
pub(crate) fn take(control: &Arc<Mutex<FileControl>>) -> FileControl {
    match control.lock() {
        Ok(c) => c.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn update(control: &Mutex<FileControl>, f: impl FnOnce(&mut FileControl)) -> tera::Result<()> {
    let mut guard = control
        .lock()
        .map_err(|_| tera::Error::msg("output control is unavailable"))?;
    f(&mut guard);
    Ok(())
}

fn string_arg(args: &HashMap<String, Value>, name: &str, function: &str) -> tera::Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            tera::Error::msg(format!("`{}` requires a string `{}` argument", function, name))
        })
}

fn current(path: &Path, function: &str) -> tera::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(tera::Error::msg(format!(
            "`{}`: {} is missing or blank",
            function,
            path.display()
        ))),
    }
}

fn anchored(
    path: &Path,
    args: &HashMap<String, Value>,
    function: &str,
) -> tera::Result<(String, String, String)> {
    let content = current(path, function)?;
    let anchor = string_arg(args, "anchor", function)?;
    let text = string_arg(args, "text", function)?;
    Ok((content, anchor, text))
}

fn find(content: &str, anchor: &str, function: &str) -> tera::Result<usize> {
    content
        .find(anchor)
        .ok_or_else(|| tera::Error::msg(format!("`{}`: anchor `{}` not found", function, anchor)))
}

fn splice(content: &str, at: usize, text: &str) -> String {
    let mut out = String::with_capacity(content.len() + text.len());
    out.push_str(&content[..at]);
    out.push_str(text);
    out.push_str(&content[at..]);
    out
}
