//! Cargo manifests of generated projects: workspace registration and
//! frontend fragments

use std::path::Path;

use regex::Regex;
use toml_edit::{Array, DocumentMut, Item, Value};
use tracing::{debug, info, warn};

use super::fs::atomic_write;
use crate::config::defaults;
use crate::error::{CodegenError, Result};

/// Add `member` to the `[workspace] members` of `root/Cargo.toml`.
///
/// Returns whether the manifest changed. A missing manifest, a manifest without
/// a `[workspace]` table, or one that already lists the member is left alone.
/// Formatting and comments of the manifest are preserved.
pub fn register_member(root: &Path, member: &str) -> Result<bool> {
    let manifest = root.join("Cargo.toml");
    if !manifest.is_file() {
        debug!("No workspace manifest at {}", manifest.display());
        return Ok(false);
    }

    let text = std::fs::read_to_string(&manifest)?;
    let mut doc: DocumentMut = text.parse().map_err(|e: toml_edit::TomlError| {
        CodegenError::ConfigError(format!("{}: {}", manifest.display(), e))
    })?;

    let Some(workspace) = doc.get_mut("workspace").and_then(Item::as_table_like_mut) else {
        debug!("{} is not a workspace manifest", manifest.display());
        return Ok(false);
    };

    if workspace.get("members").is_none() {
        workspace.insert("members", Item::Value(Value::Array(Array::new())));
    }
    let members = workspace
        .get_mut("members")
        .and_then(Item::as_array_mut)
        .ok_or_else(|| {
            CodegenError::ConfigError(format!(
                "{}: workspace.members is not an array",
                manifest.display()
            ))
        })?;

    if members.iter().any(|m| m.as_str() == Some(member)) {
        return Ok(false);
    }
    members.push(member);

    atomic_write(&manifest, doc.to_string().as_bytes())?;
    info!("Registered {} in {}", member, manifest.display());
    Ok(true)
}

/// Splice a frontend's manifest fragment into `project/Cargo.toml`, on the
/// lines just above the first append marker. The marker stays in place for
/// the next frontend.
///
/// Returns whether the manifest changed. A missing manifest or one without a
/// marker is left alone; a splice that would not parse as TOML is an error.
pub fn append_fragment(project: &Path, fragment: &str) -> Result<bool> {
    let manifest = project.join("Cargo.toml");
    if !manifest.is_file() {
        debug!("No project manifest at {}", manifest.display());
        return Ok(false);
    }

    let text = std::fs::read_to_string(&manifest)?;
    let Some(spliced) = splice_at_marker(&text, fragment)? else {
        warn!(
            "{} has no `# {}` line, fragment not added",
            manifest.display(),
            defaults::APPEND_MARKER
        );
        return Ok(false);
    };
    spliced.parse::<DocumentMut>().map_err(|e: toml_edit::TomlError| {
        CodegenError::ConfigError(format!("{} after adding fragment: {}", manifest.display(), e))
    })?;

    atomic_write(&manifest, spliced.as_bytes())?;
    info!("Added frontend fragment to {}", manifest.display());
    Ok(true)
}

fn splice_at_marker(text: &str, fragment: &str) -> Result<Option<String>> {
    let pattern = format!(r"(?m)^([ \t]*)#[ \t]*{}[ \t]*\r?$", defaults::APPEND_MARKER);
    let re = Regex::new(&pattern).map_err(|e| CodegenError::ConfigError(e.to_string()))?;
    let Some(caps) = re.captures(text) else {
        return Ok(None);
    };
    let Some(marker) = caps.get(0) else {
        return Ok(None);
    };
    let indent = caps.get(1).map_or("", |m| m.as_str());

    let mut out = String::with_capacity(text.len() + fragment.len());
    out.push_str(&text[..marker.start()]);
    for line in fragment.trim_end().lines() {
        out.push_str(indent);
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&text[marker.start()..]);
    Ok(Some(out))
}
