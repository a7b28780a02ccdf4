//! Field renames across naming-convention changes
//!
//! When a column's display name changes between runs (`userName` becoming
//! `user_name`), the existing file still uses the old name. [`resolve`] pairs
//! the old fields with the current columns by their stable identity and
//! produces a fresh model plus the old-to-new [`CompatibilityTable`] the merge
//! uses to translate carried members.

use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{CodegenError, Result};
use crate::parser::SchemaModel;

/// Old display name to new display name, valid for one entity pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatibilityTable {
    renames: IndexMap<String, String>,
}

impl CompatibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rename
    pub fn record(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.renames.insert(old.into(), new.into());
    }

    /// The new name for `old`, if it was renamed
    pub fn get(&self, old: &str) -> Option<&str> {
        self.renames.get(old).map(String::as_str)
    }

    /// Translate a name, leaving names without a rename as they are
    pub fn translate<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).unwrap_or(name)
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.renames
    }

    /// Merge another table into this one
    pub fn extend(&mut self, other: &CompatibilityTable) {
        for (old, new) in &other.renames {
            self.renames.insert(old.clone(), new.clone());
        }
    }
}

/// Output of [`resolve`]: the renamed model and the table that produced it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub schema: SchemaModel,
    pub table: CompatibilityTable,
}

/// Pair old field names with the schema's columns.
///
/// `old_fields` maps each field name found in the existing file at `path` to
/// its identity key. Fields are matched against columns by identity key, never
/// by display name. A matched field whose name differs from the column's
/// current display name is recorded as a rename, and query parameters still
/// using the old name are renamed in the returned model. Fields with no
/// matching column are custom and left alone. Two different fields matching
/// the same column are a [`CodegenError::CompatibilityConflict`].
pub fn resolve(
    schema: &SchemaModel,
    old_fields: &IndexMap<String, String>,
    path: &Path,
) -> Result<Resolution> {
    let mut table = CompatibilityTable::new();
    let mut claimed: IndexMap<&str, &str> = IndexMap::new();

    for old_name in old_fields.keys() {
        let Some(column) = schema.column_by_identity(old_name) else {
            continue;
        };

        if let Some(first) = claimed.insert(column.name.as_str(), old_name.as_str()) {
            if first != old_name.as_str() {
                return Err(CodegenError::CompatibilityConflict {
                    path: path.to_path_buf(),
                    column: column.name.clone(),
                    first: first.to_string(),
                    second: old_name.clone(),
                });
            }
        }

        if *old_name != column.field_name {
            debug!(
                "{}: field `{}` is now `{}`",
                path.display(),
                old_name,
                column.field_name
            );
            table.record(old_name.as_str(), column.field_name.as_str());
        }
    }

    let mut renamed = schema.clone();
    for sql in &mut renamed.sqls {
        for param in &mut sql.params {
            if let Some(new) = table.get(&param.param_name) {
                param.param_name = new.to_string();
            }
        }
    }

    Ok(Resolution {
        schema: renamed,
        table,
    })
}
