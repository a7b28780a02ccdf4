//! Tables and columns as declared in DDL, before naming and type resolution

use serde::{Deserialize, Serialize};

/// A `CREATE TABLE` statement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,

    pub comment: Option<String>,

    /// Columns in declaration order
    pub columns: Vec<ColumnMetadata>,

    /// Primary key columns in key order; empty when the table has no key
    pub primary_key: Vec<String>,

    /// Column lists of the UNIQUE constraints and indexes
    pub unique_keys: Vec<Vec<String>>,
}

/// One column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,

    /// Declared type as written, e.g. `VARCHAR(255)` or `INT UNSIGNED`
    pub data_type: String,

    pub nullable: bool,

    pub default_value: Option<String>,

    pub is_auto_increment: bool,

    pub is_unsigned: bool,

    /// Allowed values of an ENUM column
    pub enum_values: Option<Vec<String>>,

    pub comment: Option<String>,
}

impl TableMetadata {
    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|c| c == name)
    }

    /// Whether a UNIQUE key covers exactly this column
    pub fn is_unique_column(&self, name: &str) -> bool {
        self.unique_keys
            .iter()
            .any(|key| matches!(key.as_slice(), [only] if only == name))
    }
}

impl ColumnMetadata {
    pub fn is_enum(&self) -> bool {
        self.enum_values.is_some()
    }
}
