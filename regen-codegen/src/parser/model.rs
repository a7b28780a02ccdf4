//! The schema model templates are rendered against
//!
//! A [`SchemaModel`] is built once per entity pass from the DDL metadata and
//! the query definitions, then treated as immutable. Renames discovered by the
//! compatibility resolver produce a new model rather than editing this one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::metadata::TableMetadata;
use crate::codegen::{identity_key, to_struct_name, NamingConvention, TypeResolver};
use crate::error::{CodegenError, Result};

/// One logical entity: a table, its columns and its query definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Table name
    pub name: String,

    /// Struct name derived from the table name
    pub struct_name: String,

    /// Table comment (if any)
    #[serde(default)]
    pub comment: Option<String>,

    /// Columns in declaration order
    pub columns: Vec<Column>,

    /// Primary key column names, in key order
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Query definitions for this entity
    #[serde(default)]
    pub sqls: Vec<Sql>,
}

/// A column with its stable identifier and its display (field) name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Underlying column identifier, stable across runs
    pub name: String,

    /// Display name used by templates for fields and accessors
    pub field_name: String,

    /// SQL data type as declared
    pub data_type: String,

    /// Rust type of the field
    pub rust_type: String,

    /// Rust type when passed as a parameter
    pub param_type: String,

    pub nullable: bool,

    pub is_key: bool,

    #[serde(default)]
    pub auto_increment: bool,

    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub enum_values: Option<Vec<String>>,
}

/// A named query definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sql {
    /// Query name, e.g. `find_by_email`
    pub name: String,

    /// SQL text, if the definition carries one
    #[serde(default)]
    pub sql: Option<String>,

    /// Whether the query returns many rows
    #[serde(default)]
    pub multiple: bool,

    /// Parameters in binding order
    #[serde(default)]
    pub params: Vec<SqlParameter>,
}

/// A query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    /// Parameter name; usually the display name of the column it binds
    #[serde(alias = "name")]
    pub param_name: String,

    /// Rust type of the parameter, when known
    #[serde(default)]
    pub rust_type: Option<String>,
}

impl SchemaModel {
    /// Build the model for one table
    pub fn from_table(table: &TableMetadata, naming: NamingConvention) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|col| {
                let rust_type = TypeResolver::resolve(col, &table.name);
                Column {
                    name: col.name.clone(),
                    field_name: naming.field_name(&col.name),
                    data_type: col.data_type.clone(),
                    rust_type: rust_type.to_type_string(),
                    param_type: rust_type.to_param_type_string(),
                    nullable: col.nullable,
                    is_key: table.is_key_column(&col.name),
                    auto_increment: col.is_auto_increment,
                    unique: table.is_unique_column(&col.name),
                    comment: col.comment.clone(),
                    enum_values: col.enum_values.clone(),
                }
            })
            .collect();

        Self {
            name: table.name.clone(),
            struct_name: to_struct_name(&table.name),
            comment: table.comment.clone(),
            columns,
            primary_key: table.primary_key.clone(),
            sqls: Vec::new(),
        }
    }

    /// Attach query definitions, filling parameter types from matching columns
    pub fn with_sqls(mut self, sqls: Vec<Sql>) -> Self {
        self.sqls = sqls;
        for sql in &mut self.sqls {
            for param in &mut sql.params {
                if param.rust_type.is_none() {
                    let key = identity_key(&param.param_name);
                    param.rust_type = self
                        .columns
                        .iter()
                        .find(|c| identity_key(&c.name) == key)
                        .map(|c| c.param_type.clone());
                }
            }
        }
        self
    }

    /// Find the column a field or parameter name refers to, ignoring case and underscores
    pub fn column_by_identity(&self, name: &str) -> Option<&Column> {
        let key = identity_key(name);
        self.columns.iter().find(|c| identity_key(&c.name) == key)
    }

    /// Check the model invariants: unique column names and resolvable keys
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(identity_key(&col.name)) {
                return Err(CodegenError::SchemaError(format!(
                    "table `{}` declares column `{}` more than once (names are compared ignoring case and underscores)",
                    self.name, col.name
                )));
            }
        }
        for key in &self.primary_key {
            if !self.columns.iter().any(|c| &c.name == key) {
                return Err(CodegenError::SchemaError(format!(
                    "table `{}` has primary key column `{}` that is not declared",
                    self.name, key
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ColumnMetadata;

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
            default_value: None,
            is_auto_increment: false,
            is_unsigned: false,
            enum_values: None,
            comment: None,
        }
    }

    fn user_table() -> TableMetadata {
        TableMetadata {
            name: "user".to_string(),
            comment: None,
            columns: vec![
                column("id", "INT", false),
                column("email", "VARCHAR(255)", false),
                column("userName", "VARCHAR(64)", true),
            ],
            primary_key: vec!["id".to_string()],
            unique_keys: vec![vec!["email".to_string()]],
        }
    }

    #[test]
    fn test_from_table() {
        let model = SchemaModel::from_table(&user_table(), NamingConvention::Snake);
        assert_eq!(model.struct_name, "User");
        assert_eq!(model.columns.len(), 3);
        assert_eq!(model.columns[0].rust_type, "i32");
        assert!(model.columns[0].is_key);
        assert!(model.columns[1].unique);
        assert_eq!(model.columns[2].name, "userName");
        assert_eq!(model.columns[2].field_name, "user_name");
        assert_eq!(model.columns[2].rust_type, "Option<String>");
        assert_eq!(model.columns.iter().filter(|c| c.is_key).count(), 1);
    }

    #[test]
    fn test_with_sqls_fills_param_types() {
        let model = SchemaModel::from_table(&user_table(), NamingConvention::Snake).with_sqls(vec![
            Sql {
                name: "find_by_email".into(),
                sql: None,
                multiple: false,
                params: vec![SqlParameter {
                    param_name: "email".into(),
                    rust_type: None,
                }],
            },
        ]);
        assert_eq!(model.sqls[0].params[0].rust_type.as_deref(), Some("&str"));
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let mut table = user_table();
        table.columns.push(column("user_name", "VARCHAR(64)", true));
        let model = SchemaModel::from_table(&table, NamingConvention::Snake);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_column_by_identity() {
        let model = SchemaModel::from_table(&user_table(), NamingConvention::Snake);
        assert_eq!(model.column_by_identity("USER_NAME").map(|c| c.name.as_str()), Some("userName"));
        assert!(model.column_by_identity("missing").is_none());
    }
}
