//! MySQL DDL parsing with sqlparser-rs

use std::path::Path;

use sqlparser::ast::{
    ColumnOption, CreateTable, DataType, EnumMember, Expr, IndexColumn, IndexConstraint,
    ObjectName, PrimaryKeyConstraint, Statement, TableConstraint, UniqueConstraint,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use super::metadata::*;
use crate::error::{CodegenError, Result};

/// Parse a SQL schema string into table metadata.
///
/// Statements other than `CREATE TABLE` are ignored.
pub fn parse_schema(sql: &str) -> Result<Vec<TableMetadata>> {
    let dialect = MySqlDialect {};
    let statements = Parser::parse_sql(&dialect, sql)?;

    let tables: Vec<TableMetadata> = statements
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::CreateTable(create) => Some(extract_table_metadata(create)),
            _ => None,
        })
        .collect();

    debug!("Parsed {} tables from schema", tables.len());
    Ok(tables)
}

/// Read and parse a schema file
pub fn parse_schema_file(path: &Path) -> Result<Vec<TableMetadata>> {
    let sql = std::fs::read_to_string(path).map_err(|e| {
        CodegenError::SchemaError(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_schema(&sql)
}

fn extract_table_metadata(create: &CreateTable) -> TableMetadata {
    let mut table = TableMetadata {
        name: extract_table_name(&create.name),
        ..Default::default()
    };

    for col_def in &create.columns {
        let (column, inline_key, inline_unique) = extract_column_metadata(col_def);
        if inline_key {
            table.primary_key = vec![column.name.clone()];
        }
        if inline_unique {
            table.unique_keys.push(vec![column.name.clone()]);
        }
        table.columns.push(column);
    }

    for constraint in &create.constraints {
        match constraint {
            TableConstraint::PrimaryKey(PrimaryKeyConstraint { columns, .. }) => {
                table.primary_key = column_names(columns);
            }
            TableConstraint::Unique(UniqueConstraint { columns, .. }) => {
                table.unique_keys.push(column_names(columns));
            }
            TableConstraint::Index(IndexConstraint { name, .. }) => {
                debug!(
                    "{}: ignoring non-unique index {}",
                    table.name,
                    name.as_ref().map(|n| n.value.as_str()).unwrap_or("(unnamed)")
                );
            }
            _ => {}
        }
    }

    // key columns are never nullable
    let key = table.primary_key.clone();
    for col in table.columns.iter_mut().filter(|c| key.contains(&c.name)) {
        col.nullable = false;
    }

    table
}

fn column_names(cols: &[IndexColumn]) -> Vec<String> {
    cols.iter().map(extract_ident_from_index_column).collect()
}

/// Returns the column plus whether it was declared PRIMARY KEY / UNIQUE inline
fn extract_column_metadata(col_def: &sqlparser::ast::ColumnDef) -> (ColumnMetadata, bool, bool) {
    let data_type = format!("{}", col_def.data_type);
    let enum_values = extract_enum_values(&col_def.data_type);
    let is_unsigned = data_type.to_uppercase().contains("UNSIGNED");

    let mut nullable = true;
    let mut default_value = None;
    let mut is_auto_increment = false;
    let mut col_is_primary = false;
    let mut col_is_unique = false;
    let mut comment = None;

    for option in &col_def.options {
        match &option.option {
            ColumnOption::NotNull => nullable = false,
            ColumnOption::Null => nullable = true,
            ColumnOption::Default(expr) => default_value = Some(format!("{}", expr)),
            ColumnOption::PrimaryKey(_) => {
                col_is_primary = true;
                nullable = false;
            }
            ColumnOption::Unique(_) => col_is_unique = true,
            ColumnOption::Comment(c) => comment = Some(c.clone()),
            ColumnOption::DialectSpecific(tokens) => {
                let token_str = tokens
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_uppercase();
                if token_str.contains("AUTO_INCREMENT") {
                    is_auto_increment = true;
                }
            }
            _ => {}
        }
    }

    let column = ColumnMetadata {
        name: col_def.name.value.clone(),
        data_type,
        nullable,
        default_value,
        is_auto_increment,
        is_unsigned,
        enum_values,
        comment,
    };

    (column, col_is_primary, col_is_unique)
}

fn extract_enum_values(data_type: &DataType) -> Option<Vec<String>> {
    match data_type {
        DataType::Enum(members, _) => Some(
            members
                .iter()
                .map(|m| match m {
                    EnumMember::Name(s) => s.clone(),
                    EnumMember::NamedValue(s, _) => s.clone(),
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Last segment of a possibly schema-qualified name, without quoting
fn extract_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

fn extract_ident_from_index_column(ic: &IndexColumn) -> String {
    match &ic.column.expr {
        Expr::Identifier(ident) => ident.value.clone(),
        other => format!("{}", other),
    }
}
