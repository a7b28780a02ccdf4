//! Schema providers supply one [`SchemaModel`] per logical entity

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use super::metadata::TableMetadata;
use super::model::SchemaModel;
use super::queries::QueryDefinitions;
use super::schema_parser::{parse_schema, parse_schema_file};
use crate::codegen::NamingConvention;
use crate::error::{CodegenError, Result};

/// Source of schema models for entity generation
pub trait SchemaProvider {
    /// Names of the entities this provider can load, in declaration order
    fn entities(&self) -> Vec<String>;

    /// Load the model for one entity
    fn load(&self, entity: &str) -> Result<SchemaModel>;
}

/// Provider backed by MySQL DDL plus optional query definitions
#[derive(Debug, Clone)]
pub struct DdlSchemaProvider {
    tables: Vec<TableMetadata>,
    queries: QueryDefinitions,
    naming: NamingConvention,
}

impl DdlSchemaProvider {
    /// Build a provider from DDL text
    pub fn from_sql(sql: &str, naming: NamingConvention) -> Result<Self> {
        Ok(Self {
            tables: parse_schema(sql)?,
            queries: QueryDefinitions::default(),
            naming,
        })
    }

    /// Build a provider from a schema file and an optional queries file
    pub fn from_files(
        schema_file: &Path,
        queries_file: Option<&Path>,
        naming: NamingConvention,
    ) -> Result<Self> {
        info!("Parsing schema: {}", schema_file.display());
        let tables = parse_schema_file(schema_file)?;
        info!("Found {} tables", tables.len());

        let queries = match queries_file {
            Some(path) => {
                debug!("Loading query definitions from {}", path.display());
                QueryDefinitions::from_file(path)?
            }
            None => QueryDefinitions::default(),
        };

        Ok(Self {
            tables,
            queries,
            naming,
        })
    }

    /// Replace the query definitions
    pub fn with_queries(mut self, queries: QueryDefinitions) -> Self {
        self.queries = queries;
        self
    }

    /// Parsed table metadata
    pub fn tables(&self) -> &[TableMetadata] {
        &self.tables
    }

    /// Filter entity names by include/exclude patterns (comma-separated, `*` for all)
    pub fn filter_tables(&self, include: &str, exclude: &str) -> Vec<String> {
        let include_all = include.trim() == "*" || include.trim().is_empty();
        let include_set: HashSet<&str> = if include_all {
            HashSet::new()
        } else {
            include.split(',').map(str::trim).collect()
        };
        let exclude_set: HashSet<&str> = exclude
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        self.tables
            .iter()
            .map(|t| t.name.as_str())
            .filter(|name| (include_all || include_set.contains(name)) && !exclude_set.contains(name))
            .map(String::from)
            .collect()
    }
}

impl SchemaProvider for DdlSchemaProvider {
    fn entities(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    fn load(&self, entity: &str) -> Result<SchemaModel> {
        let table = self
            .tables
            .iter()
            .find(|t| t.name == entity)
            .ok_or_else(|| CodegenError::UnknownTable(entity.to_string()))?;

        let model =
            SchemaModel::from_table(table, self.naming).with_sqls(self.queries.for_table(entity));
        model.validate()?;
        Ok(model)
    }
}
