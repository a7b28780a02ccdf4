//! Per-table query definitions loaded from TOML
//!
//! ```toml
//! [[user]]
//! name = "find_by_email"
//! sql = "SELECT * FROM user WHERE email = ?"
//! params = [{ name = "email" }]
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use super::model::Sql;
use crate::error::{CodegenError, Result};

/// Query definitions keyed by table name
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct QueryDefinitions {
    tables: IndexMap<String, Vec<Sql>>,
}

impl QueryDefinitions {
    /// Parse query definitions from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CodegenError::ConfigError(format!("Failed to parse queries: {}", e)))
    }

    /// Load query definitions from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            CodegenError::ConfigError(format!(
                "Failed to parse queries file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Queries declared for a table (empty when none)
    pub fn for_table(&self, table: &str) -> Vec<Sql> {
        self.tables.get(table).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queries() {
        let defs = QueryDefinitions::parse(
            r#"
            [[user]]
            name = "find_by_email"
            sql = "SELECT * FROM user WHERE email = ?"
            params = [{ name = "email" }]

            [[user]]
            name = "list_active"
            multiple = true
            "#,
        )
        .unwrap();

        let sqls = defs.for_table("user");
        assert_eq!(sqls.len(), 2);
        assert_eq!(sqls[0].params[0].param_name, "email");
        assert!(sqls[1].multiple);
        assert!(defs.for_table("order").is_empty());
    }

    #[test]
    fn test_parse_queries_rejects_bad_shape() {
        assert!(QueryDefinitions::parse("user = 3").is_err());
    }
}
