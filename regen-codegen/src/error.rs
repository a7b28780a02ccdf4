//! Error types for regen-codegen

use std::path::PathBuf;

use thiserror::Error;

use crate::structure::StructureError;

/// Result type alias for regen-codegen operations
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Errors that can occur during generation
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Failed to parse SQL schema: {0}")]
    SchemaError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {}{}: {message}\n  variables: {variables}", template.display(), line.map(|l| format!(" (line {})", l)).unwrap_or_default())]
    RenderError {
        template: PathBuf,
        message: String,
        line: Option<usize>,
        variables: String,
    },

    #[error("Failed to parse existing file {}, leaving it untouched: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: StructureError,
    },

    #[error("Failed to merge into {}, leaving it untouched: {source}", path.display())]
    MergeError {
        path: PathBuf,
        #[source]
        source: StructureError,
    },

    #[error("Fields `{first}` and `{second}` in {} both map to column `{column}`", path.display())]
    CompatibilityConflict {
        path: PathBuf,
        column: String,
        first: String,
        second: String,
    },

    #[error("Dialect conversion failed: {0}")]
    DialectError(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

impl CodegenError {
    /// Whether this error only affects the file being generated.
    ///
    /// File-scoped errors are collected into the run report and the driver
    /// moves on to the next template; anything else aborts the run.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            CodegenError::RenderError { .. }
                | CodegenError::ParseError { .. }
                | CodegenError::MergeError { .. }
                | CodegenError::CompatibilityConflict { .. }
                | CodegenError::DialectError(_)
        )
    }
}

impl From<sqlparser::parser::ParserError> for CodegenError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        CodegenError::SchemaError(err.to_string())
    }
}

impl From<config::ConfigError> for CodegenError {
    fn from(err: config::ConfigError) -> Self {
        CodegenError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_scoped_classification() {
        let render = CodegenError::RenderError {
            template: PathBuf::from("entity/model.rs.tera"),
            message: "Variable `x` not found".into(),
            line: Some(3),
            variables: "{}".into(),
        };
        assert!(render.is_file_scoped());
        assert!(render.to_string().contains("(line 3)"));

        let write = CodegenError::WriteError {
            path: PathBuf::from("out.rs"),
            source: std::io::Error::other("disk full"),
        };
        assert!(!write.is_file_scoped());
        assert!(!CodegenError::ConfigError("missing".into()).is_file_scoped());
    }
}
