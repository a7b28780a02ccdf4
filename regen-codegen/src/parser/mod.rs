//! Schema input: DDL parsing with sqlparser-rs, query definitions and the schema model

mod metadata;
mod model;
mod provider;
mod queries;
mod schema_parser;

pub use metadata::*;
pub use model::*;
pub use provider::*;
pub use queries::*;
pub use schema_parser::*;
