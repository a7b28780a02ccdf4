//! SQL to Rust type mapping for template variables

use super::naming;
use crate::parser::ColumnMetadata;

/// A Rust type as exposed to templates
#[derive(Debug, Clone, PartialEq)]
pub enum RustType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Decimal,
    NaiveDate,
    NaiveDateTime,
    NaiveTime,
    Json,
    /// Generated enum type for an ENUM column
    Enum(String),
    Option(Box<RustType>),
}

impl RustType {
    /// Type string used in struct fields
    pub fn to_type_string(&self) -> String {
        match self {
            RustType::Bool => "bool".to_string(),
            RustType::I8 => "i8".to_string(),
            RustType::I16 => "i16".to_string(),
            RustType::I32 => "i32".to_string(),
            RustType::I64 => "i64".to_string(),
            RustType::U8 => "u8".to_string(),
            RustType::U16 => "u16".to_string(),
            RustType::U32 => "u32".to_string(),
            RustType::U64 => "u64".to_string(),
            RustType::F32 => "f32".to_string(),
            RustType::F64 => "f64".to_string(),
            RustType::String => "String".to_string(),
            RustType::Bytes => "Vec<u8>".to_string(),
            RustType::Decimal => "rust_decimal::Decimal".to_string(),
            RustType::NaiveDate => "chrono::NaiveDate".to_string(),
            RustType::NaiveDateTime => "chrono::NaiveDateTime".to_string(),
            RustType::NaiveTime => "chrono::NaiveTime".to_string(),
            RustType::Json => "serde_json::Value".to_string(),
            RustType::Enum(name) => name.clone(),
            RustType::Option(inner) => format!("Option<{}>", inner.to_type_string()),
        }
    }

    /// Type string used for function parameters (borrowed strings and bytes)
    pub fn to_param_type_string(&self) -> String {
        match self {
            RustType::String => "&str".to_string(),
            RustType::Bytes => "&[u8]".to_string(),
            RustType::Option(inner) => match inner.as_ref() {
                RustType::String => "Option<&str>".to_string(),
                RustType::Bytes => "Option<&[u8]>".to_string(),
                _ => format!("Option<{}>", inner.to_type_string()),
            },
            _ => self.to_type_string(),
        }
    }
}

/// Resolve SQL data types to Rust types
pub struct TypeResolver;

impl TypeResolver {
    /// Get the Rust type for a column, wrapping nullable columns in `Option`
    pub fn resolve(column: &ColumnMetadata, table_name: &str) -> RustType {
        let base = Self::resolve_base_type(column, table_name);
        if column.nullable {
            RustType::Option(Box::new(base))
        } else {
            base
        }
    }

    fn resolve_base_type(column: &ColumnMetadata, table_name: &str) -> RustType {
        if column.is_enum() {
            return RustType::Enum(naming::to_enum_name(table_name, &column.name));
        }

        let lower = column.data_type.to_lowercase();
        let (base, args) = split_type(&lower);
        let unsigned = column.is_unsigned || lower.contains("unsigned");

        match base {
            "bool" | "boolean" => RustType::Bool,
            "tinyint" if args == Some("1") => RustType::Bool,
            "bit" if args.is_none() || args == Some("1") => RustType::Bool,
            "tinyint" if unsigned => RustType::U8,
            "tinyint" => RustType::I8,
            "smallint" if unsigned => RustType::U16,
            "smallint" => RustType::I16,
            "mediumint" | "int" | "integer" if unsigned => RustType::U32,
            "mediumint" | "int" | "integer" => RustType::I32,
            "bigint" if unsigned => RustType::U64,
            "bigint" => RustType::I64,
            "float" => RustType::F32,
            "double" | "real" => RustType::F64,
            "decimal" | "numeric" | "dec" => RustType::Decimal,
            "date" => RustType::NaiveDate,
            "datetime" | "timestamp" => RustType::NaiveDateTime,
            "time" => RustType::NaiveTime,
            "json" => RustType::Json,
            "binary" | "varbinary" | "bit" | "tinyblob" | "blob" | "mediumblob" | "longblob"
            | "geometry" | "point" | "linestring" | "polygon" | "multipoint"
            | "multilinestring" | "multipolygon" | "geometrycollection" => RustType::Bytes,
            _ => RustType::String,
        }
    }
}

/// Split `varchar(255)` into (`varchar`, Some("255")); modifiers after the
/// parenthesis (`unsigned`, `zerofill`) are ignored.
fn split_type(data_type: &str) -> (&str, Option<&str>) {
    let data_type = data_type.trim();
    match data_type.find('(') {
        Some(open) => {
            let base = data_type[..open].trim();
            let args = data_type[open + 1..]
                .split(')')
                .next()
                .map(str::trim)
                .filter(|a| !a.is_empty());
            (base, args)
        }
        None => (
            data_type.split_whitespace().next().unwrap_or_default(),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_column(name: &str, data_type: &str, nullable: bool, unsigned: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
            default_value: None,
            is_auto_increment: false,
            is_unsigned: unsigned,
            enum_values: None,
            comment: None,
        }
    }

    #[test]
    fn test_integer_types() {
        let col = make_column("id", "BIGINT", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::I64);

        let col = make_column("id", "BIGINT UNSIGNED", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::U64);

        let col = make_column("count", "INT", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::I32);
    }

    #[test]
    fn test_boolean_type() {
        let col = make_column("active", "TINYINT(1)", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::Bool);

        let col = make_column("level", "TINYINT(4)", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::I8);

        let col = make_column("flag", "BOOLEAN", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::Bool);
    }

    #[test]
    fn test_string_and_temporal_types() {
        let col = make_column("bio", "TEXT", true, false);
        assert_eq!(
            TypeResolver::resolve(&col, "users"),
            RustType::Option(Box::new(RustType::String))
        );

        let col = make_column("created_at", "DATETIME", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::NaiveDateTime);

        let col = make_column("price", "DECIMAL(10,2)", false, false);
        assert_eq!(TypeResolver::resolve(&col, "users"), RustType::Decimal);
    }

    #[test]
    fn test_enum_type() {
        let mut col = make_column("status", "ENUM", false, false);
        col.enum_values = Some(vec!["ACTIVE".to_string(), "INACTIVE".to_string()]);
        assert_eq!(
            TypeResolver::resolve(&col, "users"),
            RustType::Enum("UsersStatus".to_string())
        );
    }

    #[test]
    fn test_type_strings() {
        assert_eq!(RustType::I64.to_type_string(), "i64");
        assert_eq!(
            RustType::Option(Box::new(RustType::String)).to_type_string(),
            "Option<String>"
        );
        assert_eq!(RustType::String.to_param_type_string(), "&str");
        assert_eq!(
            RustType::Option(Box::new(RustType::Bytes)).to_param_type_string(),
            "Option<&[u8]>"
        );
    }
}
