//! Naming of generated fields, structs and enums

use heck::{ToLowerCamelCase, ToPascalCase, ToSnakeCase};
use serde::{Deserialize, Serialize};

/// Convention used to derive a field's display name from its column name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// `user_name`
    #[default]
    Snake,
    /// `userName`
    Camel,
    /// Column name as declared in the schema
    Preserve,
}

impl NamingConvention {
    /// Derive the display name for a column, escaping Rust keywords
    pub fn field_name(&self, column_name: &str) -> String {
        let name = match self {
            NamingConvention::Snake => column_name.to_snake_case(),
            NamingConvention::Camel => column_name.to_lower_camel_case(),
            NamingConvention::Preserve => column_name.to_string(),
        };
        escape_keyword(name)
    }
}

/// Stable identity of a column or field name across naming conventions.
///
/// Two names are the same member when they only differ in case or
/// underscores: `userName`, `user_name` and `USER_NAME` all yield `username`.
pub fn identity_key(name: &str) -> String {
    name.trim_start_matches("r#")
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Struct name for a table: `order_items` -> `OrderItems`
pub fn to_struct_name(table_name: &str) -> String {
    table_name.to_pascal_case()
}

/// Enum name for an ENUM column: `users` + `status` -> `UsersStatus`
pub fn to_enum_name(table_name: &str, column_name: &str) -> String {
    format!(
        "{}{}",
        table_name.to_pascal_case(),
        column_name.to_pascal_case()
    )
}

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("index", "indices"),
];

/// English plural of a table or entity name, for templates
pub fn pluralize(word: &str) -> String {
    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(s, _)| *s == word) {
        return plural.to_string();
    }
    // past participles used as adjectives stay as they are
    if word.is_empty() || (word.len() > 2 && word.ends_with("ed")) {
        return word.to_string();
    }
    if word.len() > 2 && word.ends_with("is") {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if let Some(stem) = word.strip_suffix("fe") {
        return format!("{}ves", stem);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// `type` -> `r#type`. `self`, `Self`, `super` and `crate` cannot be raw
/// identifiers and are left alone.
fn escape_keyword(name: String) -> String {
    if KEYWORDS.contains(&name.as_str()) {
        format!("r#{}", name)
    } else {
        name
    }
}
