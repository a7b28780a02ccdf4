//! Member-level structure of generated files
//!
//! A [`StructuralUnit`] is the ordered list of members found in a Rust source
//! file (struct fields, impl and trait items, top-level items) or a mapper XML
//! document (children of the root element). Every member keeps its verbatim
//! text so that hand-written code can be carried into a regenerated file
//! without reformatting.

mod rename;
mod rust;
mod span;
mod xml;

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use indexmap::IndexMap;
use thiserror::Error;

use crate::codegen::{identity_key, ArtifactKind};

pub use rename::rename_identifiers;

/// Errors raised while reading the structure of a file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    #[error("{message} (line {line}, column {column})")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("{0:?} files have no member structure")]
    Unsupported(ArtifactKind),
}

/// Syntax family of a structural unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    Rust,
    Xml,
}

impl StructureKind {
    /// The structure used for an artifact kind, if it has one
    pub fn for_artifact(kind: ArtifactKind) -> Option<Self> {
        match kind {
            ArtifactKind::Entity | ArtifactKind::Source => Some(StructureKind::Rust),
            ArtifactKind::Mapper => Some(StructureKind::Xml),
            ArtifactKind::Protected | ArtifactKind::Generic => None,
        }
    }
}

/// What a member is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Named struct field
    Field,
    /// Item inside an impl or trait block
    AssocItem,
    /// Top-level item other than a container
    Item,
    /// `use` declaration
    Use,
    /// Child element of the XML root
    Element,
}

/// Identity of a member within its unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub kind: MemberKind,
    /// Key of the enclosing container, `None` for file-level members
    pub container: Option<String>,
    pub name: String,
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{}::{}", container, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Whether a member came from the template or was written by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Generated,
    Custom,
}

/// One member with its verbatim text
#[derive(Debug, Clone)]
pub struct Member {
    pub key: MemberKey,
    /// Human-readable signature, for diagnostics only
    pub signature: String,
    /// Source text including directly preceding comments and attributes
    pub text: String,
    /// Byte range of `text` in the unit
    pub span: Range<usize>,
    pub origin: Origin,
}

/// A block members live in: a struct, an impl or trait block, or the XML root
#[derive(Debug, Clone)]
pub struct Container {
    pub key: String,
    /// Byte range of the whole container, including leading comments
    pub span: Range<usize>,
    /// Where new members are spliced in
    pub insert_at: usize,
    /// The closing delimiter shares its line with other content
    pub inline_close: bool,
    /// Position after the last field when it has no trailing comma
    pub comma_at: Option<usize>,
    /// Indentation used for inserted members
    pub indent: String,
}

/// Parsed member structure of one file
#[derive(Debug, Clone)]
pub struct StructuralUnit {
    pub kind: StructureKind,
    pub text: String,
    pub members: Vec<Member>,
    pub containers: Vec<Container>,
    /// Where file-level `use` declarations are spliced in
    pub use_insert_at: usize,
}

impl StructuralUnit {
    /// Find a member by key
    pub fn member(&self, key: &MemberKey) -> Option<&Member> {
        self.members.iter().find(|m| &m.key == key)
    }

    /// Find a container by key
    pub fn container(&self, key: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.key == key)
    }

    /// Mark every member as generated or custom
    pub fn with_origin(mut self, origin: Origin) -> Self {
        for member in &mut self.members {
            member.origin = origin;
        }
        self
    }
}

/// Parse text into its member structure.
///
/// Only entity, source and mapper artifacts have a structure.
pub fn parse(text: &str, kind: ArtifactKind) -> Result<StructuralUnit, StructureError> {
    match StructureKind::for_artifact(kind) {
        Some(StructureKind::Rust) => rust::parse(text),
        Some(StructureKind::Xml) => xml::parse(text),
        None => Err(StructureError::Unsupported(kind)),
    }
}

/// Field names of struct `name`, mapped to their identity key
pub fn field_map(unit: &StructuralUnit, name: &str) -> IndexMap<String, String> {
    let container = format!("struct {}", name);
    unit.members
        .iter()
        .filter(|m| m.key.kind == MemberKind::Field)
        .filter(|m| m.key.container.as_deref() == Some(container.as_str()))
        .map(|m| {
            let name = m.key.name.split('#').next().unwrap_or(&m.key.name);
            (name.to_string(), identity_key(name))
        })
        .collect()
}

/// Number of members in the unit
pub fn member_count(unit: &StructuralUnit) -> usize {
    unit.members.len()
}

/// Suffix repeated names with an ordinal so keys stay unique: `a`, `a#2`, `a#3`
pub(crate) struct KeyDisambiguator {
    seen: HashMap<(Option<String>, String), usize>,
}

impl KeyDisambiguator {
    pub(crate) fn new() -> Self {
        Self {
            seen: HashMap::new(),
        }
    }

    pub(crate) fn unique(&mut self, container: Option<&str>, name: String) -> String {
        let count = self
            .seen
            .entry((container.map(String::from), name.clone()))
            .or_insert(0);
        *count += 1;
        if *count == 1 {
            name
        } else {
            format!("{}#{}", name, count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disambiguator() {
        let mut keys = KeyDisambiguator::new();
        assert_eq!(keys.unique(None, "impl User".into()), "impl User");
        assert_eq!(keys.unique(None, "impl User".into()), "impl User#2");
        assert_eq!(keys.unique(Some("impl User"), "impl User".into()), "impl User");
    }

    #[test]
    fn test_unsupported_kind() {
        assert_eq!(
            parse("anything", ArtifactKind::Generic).unwrap_err(),
            StructureError::Unsupported(ArtifactKind::Generic)
        );
    }

    #[test]
    fn test_field_map() {
        let unit = parse(
            "pub struct User {\n    pub id: i32,\n    pub userName: String,\n}\n\npub struct Legacy {\n    pub user_name: String,\n}\n",
            ArtifactKind::Entity,
        )
        .unwrap();
        let fields = field_map(&unit, "User");
        assert_eq!(fields.get("userName").map(String::as_str), Some("username"));
        assert_eq!(fields.len(), 2);
        assert!(field_map(&unit, "Missing").is_empty());
        assert_eq!(member_count(&unit), 3);
    }
}
