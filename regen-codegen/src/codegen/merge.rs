//! Splicing hand-written members into freshly rendered text

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use super::artifact::ArtifactKind;
use super::compat::CompatibilityTable;
use crate::structure::{
    self, rename_identifiers, Container, Member, MemberKey, MemberKind, Origin, StructuralUnit,
    StructureError, StructureKind,
};

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Final text
    pub text: String,
    /// The final text's structure; carried members are tagged [`Origin::Custom`]
    pub unit: StructuralUnit,
    /// Keys (in the final unit) of the carried members
    pub carried: Vec<MemberKey>,
    /// Keys of the old containers carried whole
    pub carried_containers: Vec<String>,
}

/// Merge an existing file's custom members into freshly rendered text.
///
/// Old containers are paired with new ones of the same kind and name by
/// the members they share. Every old member without a counterpart in any
/// same-named new container (after translating field names through
/// `table`) is carried verbatim into its paired container, or appended at
/// file level. Old containers that pair with nothing are carried whole.
/// Generated members always win over their old versions. The result is
/// re-parsed before it is returned.
pub fn merge(
    new_text: &str,
    old: &StructuralUnit,
    table: &CompatibilityTable,
    kind: ArtifactKind,
) -> Result<MergeOutcome, StructureError> {
    let new_unit = structure::parse(new_text, kind)?;
    let structure_kind = new_unit.kind;
    let pairs = pair_containers(old, &new_unit, table);

    let mut splices = Splices::default();
    let mut carried = Vec::new();
    let mut carried_containers = Vec::new();

    for container in &old.containers {
        if !pairs.contains_key(container.key.as_str()) {
            debug!("Carrying custom container {}", container.key);
            carried_containers.push(container.key.clone());
            let text = rename_identifiers(
                &old.text[container.span.clone()],
                table.as_map(),
                structure_kind,
            );
            splices.append(new_text, text);
        }
    }

    let has_use = new_unit
        .members
        .iter()
        .any(|m| m.key.kind == MemberKind::Use);

    for member in &old.members {
        let key = match member.key.container.as_deref() {
            Some(old_container) => {
                // carried whole above
                let Some(&target) = pairs.get(old_container) else {
                    continue;
                };
                let name = translate_name(&member.key, table);
                let generated = new_unit
                    .containers
                    .iter()
                    .filter(|c| same_family(structure_kind, old_container, &c.key))
                    .any(|c| has_member(&new_unit, &c.key, member.key.kind, &name));
                if generated {
                    continue;
                }
                let container = &new_unit.containers[target];
                let text = rename_identifiers(&member.text, table.as_map(), structure_kind);
                splices.into_container(container, member, &text);
                MemberKey {
                    kind: member.key.kind,
                    container: Some(container.key.clone()),
                    name,
                }
            }
            None => {
                if new_unit.member(&member.key).is_some() {
                    continue;
                }
                let text = rename_identifiers(&member.text, table.as_map(), structure_kind);
                if member.key.kind == MemberKind::Use {
                    if has_use {
                        splices.insert(new_unit.use_insert_at, format!("\n{}", text));
                    } else {
                        splices.insert(new_unit.use_insert_at, format!("{}\n", text));
                    }
                } else {
                    splices.append(new_text, text);
                }
                member.key.clone()
            }
        };
        debug!("Carrying custom member {}", member.key);
        carried.push(key);
    }

    let tail_len = splices.tail.len();
    let merged = splices.apply(new_text);
    let unit = structure::parse(&merged, kind)?;
    let unit = tag_custom(unit, &carried, merged.len() - tail_len);

    Ok(MergeOutcome {
        text: merged,
        unit,
        carried,
        carried_containers,
    })
}

/// Old container key to the index of its new counterpart.
///
/// XML documents have a single root, which maps to the new root even when
/// the dialect renamed it. Rust containers pair within a family (`impl User`,
/// `impl User#2`, ...) by the number of members they share, most first, then
/// in document order. Containers sharing nothing pair only with a new
/// container left over after that.
fn pair_containers(
    old: &StructuralUnit,
    new: &StructuralUnit,
    table: &CompatibilityTable,
) -> HashMap<String, usize> {
    let mut pairs = HashMap::new();
    if old.kind == StructureKind::Xml {
        if let (Some(root), false) = (old.containers.first(), new.containers.is_empty()) {
            pairs.insert(root.key.clone(), 0);
        }
        return pairs;
    }

    let mut scored = Vec::new();
    for (i, o) in old.containers.iter().enumerate() {
        for (j, n) in new.containers.iter().enumerate() {
            if !same_family(old.kind, &o.key, &n.key) {
                continue;
            }
            let shared = old
                .members
                .iter()
                .filter(|m| m.key.container.as_deref() == Some(o.key.as_str()))
                .filter(|m| has_member(new, &n.key, m.key.kind, &translate_name(&m.key, table)))
                .count();
            scored.push((shared, i, j));
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut used = HashSet::new();
    for (_, i, j) in scored {
        let key = &old.containers[i].key;
        if pairs.contains_key(key) || used.contains(&j) {
            continue;
        }
        used.insert(j);
        pairs.insert(key.clone(), j);
    }
    pairs
}

/// Container key without its repeat ordinal: `impl User#2` -> `impl User`
fn base_key(key: &str) -> &str {
    match key.rsplit_once('#') {
        Some((base, ordinal)) if ordinal.chars().all(|c| c.is_ascii_digit()) => base,
        _ => key,
    }
}

fn same_family(kind: StructureKind, old: &str, new: &str) -> bool {
    match kind {
        StructureKind::Xml => true,
        StructureKind::Rust => base_key(old) == base_key(new),
    }
}

fn has_member(unit: &StructuralUnit, container: &str, kind: MemberKind, name: &str) -> bool {
    unit.members.iter().any(|m| {
        m.key.kind == kind && m.key.name == name && m.key.container.as_deref() == Some(container)
    })
}

/// An old member's name as it would appear in the new unit
fn translate_name(key: &MemberKey, table: &CompatibilityTable) -> String {
    match key.kind {
        MemberKind::Field => {
            let (base, ordinal) = match key.name.split_once('#') {
                Some((base, ordinal)) => (base, Some(ordinal)),
                None => (key.name.as_str(), None),
            };
            let base = table.translate(base);
            match ordinal {
                Some(ordinal) => format!("{}#{}", base, ordinal),
                None => base.to_string(),
            }
        }
        _ => key.name.clone(),
    }
}

/// Members carried into containers are found by key, everything from
/// `tail_start` on was appended
fn tag_custom(
    mut unit: StructuralUnit,
    carried: &[MemberKey],
    tail_start: usize,
) -> StructuralUnit {
    for member in &mut unit.members {
        if member.span.start >= tail_start || carried.contains(&member.key) {
            member.origin = Origin::Custom;
        }
    }
    unit
}

/// Pending insertions, keyed by byte offset into the new text
#[derive(Default)]
struct Splices {
    at: BTreeMap<usize, String>,
    commas: HashSet<usize>,
    tail: String,
}

impl Splices {
    fn insert(&mut self, pos: usize, text: String) {
        self.at.entry(pos).or_default().push_str(&text);
    }

    fn append(&mut self, new_text: &str, text: String) {
        if self.tail.is_empty() && !new_text.ends_with('\n') && !new_text.is_empty() {
            self.tail.push('\n');
        }
        self.tail.push('\n');
        self.tail.push_str(text.trim_start_matches('\n'));
        self.tail.push('\n');
    }

    fn into_container(&mut self, container: &Container, member: &Member, text: &str) {
        let mut body = if text.starts_with(char::is_whitespace) {
            text.to_string()
        } else {
            format!("{}{}", container.indent, text)
        };

        let separator = match member.key.kind {
            MemberKind::Field => {
                if let Some(pos) = container.comma_at {
                    if self.commas.insert(pos) {
                        self.insert(pos, ",".to_string());
                    }
                }
                body.push(',');
                ""
            }
            MemberKind::AssocItem => "\n",
            _ => "",
        };

        let piece = if container.inline_close {
            format!("\n{}{}\n", separator, body)
        } else {
            format!("{}{}\n", separator, body)
        };
        self.insert(container.insert_at, piece);
    }

    fn apply(self, new_text: &str) -> String {
        let mut out = String::with_capacity(new_text.len() + self.tail.len());
        let mut cursor = 0;
        for (pos, text) in &self.at {
            out.push_str(&new_text[cursor..*pos]);
            out.push_str(text);
            cursor = *pos;
        }
        out.push_str(&new_text[cursor..]);
        out.push_str(&self.tail);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATED: &str = "use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct User {
    pub id: i32,
    pub user_name: String,
}

impl User {
    pub fn new(id: i32, user_name: String) -> Self {
        Self { id, user_name }
    }
}
";

    fn existing() -> StructuralUnit {
        structure::parse(
            "use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct User {
    pub id: i64,
    pub userName: String,
    // not in the schema
    pub nickname: Option<String>,
}

impl User {
    pub fn new(id: i64, userName: String) -> Self {
        Self { id, userName, nickname: None }
    }

    // hand written
    pub fn helper(&self) -> String {
        format!(\"{}:{}\", self.id, self.userName)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, \"{}\", self.userName)
    }
}
",
            ArtifactKind::Entity,
        )
        .unwrap()
    }

    fn renames() -> CompatibilityTable {
        let mut table = CompatibilityTable::new();
        table.record("userName", "user_name");
        table
    }

    #[test]
    fn test_custom_members_are_carried() {
        let outcome = merge(GENERATED, &existing(), &renames(), ArtifactKind::Entity).unwrap();
        let text = &outcome.text;

        assert!(text.contains("    // not in the schema\n    pub nickname: Option<String>,\n}"));
        assert!(text.contains("    // hand written\n    pub fn helper(&self) -> String {"));
        assert!(text.contains("self.user_name)"));
        assert!(text.contains("use std::fmt;"));
        assert!(text.contains("impl fmt::Display for User"));
        assert!(!text.contains("userName"));
        // generated members win
        assert!(text.contains("pub id: i32,"));
        assert!(!text.contains("pub id: i64"));
        assert_eq!(text.matches("pub user_name: String").count(), 1);
        assert_eq!(outcome.carried_containers.len(), 1);
    }

    #[test]
    fn test_carried_members_are_tagged_custom() {
        let outcome = merge(GENERATED, &existing(), &renames(), ArtifactKind::Entity).unwrap();
        let custom: Vec<_> = outcome
            .unit
            .members
            .iter()
            .filter(|m| m.origin == Origin::Custom)
            .map(|m| m.key.name.clone())
            .collect();
        assert!(custom.contains(&"nickname".to_string()));
        assert!(custom.contains(&"helper".to_string()));
        assert!(custom.contains(&"fmt".to_string()));
        assert!(!custom.contains(&"id".to_string()));
    }

    #[test]
    fn test_merge_is_stable() {
        let first = merge(GENERATED, &existing(), &renames(), ArtifactKind::Entity).unwrap();
        let again = merge(
            GENERATED,
            &first.unit,
            &CompatibilityTable::new(),
            ArtifactKind::Entity,
        )
        .unwrap();
        assert_eq!(first.text, again.text);
    }

    #[test]
    fn test_missing_trailing_comma() {
        let generated = "pub struct A {\n    pub a: i32\n}\n";
        let old = structure::parse("pub struct A {\n    pub a: i32,\n    pub b: u8,\n}\n", ArtifactKind::Entity)
            .unwrap();
        let outcome = merge(generated, &old, &CompatibilityTable::new(), ArtifactKind::Entity).unwrap();
        assert_eq!(outcome.text, "pub struct A {\n    pub a: i32,\n    pub b: u8,\n}\n");
    }

    #[test]
    fn test_merge_mapper() {
        let generated = "<mapper namespace=\"User\">\n    <select id=\"findById\">SELECT 1</select>\n</mapper>\n";
        let old = structure::parse(
            "<mapper namespace=\"User\">\n    <select id=\"findById\">SELECT 0</select>\n    <select id=\"custom\">SELECT #{userName}</select>\n</mapper>\n",
            ArtifactKind::Mapper,
        )
        .unwrap();
        let outcome = merge(generated, &old, &renames(), ArtifactKind::Mapper).unwrap();
        assert_eq!(
            outcome.text,
            "<mapper namespace=\"User\">\n    <select id=\"findById\">SELECT 1</select>\n    <select id=\"custom\">SELECT #{user_name}</select>\n</mapper>\n"
        );
    }

    #[test]
    fn test_custom_impl_above_generated_impl() {
        let generated = "pub struct User {\n    pub id: i32,\n}\n\nimpl User {\n    pub const TABLE: &'static str = \"users\";\n}\n";
        let old = structure::parse(
            "pub struct User {\n    pub id: i32,\n}\n\nimpl User {\n    pub fn helper(&self) -> i32 {\n        self.id\n    }\n}\n\nimpl User {\n    pub const TABLE: &'static str = \"user\";\n}\n",
            ArtifactKind::Entity,
        )
        .unwrap();
        let outcome = merge(generated, &old, &CompatibilityTable::new(), ArtifactKind::Entity).unwrap();
        let text = &outcome.text;

        assert_eq!(text.matches("const TABLE").count(), 1);
        assert!(text.contains("\"users\""));
        assert!(!text.contains("\"user\""));
        assert!(text.contains("pub fn helper(&self) -> i32"));
        assert_eq!(outcome.carried_containers, vec!["impl User".to_string()]);

        let custom: Vec<_> = outcome
            .unit
            .members
            .iter()
            .filter(|m| m.origin == Origin::Custom)
            .map(|m| m.key.name.as_str())
            .collect();
        assert_eq!(custom, vec!["helper"]);
    }

    #[test]
    fn test_member_moved_between_impl_blocks_is_not_duplicated() {
        let generated = "pub struct A;\n\nimpl A {\n    pub fn a() {}\n}\n\nimpl A {\n    pub fn b() {}\n}\n";
        let old = structure::parse(
            "pub struct A;\n\nimpl A {\n    pub fn b() {}\n    pub fn mine() {}\n}\n\nimpl A {\n    pub fn a() {}\n}\n",
            ArtifactKind::Entity,
        )
        .unwrap();
        let outcome = merge(generated, &old, &CompatibilityTable::new(), ArtifactKind::Entity).unwrap();
        assert_eq!(outcome.text.matches("fn a()").count(), 1);
        assert_eq!(outcome.text.matches("fn b()").count(), 1);
        assert!(outcome
            .text
            .contains("impl A {\n    pub fn b() {}\n\n    pub fn mine() {}\n}"));
        assert!(outcome.carried_containers.is_empty());
    }

    #[test]
    fn test_hand_added_element_before_generated_one() {
        let generated = "<sqlMap>\n  <typeAlias alias=\"User\" type=\"app.User\"/>\n</sqlMap>\n";
        let old = structure::parse(
            "<sqlMap>\n  <typeAlias alias=\"Custom\" type=\"app.Custom\"/>\n  <typeAlias alias=\"User\" type=\"app.User\"/>\n</sqlMap>\n",
            ArtifactKind::Mapper,
        )
        .unwrap();
        let outcome = merge(generated, &old, &CompatibilityTable::new(), ArtifactKind::Mapper).unwrap();
        assert!(outcome.text.contains("alias=\"Custom\""));
        assert_eq!(outcome.text.matches("alias=\"User\"").count(), 1);
        assert_eq!(outcome.carried.len(), 1);
    }

    #[test]
    fn test_unparseable_generated_text() {
        let err = merge("pub struct {", &existing(), &renames(), ArtifactKind::Entity).unwrap_err();
        assert!(matches!(err, StructureError::Syntax { .. }));
    }
}
