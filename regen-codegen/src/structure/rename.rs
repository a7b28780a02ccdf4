//! Identifier renaming inside carried member text

use std::ops::Range;
use std::str::FromStr;

use indexmap::IndexMap;
use proc_macro2::{TokenStream, TokenTree};
use regex::{Captures, Regex};
use tracing::warn;

use super::span::LineIndex;
use super::StructureKind;

/// Rename identifiers in `text` through `renames` (old name to new name).
///
/// Rust text is renamed token by token, so string literals and comments are
/// left alone. In XML only property references are renamed: parameter
/// placeholders (`#{name}`, `${name}`, `#name#`, `$name$`) and the values of
/// `property`, `test`, `collection`, `keyProperty` and `compareProperty`.
/// SQL column names stay as they are. Text that cannot be lexed is returned
/// unchanged.
pub fn rename_identifiers(
    text: &str,
    renames: &IndexMap<String, String>,
    kind: StructureKind,
) -> String {
    if renames.is_empty() {
        return text.to_string();
    }
    match kind {
        StructureKind::Rust => rename_rust(text, renames),
        StructureKind::Xml => rename_xml(text, renames),
    }
}

fn rename_rust(text: &str, renames: &IndexMap<String, String>) -> String {
    let stream = match TokenStream::from_str(text) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot lex carried member, keeping its identifiers: {}", e);
            return text.to_string();
        }
    };

    let index = LineIndex::new(text);
    let mut edits = Vec::new();
    collect_idents(stream, text, &index, renames, &mut edits);

    let mut out = text.to_string();
    edits.sort_by_key(|(range, _)| range.start);
    for (range, new) in edits.into_iter().rev() {
        out.replace_range(range, new);
    }
    out
}

fn collect_idents<'r>(
    stream: TokenStream,
    text: &str,
    index: &LineIndex<'_>,
    renames: &'r IndexMap<String, String>,
    edits: &mut Vec<(Range<usize>, &'r str)>,
) {
    for tree in stream {
        match tree {
            TokenTree::Group(group) => collect_idents(group.stream(), text, index, renames, edits),
            TokenTree::Ident(ident) => {
                let name = ident.to_string();
                let bare = name.strip_prefix("r#").unwrap_or(&name);
                let Some(new) = renames.get(bare) else {
                    continue;
                };
                let span = ident.span();
                let range = index.offset(span.start())..index.offset(span.end());
                // synthesized tokens (doc attributes) do not point at their own text
                if text.get(range.clone()) == Some(name.as_str()) {
                    edits.push((range, new.as_str()));
                }
            }
            _ => {}
        }
    }
}

const XML_REFERENCES: &str = r#"#\{[^}]*\}|\$\{[^}]*\}|#[\w.\[\]:]+#|\$[\w.]+\$|\b(?:property|test|collection|keyProperty|compareProperty)\s*=\s*"[^"]*""#;

fn rename_xml(text: &str, renames: &IndexMap<String, String>) -> String {
    let references = match Regex::new(XML_REFERENCES) {
        Ok(re) => re,
        Err(e) => {
            warn!("Cannot build reference pattern, keeping names: {}", e);
            return text.to_string();
        }
    };
    references
        .replace_all(text, |caps: &Captures<'_>| rename_words(&caps[0], renames))
        .into_owned()
}

fn rename_words(text: &str, renames: &IndexMap<String, String>) -> String {
    let mut names: Vec<&str> = renames.keys().map(String::as_str).collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&format!(r"\b(?:{})\b", alternation)) {
        Ok(re) => re
            .replace_all(text, |caps: &Captures<'_>| {
                renames
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        Err(e) => {
            warn!("Cannot build rename pattern, keeping names: {}", e);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_rename_rust_tokens_only() {
        let text = "    // userName is shown\n    pub fn helper(&self) -> String {\n        format!(\"userName={}\", self.userName)\n    }";
        let renamed = rename_identifiers(text, &table(&[("userName", "user_name")]), StructureKind::Rust);
        assert!(renamed.contains("self.user_name)"));
        assert!(renamed.contains("\"userName={}\""));
        assert!(renamed.contains("// userName is shown"));
    }

    #[test]
    fn test_rename_is_single_pass() {
        let renames = table(&[("a", "b"), ("b", "c")]);
        assert_eq!(rename_identifiers("a + b", &renames, StructureKind::Rust), "b + c");
        assert_eq!(
            rename_identifiers("<x property=\"a\">#{b}</x>", &renames, StructureKind::Xml),
            "<x property=\"b\">#{c}</x>"
        );
    }

    #[test]
    fn test_rename_xml_references_only() {
        let renamed = rename_identifiers(
            "<if test=\"userName != null\">userName = #{userName}, #userNames#</if>",
            &table(&[("userName", "user_name")]),
            StructureKind::Xml,
        );
        assert_eq!(
            renamed,
            "<if test=\"user_name != null\">userName = #{user_name}, #userNames#</if>"
        );
    }

    #[test]
    fn test_empty_table_is_identity() {
        let text = "fn x() {}";
        assert_eq!(rename_identifiers(text, &IndexMap::new(), StructureKind::Rust), text);
    }
}
