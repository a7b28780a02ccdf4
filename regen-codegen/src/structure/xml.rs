//! Mapper XML structure via quick-xml
//!
//! Members are the children of the root element, keyed by tag name and `id`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::span::{extend_start, indent_at, line_start};
use super::{
    Container, KeyDisambiguator, Member, MemberKey, MemberKind, Origin, StructuralUnit,
    StructureError, StructureKind,
};

pub(super) fn parse(text: &str) -> Result<StructuralUnit, StructureError> {
    let mut reader = Reader::from_str(text);
    let mut keys = KeyDisambiguator::new();
    let mut members = Vec::new();

    let mut depth = 0usize;
    let mut root: Option<(String, usize)> = None;
    let mut root_close: Option<(usize, usize)> = None;
    let mut open: Option<(usize, String, String)> = None;
    let mut pending_comment: Option<usize> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(StructureError::Xml(format!(
                    "{} at byte {}",
                    e,
                    reader.error_position()
                )))
            }
        };
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                match depth {
                    0 => {
                        if root.is_some() {
                            return Err(StructureError::Xml("more than one root element".into()));
                        }
                        root = Some((tag_name(&e), tag_start(text, before)));
                    }
                    1 => {
                        let start = pending_comment.take().unwrap_or(tag_start(text, before));
                        let (name, signature) = element_key(&e)?;
                        open = Some((extend_start(text, start, "<!--"), name, signature));
                    }
                    _ => {}
                }
                depth += 1;
            }
            Event::Empty(e) => match depth {
                0 => {
                    return Err(StructureError::Xml(format!(
                        "root element <{}> is empty",
                        tag_name(&e)
                    )))
                }
                1 => {
                    let start = pending_comment.take().unwrap_or(tag_start(text, before));
                    let start = extend_start(text, start, "<!--");
                    let (name, signature) = element_key(&e)?;
                    let end = tag_end(text, after);
                    members.push((start..end, name, signature));
                }
                _ => {}
            },
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| StructureError::Xml("unbalanced closing tag".into()))?;
                match depth {
                    0 => root_close = Some((tag_start(text, before), tag_end(text, after))),
                    1 => {
                        if let Some((start, name, signature)) = open.take() {
                            members.push((start..tag_end(text, after), name, signature));
                        }
                    }
                    _ => {}
                }
            }
            Event::Comment(_) if depth == 1 => {
                pending_comment.get_or_insert(tag_start(text, before));
            }
            Event::Text(_) if depth == 1 => {
                let gap = &text[before..after.min(text.len())];
                // a blank line detaches a comment from the next element
                if !gap.trim().is_empty() || gap.matches('\n').count() > 1 {
                    pending_comment = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let Some((root_name, root_start)) = root else {
        return Err(StructureError::Xml("no root element".into()));
    };
    let Some((close, root_end)) = root_close else {
        return Err(StructureError::Xml(format!("<{}> is never closed", root_name)));
    };

    let close_line = line_start(text, close);
    let inline_close = !text[close_line..close].trim().is_empty();
    let indent = members
        .last()
        .map(|(span, _, _)| indent_at(text, span.end).to_string())
        .unwrap_or_else(|| format!("{}    ", indent_at(text, root_start)));

    let members = members
        .into_iter()
        .map(|(span, name, signature)| Member {
            key: MemberKey {
                kind: MemberKind::Element,
                container: Some(root_name.clone()),
                name: keys.unique(Some(root_name.as_str()), name),
            },
            signature,
            text: text[span.clone()].to_string(),
            span,
            origin: Origin::Generated,
        })
        .collect();

    Ok(StructuralUnit {
        kind: StructureKind::Xml,
        text: text.to_string(),
        members,
        containers: vec![Container {
            key: root_name,
            span: root_start..root_end,
            insert_at: if inline_close { close } else { close_line },
            inline_close,
            comma_at: None,
            indent,
        }],
        use_insert_at: text.len(),
    })
}

/// First `<` at or after `pos`
fn tag_start(text: &str, pos: usize) -> usize {
    let pos = pos.min(text.len());
    text[pos..].find('<').map(|i| pos + i).unwrap_or(pos)
}

/// Just past the last `>` before `pos`
fn tag_end(text: &str, pos: usize) -> usize {
    let pos = pos.min(text.len());
    text[..pos].rfind('>').map(|i| i + 1).unwrap_or(pos)
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// `tag#id` when the element has an id. Otherwise the tag followed by its
/// attributes sorted by name, `typeAlias[alias=User type=app.User]`, or the
/// bare tag when it has none.
fn element_key(e: &BytesStart<'_>) -> Result<(String, String), StructureError> {
    let tag = tag_name(e);
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| StructureError::Xml(e.to_string()))?;
        let value = std::str::from_utf8(&attr.value)
            .map_err(|e| StructureError::Xml(e.to_string()))?
            .trim()
            .to_string();
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "id" {
            return Ok((
                format!("{}#{}", tag, value),
                format!("<{} id=\"{}\">", tag, value),
            ));
        }
        attrs.push((key, value));
    }
    if attrs.is_empty() {
        return Ok((tag.clone(), format!("<{}>", tag)));
    }
    attrs.sort();
    let attrs = attrs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    Ok((format!("{}[{}]", tag, attrs), format!("<{} {}>", tag, attrs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "http://mybatis.org/dtd/mybatis-3-mapper.dtd">
<mapper namespace="UserMapper">
    <resultMap id="userMap" type="User">
        <id column="id" property="id"/>
    </resultMap>

    <select id="findById" resultMap="userMap">
        SELECT * FROM user WHERE id = #{id}
    </select>

    <!-- custom report -->
    <select id="countActive" resultType="int">
        SELECT COUNT(*) FROM user WHERE active = 1
    </select>
    <sql id="columns"/>
</mapper>
"#;

    #[test]
    fn test_root_children_are_members() {
        let unit = parse(MAPPER).unwrap();
        let names: Vec<_> = unit.members.iter().map(|m| m.key.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["resultMap#userMap", "select#findById", "select#countActive", "sql#columns"]
        );
        assert_eq!(unit.containers[0].key, "mapper");
    }

    #[test]
    fn test_member_text_includes_comment() {
        let unit = parse(MAPPER).unwrap();
        let custom = &unit.members[2];
        assert!(custom.text.starts_with("    <!-- custom report -->\n    <select"));
        assert!(custom.text.ends_with("</select>"));
        assert_eq!(unit.members[3].text, "    <sql id=\"columns\"/>");
    }

    #[test]
    fn test_root_insert_point() {
        let unit = parse(MAPPER).unwrap();
        let root = &unit.containers[0];
        assert!(unit.text[root.insert_at..].starts_with("</mapper>"));
        assert_eq!(root.indent, "    ");
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            parse("<mapper><select id=\"a\"></mapper>"),
            Err(StructureError::Xml(_))
        ));
        assert!(matches!(parse("<mapper>"), Err(StructureError::Xml(_))));
    }

    #[test]
    fn test_repeated_elements_without_id() {
        let unit = parse(
            "<sqlMap>\n  <typeAlias type=\"a.B\" alias=\"b\"/>\n  <typeAlias alias=\"a\"/>\n  <typeAlias alias=\"a\"/>\n  <cacheModel/>\n</sqlMap>",
        )
        .unwrap();
        let names: Vec<_> = unit.members.iter().map(|m| m.key.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "typeAlias[alias=b type=a.B]",
                "typeAlias[alias=a]",
                "typeAlias[alias=a]#2",
                "cacheModel"
            ]
        );
    }
}
