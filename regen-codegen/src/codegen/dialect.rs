//! Mapper dialect conversion
//!
//! Templates may still emit legacy iBatis `sqlMap` documents. When the target
//! dialect is MyBatis, those are rewritten into `mapper` documents: elements
//! and attributes are renamed, dynamic SQL tags become `if`/`where`/`trim`/
//! `foreach`, and inline `#param#` placeholders become `#{param}`. The rewrite
//! splices the original text by quick-xml event positions so everything it
//! does not touch (comments, whitespace, CDATA) stays byte-for-byte.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodegenError, Result};

const MYBATIS_DOCTYPE: &str = r#"<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "http://mybatis.org/dtd/mybatis-3-mapper.dtd">"#;

const PREFIX_OVERRIDES: &str = "AND |OR ";

/// Mapper dialect of the generated project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MyBatis 3 `mapper` documents; legacy `sqlMap` output is converted
    #[default]
    Mybatis,
    /// iBatis 2 `sqlMap` documents, left as rendered
    Ibatis,
}

/// Convert `text` to the target dialect.
///
/// Only documents whose root is `sqlMap` are touched, and only for
/// [`Dialect::Mybatis`]; anything else is returned unchanged.
pub fn apply(dialect: Dialect, text: &str) -> Result<String> {
    if dialect != Dialect::Mybatis {
        return Ok(text.to_string());
    }
    Converter::new()?.convert(text)
}

struct Converter {
    iterate_param: Regex,
    jdbc_param: Regex,
    inline_param: Regex,
    literal_param: Regex,
}

impl Converter {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CodegenError::DialectError(e.to_string()))
        };
        Ok(Self {
            iterate_param: compile(r"#[\w.]+\[\](?:\.([\w.]+))?#")?,
            jdbc_param: compile(r"#([\w.]+):(\w+)#")?,
            inline_param: compile(r"#([\w.]+)#")?,
            literal_param: compile(r"\$([\w.]+)\$")?,
        })
    }

    fn convert(&self, text: &str) -> Result<String> {
        let mut reader = Reader::from_str(text);
        let mut out = String::with_capacity(text.len() + 64);
        let mut pending = String::new();
        // (original name, converted name) of every open element
        let mut open: Vec<(String, String)> = Vec::new();
        let mut seen_root = false;

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| {
                CodegenError::DialectError(format!("{} at byte {}", e, reader.error_position()))
            })?;
            let after = (reader.buffer_position() as usize).min(text.len());
            let raw = &text[before..after];

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let empty = matches!(event, Event::Empty(_));
                    if !seen_root {
                        seen_root = true;
                        if e.name().as_ref() != b"sqlMap" {
                            return Ok(text.to_string());
                        }
                        debug!("Converting sqlMap document to mapper");
                    }
                    self.flush(&mut out, &mut pending);

                    let original = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let element = rewrite_element(&original, &attributes(e)?)?;
                    out.push_str(&element.render(empty));
                    if !empty {
                        if let Some(body) = &element.body_prefix {
                            out.push_str(body);
                        }
                        open.push((original, element.name));
                    }
                }
                Event::End(_) => {
                    self.flush(&mut out, &mut pending);
                    let (original, converted) = open
                        .pop()
                        .ok_or_else(|| CodegenError::DialectError("unbalanced closing tag".into()))?;
                    if original == converted {
                        out.push_str(raw);
                    } else {
                        out.push_str(&format!("</{}>", converted));
                    }
                }
                Event::DocType(_) => {
                    self.flush(&mut out, &mut pending);
                    out.push_str(MYBATIS_DOCTYPE);
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) => {
                    self.flush(&mut out, &mut pending);
                    out.push_str(raw);
                }
                Event::Eof => break,
                // text, CDATA and entity references
                _ => pending.push_str(raw),
            }
        }
        self.flush(&mut out, &mut pending);

        if !open.is_empty() {
            return Err(CodegenError::DialectError(format!(
                "<{}> is never closed",
                open[open.len() - 1].0
            )));
        }
        if !seen_root {
            return Ok(text.to_string());
        }
        Ok(out)
    }

    fn flush(&self, out: &mut String, pending: &mut String) {
        if !pending.is_empty() {
            out.push_str(&self.placeholders(pending));
            pending.clear();
        }
    }

    /// Rewrite inline parameter placeholders
    fn placeholders(&self, text: &str) -> String {
        let text = self.iterate_param.replace_all(text, |caps: &Captures| match caps.get(1) {
            Some(property) => format!("#{{item.{}}}", property.as_str()),
            None => "#{item}".to_string(),
        });
        let text = self.jdbc_param.replace_all(&text, |caps: &Captures| {
            format!("#{{{},jdbcType={}}}", &caps[1], &caps[2])
        });
        let text = self
            .inline_param
            .replace_all(&text, |caps: &Captures| format!("#{{{}}}", &caps[1]));
        self.literal_param
            .replace_all(&text, |caps: &Captures| format!("${{{}}}", &caps[1]))
            .into_owned()
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<IndexMap<String, String>> {
    let mut attrs = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CodegenError::DialectError(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = std::str::from_utf8(&attr.value)
            .map_err(|e| CodegenError::DialectError(e.to_string()))?;
        attrs.insert(key, value.to_string());
    }
    Ok(attrs)
}

/// A converted start tag
#[derive(Debug)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    /// Text emitted right after the start tag (a converted `prepend`)
    body_prefix: Option<String>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            body_prefix: None,
        }
    }

    fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.push((key.to_string(), value.into()));
        self
    }

    fn render(&self, empty: bool) -> String {
        let mut tag = format!("<{}", self.name);
        for (key, value) in &self.attrs {
            tag.push_str(&format!(" {}=\"{}\"", key, value));
        }
        tag.push_str(if empty { "/>" } else { ">" });
        tag
    }
}

fn rewrite_element(name: &str, attrs: &IndexMap<String, String>) -> Result<Element> {
    let prepend = attrs.get("prepend").map(|p| p.trim()).filter(|p| !p.is_empty());

    let element = match name {
        "sqlMap" => renamed("mapper", attrs, &[]),
        "resultMap" => renamed(name, attrs, &[("class", "type")]),
        "dynamic" => match prepend {
            Some(p) if p.eq_ignore_ascii_case("where") => Element::new("where"),
            Some(p) => Element::new("trim")
                .attr("prefix", p)
                .attr("prefixOverrides", PREFIX_OVERRIDES),
            None => Element::new("trim").attr("prefixOverrides", PREFIX_OVERRIDES),
        },
        "iterate" => {
            let collection = attrs.get("property").map(String::as_str).unwrap_or("list");
            let mut open = String::new();
            if let Some(p) = prepend {
                open.push_str(p);
                open.push(' ');
            }
            open.push_str(attrs.get("open").map(String::as_str).unwrap_or(""));
            let mut element = Element::new("foreach")
                .attr("collection", collection)
                .attr("item", "item");
            if !open.trim().is_empty() {
                element = element.attr("open", open);
            }
            if let Some(separator) = attrs.get("conjunction") {
                element = element.attr("separator", separator.as_str());
            }
            if let Some(close) = attrs.get("close") {
                element = element.attr("close", close.as_str());
            }
            element
        }
        _ if is_conditional(name) => {
            let mut element = Element::new("if").attr("test", test_expression(name, attrs)?);
            element.body_prefix = prepend.map(|p| format!("{} ", p));
            element
        }
        _ => renamed(name, attrs, &[]),
    };
    Ok(element)
}

/// Keep the element, renaming class attributes to their MyBatis names
fn renamed(name: &str, attrs: &IndexMap<String, String>, extra: &[(&str, &str)]) -> Element {
    let mut element = Element::new(name);
    for (key, value) in attrs {
        let key = match key.as_str() {
            "parameterClass" => "parameterType",
            "resultClass" => "resultType",
            other => extra
                .iter()
                .find(|(from, _)| *from == other)
                .map(|(_, to)| *to)
                .unwrap_or(other),
        };
        element = element.attr(key, value.as_str());
    }
    element
}

fn is_conditional(name: &str) -> bool {
    matches!(
        name,
        "isNull"
            | "isNotNull"
            | "isEmpty"
            | "isNotEmpty"
            | "isEqual"
            | "isNotEqual"
            | "isGreaterThan"
            | "isGreaterEqual"
            | "isLessThan"
            | "isLessEqual"
            | "isPropertyAvailable"
            | "isNotPropertyAvailable"
            | "isParameterPresent"
            | "isNotParameterPresent"
    )
}

/// OGNL test for an iBatis conditional element
fn test_expression(name: &str, attrs: &IndexMap<String, String>) -> Result<String> {
    match name {
        "isParameterPresent" => return Ok("_parameter != null".into()),
        "isNotParameterPresent" => return Ok("_parameter == null".into()),
        _ => {}
    }

    let property = attrs
        .get("property")
        .ok_or_else(|| CodegenError::DialectError(format!("<{}> without a property", name)))?;

    let expression = match name {
        "isNull" => format!("{} == null", property),
        "isNotNull" => format!("{} != null", property),
        "isEmpty" => format!("{0} == null or {0} == ''", property),
        "isNotEmpty" => format!("{0} != null and {0} != ''", property),
        "isPropertyAvailable" => format!("_parameter.containsKey('{}')", property),
        "isNotPropertyAvailable" => format!("!_parameter.containsKey('{}')", property),
        _ => {
            let operator = match name {
                "isEqual" => "==",
                "isNotEqual" => "!=",
                "isGreaterThan" => "gt",
                "isGreaterEqual" => "gte",
                "isLessThan" => "lt",
                _ => "lte",
            };
            let operand = match (attrs.get("compareValue"), attrs.get("compareProperty")) {
                (Some(value), _) => literal(value),
                (None, Some(other)) => other.clone(),
                (None, None) => {
                    return Err(CodegenError::DialectError(format!(
                        "<{}> needs compareValue or compareProperty",
                        name
                    )))
                }
            };
            format!("{} {} {}", property, operator, operand)
        }
    };
    Ok(expression)
}

fn literal(value: &str) -> String {
    if value.parse::<f64>().is_ok() || value == "true" || value == "false" {
        value.to_string()
    } else {
        format!("'{}'", value)
    }
}
