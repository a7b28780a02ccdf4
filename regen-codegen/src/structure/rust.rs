//! Rust source structure via syn
//!
//! Spans come from proc-macro2's `span-locations`, which lets every member be
//! sliced out of the original text instead of being re-printed.

use std::ops::Range;

use proc_macro2::extra::DelimSpan;
use proc_macro2::Span;
use quote::ToTokens;
use syn::{Fields, ImplItem, Item, TraitItem};

use super::span::{extend_start, indent_at, line_end, line_start, LineIndex};
use super::{
    Container, KeyDisambiguator, Member, MemberKey, MemberKind, Origin, StructuralUnit,
    StructureError, StructureKind,
};

const BOM: &str = "\u{feff}";

pub(super) fn parse(text: &str) -> Result<StructuralUnit, StructureError> {
    let base = if text.starts_with(BOM) { BOM.len() } else { 0 };
    let source = &text[base..];
    let file: syn::File = syn::parse_str(source).map_err(syntax_error)?;

    let mut builder = Builder {
        source,
        index: LineIndex::new(source),
        keys: KeyDisambiguator::new(),
        members: Vec::new(),
        containers: Vec::new(),
        last_use_end: None,
        first_item_start: None,
    };
    for item in &file.items {
        builder.item(item);
    }

    let use_insert_at = builder
        .last_use_end
        .or(builder.first_item_start)
        .unwrap_or(source.len());

    let mut unit = StructuralUnit {
        kind: StructureKind::Rust,
        text: text.to_string(),
        members: builder.members,
        containers: builder.containers,
        use_insert_at,
    };
    if base > 0 {
        shift(&mut unit, base);
    }
    Ok(unit)
}

fn syntax_error(err: syn::Error) -> StructureError {
    let start = err.span().start();
    StructureError::Syntax {
        line: start.line,
        column: start.column + 1,
        message: err.to_string(),
    }
}

fn shift(unit: &mut StructuralUnit, by: usize) {
    for member in &mut unit.members {
        member.span = member.span.start + by..member.span.end + by;
    }
    for container in &mut unit.containers {
        container.span = container.span.start + by..container.span.end + by;
        container.insert_at += by;
        container.comma_at = container.comma_at.map(|p| p + by);
    }
    unit.use_insert_at += by;
}

struct Builder<'a> {
    source: &'a str,
    index: LineIndex<'a>,
    keys: KeyDisambiguator,
    members: Vec<Member>,
    containers: Vec<Container>,
    last_use_end: Option<usize>,
    first_item_start: Option<usize>,
}

impl Builder<'_> {
    fn pos(&self, span: Span) -> usize {
        self.index.offset(span.start())
    }

    /// Byte range from the first to the last token of a node
    fn token_range(&self, node: &impl ToTokens) -> Option<Range<usize>> {
        let mut tokens = node.to_token_stream().into_iter();
        let first = tokens.next()?;
        let last = tokens.last().unwrap_or_else(|| first.clone());
        let start = self.index.offset(first.span().start());
        let end = self.index.offset(last.span().end());
        (start <= end).then_some(start..end)
    }

    /// Token range widened over leading comments
    fn member_range(&self, node: &impl ToTokens) -> Option<(Range<usize>, usize)> {
        let range = self.token_range(node)?;
        let start = extend_start(self.source, range.start, "//");
        Some((start..range.end, range.start))
    }

    fn item(&mut self, item: &Item) {
        let Some((span, _)) = self.member_range(item) else {
            return;
        };
        self.first_item_start.get_or_insert(span.start);

        match item {
            Item::Struct(s) => match &s.fields {
                Fields::Named(named) => {
                    let key = self.keys.unique(None, format!("struct {}", s.ident));
                    let mut last = None;
                    for field in &named.named {
                        let Some((range, token_start)) = self.member_range(field) else {
                            continue;
                        };
                        let name = field
                            .ident
                            .as_ref()
                            .map(|i| i.to_string())
                            .unwrap_or_default();
                        let signature =
                            format!("{}: {}", name, field.ty.to_token_stream());
                        let name = self.keys.unique(Some(key.as_str()), name);
                        last = Some((token_start, range.end));
                        self.push(MemberKind::Field, Some(key.as_str()), name, signature, range);
                    }
                    self.container(key, span, &named.brace_token.span, last, true);
                }
                _ => self.push_item(MemberKind::Item, format!("struct {}", s.ident), item, span),
            },
            Item::Impl(imp) => {
                let self_ty = imp.self_ty.to_token_stream();
                let name = match &imp.trait_ {
                    Some((bang, path, _)) => format!(
                        "impl {}{} for {}",
                        if bang.is_some() { "!" } else { "" },
                        path.to_token_stream(),
                        self_ty
                    ),
                    None => format!("impl {}", self_ty),
                };
                let key = self.keys.unique(None, name);
                let mut last = None;
                for assoc in &imp.items {
                    let (name, signature) = impl_item_name(assoc);
                    last = self.push_assoc(&key, name, signature, assoc).or(last);
                }
                self.container(key, span, &imp.brace_token.span, last, false);
            }
            Item::Trait(t) => {
                let key = self.keys.unique(None, format!("trait {}", t.ident));
                let mut last = None;
                for assoc in &t.items {
                    let (name, signature) = trait_item_name(assoc);
                    last = self.push_assoc(&key, name, signature, assoc).or(last);
                }
                self.container(key, span, &t.brace_token.span, last, false);
            }
            Item::Use(u) => {
                self.last_use_end = Some(line_end(self.source, span.end));
                self.push_item(MemberKind::Use, format!("use {}", u.tree.to_token_stream()), item, span);
            }
            other => self.push_item(MemberKind::Item, item_name(other), item, span),
        }
    }

    fn push_item(&mut self, kind: MemberKind, name: String, item: &Item, span: Range<usize>) {
        let signature = match item {
            Item::Fn(f) => f.sig.to_token_stream().to_string(),
            _ => name.clone(),
        };
        let name = self.keys.unique(None, name);
        self.push(kind, None, name, signature, span);
    }

    fn push_assoc(
        &mut self,
        container: &str,
        name: String,
        signature: String,
        node: &impl ToTokens,
    ) -> Option<(usize, usize)> {
        let (range, token_start) = self.member_range(node)?;
        let end = range.end;
        let name = self.keys.unique(Some(container), name);
        self.push(MemberKind::AssocItem, Some(container), name, signature, range);
        Some((token_start, end))
    }

    fn push(
        &mut self,
        kind: MemberKind,
        container: Option<&str>,
        name: String,
        signature: String,
        span: Range<usize>,
    ) {
        self.members.push(Member {
            key: MemberKey {
                kind,
                container: container.map(String::from),
                name,
            },
            signature,
            text: self.source[span.clone()].to_string(),
            span,
            origin: Origin::Generated,
        });
    }

    /// Register a braced container; `last` is the token range of its last member
    fn container(
        &mut self,
        key: String,
        span: Range<usize>,
        braces: &DelimSpan,
        last: Option<(usize, usize)>,
        fields: bool,
    ) {
        let open = self.pos(braces.open());
        let close = self.pos(braces.close());
        let close_line = line_start(self.source, close);
        let inline_close = !self.source[close_line..close].trim().is_empty();
        let insert_at = if inline_close { close } else { close_line };

        let comma_at = match last {
            Some((_, end)) if fields && !self.source[end..close].trim_start().starts_with(',') => {
                Some(end)
            }
            _ => None,
        };
        let indent = match last {
            Some((start, _)) if !inline_close => indent_at(self.source, start).to_string(),
            _ => format!("{}    ", indent_at(self.source, open)),
        };

        self.containers.push(Container {
            key,
            span,
            insert_at,
            inline_close,
            comma_at,
            indent,
        });
    }
}

fn impl_item_name(item: &ImplItem) -> (String, String) {
    match item {
        ImplItem::Fn(f) => (f.sig.ident.to_string(), f.sig.to_token_stream().to_string()),
        ImplItem::Const(c) => (format!("const {}", c.ident), format!("const {}: {}", c.ident, c.ty.to_token_stream())),
        ImplItem::Type(t) => (format!("type {}", t.ident), format!("type {}", t.ident)),
        ImplItem::Macro(m) => {
            let name = format!("{}!", m.mac.path.to_token_stream());
            (name.clone(), name)
        }
        other => {
            let text = other.to_token_stream().to_string();
            (text.clone(), text)
        }
    }
}

fn trait_item_name(item: &TraitItem) -> (String, String) {
    match item {
        TraitItem::Fn(f) => (f.sig.ident.to_string(), f.sig.to_token_stream().to_string()),
        TraitItem::Const(c) => (format!("const {}", c.ident), format!("const {}: {}", c.ident, c.ty.to_token_stream())),
        TraitItem::Type(t) => (format!("type {}", t.ident), format!("type {}", t.ident)),
        TraitItem::Macro(m) => {
            let name = format!("{}!", m.mac.path.to_token_stream());
            (name.clone(), name)
        }
        other => {
            let text = other.to_token_stream().to_string();
            (text.clone(), text)
        }
    }
}

fn item_name(item: &Item) -> String {
    match item {
        Item::Fn(f) => format!("fn {}", f.sig.ident),
        Item::Const(c) => format!("const {}", c.ident),
        Item::Static(s) => format!("static {}", s.ident),
        Item::Enum(e) => format!("enum {}", e.ident),
        Item::Type(t) => format!("type {}", t.ident),
        Item::Mod(m) => format!("mod {}", m.ident),
        Item::Union(u) => format!("union {}", u.ident),
        Item::TraitAlias(t) => format!("trait {}", t.ident),
        Item::ExternCrate(e) => format!("extern crate {}", e.ident),
        Item::Macro(m) => match &m.ident {
            Some(ident) => format!("macro_rules! {}", ident),
            None => format!("{}!", m.mac.path.to_token_stream()),
        },
        other => other.to_token_stream().to_string(),
    }
}
