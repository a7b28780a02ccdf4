//! Byte offsets for parser positions

use proc_macro2::LineColumn;

/// Maps `LineColumn` positions (1-based line, 0-based char column) to byte offsets
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    pub(crate) fn offset(&self, pos: LineColumn) -> usize {
        let Some(&start) = pos
            .line
            .checked_sub(1)
            .and_then(|line| self.line_starts.get(line))
        else {
            return self.text.len();
        };
        let line = &self.text[start..];
        let line = line.split('\n').next().unwrap_or_default();
        start
            + line
                .char_indices()
                .nth(pos.column)
                .map(|(i, _)| i)
                .unwrap_or(line.len())
    }
}

/// Start of the line containing `pos`
pub(crate) fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// End of the line containing `pos`, before the newline
pub(crate) fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len())
}

/// Widen a member start to its line start and the comment lines directly above it.
///
/// Only applies when nothing but whitespace precedes `pos` on its line; a blank
/// line ends the comment block.
pub(crate) fn extend_start(text: &str, pos: usize, comment_prefix: &str) -> usize {
    let mut start = line_start(text, pos);
    if !text[start..pos].trim().is_empty() {
        return pos;
    }
    while start > 0 {
        let prev = line_start(text, start - 1);
        let line = text[prev..start].trim();
        // inner doc comments belong to the enclosing module
        if line.is_empty() || !line.starts_with(comment_prefix) || line.starts_with("//!") {
            break;
        }
        start = prev;
    }
    start
}

/// Leading whitespace of the line containing `pos`
pub(crate) fn indent_at(text: &str, pos: usize) -> &str {
    let start = line_start(text, pos);
    let line = &text[start..line_end(text, start)];
    &line[..line.len() - line.trim_start().len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let text = "ab\nçd\nef";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(LineColumn { line: 1, column: 1 }), 1);
        assert_eq!(index.offset(LineColumn { line: 2, column: 1 }), 5);
        assert_eq!(index.offset(LineColumn { line: 3, column: 2 }), text.len());
        assert_eq!(index.offset(LineColumn { line: 9, column: 0 }), text.len());
    }

    #[test]
    fn test_extend_start_over_comments() {
        let text = "fn a() {}\n\n// one\n// two\n    fn b() {}\n";
        let pos = text.find("fn b").unwrap();
        let start = extend_start(text, pos, "//");
        assert!(text[start..].starts_with("// one"));

        let inline = "let x = 1; fn c() {}";
        let pos = inline.find("fn c").unwrap();
        assert_eq!(extend_start(inline, pos, "//"), pos);
    }

    #[test]
    fn test_indent_at() {
        let text = "struct A {\n    x: i32,\n}";
        assert_eq!(indent_at(text, text.find('x').unwrap()), "    ");
        assert_eq!(indent_at(text, 0), "");
    }
}
