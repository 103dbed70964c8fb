//! Open/close pairing of block tags.
//!
//! Matching searches from the most recent entry backwards for the nearest
//! open tag with the same name. This is deliberately looser than a stack:
//! in `{% if %}{% for %}{% endif %}{% endfor %}` the `endif` closes the `if`
//! and leaves the `for` open for the `endfor`.

use crate::token::{Diagnostic, ParseError, Span};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    node: usize,
    span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    entries: Vec<Entry>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an opened block tag. `span` locates its open delimiter.
    pub fn open(&mut self, name: &str, node: usize, span: Span) {
        self.entries.push(Entry {
            name: name.to_string(),
            node,
            span,
        });
    }

    /// Close the nearest open tag named `name`, returning its node index.
    pub fn close(&mut self, name: &str) -> Option<usize> {
        let index = self.entries.iter().rposition(|entry| entry.name == name)?;
        Some(self.entries.remove(index).node)
    }

    /// Name of the innermost open tag.
    pub fn parent(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget entries opened at or after `offset`, for re-scanning from an edit.
    pub fn truncate_from(&mut self, offset: usize) {
        self.entries.retain(|entry| entry.span.start < offset);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drain every unmatched tag into a `MissingEndTag` diagnostic ending at `end`.
    pub fn flush(&mut self, end: usize) -> Vec<Diagnostic> {
        let diagnostics: Vec<Diagnostic> = self
            .entries
            .drain(..)
            .map(|entry| Diagnostic {
                kind: ParseError::MissingEndTag,
                span: Span { end, ..entry.span },
                tag: entry.name,
            })
            .collect();
        if !diagnostics.is_empty() {
            debug!(count = diagnostics.len(), "unmatched block tags");
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(start: usize) -> Span {
        Span::new(start, start + 2, 1, start + 1)
    }

    #[test]
    fn test_matches_nearest_same_name() {
        let mut h = Hierarchy::new();
        h.open("if", 0, at(0));
        h.open("for", 1, at(10));
        h.open("if", 2, at(20));
        assert_eq!(h.close("if"), Some(2));
        assert_eq!(h.close("if"), Some(0));
        assert_eq!(h.parent(), Some("for"));
        assert_eq!(h.close("if"), None);
    }

    #[test]
    fn test_interleaved_close_is_tolerated() {
        let mut h = Hierarchy::new();
        h.open("if", 0, at(0));
        h.open("for", 1, at(10));
        assert_eq!(h.close("if"), Some(0));
        assert_eq!(h.close("for"), Some(1));
        assert!(h.is_empty());
    }

    #[test]
    fn test_flush_reports_each_unmatched() {
        let mut h = Hierarchy::new();
        h.open("if", 0, at(0));
        h.open("capture", 1, at(12));
        let diagnostics = h.flush(40);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].kind, ParseError::MissingEndTag);
        assert_eq!(diagnostics[0].tag, "if");
        assert_eq!(diagnostics[0].span, Span::new(0, 40, 1, 1));
        assert_eq!(diagnostics[1].span.start, 12);
        assert!(h.is_empty());
        assert!(diagnostics[0].to_string().contains("'if'"));
    }

    #[test]
    fn test_truncate_from() {
        let mut h = Hierarchy::new();
        h.open("if", 0, at(0));
        h.open("for", 1, at(10));
        h.truncate_from(5);
        assert_eq!(h.len(), 1);
        assert_eq!(h.parent(), Some("if"));
    }
}
