//! Character stream driven by the scanner.
//!
//! Offsets are byte offsets into the source and always sit on a char
//! boundary. The stream keeps a token start alongside the cursor: capturing
//! operations move the start to the cursor before consuming, so after any
//! successful capture `token()` is exactly the consumed text. Non-capturing
//! moves (`forward`, `skip_whitespace`) leave the start where it was, which
//! lets a caller `mark()` once and grow a token across several moves.

use crate::token::Span;
use memchr::memmem;
use std::ops::Range;

/// Kind of numeric literal read by [`Stream::number`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Integer,
    Float,
}

/// Result of [`Stream::quoted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoted {
    /// Not at a quote; nothing consumed.
    None,
    /// Consumed a terminated string, quotes included.
    Closed,
    /// Consumed an unterminated string up to a stop pattern or end of input.
    Open,
}

pub struct Stream<'a> {
    source: &'a str,
    pos: usize,
    start: usize,
    lines: Vec<usize>,
}

pub(crate) fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '?'
}

impl<'a> Stream<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lines = vec![0];
        lines.extend(memchr::memchr_iter(b'\n', source.as_bytes()).map(|i| i + 1));
        Self {
            source,
            pos: 0,
            start: 0,
            lines,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn is_eos(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Move the cursor (and token start) to an absolute offset.
    pub fn jump(&mut self, offset: usize) {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset += 1;
        }
        self.pos = offset;
        self.start = offset;
    }

    /// Begin a token at the cursor.
    pub fn mark(&mut self) {
        self.start = self.pos;
    }

    /// Begin the current token at an earlier offset.
    pub fn rewind_start(&mut self, offset: usize) {
        self.start = offset.min(self.pos);
    }

    pub fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn peek_str(&self, pattern: &str) -> bool {
        self.rest().starts_with(pattern)
    }

    pub fn is_next(&self, pred: impl Fn(char) -> bool) -> bool {
        self.peek().is_some_and(pred)
    }

    /// Move `n` chars without touching the token start.
    pub fn forward(&mut self, n: usize) -> usize {
        let bytes: usize = self.rest().chars().take(n).map(char::len_utf8).sum();
        self.pos += bytes;
        bytes
    }

    /// Capture the next `n` chars as the token.
    pub fn advance(&mut self, n: usize) -> bool {
        self.mark();
        self.forward(n) > 0
    }

    /// Capture up to an absolute offset.
    pub fn until(&mut self, offset: usize) -> bool {
        self.mark();
        self.extend_to(offset)
    }

    /// Move the cursor to an absolute offset, keeping the token start.
    pub fn extend_to(&mut self, offset: usize) -> bool {
        let offset = offset.min(self.source.len());
        if offset <= self.pos {
            return false;
        }
        self.pos = offset;
        true
    }

    /// Capture the rest of the input.
    pub fn to_end(&mut self) -> bool {
        self.until(self.source.len())
    }

    pub fn if_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance(1)
        } else {
            false
        }
    }

    pub fn if_str(&mut self, pattern: &str) -> bool {
        if self.peek_str(pattern) {
            self.until(self.pos + pattern.len())
        } else {
            false
        }
    }

    /// Like [`Stream::if_str`] but the pattern must end on a word boundary.
    pub fn if_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.until(self.pos + word.len())
        } else {
            false
        }
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.peek_str(word)
            && !self.rest()[word.len()..]
                .chars()
                .next()
                .is_some_and(is_identifier_char)
    }

    /// Capture the longest run of chars matching `pred`.
    pub fn consume_while(&mut self, pred: impl Fn(char) -> bool) -> bool {
        let len = self
            .rest()
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map_or(self.rest().len(), |(i, _)| i);
        self.until(self.pos + len)
    }

    /// Capture a run of spaces and tabs.
    pub fn whitespace(&mut self) -> bool {
        self.consume_while(|c| c == ' ' || c == '\t')
    }

    /// Capture a run of line breaks.
    pub fn newlines(&mut self) -> bool {
        self.consume_while(|c| c == '\n' || c == '\r')
    }

    /// Skip spaces, tabs and line breaks without capturing.
    pub fn skip_whitespace(&mut self) -> bool {
        let len = self.rest().len() - self.rest().trim_start().len();
        self.pos += len;
        len > 0
    }

    pub fn identifier(&mut self) -> bool {
        if !self.is_next(is_identifier_start) {
            return false;
        }
        self.consume_while(is_identifier_char)
    }

    /// Peek at the identifier under the cursor without consuming it.
    pub fn peek_identifier(&self) -> Option<&'a str> {
        let rest = self.rest();
        if !rest.chars().next().is_some_and(is_identifier_start) {
            return None;
        }
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_identifier_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        Some(&rest[..len])
    }

    /// Capture an integer or float literal with an optional leading minus.
    /// A `.` only belongs to the number when a digit follows it.
    pub fn number(&mut self) -> Option<Number> {
        let bytes = self.rest().as_bytes();
        let mut i = usize::from(bytes.first() == Some(&b'-'));
        let digits = i;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        if i == digits {
            return None;
        }
        let mut kind = Number::Integer;
        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            i += 1;
            while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            kind = Number::Float;
        }
        self.until(self.pos + i);
        Some(kind)
    }

    /// Capture a single or double quoted string.
    ///
    /// When no closing quote exists before the earliest of `stops`, the
    /// string is unterminated and everything up to that stop is consumed.
    pub fn quoted(&mut self, stops: &[&str]) -> Quoted {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Quoted::None,
        };
        let body = self.pos + 1;
        let limit = self.earliest(body, stops).unwrap_or(self.source.len());
        match self.source[body..limit].find(quote) {
            Some(i) => {
                self.until(body + i + 1);
                Quoted::Closed
            }
            None => {
                self.until(limit);
                Quoted::Open
            }
        }
    }

    /// Absolute offset of `pattern` at or after the cursor, unless one of
    /// `stops` occurs first.
    pub fn find(&self, pattern: &str, stops: &[&str]) -> Option<usize> {
        let found = memmem::find(self.rest().as_bytes(), pattern.as_bytes())? + self.pos;
        match self.earliest(self.pos, stops) {
            Some(stop) if stop < found => None,
            _ => Some(found),
        }
    }

    /// Absolute offset of the first of `needles` at or after the cursor.
    pub fn seek(&self, needles: &[u8]) -> Option<usize> {
        let hay = self.rest().as_bytes();
        let found = match *needles {
            [a] => memchr::memchr(a, hay),
            [a, b] => memchr::memchr2(a, b, hay),
            [a, b, c] => memchr::memchr3(a, b, c, hay),
            _ => hay.iter().position(|byte| needles.contains(byte)),
        };
        found.map(|i| i + self.pos)
    }

    fn earliest(&self, from: usize, patterns: &[&str]) -> Option<usize> {
        let hay = &self.source.as_bytes()[from..];
        patterns
            .iter()
            .filter_map(|p| memmem::find(hay, p.as_bytes()))
            .min()
            .map(|i| i + from)
    }

    /// Text of the current token.
    pub fn token(&self) -> &'a str {
        &self.source[self.start..self.pos]
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.pos
    }

    pub fn slice(&self, range: Range<usize>) -> &'a str {
        &self.source[range]
    }

    /// 1-based line and column (in chars) of an offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = self.lines.partition_point(|&start| start <= offset);
        let line_start = self.lines[line - 1];
        let column = self.source[line_start..offset].chars().count() + 1;
        (line, column)
    }

    /// Span of the current token.
    pub fn span(&self) -> Span {
        let (line, column) = self.position(self.start);
        Span::new(self.start, self.pos, line, column)
    }

    /// Span between two absolute offsets.
    pub fn span_of(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.position(start);
        Span::new(start, end, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_advance_captures() {
        let mut s = Stream::new("héllo");
        assert!(s.advance(2));
        assert_eq!(s.token(), "hé");
        assert_eq!(s.offset(), 3);
        assert!(s.advance(10));
        assert_eq!(s.token(), "llo");
        assert!(s.is_eos());
        assert!(!s.advance(1));
    }

    #[test]
    fn test_mark_and_forward_grow_token() {
        let mut s = Stream::new("abc def");
        s.mark();
        s.forward(3);
        s.skip_whitespace();
        s.forward(1);
        assert_eq!(s.token(), "abc d");
    }

    #[test]
    fn test_jump_lands_on_char_boundary() {
        let mut s = Stream::new("aé b");
        s.jump(2);
        assert_eq!(s.offset(), 3);
        s.jump(100);
        assert!(s.is_eos());
    }

    #[test]
    fn test_conditional_consume() {
        let mut s = Stream::new("inx in");
        assert!(!s.if_word("in"));
        assert!(s.if_str("in"));
        assert!(s.if_char('x'));
        assert!(!s.if_char('x'));
        assert!(s.whitespace());
        assert!(s.if_word("in"));
    }

    #[test]
    fn test_identifier() {
        let mut s = Stream::new("product-card_2? rest");
        assert_eq!(s.peek_identifier(), Some("product-card_2?"));
        assert!(s.identifier());
        assert_eq!(s.token(), "product-card_2?");
        assert!(!s.identifier());
        let mut s = Stream::new("9lives");
        assert!(!s.identifier());
    }

    #[test]
    fn test_numbers() {
        let mut s = Stream::new("-12.5");
        assert_eq!(s.number(), Some(Number::Float));
        assert_eq!(s.token(), "-12.5");

        let mut s = Stream::new("1..5");
        assert_eq!(s.number(), Some(Number::Integer));
        assert_eq!(s.token(), "1");

        let mut s = Stream::new("-x");
        assert_eq!(s.number(), None);
        assert_eq!(s.offset(), 0);
    }

    #[test]
    fn test_quoted() {
        let mut s = Stream::new(r#""a b" }}"#);
        assert_eq!(s.quoted(&["}}"]), Quoted::Closed);
        assert_eq!(s.token(), r#""a b""#);

        let mut s = Stream::new(r#"'open }} 'x'"#);
        assert_eq!(s.quoted(&["}}"]), Quoted::Open);
        assert_eq!(s.token(), "'open ");

        let mut s = Stream::new("x");
        assert_eq!(s.quoted(&[]), Quoted::None);
    }

    #[test]
    fn test_find_respects_stops() {
        let s = Stream::new("a }} {{ b %}");
        assert_eq!(s.find("}}", &["{{"]), Some(2));
        assert_eq!(s.find("%}", &["{{", "{%"]), None);
        assert_eq!(s.find("%}", &[]), Some(10));
        assert_eq!(s.seek(b"{%"), Some(5));
    }

    #[test]
    fn test_position() {
        let mut s = Stream::new("ab\ncd\n\nef");
        assert_eq!(s.position(0), (1, 1));
        assert_eq!(s.position(4), (2, 2));
        assert_eq!(s.position(6), (3, 1));
        s.jump(7);
        s.advance(2);
        assert_eq!(s.span(), Span::new(7, 9, 4, 1));
    }

    #[test]
    fn test_whitespace_and_newlines() {
        let mut s = Stream::new(" \t\r\n\nx");
        assert!(s.whitespace());
        assert_eq!(s.token(), " \t");
        assert!(s.newlines());
        assert_eq!(s.token(), "\r\n\n");
        assert!(!s.whitespace());
    }
}
