use crate::brackets::Brackets;
use crate::grammar::Grammar;
use crate::hierarchy::Hierarchy;
use crate::stream::{is_identifier_char, is_identifier_start, Number, Quoted, Stream};
use crate::token::{Diagnostic, ParseError, ScanState, Span, Token, TokenType};
use tagline_spec::{ArgumentKind, Expect, Language, TagKind, ValueType};
use tracing::{debug, trace};

/// Open delimiters. Recovery never consumes across one of these.
const OPENERS: &[&str] = &["{{", "{%"];

const COMPARISONS: &[&str] = &["==", "!=", "<>", ">=", "<=", ">", "<"];

const LOGICAL: &[&str] = &["contains", "and", "or"];

/// A tag body that is passed over verbatim until its end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Skip {
    name: String,
    token: TokenType,
}

/// Everything produced by a full scan of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Lexed {
    pub fn kinds(&self) -> Vec<TokenType> {
        self.tokens.iter().map(|t| t.kind).collect()
    }

    pub fn errors(&self) -> Vec<ParseError> {
        self.tokens.iter().filter_map(|t| t.error).collect()
    }
}

/// Liquid template scanner.
///
/// Pull-based: each [`Scanner::scan`] call produces at most one token and
/// leaves the scanner ready for the next call. Literal markup between tags
/// is passed over without producing tokens. Grammar violations never abort
/// scanning; they surface as `ParseError` tokens and scanning resumes inside
/// or after the offending tag.
pub struct Scanner<'a, G: Grammar> {
    stream: Stream<'a>,
    grammar: G,
    state: ScanState,
    /// Body being skipped verbatim (`comment`, `raw`, embedded tags).
    skip: Option<Skip>,
    /// State to resume once an object path is exhausted.
    ret: Option<ScanState>,
    error: Option<ParseError>,
    brackets: Brackets,
    hierarchy: Hierarchy,
    diagnostics: Vec<Diagnostic>,
    tag_start: usize,
    /// The open tag is `{{ }}` rather than `{% %}`.
    output: bool,
    node: usize,
    nodes: usize,
    pair: Option<usize>,
    flushed: bool,
}

impl<'a, G: Grammar> Scanner<'a, G> {
    pub fn new(source: &'a str, grammar: G) -> Self {
        Self {
            stream: Stream::new(source),
            grammar,
            state: ScanState::CharSeq,
            skip: None,
            ret: None,
            error: None,
            brackets: Brackets::new(),
            hierarchy: Hierarchy::new(),
            diagnostics: Vec::new(),
            tag_start: 0,
            output: false,
            node: 0,
            nodes: 0,
            pair: None,
            flushed: false,
        }
    }

    /// Scan a whole document.
    pub fn tokenize(source: &'a str, grammar: G) -> Lexed {
        let mut scanner = Scanner::new(source, grammar);
        let tokens = scanner.tokens().collect();
        Lexed {
            tokens,
            diagnostics: scanner.diagnostics,
        }
    }

    /// Produce the next token.
    ///
    /// A non-zero `offset` repositions the stream first. `None` means a run
    /// of literal text was passed over; [`Scanner::range`] covers it and the
    /// caller should keep scanning. Returns `Some(TokenType::Eos)` once the
    /// input is exhausted.
    pub fn scan(&mut self, offset: usize) -> Option<TokenType> {
        if offset > 0 {
            self.stream.jump(offset);
        }

        let token = if self.stream.is_eos() {
            self.end_of_stream()
        } else if self.state == ScanState::CharSeq {
            self.char_seq()
        } else {
            self.tag()
        };

        if token != Some(TokenType::ParseError) {
            self.error = None;
        }
        if let Some(kind) = token {
            trace!(?kind, state = ?self.state, range = ?self.stream.range(), "token");
        }
        token
    }

    /// Tokens from the cursor to the end of the document, `Eos` excluded.
    pub fn tokens(&mut self) -> Tokens<'_, 'a, G> {
        Tokens { scanner: self }
    }

    /// Clear all state and rewind to the start of the document.
    pub fn reset(&mut self) {
        self.rewind(0);
        self.hierarchy.clear();
        self.nodes = 0;
    }

    /// Resume literal scanning at `offset`, forgetting block tags opened at
    /// or after it. `offset` must not fall inside a tag or a skipped body.
    pub fn rewind(&mut self, offset: usize) {
        self.stream.jump(offset);
        self.state = ScanState::CharSeq;
        self.skip = None;
        self.ret = None;
        self.error = None;
        self.brackets.clear();
        self.hierarchy.truncate_from(offset);
        self.diagnostics.clear();
        self.tag_start = offset;
        self.pair = None;
        self.flushed = false;
        self.grammar.reset_filter();
        self.grammar.release_object();
    }

    /// State the next [`Scanner::scan`] call starts in.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Text of the most recent token.
    pub fn token(&self) -> &'a str {
        self.stream.token()
    }

    /// Byte offset where the most recent token starts.
    pub fn start(&self) -> usize {
        self.stream.start()
    }

    /// Byte offset of the cursor, which is where the most recent token ends.
    pub fn end(&self) -> usize {
        self.stream.offset()
    }

    /// Byte range of the most recent token or literal run.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.stream.range()
    }

    /// [`Scanner::range`] with the line and column of its start.
    pub fn span(&self) -> Span {
        self.stream.span()
    }

    /// Diagnostic carried by the most recent token, if it is a `ParseError`.
    pub fn error(&self) -> Option<ParseError> {
        self.error
    }

    /// 1-based line of the most recent token.
    pub fn line(&self) -> usize {
        self.stream.position(self.stream.start()).0
    }

    /// 1-based line and column of the most recent token.
    pub fn position(&self) -> (usize, usize) {
        self.stream.position(self.stream.start())
    }

    /// Source from the start of the current tag to the cursor.
    pub fn tag_text(&self) -> &'a str {
        self.stream.slice(self.tag_start..self.stream.offset())
    }

    /// Node index of the block tag closed by the latest end tag.
    pub fn pair(&self) -> Option<usize> {
        self.pair
    }

    /// Deferred diagnostics. Filled once the end of the document is reached.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The dialect the scanner validates against.
    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    fn end_of_stream(&mut self) -> Option<TokenType> {
        let in_tag = !matches!(
            self.state,
            ScanState::CharSeq
                | ScanState::HtmlTagOpen
                | ScanState::HtmlAttributeName
                | ScanState::HtmlAttributeOperator
                | ScanState::HtmlAttributeValue
                | ScanState::HtmlTagClose
                | ScanState::HtmlTagCloseName
        );
        if in_tag && self.brackets.close().is_some() {
            return self.report_here(ParseError::MissingBracketNotation, self.state);
        }
        if in_tag {
            self.close_tag();
            self.stream.mark();
            return self.report(ParseError::MissingCloseDelimiter, ScanState::CharSeq);
        }
        self.state = ScanState::CharSeq;
        if !self.flushed {
            self.flushed = true;
            let end = self.stream.source().len();
            self.diagnostics.extend(self.hierarchy.flush(end));
        }
        Some(TokenType::Eos)
    }

    // --- Literal text ---

    fn char_seq(&mut self) -> Option<TokenType> {
        if self.skip.is_some() {
            return self.skip_body();
        }

        if self.stream.peek_str("{{") {
            return Some(self.open_tag(true));
        }
        if self.stream.peek_str("{%") {
            return Some(self.open_tag(false));
        }
        let associates = self.grammar.has_associates();
        if associates && self.stream.peek() == Some('<') {
            if self.stream.peek_at(1) == Some('/')
                && self.stream.peek_at(2).is_some_and(is_identifier_start)
            {
                self.state = ScanState::HtmlTagClose;
                return self.tag();
            }
            if self.stream.peek_at(1).is_some_and(is_identifier_start) {
                self.state = ScanState::HtmlTagOpen;
                return self.tag();
            }
        }

        // Literal run up to the next character that may start a tag.
        let needles: &[u8] = if associates { b"{<" } else { b"{" };
        self.stream.mark();
        self.stream.forward(1);
        let end = self
            .stream
            .seek(needles)
            .unwrap_or(self.stream.source().len());
        self.stream.extend_to(end);
        None
    }

    fn open_tag(&mut self, output: bool) -> TokenType {
        self.stream.advance(2);
        self.tag_start = self.stream.start();
        self.output = output;
        self.node = self.nodes;
        self.nodes += 1;
        self.ret = None;
        self.pair = None;
        self.brackets.clear();
        self.grammar.reset_filter();
        if output {
            self.grammar.set_expect(Expect::Object);
            self.state = ScanState::AfterOutputTagOpen;
        } else {
            self.grammar.set_expect(Expect::Tag);
            self.state = ScanState::AfterTagOpen;
        }
        TokenType::DelimiterOpen
    }

    fn skip_body(&mut self) -> Option<TokenType> {
        let skip = self.skip.clone()?;
        match self.find_end_tag(&skip.name) {
            Some(at) => {
                self.skip = None;
                self.stream.until(at).then_some(skip.token)
            }
            None => self.stream.to_end().then_some(skip.token),
        }
    }

    /// Offset of the next `{% end<name> %}` open delimiter.
    fn find_end_tag(&self, name: &str) -> Option<usize> {
        let rest = self.stream.rest();
        let mut from = 0;
        while let Some(i) = memchr::memmem::find(&rest.as_bytes()[from..], b"{%") {
            let at = from + i;
            let inner = rest[at + 2..].trim_start_matches('-').trim_start();
            let after = inner
                .strip_prefix("end")
                .and_then(|s| s.strip_prefix(name));
            if after.is_some_and(|s| !s.chars().next().is_some_and(is_identifier_char)) {
                return Some(self.stream.offset() + at);
            }
            from = at + 2;
        }
        None
    }

    // --- Tag content ---

    fn tag(&mut self) -> Option<TokenType> {
        if self.stream.whitespace() {
            return Some(TokenType::Whitespace);
        }
        if self.stream.newlines() {
            return Some(TokenType::Newline);
        }

        loop {
            match self.state {
                ScanState::CharSeq => return self.char_seq(),

                ScanState::AfterOutputTagOpen => {
                    if self.at_trim_left() {
                        self.stream.advance(1);
                        return Some(TokenType::TrimDashLeft);
                    }
                    self.stream.mark();
                    self.state = ScanState::BeforeOutputTagName;
                    return Some(TokenType::ObjectTag);
                }

                ScanState::AfterTagOpen => {
                    if self.at_trim_left() {
                        self.stream.advance(1);
                        return Some(TokenType::TrimDashLeft);
                    }
                    let is_end = self
                        .stream
                        .peek_identifier()
                        .is_some_and(|name| name.len() > 3 && name.starts_with("end"));
                    self.state = if is_end {
                        ScanState::BeforeEndTagName
                    } else {
                        ScanState::BeforeStartTagName
                    };
                }

                ScanState::BeforeOutputTagName => {
                    if self.at_close() {
                        return self.report_here(ParseError::MissingTagName, ScanState::TagClose);
                    }
                    if let Some(token) = self.value(ScanState::Filter, TokenType::Object) {
                        return Some(token);
                    }
                    self.unexpected();
                }

                ScanState::BeforeStartTagName => return self.start_tag_name(),

                ScanState::BeforeEndTagName => {
                    self.stream.identifier();
                    let name = self.stream.token();
                    let opened = name.strip_prefix("end").unwrap_or(name);
                    self.pair = self.hierarchy.close(opened);
                    if self.pair.is_none() {
                        debug!(name, "end tag without open tag");
                    }
                    self.stream.rewind_start(self.tag_start);
                    self.state = ScanState::EndTagClose;
                    return Some(TokenType::EndTag);
                }

                ScanState::HtmlTagOpen => return Some(self.html_tag_open()),
                ScanState::HtmlTagClose => return Some(self.html_tag_close()),

                ScanState::HtmlAttributeName => {
                    if self.stream.if_char('>') || self.stream.if_str("/>") {
                        let parent = self.hierarchy.parent().map(str::to_string);
                        if let Some(name) = parent.filter(|_| self.stream.token() == "/>") {
                            self.hierarchy.close(&name);
                        }
                        self.state = ScanState::CharSeq;
                        return Some(TokenType::HtmlStartTagClose);
                    }
                    if OPENERS.iter().any(|o| self.stream.peek_str(o)) {
                        self.state = ScanState::CharSeq;
                        return self.char_seq();
                    }
                    if self.stream.consume_while(|c| {
                        !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '{')
                    }) {
                        self.state = ScanState::HtmlAttributeOperator;
                        return Some(TokenType::HtmlAttributeName);
                    }
                    self.stream.advance(1);
                    self.state = ScanState::CharSeq;
                    return Some(TokenType::ParseCancel);
                }

                ScanState::HtmlAttributeOperator => {
                    if self.stream.if_char('=') {
                        self.state = ScanState::HtmlAttributeValue;
                        return Some(TokenType::HtmlOperatorValue);
                    }
                    self.state = ScanState::HtmlAttributeName;
                }

                ScanState::HtmlAttributeValue => {
                    match self.stream.quoted(OPENERS) {
                        Quoted::Closed => {
                            self.state = ScanState::HtmlAttributeName;
                            return Some(TokenType::HtmlAttributeValue);
                        }
                        // A tag inside the value is scanned as a tag; the
                        // rest of the markup tag is literal text.
                        Quoted::Open if OPENERS.iter().any(|o| self.stream.peek_str(o)) => {
                            self.state = ScanState::CharSeq;
                            return Some(TokenType::HtmlAttributeValue);
                        }
                        Quoted::Open => {
                            self.state = ScanState::CharSeq;
                            return Some(TokenType::ParseCancel);
                        }
                        Quoted::None => {}
                    }
                    self.state = ScanState::HtmlAttributeName;
                    let rest = self.stream.rest();
                    let mut len = rest
                        .find(|c: char| c.is_whitespace() || c == '>')
                        .unwrap_or(rest.len());
                    let opener = OPENERS.iter().filter_map(|o| rest[..len].find(*o)).min();
                    if let Some(at) = opener {
                        len = at;
                    }
                    if len > 0 {
                        self.stream.until(self.stream.offset() + len);
                        return Some(TokenType::HtmlAttributeValue);
                    }
                }

                ScanState::HtmlTagCloseName => {
                    self.state = ScanState::CharSeq;
                    if self.stream.if_char('>') {
                        return Some(TokenType::HtmlEndTagClose);
                    }
                    self.stream.mark();
                    return Some(TokenType::ParseCancel);
                }

                ScanState::Iteration => {
                    if self.stream.identifier() {
                        self.state = ScanState::IterationOperator;
                        return Some(TokenType::IterationIteree);
                    }
                    if self.at_close() {
                        return self.report_here(
                            ParseError::MissingIterationIteree,
                            ScanState::TagClose,
                        );
                    }
                    self.fail(ParseError::MissingIterationIteree);
                }

                ScanState::IterationOperator => {
                    if self.stream.if_word("in") {
                        self.state = ScanState::IterationArray;
                        return Some(TokenType::IterationOperator);
                    }
                    if self.at_close() {
                        return self.report_here(ParseError::InvalidOperator, ScanState::TagClose);
                    }
                    self.fail(ParseError::InvalidOperator);
                }

                ScanState::IterationArray => {
                    if self.at_close() {
                        return self
                            .report_here(ParseError::MissingIterationArray, ScanState::TagClose);
                    }
                    if self.stream.peek() == Some('(') {
                        return self.iteration_range();
                    }
                    if self.stream.identifier() {
                        self.reference(ScanState::IterationParameter, TokenType::Variable);
                        return Some(TokenType::IterationArray);
                    }
                    self.fail(ParseError::MissingIterationArray);
                }

                ScanState::IterationParameter => {
                    if self.at_close() {
                        self.state = ScanState::TagClose;
                        continue;
                    }
                    if self.stream.identifier() {
                        return match self.grammar.parameter(self.stream.token()) {
                            Some(true) => {
                                self.state = ScanState::IterationParameterValue;
                                Some(TokenType::IterationParameter)
                            }
                            Some(false) => Some(TokenType::IterationParameter),
                            None => self.report(
                                ParseError::InvalidParameter,
                                ScanState::IterationParameter,
                            ),
                        };
                    }
                    self.unexpected();
                }

                ScanState::IterationParameterValue => {
                    if self.stream.if_char(':') {
                        return Some(TokenType::FilterOperator);
                    }
                    let after_colon = self.stream.source()[..self.stream.offset()]
                        .trim_end()
                        .ends_with(':');
                    if self.at_close() {
                        return self
                            .report_here(ParseError::MissingParameterValue, ScanState::TagClose);
                    }
                    if !after_colon {
                        self.fail(ParseError::MissingColon);
                        continue;
                    }
                    if self.stream.number().is_some() {
                        self.state = ScanState::IterationParameter;
                        return Some(TokenType::IterationParameterValue);
                    }
                    if self.stream.identifier() {
                        self.reference(ScanState::IterationParameter, TokenType::Variable);
                        return Some(TokenType::IterationParameterValue);
                    }
                    self.fail(ParseError::MissingParameterValue);
                }

                ScanState::VariableIdentifier => {
                    if self.stream.identifier() {
                        self.state = ScanState::VariableOperator;
                        return Some(TokenType::VariableIdentifier);
                    }
                    if self.at_close() {
                        return self
                            .report_here(ParseError::InvalidObjectName, ScanState::TagClose);
                    }
                    self.fail(ParseError::InvalidObjectName);
                }

                ScanState::VariableOperator => {
                    if self.stream.if_char('=') {
                        self.state = ScanState::VariableAssignment;
                        return Some(TokenType::VariableOperator);
                    }
                    if self.at_close() {
                        if self.grammar.has_arguments() && !self.grammar.is_block() {
                            return self
                                .report_here(ParseError::MissingAssignment, ScanState::TagClose);
                        }
                        self.state = ScanState::TagClose;
                        continue;
                    }
                    self.fail(ParseError::InvalidOperator);
                }

                ScanState::VariableAssignment => {
                    if self.at_close() {
                        return self
                            .report_here(ParseError::MissingAssignment, ScanState::TagClose);
                    }
                    if let Some(token) = self.value(ScanState::Filter, TokenType::Variable) {
                        return Some(token);
                    }
                    self.unexpected();
                }

                ScanState::EmbeddedLanguage => {
                    self.state = if self.grammar.has_arguments() {
                        ScanState::GotoTagEnd
                    } else {
                        ScanState::TagClose
                    };
                }

                ScanState::Control => {
                    self.state = if self.grammar.has_arguments() {
                        ScanState::ControlCondition
                    } else {
                        ScanState::TagClose
                    };
                }

                ScanState::ControlCondition => {
                    if self.at_close() {
                        return self
                            .report_here(ParseError::MissingCondition, ScanState::TagClose);
                    }
                    if let Some(token) = self.value(ScanState::ControlOperator, TokenType::Variable)
                    {
                        return Some(token);
                    }
                    self.unexpected();
                }

                ScanState::ControlOperator => {
                    if self.at_close() {
                        self.state = ScanState::TagClose;
                        continue;
                    }
                    let matched = COMPARISONS.iter().any(|op| self.stream.if_str(op))
                        || LOGICAL.iter().any(|op| self.stream.if_word(op));
                    if matched {
                        self.state = ScanState::ControlCondition;
                        return Some(TokenType::ControlOperator);
                    }
                    if self.stream.if_char(',') {
                        self.state = ScanState::ControlCondition;
                        return Some(TokenType::Separator);
                    }
                    self.fail(ParseError::InvalidOperator);
                }

                ScanState::Object => {
                    let next = self.stream.peek_at(1);
                    match self.stream.peek() {
                        Some('.') if next.is_some_and(is_identifier_start) => {
                            self.stream.advance(1);
                            self.state = ScanState::ObjectDotNotation;
                            return Some(TokenType::ObjectDotNotation);
                        }
                        Some('.') if next == Some('.') => self.fail(ParseError::InvalidCharacter),
                        Some('.') => self.fail(ParseError::MissingProperty),
                        Some('[') => {
                            self.brackets.open(self.stream.offset());
                            self.stream.advance(1);
                            self.state = ScanState::ObjectBracketNotation;
                            return Some(TokenType::ObjectBracketNotationOpen);
                        }
                        Some(']') if self.brackets.is_empty() => {
                            self.fail(ParseError::InvalidCharacter)
                        }
                        _ if !self.brackets.is_empty() => {
                            self.state = ScanState::ObjectBracketNotationEnd;
                        }
                        _ => {
                            self.grammar.release_object();
                            self.state = self.ret.take().unwrap_or(ScanState::TagClose);
                        }
                    }
                }

                ScanState::ObjectDotNotation => {
                    if !self.stream.identifier() {
                        self.fail(ParseError::MissingProperty);
                        continue;
                    }
                    self.state = ScanState::Object;
                    return match self.grammar.property(self.stream.token()) {
                        Some(false) => self.report(ParseError::UnknownProperty, ScanState::Object),
                        _ => Some(TokenType::ObjectProperty),
                    };
                }

                ScanState::ObjectBracketNotation => return self.bracket_property(),

                ScanState::ObjectBracketNotationEnd => {
                    if self.stream.peek() == Some(']') {
                        let Some(bracket) = self.brackets.close() else {
                            self.fail(ParseError::InvalidCharacter);
                            continue;
                        };
                        if bracket.dynamic {
                            self.grammar.release_object();
                        }
                        self.stream.advance(1);
                        self.state = ScanState::Object;
                        return Some(TokenType::ObjectBracketNotationClose);
                    }
                    if self.at_close() || self.tag_end().is_none() {
                        self.state = ScanState::TagClose;
                        continue;
                    }
                    self.fail(ParseError::InvalidProperty);
                }

                ScanState::Filter => {
                    if self.stream.if_char('|') {
                        self.state = ScanState::FilterIdentifier;
                        return Some(TokenType::Filter);
                    }
                    if self.at_close() {
                        self.state = ScanState::TagClose;
                        continue;
                    }
                    self.unexpected();
                }

                ScanState::FilterIdentifier => {
                    if !self.stream.identifier() {
                        if self.at_close() {
                            return self.report_here(ParseError::MissingFilter, ScanState::TagClose);
                        }
                        self.fail(ParseError::MissingFilter);
                        continue;
                    }
                    self.grammar.set_expect(Expect::Filter);
                    if !self.grammar.cursor(self.stream.token()) {
                        return self.report(ParseError::InvalidFilter, ScanState::GotoTagEnd);
                    }
                    self.state = ScanState::FilterOperator;
                    return Some(TokenType::FilterIdentifier);
                }

                ScanState::FilterOperator => {
                    if self.stream.peek() == Some(':') {
                        if !self.grammar.filter_has_arguments() {
                            self.fail(ParseError::RejectFilterArguments);
                            continue;
                        }
                        self.stream.advance(1);
                        self.state = ScanState::FilterArgumentType;
                        return Some(TokenType::FilterOperator);
                    }
                    let required = self.grammar.filter_requires_arguments();
                    self.grammar.reset_filter();
                    if required {
                        return self.report_here(ParseError::MissingColon, ScanState::Filter);
                    }
                    self.state = ScanState::Filter;
                }

                ScanState::FilterArgumentType => {
                    self.state = match self.grammar.argument() {
                        Some(ArgumentKind::Parameter) => ScanState::GotoTagEnd,
                        Some(_) => ScanState::FilterArgument,
                        None => ScanState::TagClose,
                    };
                }

                ScanState::FilterArgument => return self.filter_argument(),

                ScanState::FilterSeparator => {
                    let spread = self.grammar.argument() == Some(ArgumentKind::Spread);
                    if self.stream.peek() == Some(',') {
                        if self.grammar.is_last() && !spread {
                            self.fail(ParseError::InvalidCharacter);
                            continue;
                        }
                        self.stream.advance(1);
                        if !spread {
                            self.grammar.next_argument();
                        }
                        self.state = ScanState::FilterArgumentType;
                        return Some(TokenType::Separator);
                    }
                    if self.at_close() || self.stream.peek() == Some('|') {
                        let missing = !spread
                            && !self.grammar.is_last()
                            && self.grammar.next_argument()
                            && self.grammar.is_required();
                        self.grammar.reset_filter();
                        if missing {
                            return self
                                .report_here(ParseError::MissingFilterArgument, ScanState::Filter);
                        }
                        self.state = ScanState::Filter;
                        continue;
                    }
                    if self.tag_end().is_none() {
                        self.state = ScanState::TagClose;
                        continue;
                    }
                    self.fail(ParseError::MissingFilterSeparator);
                }

                // Parameters are passed over rather than validated.
                ScanState::FilterParameter
                | ScanState::FilterParameterOperator
                | ScanState::FilterParameterValue => {
                    self.state = ScanState::GotoTagEnd;
                }

                ScanState::GotoTagEnd | ScanState::TagUnknown => {
                    self.ret = None;
                    self.stream.mark();
                    let end = self.recovery_end();
                    self.state = ScanState::TagClose;
                    if self.stream.extend_to(end) {
                        return Some(TokenType::ParseSkip);
                    }
                }

                ScanState::ParseError => {
                    self.stream.mark();
                    let end = self.recovery_end();
                    self.stream.extend_to(end);
                    self.state = ScanState::TagClose;
                    return Some(TokenType::ParseError);
                }

                ScanState::TagClose | ScanState::EndTagClose => return self.tag_close(),
            }
        }
    }

    fn start_tag_name(&mut self) -> Option<TokenType> {
        if self.at_close() {
            return self.report_here(ParseError::MissingTagName, ScanState::TagClose);
        }
        if self.stream.peek() == Some('#') {
            self.stream.mark();
            let end = self.recovery_end();
            self.stream.extend_to(end);
            self.state = ScanState::TagClose;
            return Some(TokenType::Comment);
        }
        if !self.stream.identifier() {
            self.fail(ParseError::InvalidTagName);
            return self.tag();
        }

        let name = self.stream.token();
        self.grammar.set_expect(Expect::Tag);
        if !self.grammar.cursor(name) {
            self.state = ScanState::TagUnknown;
            return Some(TokenType::Unknown);
        }

        let kind = self.grammar.kind().unwrap_or(TagKind::Other);
        let misplaced =
            self.grammar.has_placement() && !self.grammar.in_parent(self.hierarchy.parent());
        if self.grammar.is_block() {
            let span = self.stream.span_of(self.tag_start, self.tag_start + 2);
            self.hierarchy.open(name, self.node, span);
        }

        let (state, token) = if self.grammar.is_singular() {
            (ScanState::GotoTagEnd, TokenType::SingularTag)
        } else {
            match kind {
                TagKind::Comment => {
                    self.skip_until_end(name, TokenType::Comment);
                    (ScanState::GotoTagEnd, TokenType::Comment)
                }
                TagKind::Raw => {
                    self.skip_until_end(name, TokenType::Raw);
                    (ScanState::GotoTagEnd, TokenType::StartTag)
                }
                TagKind::Embedded => {
                    let body = match self.grammar.language() {
                        Some(Language::Json) => TokenType::EmbeddedJson,
                        Some(Language::Css) => TokenType::EmbeddedCss,
                        Some(Language::Javascript) => TokenType::EmbeddedJavascript,
                        None => TokenType::Embedded,
                    };
                    self.skip_until_end(name, body);
                    (ScanState::EmbeddedLanguage, TokenType::Embedded)
                }
                TagKind::Control => (ScanState::Control, TokenType::Control),
                TagKind::Iteration => (ScanState::Iteration, TokenType::Iteration),
                TagKind::Variable => (ScanState::VariableIdentifier, TokenType::VariableKeyword),
                TagKind::Output => (ScanState::BeforeOutputTagName, TokenType::StartTag),
                TagKind::Import | TagKind::Other if self.grammar.has_arguments() => {
                    (ScanState::GotoTagEnd, TokenType::StartTag)
                }
                TagKind::Import | TagKind::Other => (ScanState::TagClose, TokenType::StartTag),
            }
        };

        self.state = state;
        if misplaced {
            return self.report(ParseError::InvalidPlacement, state);
        }
        Some(token)
    }

    fn skip_until_end(&mut self, name: &str, token: TokenType) {
        self.skip = Some(Skip {
            name: name.to_string(),
            token,
        });
    }

    /// Read a value literal or an object path head.
    ///
    /// Literals continue at `next`. Identifiers enter the object path with
    /// `next` as its return state and are emitted as `Object` when the
    /// dialect knows them, otherwise as `bare`. `None` when nothing matched.
    fn value(&mut self, next: ScanState, bare: TokenType) -> Option<TokenType> {
        let stops = self.string_stops();
        match self.stream.quoted(&stops) {
            Quoted::Closed => {
                self.state = next;
                return Some(TokenType::String);
            }
            Quoted::Open => return self.report(ParseError::MissingQuotation, ScanState::TagClose),
            Quoted::None => {}
        }
        if self.stream.number().is_some() {
            self.state = next;
            return Some(TokenType::Number);
        }
        if self.stream.if_word("true") || self.stream.if_word("false") {
            self.state = next;
            return Some(TokenType::Boolean);
        }
        if self.stream.identifier() {
            return Some(self.reference(next, bare));
        }
        None
    }

    /// Enter the object path for the identifier just consumed.
    fn reference(&mut self, ret: ScanState, bare: TokenType) -> TokenType {
        let name = self.stream.token();
        self.grammar.set_expect(Expect::Object);
        let known = self.grammar.cursor(name);
        self.ret = Some(ret);
        self.state = ScanState::Object;
        if known {
            TokenType::Object
        } else {
            bare
        }
    }

    fn bracket_property(&mut self) -> Option<TokenType> {
        if self.stream.peek() == Some(']') {
            return self.report_here(
                ParseError::MissingProperty,
                ScanState::ObjectBracketNotationEnd,
            );
        }
        if self.at_close() {
            return self.report_here(ParseError::MissingProperty, ScanState::TagClose);
        }

        self.state = ScanState::ObjectBracketNotationEnd;
        let stops = self.string_stops();
        match self.stream.quoted(&stops) {
            Quoted::Closed => {
                let token = self.stream.token();
                let key = &token[1..token.len() - 1];
                if key.is_empty() {
                    return self.report(
                        ParseError::MissingProperty,
                        ScanState::ObjectBracketNotationEnd,
                    );
                }
                return match self.grammar.property(key) {
                    Some(false) => self.report(
                        ParseError::UnknownProperty,
                        ScanState::ObjectBracketNotationEnd,
                    ),
                    _ => Some(TokenType::ObjectPropertyString),
                };
            }
            Quoted::Open => return self.report(ParseError::MissingQuotation, ScanState::TagClose),
            Quoted::None => {}
        }

        self.grammar.release_object();
        if self.stream.number().is_some() {
            return Some(TokenType::ObjectPropertyNumber);
        }
        if self.stream.identifier() {
            self.brackets.set_dynamic();
            let name = self.stream.token();
            self.grammar.set_expect(Expect::Object);
            let known = self.grammar.cursor(name);
            self.state = ScanState::Object;
            return Some(if known {
                TokenType::Object
            } else {
                TokenType::Variable
            });
        }

        self.unexpected();
        self.tag()
    }

    fn filter_argument(&mut self) -> Option<TokenType> {
        let at_close = self.at_close();
        if at_close || self.stream.peek() == Some('|') {
            self.grammar.reset_filter();
            let next = if at_close {
                ScanState::TagClose
            } else {
                ScanState::Filter
            };
            return self.report_here(ParseError::MissingFilterArgument, next);
        }

        let stops = self.string_stops();
        match self.stream.quoted(&stops) {
            Quoted::Closed => {
                return self.accept(ValueType::String, TokenType::String, ParseError::RejectString)
            }
            Quoted::Open => return self.report(ParseError::MissingQuotation, ScanState::TagClose),
            Quoted::None => {}
        }
        match self.stream.number() {
            Some(Number::Integer) => {
                return self.accept(
                    ValueType::Integer,
                    TokenType::Integer,
                    ParseError::RejectInteger,
                )
            }
            Some(Number::Float) => {
                return self.accept(ValueType::Float, TokenType::Float, ParseError::RejectNumber)
            }
            None => {}
        }
        if self.stream.if_word("true") || self.stream.if_word("false") {
            return self.accept(ValueType::Boolean, TokenType::Boolean, ParseError::RejectBoolean);
        }
        if self.stream.identifier() {
            if !self.grammar.accepts(ValueType::Reference) {
                return self.report(ParseError::RejectReference, ScanState::FilterSeparator);
            }
            return Some(self.reference(ScanState::FilterSeparator, TokenType::Variable));
        }

        self.unexpected();
        self.tag()
    }

    fn accept(
        &mut self,
        value: ValueType,
        token: TokenType,
        reject: ParseError,
    ) -> Option<TokenType> {
        self.state = ScanState::FilterSeparator;
        if self.grammar.accepts(value) {
            Some(token)
        } else {
            self.report(reject, ScanState::FilterSeparator)
        }
    }

    /// `(start..end)` collection of an iteration tag.
    fn iteration_range(&mut self) -> Option<TokenType> {
        let mut stops = vec![self.close()];
        stops.extend_from_slice(OPENERS);
        let Some(end) = self.stream.find(")", &stops) else {
            self.fail(ParseError::MissingIterationArray);
            return self.tag();
        };
        self.stream.until(end + 1);
        self.state = ScanState::IterationParameter;

        let token = self.stream.token();
        let inner = token[1..token.len() - 1].trim();
        let valid = inner
            .split_once("..")
            .is_some_and(|(from, to)| is_range_bound(from.trim()) && is_range_bound(to.trim()));
        if valid {
            Some(TokenType::IterationArray)
        } else {
            self.report(ParseError::InvalidCharacters, ScanState::IterationParameter)
        }
    }

    fn tag_close(&mut self) -> Option<TokenType> {
        if self.brackets.close().is_some() {
            return self.report_here(ParseError::MissingBracketNotation, self.state);
        }

        let close = self.close();
        if self.stream.peek() == Some('-') {
            let after = &self.stream.rest()[1..];
            if after.starts_with(close) {
                self.stream.advance(1);
                return Some(TokenType::TrimDashRight);
            }
            if after.trim_start_matches([' ', '\t']).starts_with(close)
                && after.starts_with([' ', '\t'])
            {
                let spaces = after.len() - after.trim_start_matches([' ', '\t']).len();
                self.stream.until(self.stream.offset() + 1 + spaces);
                return self.report(ParseError::RejectWhitespace, self.state);
            }
        }

        if self.stream.if_str(close) {
            let token = if self.state == ScanState::EndTagClose {
                TokenType::DelimiterEnder
            } else {
                TokenType::DelimiterClose
            };
            self.close_tag();
            return Some(token);
        }

        match self.tag_end() {
            Some(end) => {
                self.stream.until(end);
                let error = if self.stream.token().trim_end().chars().count() == 1 {
                    ParseError::InvalidCharacter
                } else {
                    ParseError::InvalidCharacters
                };
                self.report(error, self.state)
            }
            None => {
                self.close_tag();
                self.stream.mark();
                self.report(ParseError::MissingCloseDelimiter, ScanState::CharSeq)
            }
        }
    }

    fn close_tag(&mut self) {
        self.state = ScanState::CharSeq;
        self.ret = None;
        self.brackets.clear();
        self.grammar.reset_filter();
        self.grammar.release_object();
    }

    fn html_tag_open(&mut self) -> TokenType {
        let name = &self.stream.rest()[1..];
        let len = name
            .find(|c: char| !is_identifier_char(c))
            .unwrap_or(name.len());
        let name = &name[..len];
        if !self.grammar.is_associate(name) {
            self.stream.advance(1 + name.chars().count());
            self.state = ScanState::CharSeq;
            return TokenType::ParseCancel;
        }

        let start = self.stream.offset();
        self.stream.forward(1);
        self.stream.identifier();
        self.stream.rewind_start(start);
        self.node = self.nodes;
        self.nodes += 1;
        let span = self.stream.span_of(start, self.stream.offset());
        let name = self.html_name();
        self.hierarchy.open(&name, self.node, span);
        self.state = ScanState::HtmlAttributeName;
        TokenType::HtmlTagName
    }

    fn html_tag_close(&mut self) -> TokenType {
        let name = &self.stream.rest()[2..];
        let len = name
            .find(|c: char| !is_identifier_char(c))
            .unwrap_or(name.len());
        let name = &name[..len];
        if !self.grammar.is_associate(name) {
            self.stream.advance(2 + name.chars().count());
            self.state = ScanState::CharSeq;
            return TokenType::ParseCancel;
        }

        let start = self.stream.offset();
        self.stream.forward(2);
        self.stream.identifier();
        self.stream.rewind_start(start);
        let name = self.html_name();
        self.pair = self.hierarchy.close(&name);
        self.state = ScanState::HtmlTagCloseName;
        TokenType::HtmlEndTag
    }

    /// Hierarchy key for the HTML tag name under the token.
    fn html_name(&self) -> String {
        let name = self.stream.token().trim_start_matches(['<', '/']);
        let name = name.trim_end_matches(['>', '/']);
        format!("<{}>", name.to_ascii_lowercase())
    }

    // --- Helpers ---

    fn close(&self) -> &'static str {
        if self.output {
            "}}"
        } else {
            "%}"
        }
    }

    fn string_stops(&self) -> [&'static str; 3] {
        [self.close(), OPENERS[0], OPENERS[1]]
    }

    /// At the close sequence, including a trim dash and any stray blanks after it.
    fn at_close(&self) -> bool {
        let close = self.close();
        let rest = self.stream.rest();
        rest.starts_with(close)
            || rest
                .strip_prefix('-')
                .is_some_and(|r| r.trim_start_matches([' ', '\t']).starts_with(close))
    }

    fn at_trim_left(&self) -> bool {
        self.stream.offset() == self.tag_start + 2 && self.stream.peek() == Some('-')
    }

    /// Offset where the current tag's close sequence starts, trim dash
    /// included, unless a new tag opens first.
    fn tag_end(&self) -> Option<usize> {
        let at = self.stream.find(self.close(), OPENERS)?;
        let dashed = at > self.stream.offset() && self.stream.source().as_bytes()[at - 1] == b'-';
        Some(if dashed { at - 1 } else { at })
    }

    /// How far recovery may consume: the close sequence, else the next tag,
    /// else the end of input.
    fn recovery_end(&self) -> usize {
        self.tag_end().unwrap_or_else(|| {
            OPENERS
                .iter()
                .filter_map(|o| self.stream.find(o, &[]))
                .min()
                .unwrap_or(self.stream.source().len())
        })
    }

    /// Route an unexpected character: a tag with no close sequence goes
    /// straight to closing, anything else is consumed as an error.
    fn unexpected(&mut self) {
        match self.tag_end() {
            None => self.state = ScanState::TagClose,
            Some(end) => {
                let run = self.stream.slice(self.stream.offset()..end).trim_end();
                self.fail(if run.chars().count() > 1 {
                    ParseError::InvalidCharacters
                } else {
                    ParseError::InvalidCharacter
                });
            }
        }
    }

    /// Raise an error that consumes the rest of the tag.
    fn fail(&mut self, error: ParseError) {
        debug!(?error, offset = self.stream.offset(), "parse error");
        self.error = Some(error);
        self.state = ScanState::ParseError;
    }

    /// Report an error on the current token and continue at `next`.
    fn report(&mut self, error: ParseError, next: ScanState) -> Option<TokenType> {
        debug!(?error, range = ?self.stream.range(), "parse error");
        self.error = Some(error);
        self.state = next;
        Some(TokenType::ParseError)
    }

    /// Report a zero-width error at the cursor.
    fn report_here(&mut self, error: ParseError, next: ScanState) -> Option<TokenType> {
        self.stream.mark();
        self.report(error, next)
    }
}

/// Iterator returned by [`Scanner::tokens`].
pub struct Tokens<'s, 'a, G: Grammar> {
    scanner: &'s mut Scanner<'a, G>,
}

impl<G: Grammar> Iterator for Tokens<'_, '_, G> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            match self.scanner.scan(0) {
                None => continue,
                Some(TokenType::Eos) => return None,
                Some(kind) => {
                    return Some(Token {
                        kind,
                        span: self.scanner.span(),
                        error: self.scanner.error,
                    })
                }
            }
        }
    }
}

fn is_range_bound(bound: &str) -> bool {
    bound.parse::<i64>().is_ok()
        || (bound.starts_with(is_identifier_start)
            && bound
                .chars()
                .all(|c| is_identifier_char(c) || c == '.'))
}
