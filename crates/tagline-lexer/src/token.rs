/// A region of source text, tracking line and column for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Lexer states. The scanner is always in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanState {
    // Literal region
    #[default]
    CharSeq,

    // Delimiter entry
    AfterOutputTagOpen,
    AfterTagOpen,

    // Tag naming
    BeforeOutputTagName,
    BeforeStartTagName,
    BeforeEndTagName,
    TagUnknown,

    // HTML attribute sub-grammar
    HtmlTagOpen,
    HtmlAttributeName,
    HtmlAttributeOperator,
    HtmlAttributeValue,
    HtmlTagClose,
    HtmlTagCloseName,

    // Iteration tags
    Iteration,
    IterationOperator,
    IterationArray,
    IterationParameter,
    IterationParameterValue,

    // Variable assignment tags
    VariableIdentifier,
    VariableOperator,
    VariableAssignment,

    // Embedded language tags
    EmbeddedLanguage,

    // Conditional tags
    Control,
    ControlCondition,
    ControlOperator,

    // Object paths
    Object,
    ObjectDotNotation,
    ObjectBracketNotation,
    ObjectBracketNotationEnd,

    // Filters
    Filter,
    FilterIdentifier,
    FilterOperator,
    FilterArgumentType,
    FilterArgument,
    FilterSeparator,
    FilterParameter,
    FilterParameterOperator,
    FilterParameterValue,

    // Recovery and closing
    GotoTagEnd,
    ParseError,
    TagClose,
    EndTagClose,
}

/// Token classification. One is produced per scanner call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Structure
    DelimiterOpen,
    DelimiterClose,
    /// Close delimiter of an end tag.
    DelimiterEnder,
    TrimDashLeft,
    TrimDashRight,

    // Tag identity
    /// Zero-width marker classifying a `{{ }}` tag, placed before its value.
    ObjectTag,
    StartTag,
    /// Spans from the tag's open delimiter to the end of its name.
    EndTag,
    Unknown,
    Comment,
    Raw,
    Control,
    ControlOperator,
    Embedded,
    EmbeddedJson,
    EmbeddedCss,
    EmbeddedJavascript,
    Iteration,
    IterationIteree,
    IterationOperator,
    IterationArray,
    IterationParameter,
    IterationParameterValue,
    VariableKeyword,
    VariableIdentifier,
    VariableOperator,
    SingularTag,
    LiquidTagName,

    // Values
    String,
    Number,
    Integer,
    Float,
    Boolean,
    Variable,
    Object,
    ObjectProperty,
    ObjectPropertyString,
    ObjectPropertyNumber,
    ObjectDotNotation,
    ObjectBracketNotationOpen,
    ObjectBracketNotationClose,

    // Filters
    Filter,
    FilterIdentifier,
    /// A `:` introducing argument values.
    FilterOperator,
    FilterArgument,
    Separator,

    // HTML
    HtmlTagName,
    HtmlAttributeName,
    HtmlOperatorValue,
    HtmlAttributeValue,
    HtmlStartTagClose,
    HtmlEndTag,
    HtmlEndTagClose,

    // Whitespace and control
    Whitespace,
    Newline,
    Eos,

    // Diagnostics
    ParseError,
    ParseCancel,
    /// Tag content consumed without being tokenized.
    ParseSkip,
}

/// Diagnostic classification carried by a `ParseError` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ParseError {
    #[error("Missing end tag")]
    MissingEndTag,
    #[error("Invalid character")]
    InvalidCharacter,
    #[error("Invalid characters")]
    InvalidCharacters,
    #[error("Missing closing quotation")]
    MissingQuotation,
    #[error("Invalid tag name")]
    InvalidTagName,
    #[error("Invalid object name")]
    InvalidObjectName,
    #[error("Missing iteration iteree")]
    MissingIterationIteree,
    #[error("Missing iteration array")]
    MissingIterationArray,
    #[error("Invalid operator")]
    InvalidOperator,
    #[error("Tag is not allowed here")]
    InvalidPlacement,
    #[error("Missing condition")]
    MissingCondition,
    #[error("Filter does not accept arguments")]
    RejectFilterArguments,
    #[error("Argument does not accept a string")]
    RejectString,
    #[error("Argument does not accept a number")]
    RejectNumber,
    #[error("Argument does not accept an integer")]
    RejectInteger,
    #[error("Argument does not accept a boolean")]
    RejectBoolean,
    #[error("Argument does not accept a variable")]
    RejectReference,
    #[error("Missing colon")]
    MissingColon,
    #[error("Missing filter argument")]
    MissingFilterArgument,
    #[error("Missing filter argument separator")]
    MissingFilterSeparator,
    #[error("Missing filter")]
    MissingFilter,
    #[error("Unknown filter")]
    InvalidFilter,
    #[error("Missing property")]
    MissingProperty,
    #[error("Invalid property")]
    InvalidProperty,
    #[error("Missing closing bracket")]
    MissingBracketNotation,
    #[error("Whitespace is not allowed after a trim dash")]
    RejectWhitespace,
    #[error("Missing close delimiter")]
    MissingCloseDelimiter,
    #[error("Unknown property")]
    UnknownProperty,
    #[error("Missing tag name")]
    MissingTagName,
    #[error("Missing assignment value")]
    MissingAssignment,
    #[error("Unknown parameter")]
    InvalidParameter,
    #[error("Missing parameter value")]
    MissingParameterValue,
}

/// A token produced by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    pub span: Span,
    /// Set on `ParseError` tokens.
    pub error: Option<ParseError>,
}

impl Token {
    pub fn new(kind: TokenType, span: Span) -> Self {
        Self {
            kind,
            span,
            error: None,
        }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// A deferred diagnostic raised at end of document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} for '{tag}' opened at line {}, column {}", .span.line, .span.column)]
pub struct Diagnostic {
    pub kind: ParseError,
    /// From the opening tag's start to the end of the document.
    pub span: Span,
    pub tag: String,
}
