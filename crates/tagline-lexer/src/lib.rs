//! Tagline Lexer
//!
//! Resumable scanner for Liquid templates embedded in markup. Literal text
//! is passed over; `{{ }}` and `{% %}` tags are tokenized and validated
//! against a dialect supplied through the [`Grammar`] trait. Grammar
//! violations become `ParseError` tokens instead of aborting the scan, and
//! unclosed block tags are reported once the document ends.
//!
//! # Example
//!
//! ```
//! use tagline_lexer::{ParseError, Scanner, Spec, TokenType};
//!
//! let spec = Spec::standard();
//! let lexed = Scanner::tokenize("{% if a %}{{ a | upcase }}", spec.cursor());
//! assert_eq!(lexed.tokens[0].kind, TokenType::DelimiterOpen);
//! assert_eq!(lexed.diagnostics[0].kind, ParseError::MissingEndTag);
//! ```

pub mod brackets;
pub mod grammar;
pub mod hierarchy;
pub mod scanner;
pub mod stream;
pub mod token;

pub use grammar::Grammar;
pub use scanner::{Lexed, Scanner, Tokens};
pub use token::{Diagnostic, ParseError, ScanState, Span, Token, TokenType};

pub use tagline_spec::{Cursor, Expect, Spec};
