//! # Lexer - Tokenizing Tree Notation
//!
//! Breaks fixture text into tokens using the [Logos] lexer generator.
//!
//! [Logos]: https://docs.rs/logos
//!
//! Like any lossless lexer, **every byte in the input appears in exactly one
//! token**. Bytes Logos cannot match become [`TokenKind::Stray`] tokens
//! instead of being dropped, so text content round-trips exactly:
//!
//! ```
//! use markup_provenance_syntax::lexer::lex;
//!
//! let input = "<p data-tsr=\"0,2\">a/b</p>";
//! let tokens = lex(input);
//!
//! let reconstructed: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! Tokens are context-free. The lexer doesn't know whether `title` is an
//! attribute name or a word of text; the parser decides from position.

use std::ops::Range;

use logos::Logos;

/// Token kinds produced by the Logos lexer.
///
/// Kept separate from [`TokenKind`] because Logos needs to derive on it
/// and has no pattern for bytes it cannot match.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"")]
enum RawToken {
    /// `<!--` through the next `-->`
    #[token("<!--", lex_comment)]
    Comment,

    /// `</name>`
    #[regex(r"</[A-Za-z][A-Za-z0-9:-]*[ \t\r\n]*>")]
    CloseTag,

    /// `<name`, attributes follow
    #[regex(r"<[A-Za-z][A-Za-z0-9:-]*")]
    OpenTag,

    #[token("/>")]
    SelfClose,

    #[token(">")]
    Gt,

    #[token("=")]
    Eq,

    /// Quoted attribute value; raw `<` and `>` must be escaped inside it
    #[regex(r#""[^"<>]*""#)]
    #[regex(r"'[^'<>]*'")]
    Quoted,

    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r#"[^<>="'\s/]+"#)]
    Word,
}

fn lex_comment(lex: &mut logos::Lexer<RawToken>) -> bool {
    match lex.remainder().find("-->") {
        Some(i) => {
            lex.bump(i + 3);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    CloseTag,
    OpenTag,
    SelfClose,
    Gt,
    Eq,
    Quoted,
    Whitespace,
    Word,
    /// Anything no other rule matched
    Stray,
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Comment => TokenKind::Comment,
            RawToken::CloseTag => TokenKind::CloseTag,
            RawToken::OpenTag => TokenKind::OpenTag,
            RawToken::SelfClose => TokenKind::SelfClose,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Eq => TokenKind::Eq,
            RawToken::Quoted => TokenKind::Quoted,
            RawToken::Whitespace => TokenKind::Whitespace,
            RawToken::Word => TokenKind::Word,
        }
    }
}

impl TokenKind {
    /// Tokens that end a run of text content.
    pub fn is_markup(self) -> bool {
        matches!(
            self,
            TokenKind::Comment | TokenKind::CloseTag | TokenKind::OpenTag
        )
    }
}

/// A lexed token with its kind, text slice and byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Range<usize>,
}

/// Lex the input into a sequence of tokens.
///
/// Guarantees that all bytes from the input appear in the output tokens.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(input);

    while let Some(result) = lexer.next() {
        let kind = result.map_or(TokenKind::Stray, TokenKind::from);
        tokens.push(Token {
            kind,
            text: lexer.slice(),
            span: lexer.span(),
        });
    }

    tokens
}
