//! # Parser - Event-Based Tree Construction
//!
//! Turns the token stream into a flat list of [`Event`]s, which the
//! [`Sink`] then builds into an engine [`Document`].
//!
//! ## Grammar
//!
//! ```text
//! content  := (element | comment | text)*
//! element  := '<' name attr* ('/>' | '>' content '</' name '>')
//! attr     := name ('=' (quoted | word))?
//! ```
//!
//! Void elements (`meta`, `br`, `hr`, `img`, `link`) need no closing tag.
//! Text is kept verbatim, whitespace included, since the passes measure
//! every text node. Entities in text and attribute values are decoded.
//!
//! ## Module Structure
//!
//! - [`event`] - The Event enum
//! - [`sink`] - Converts events to a document, mapping `data-*` attributes
//!   onto provenance
//!
//! ## Public API
//!
//! The main entry point is [`parse`]:
//!
//! ```
//! use markup_provenance_syntax::parse;
//!
//! let doc = parse("<p>hello</p>", "hello").unwrap();
//! assert_eq!(doc.source_len(), 5);
//! ```

pub mod event;
pub mod sink;

use markup_provenance_engine::Document;

use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind, lex};
use event::Event;
use sink::Sink;

/// Elements that never have content or a closing tag.
pub const VOID_ELEMENTS: [&str; 5] = ["meta", "br", "hr", "img", "link"];

/// The parser state machine.
///
/// Holds the token stream, current position, accumulated events and the
/// names of the elements still open.
pub struct Parser<'t, 'input> {
    tokens: &'t [Token<'input>],
    pos: usize,
    events: Vec<Event>,
    open: Vec<&'input str>,
}

impl<'t, 'input> Parser<'t, 'input> {
    /// Create a new parser from a slice of tokens.
    pub fn new(tokens: &'t [Token<'input>]) -> Self {
        Self {
            tokens,
            pos: 0,
            events: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Parse the tokens into events.
    pub fn parse(mut self) -> Result<Vec<Event>, SyntaxError> {
        self.content()?;
        Ok(self.events)
    }

    fn current(&self) -> Option<&Token<'input>> {
        self.tokens.get(self.pos)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().is_some_and(|t| t.kind == kind)
    }

    fn skip_whitespace(&mut self) {
        while self.at(TokenKind::Whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, expected: &'static str) -> SyntaxError {
        match self.current() {
            Some(t) => SyntaxError::UnexpectedToken {
                offset: t.span.start,
                found: t.text.to_string(),
                expected,
            },
            None => SyntaxError::UnexpectedEof {
                name: self.open.last().copied().unwrap_or("body").to_string(),
            },
        }
    }

    fn content(&mut self) -> Result<(), SyntaxError> {
        while let Some(token) = self.current() {
            match token.kind {
                TokenKind::OpenTag => self.element()?,
                TokenKind::CloseTag => self.close_tag()?,
                TokenKind::Comment => {
                    let text = token.text;
                    self.events
                        .push(Event::Comment(text[4..text.len() - 3].to_string()));
                    self.pos += 1;
                }
                _ => self.text()?,
            }
        }
        match self.open.last() {
            Some(name) => Err(SyntaxError::UnclosedElement {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Collects every token up to the next tag or comment into one text node.
    fn text(&mut self) -> Result<(), SyntaxError> {
        let mut raw = String::new();
        while let Some(token) = self.current() {
            if token.kind.is_markup() {
                break;
            }
            if token.kind == TokenKind::Stray && token.text.starts_with("<!--") {
                return Err(SyntaxError::UnterminatedComment {
                    offset: token.span.start,
                });
            }
            raw.push_str(token.text);
            self.pos += 1;
        }
        self.events
            .push(Event::Text(html_escape::decode_html_entities(&raw).into_owned()));
        Ok(())
    }

    fn element(&mut self) -> Result<(), SyntaxError> {
        let text: &'input str = self.tokens[self.pos].text;
        let name = &text[1..];
        self.pos += 1;

        let mut attrs = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            let Some(token) = self.current() else {
                return Err(SyntaxError::UnexpectedEof {
                    name: name.to_string(),
                });
            };
            match token.kind {
                TokenKind::Gt => break false,
                TokenKind::SelfClose => break true,
                TokenKind::Word => attrs.push(self.attribute()?),
                _ => return Err(self.unexpected("attribute, '>' or '/>'")),
            }
        };
        self.pos += 1;

        self.events.push(Event::Open {
            name: name.to_string(),
            attrs,
        });
        if self_closing || VOID_ELEMENTS.contains(&name) {
            self.events.push(Event::Close);
        } else {
            self.open.push(name);
        }
        Ok(())
    }

    fn attribute(&mut self) -> Result<(String, String), SyntaxError> {
        let name = self.tokens[self.pos].text.to_string();
        self.pos += 1;
        self.skip_whitespace();
        if !self.at(TokenKind::Eq) {
            return Ok((name, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();

        let raw: &'input str = match self.current().map(|t| (t.kind, t.text)) {
            Some((TokenKind::Quoted, text)) => &text[1..text.len() - 1],
            Some((TokenKind::Word, text)) => text,
            _ => return Err(self.unexpected("attribute value")),
        };
        self.pos += 1;
        Ok((name, html_escape::decode_html_entities(raw).into_owned()))
    }

    fn close_tag(&mut self) -> Result<(), SyntaxError> {
        let offset = self.tokens[self.pos].span.start;
        let text: &'input str = self.tokens[self.pos].text;
        let name = text[2..text.len() - 1].trim_end();
        match self.open.last().copied() {
            Some(open) if open == name => {
                self.open.pop();
                self.events.push(Event::Close);
                self.pos += 1;
                Ok(())
            }
            Some(open) => Err(SyntaxError::MismatchedCloseTag {
                offset,
                expected: open.to_string(),
                found: name.to_string(),
            }),
            None => Err(SyntaxError::UnexpectedCloseTag {
                offset,
                name: name.to_string(),
            }),
        }
    }
}

/// Parses tree notation into a document whose spans point into `source`.
///
/// A top-level `<body>` element stands for the document root itself, so
/// attributes placed on it describe the root.
pub fn parse(tree: &str, source: &str) -> Result<Document, SyntaxError> {
    let tokens = lex(tree);
    let events = Parser::new(&tokens).parse()?;
    Sink::new(source).finish(events)
}
