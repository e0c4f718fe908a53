//! # markup-provenance-syntax
//!
//! A lossless text notation for annotated document trees. It reads like
//! HTML; provenance the passes consume travels in `data-*` attributes:
//!
//! ```text
//! <p data-tsr="0,0"><meta typeof="mw:Transclusion" about="#mwt1"
//!   data-tsr="0,10" data-tpl="1x|foo">foo<meta typeof="mw:Transclusion/End"
//!   about="#mwt1"></p>
//! ```
//!
//! Text is kept verbatim, so fixtures describe exactly the nodes a tree
//! builder would have produced, whitespace nodes included.
//!
//! ## Architecture
//!
//! ```text
//! Notation → Lexer (Logos) → Tokens → Parser → Events → Sink → Document
//! ```
//!
//! - [`lexer`]: context-free tokens, every byte preserved
//! - [`parser`]: grammar and events; [`parser::sink`] builds the document
//! - [`attrs`]: the `data-*` to provenance mapping
//! - [`render`]: writes a processed document back out

pub mod attrs;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod render;

pub use error::SyntaxError;
pub use parser::parse;
pub use render::{render, render_content};
