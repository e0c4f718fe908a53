//! # Parser Events
//!
//! The parser emits a **flat sequence** of events that the
//! [`Sink`](super::sink::Sink) turns into a document:
//!
//! ```text
//! Open(p, [about="#mwt1"])   ← begin a <p> element
//!   Text("hello")
//!   Comment(" note ")
//! Close                      ← end the <p>
//! ```
//!
//! The sink keeps a stack of open elements: `Open` pushes, `Close` pops.
//! Keeping tree building out of the grammar means the grammar never deals
//! with provenance attributes.

/// An event emitted by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Begin an element with its attributes in source order.
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },

    /// A text node, entities already decoded.
    Text(String),

    /// A comment node holding the text between `<!--` and `-->`.
    Comment(String),

    /// Finish the innermost open element.
    Close,
}

impl Event {
    pub fn open(name: &str) -> Self {
        Event::Open {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }
}
