//! Sink for converting parser events into an engine document.

use markup_provenance_engine::{Document, NodeId};

use crate::attrs;
use crate::error::SyntaxError;
use crate::parser::event::Event;

/// Builds a [`Document`] from parser events.
pub struct Sink {
    doc: Document,
    stack: Vec<NodeId>,
}

impl Sink {
    /// Create a sink for a document over `source`.
    pub fn new(source: &str) -> Self {
        let doc = Document::new(source);
        let root = doc.root();
        Self {
            doc,
            stack: vec![root],
        }
    }

    /// Consume the sink and build the document.
    pub fn finish(mut self, events: Vec<Event>) -> Result<Document, SyntaxError> {
        for event in events {
            match event {
                Event::Open { name, attrs } => self.open(&name, attrs)?,
                Event::Text(text) => {
                    let parent = self.current();
                    self.doc.append_text(parent, &text);
                }
                Event::Comment(text) => {
                    let id = self.doc.create_comment(text);
                    self.append(id);
                }
                Event::Close => {
                    self.stack.pop();
                }
            }
        }
        Ok(self.doc)
    }

    fn current(&self) -> NodeId {
        self.stack
            .last()
            .copied()
            .unwrap_or_else(|| self.doc.root())
    }

    fn append(&mut self, id: NodeId) {
        let parent = self.current();
        self.doc.append_child(parent, id);
    }

    fn open(&mut self, name: &str, attrs: Vec<(String, String)>) -> Result<(), SyntaxError> {
        let root = self.doc.root();
        // An outer <body> describes the root rather than a child of it.
        let id = if name == "body" && self.stack == [root] && !self.doc.has_children(root) {
            root
        } else {
            let id = self.doc.create_element(name);
            self.append(id);
            id
        };
        for (key, value) in attrs {
            if !attrs::apply(&mut self.doc, id, &key, &value)? {
                self.doc.set_attr(id, &key, &value);
            }
        }
        self.stack.push(id);
        Ok(())
    }
}
