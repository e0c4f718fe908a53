//! Soft inconsistencies found while resolving spans or wrapping ranges.
//!
//! Nothing here aborts processing. Each event is kept for the caller and
//! also forwarded to the `log` facade so hosts see it without extra wiring.

use serde::Serialize;

use crate::dom::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Computed start disagrees with the known start of a subtree.
    DsrInconsistent,
    /// A running end offset went below zero and was clamped.
    DsrNegative,
    /// Nesting exceeded the recursion bound; the subtree was treated as opaque.
    DsrDepth,
    /// A range lacked the spans needed to build its metadata.
    EncapsulationInvalid,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::DsrInconsistent => "dsr/inconsistent",
            Category::DsrNegative => "dsr/negative",
            Category::DsrDepth => "dsr/depth",
            Category::EncapsulationInvalid => "encap/invalid",
        }
    }

    pub fn level(self) -> log::Level {
        match self {
            Category::DsrInconsistent | Category::DsrNegative => log::Level::Info,
            Category::DsrDepth => log::Level::Warn,
            Category::EncapsulationInvalid => log::Level::Error,
        }
    }

    fn target(self) -> &'static str {
        match self {
            Category::DsrInconsistent | Category::DsrNegative | Category::DsrDepth => "dsr",
            Category::EncapsulationInvalid => "wrap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub category: Category,
    #[serde(skip)]
    pub node: Option<NodeId>,
    pub node_name: String,
    pub message: String,
}

/// Collects diagnostics for one document.
#[derive(Debug, Default)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(
        &mut self,
        category: Category,
        node: Option<NodeId>,
        node_name: &str,
        message: impl Into<String>,
    ) {
        let message = message.into();
        log::log!(
            target: category.target(),
            category.level(),
            "{}: <{node_name}> {message}",
            category.as_str()
        );
        self.events.push(Diagnostic {
            category,
            node,
            node_name: node_name.to_string(),
            message,
        });
    }

    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn of(&self, category: Category) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter(move |d| d.category == category)
    }
}
