//! # Transclusion Ranges
//!
//! Wraps the output of each expansion into a single editable unit. Runs
//! after span resolution, in three steps:
//!
//! 1. **`locate`**: pair start and end markers by their `about` id and find
//!    the sibling run under their common ancestor that holds the expansion.
//! 2. **`resolve`**: tag every node with the ranges covering it, fold nested
//!    and overlapping ranges into the enclosing one, and collect the
//!    invocation info of everything folded.
//! 3. **`encapsulate`**: give every top-level node of each surviving range
//!    the shared `about` id, and put the merged span and
//!    [`ExpansionInfo`](crate::expansion::ExpansionInfo) on its first element.
//!
//! Marker elements are consumed along the way.

mod encapsulate;
mod locate;
mod resolve;

use std::collections::HashMap;

use crate::diagnostics::Diagnostics;
use crate::dom::{Document, NodeId};
use crate::error::EncapsulationError;
use crate::expansion::TemplateInfo;
use crate::source::DomSourceRange;

/// A candidate or resolved transclusion region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomRange {
    /// The `about` id without its `#mwt` prefix.
    pub id: String,
    /// Source offset of the start marker; orders ranges textually.
    pub start_offset: i64,
    pub start_elem: NodeId,
    pub end_elem: NodeId,
    /// First node of the wrapped sibling run.
    pub start: NodeId,
    /// Last node of the wrapped sibling run.
    pub end: NodeId,
    /// The end precedes the start in tree order (foster parenting).
    pub flipped: bool,
}

impl DomRange {
    /// Common ancestor of the wrapped run.
    pub fn root(&self, doc: &Document) -> Option<NodeId> {
        doc.parent(self.start)
    }

    /// First and last node in tree order, whichever way the range points.
    pub fn ordered_bounds(&self) -> (NodeId, NodeId) {
        if self.flipped {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        }
    }
}

/// An entry of a range's merged invocation list.
#[derive(Debug, Clone, PartialEq)]
enum CompoundPart {
    /// Source text between or around invocations.
    Literal(String),
    Invocation {
        dsr: DomSourceRange,
        info: TemplateInfo,
        is_param: bool,
    },
}

impl CompoundPart {
    fn dsr(&self) -> Option<&DomSourceRange> {
        match self {
            CompoundPart::Invocation { dsr, .. } => Some(dsr),
            CompoundPart::Literal(_) => None,
        }
    }
}

/// State shared by the three steps of one wrapping run.
pub struct RangeBuilder<'a> {
    doc: &'a mut Document,
    diagnostics: &'a mut Diagnostics,
    /// Ranges covering each element, in the order they were attached.
    node_ranges: HashMap<NodeId, Vec<usize>>,
    /// Merged invocation parts per top-level range id.
    compound: HashMap<String, Vec<CompoundPart>>,
    /// Marker types of ranges folded into each top-level range.
    merged_types: HashMap<String, Vec<&'static str>>,
}

impl<'a> RangeBuilder<'a> {
    pub fn new(doc: &'a mut Document, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            doc,
            diagnostics,
            node_ranges: HashMap::new(),
            compound: HashMap::new(),
            merged_types: HashMap::new(),
        }
    }

    /// Runs all three steps over the subtree under `root`.
    pub fn execute(mut self, root: NodeId) -> Result<(), EncapsulationError> {
        let ranges = self.find_ranges(root)?;
        if ranges.is_empty() {
            return Ok(());
        }
        let top_level = self.resolve(root, ranges)?;
        self.encapsulate(&top_level)
    }
}

/// Wraps every transclusion under `root`. Spans must already be resolved.
pub fn wrap_transclusions(
    doc: &mut Document,
    root: NodeId,
    diagnostics: &mut Diagnostics,
) -> Result<(), EncapsulationError> {
    RangeBuilder::new(doc, diagnostics).execute(root)
}

/// Short start-tag rendering of an element for fault messages.
fn describe(doc: &Document, id: NodeId) -> String {
    match doc.element(id) {
        Some(el) => {
            let mut out = format!("<{}", el.name);
            for (k, v) in &el.attrs {
                out.push_str(&format!(" {k}=\"{v}\""));
            }
            out.push('>');
            out
        }
        None => format!("{:?}", doc.text(id).unwrap_or_default()),
    }
}
