//! # Source-Range Resolution
//!
//! Assigns a [`DomSourceRange`](crate::source::DomSourceRange) to every
//! element of a document, working from the few anchors the tokenizer left
//! behind (tag source ranges, literal `src` of placeholders, expansion
//! marker offsets) and the widths implied by element names.
//!
//! ## Modules
//!
//! - **`compute`**: the right-to-left resolver with forward patching
//! - **`widths`**: implied opening/closing syntax widths
//! - **`measure`**: source widths of text and comment nodes
//!
//! This pass never fails. Anything that does not add up is reported
//! through [`Diagnostics`] and resolved to a best-effort value.

mod compute;
pub mod measure;
pub mod widths;

use crate::diagnostics::Diagnostics;
use crate::dom::{Document, NodeId};
use crate::source::{DomSourceRange, SourceRange};

use compute::DsrComputer;

pub const DEFAULT_MAX_DEPTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsrOptions {
    /// Known source bounds of the root; defaults to the whole source text.
    pub source_offsets: Option<SourceRange>,
    /// Attribute-only re-expansion: the root has no meaningful offsets, so
    /// a mismatch there is not reported.
    pub attr_expansion: bool,
    /// Deeper elements are treated as opaque rather than recursed into.
    pub max_depth: usize,
}

impl Default for DsrOptions {
    fn default() -> Self {
        Self {
            source_offsets: None,
            attr_expansion: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Resolves spans for everything below `root`, then sets `root`'s own
/// span to the seeded bounds.
pub fn compute_dsr(
    doc: &mut Document,
    root: NodeId,
    options: &DsrOptions,
    diagnostics: &mut Diagnostics,
) {
    let start = options.source_offsets.map_or(0, |r| r.start);
    let end = options
        .source_offsets
        .map_or_else(|| doc.source_len(), |r| r.end);

    log::trace!(target: "dsr", "computing spans for [{start}, {end})");
    DsrComputer {
        doc: &mut *doc,
        diagnostics,
        attr_expansion: options.attr_expansion,
        max_depth: options.max_depth,
    }
    .compute_node(root, Some(start), Some(end));

    doc.provenance_mut(root).dsr = Some(DomSourceRange::new(
        Some(start),
        Some(end),
        Some(0),
        Some(0),
    ));
}
