//! Source-range provenance for annotated document trees.
//!
//! Two passes run over a [`Document`] in order:
//!
//! 1. [`compute_dsr`] gives every node the span of source it came from.
//! 2. [`wrap_transclusions`] pairs expansion markers, merges overlapping and
//!    nested regions and rewrites each into one tagged unit carrying
//!    [`ExpansionInfo`].
//!
//! [`process_document`] runs both.

pub mod diagnostics;
pub mod dom;
pub mod dsr;
pub mod error;
pub mod expansion;
pub mod ranges;
pub mod snapshot;
pub mod source;

// Re-export key types for easier usage
pub use diagnostics::{Category, Diagnostic, Diagnostics};
pub use dom::{Document, Element, Flags, NodeId, NodeKind, Provenance, Syntax};
pub use dsr::{DEFAULT_MAX_DEPTH, DsrOptions, compute_dsr};
pub use error::EncapsulationError;
pub use expansion::{
    ExpansionInfo, ExpansionPart, Invocation, InvocationKind, ParamInfo, TemplateInfo,
    TemplateParam,
};
pub use ranges::{DomRange, RangeBuilder, wrap_transclusions};
pub use source::{DomSourceRange, SourceRange};

/// Runs span resolution and then transclusion wrapping over the whole
/// document. Soft inconsistencies from both passes are returned; a
/// structural fault aborts with the tree partially rewritten.
pub fn process_document(
    doc: &mut Document,
    options: &DsrOptions,
) -> Result<Diagnostics, EncapsulationError> {
    let mut diagnostics = Diagnostics::new();
    let root = doc.root();
    compute_dsr(doc, root, options, &mut diagnostics);
    wrap_transclusions(doc, root, &mut diagnostics)?;
    log::debug!(
        target: "wrap",
        "processed document: {} diagnostics",
        diagnostics.len()
    );
    Ok(diagnostics)
}
