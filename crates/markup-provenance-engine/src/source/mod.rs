//! # Source Text and Spans
//!
//! The original source text is held in an `xi_rope::Rope`; nodes never copy
//! it, they point into it with spans:
//!
//! - **`SourceRange`** (tsr): one tag's source syntax, always concrete.
//! - **`DomSourceRange`** (dsr): a whole subtree's origin, possibly partial,
//!   with the widths of the opening and closing syntax.

pub mod slice;
pub mod span;

pub use slice::{preview, safe_substr};
pub use span::{DomSourceRange, SourceRange};
