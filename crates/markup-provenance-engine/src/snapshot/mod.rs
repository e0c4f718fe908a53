//! # Snapshot Testing Support
//!
//! Utilities for checking pass output via snapshot assertions and invariant
//! checks.
//!
//! ## Modules
//!
//! - **`normalize`**: Converts a document to a stable, serializable `Snap`
//!   whose `Display` form is a compact indented outline for `insta`
//! - **`invariants`**: Runtime checks for span correctness (ordered bounds,
//!   children contained in parents, fostered nodes zero-width)

pub mod invariants;
pub mod normalize;

pub use invariants::check as invariants;
pub use normalize::{NodeSnap, Snap, normalize};
