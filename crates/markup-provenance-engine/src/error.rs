use thiserror::Error;

/// Structural faults that abort processing of the current document.
///
/// These are distinct from the soft inconsistencies reported through
/// [`crate::Diagnostics`]: they mean no trustworthy output could be produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncapsulationError {
    #[error("cycle in range nesting involving range {range}")]
    NestingCycle { range: String },

    #[error("cannot encapsulate range {range}: no element between its markers (start: {start})")]
    Unencapsulatable { range: String, start: String },

    #[error("start marker for {about} found after its content")]
    UnexpectedStartMarker { about: String },

    #[error("end marker for {about} has no start marker")]
    MissingStartMarker { about: String },

    #[error("start marker of range {range} is the common ancestor of its markers")]
    CommonAncestorIsStartMarker { range: String },

    #[error("flipped range {range} overlaps its predecessor instead of being enclosed")]
    FlippedOverlap { range: String },

    #[error("range {range} has no invocation info on its start marker")]
    MissingInvocationInfo { range: String },

    #[error("no parts recorded for range {range}")]
    MissingParts { range: String },
}
