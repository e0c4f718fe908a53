use thiserror::Error;

/// Failures reading tree notation. Offsets are byte positions in the
/// notation text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unexpected {found:?} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        offset: usize,
        found: String,
        expected: &'static str,
    },

    #[error("unexpected end of input inside <{name}>")]
    UnexpectedEof { name: String },

    #[error("element <{name}> is never closed")]
    UnclosedElement { name: String },

    #[error("</{found}> at offset {offset} does not close <{expected}>")]
    MismatchedCloseTag {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("</{name}> at offset {offset} has no open element")]
    UnexpectedCloseTag { offset: usize, name: String },

    #[error("comment at offset {offset} is never terminated")]
    UnterminatedComment { offset: usize },

    #[error("invalid {name}=\"{value}\": {reason}")]
    BadAttribute {
        name: String,
        value: String,
        reason: String,
    },
}
