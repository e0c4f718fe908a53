use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::dom::{Document, NodeId, classify};

/// Bytes of `<!--` plus `-->`.
const COMMENT_DELIMITERS: i64 = 7;

fn comment_escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--(&(amp;)*gt;|>)").expect("Invalid comment escape regex"))
}

fn newline_then_char_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n.").expect("Invalid newline regex"))
}

/// Re-encodes comment data the way it must appear in source: entities are
/// decoded, then any `-->` is escaped so the comment cannot close early.
pub fn decode_comment(data: &str) -> String {
    let decoded = html_escape::decode_html_entities(data);
    comment_escape_re()
        .replace_all(&decoded, |caps: &Captures<'_>| {
            let m = &caps[0];
            if m == "-->" {
                "--&gt;".to_string()
            } else {
                format!("--&amp;{}", &m[3..])
            }
        })
        .into_owned()
}

/// Source width of a comment node including its delimiters.
pub fn decoded_comment_length(data: &str) -> i64 {
    // Byte length, the same unit text widths and offsets use.
    decode_comment(data).len() as i64 + COMMENT_DELIMITERS
}

/// An indent-pre is a `pre` produced by leading-space syntax.
pub fn is_indent_pre(doc: &Document, id: NodeId) -> bool {
    doc.has_name(id, "pre") && !classify::is_literal_markup(doc, id)
}

/// Leading spaces an indent-pre swallowed from each line of `text`.
///
/// The last child's trailing newline adds no content to the `pre`, so for
/// it only newlines followed by a character count.
pub fn indent_pre_correction(doc: &Document, text: NodeId) -> i64 {
    let Some(parent) = doc.parent(text) else {
        return 0;
    };
    if !is_indent_pre(doc, parent) {
        return 0;
    }
    let value = doc.text(text).unwrap_or_default();
    if doc.last_child(parent) == Some(text) {
        newline_then_char_re().find_iter(value).count() as i64
    } else {
        value.matches('\n').count() as i64
    }
}

/// Source width of a text or comment node, or `None` for elements.
pub fn non_element_width(doc: &Document, id: NodeId) -> Option<i64> {
    if doc.is_comment(id) {
        return doc.text(id).map(decoded_comment_length);
    }
    doc.text(id).map(|t| t.len() as i64)
}
