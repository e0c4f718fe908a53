use std::sync::OnceLock;

use regex::Regex;

use super::{Document, NodeId};

pub const QUOTE_TAGS: &[&str] = &["i", "b"];
pub const LIST_TAGS: &[&str] = &["ul", "ol", "dl"];
pub const LIST_ITEM_TAGS: &[&str] = &["li", "dt", "dd"];
pub const FOSTERABLE_PARENTS: &[&str] = &["table", "thead", "tbody", "tfoot", "tr"];

/// Which expansion an expansion marker bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Transclusion,
    Param,
}

/// An expansion boundary marker's typeof token, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TplMarker {
    pub kind: MarkerKind,
    pub end: bool,
}

impl TplMarker {
    pub fn parse(token: &str) -> Option<Self> {
        let (base, end) = match token.strip_suffix("/End") {
            Some(base) => (base, true),
            None => (token, false),
        };
        let kind = match base {
            "mw:Transclusion" => MarkerKind::Transclusion,
            "mw:Param" => MarkerKind::Param,
            _ => return None,
        };
        Some(Self { kind, end })
    }

    pub fn type_token(self) -> &'static str {
        match (self.kind, self.end) {
            (MarkerKind::Transclusion, false) => "mw:Transclusion",
            (MarkerKind::Transclusion, true) => "mw:Transclusion/End",
            (MarkerKind::Param, false) => "mw:Param",
            (MarkerKind::Param, true) => "mw:Param/End",
        }
    }
}

/// The expansion marker type carried by an element, if any.
pub fn tpl_marker(doc: &Document, id: NodeId) -> Option<TplMarker> {
    doc.type_of_tokens(id).find_map(TplMarker::parse)
}

pub fn is_tpl_marker_meta(doc: &Document, id: NodeId) -> bool {
    doc.has_name(id, "meta") && tpl_marker(doc, id).is_some()
}

pub fn is_tpl_start_marker_meta(doc: &Document, id: NodeId) -> bool {
    doc.has_name(id, "meta") && tpl_marker(doc, id).is_some_and(|m| !m.end)
}

pub fn at_the_top(doc: &Document, id: NodeId) -> bool {
    id == doc.root()
}

pub fn is_literal_markup(doc: &Document, id: NodeId) -> bool {
    doc.is_element(id) && doc.provenance(id).is_literal_markup()
}

pub fn is_quote_elt(doc: &Document, id: NodeId) -> bool {
    doc.element(id)
        .is_some_and(|el| QUOTE_TAGS.contains(&el.name.as_str()))
}

pub fn is_list(doc: &Document, id: NodeId) -> bool {
    doc.element(id)
        .is_some_and(|el| LIST_TAGS.contains(&el.name.as_str()))
}

pub fn is_list_item(doc: &Document, id: NodeId) -> bool {
    doc.element(id)
        .is_some_and(|el| LIST_ITEM_TAGS.contains(&el.name.as_str()))
}

pub fn is_nested_in_list_item(doc: &Document, id: NodeId) -> bool {
    let mut n = doc.parent(id);
    while let Some(cur) = n {
        if at_the_top(doc, cur) {
            return false;
        }
        if is_list_item(doc, cur) {
            return true;
        }
        n = doc.parent(cur);
    }
    false
}

/// Non-element content cannot live here; foster parenting would move it.
pub fn is_fosterable_position(doc: &Document, id: NodeId) -> bool {
    doc.parent(id)
        .and_then(|p| doc.element(p))
        .is_some_and(|el| FOSTERABLE_PARENTS.contains(&el.name.as_str()))
}

fn rel_has(doc: &Document, id: NodeId, token: &str) -> bool {
    doc.attr(id, "rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t == token))
}

pub fn is_wikilink(doc: &Document, id: NodeId) -> bool {
    doc.has_name(id, "a") && rel_has(doc, id, "mw:WikiLink")
}

pub fn is_ext_link(doc: &Document, id: NodeId) -> bool {
    doc.has_name(id, "a") && rel_has(doc, id, "mw:ExtLink")
}

pub fn is_url_link(doc: &Document, id: NodeId) -> bool {
    is_ext_link(doc, id) && doc.provenance(id).stx == Some(super::Syntax::Url)
}

pub fn is_magic_link(doc: &Document, id: NodeId) -> bool {
    doc.has_name(id, "a") && doc.provenance(id).stx == Some(super::Syntax::MagicLink)
}

fn dom_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^mw:DOMFragment(/sealed/\w+)?$").expect("Invalid DOMFragment regex")
    })
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^mw:Placeholder(/\w*)?$").expect("Invalid placeholder regex"))
}

fn expanded_attrs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^mw:ExpandedAttrs(/\S+)*$").expect("Invalid ExpandedAttrs regex")
    })
}

/// Wrapper holding an already-processed fragment whose contents are opaque.
pub fn is_dom_fragment_wrapper(doc: &Document, id: NodeId) -> bool {
    doc.type_of_tokens(id)
        .any(|t| dom_fragment_re().is_match(t))
}

pub fn is_placeholder(doc: &Document, id: NodeId) -> bool {
    doc.type_of_tokens(id).any(|t| placeholder_re().is_match(t))
}

pub fn has_expanded_attrs(doc: &Document, id: NodeId) -> bool {
    doc.type_of_tokens(id).any(|t| expanded_attrs_re().is_match(t))
}
