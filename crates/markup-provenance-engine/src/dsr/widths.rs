//! Widths of the opening and closing syntax that an element's name (or
//! link flavour) implies when the tokenizer did not record them.

use crate::dom::{Document, NodeId, Provenance, Syntax, classify};

/// Opening and closing widths; `None` means "not implied".
pub type TagWidths = (Option<i64>, Option<i64>);

/// Elements whose tsr covers only the start tag, never the whole subtree.
const LIMITED_TSR_TAGS: &[&str] = &[
    "b", "i", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "dl", "li", "dt", "dd", "table",
    "caption", "tr", "td", "th", "hr", "br", "pre",
];

/// Widths implied by an element name alone.
pub fn implied_widths(name: &str) -> Option<TagWidths> {
    let widths = match name {
        "body" | "html" | "head" | "p" | "meta" | "pre" | "ol" | "ul" | "dl" | "tbody"
        | "thead" | "tfoot" | "br" | "figcaption" => (Some(0), Some(0)),
        "li" | "dt" | "dd" => (Some(1), Some(0)),
        "hr" => (Some(4), Some(0)),
        "table" | "i" | "figure" => (Some(2), Some(2)),
        "b" => (Some(3), Some(3)),
        "tr" | "td" | "th" => (None, Some(0)),
        _ => {
            let level = name.strip_prefix('h')?.parse::<i64>().ok()?;
            if !(1..=6).contains(&level) {
                return None;
            }
            (Some(level), Some(level))
        }
    };
    Some(widths)
}

/// Whether an element's tsr covers its whole subtree.
pub fn tsr_spans_tag_dom(doc: &Document, id: NodeId, prov: &Provenance) -> bool {
    let name = doc.node_name(id);
    !(LIMITED_TSR_TAGS.contains(&name)
        || doc
            .type_of_tokens(id)
            .any(|t| t == "mw:Placeholder" || t == "mw:LanguageVariant")
        || prov.is_literal_markup())
}

/// Opening width of a list item: its list nesting depth, or 0 when it
/// shares the opening syntax of the list nested directly inside it.
pub fn list_item_width(doc: &Document, li: NodeId) -> Option<i64> {
    if doc.prev_sibling(li).is_none()
        && doc
            .first_child(li)
            .is_some_and(|c| classify::is_list(doc, c))
    {
        return Some(0);
    }

    let mut depth = 0;
    let mut node = li;
    while !classify::at_the_top(doc, node) {
        if classify::is_list_item(doc, node) {
            depth += 1;
        } else if !classify::is_list(doc, node) {
            let flags = doc.provenance(node).flags;
            if !classify::is_literal_markup(doc, node)
                || !flags.auto_inserted_start
                || !flags.auto_inserted_end
            {
                break;
            }
        }
        match doc.parent(node) {
            Some(p) => node = p,
            None => break,
        }
    }
    Some(depth)
}

fn anchor_widths(doc: &Document, id: NodeId, prov: &Provenance) -> Option<TagWidths> {
    if classify::is_wikilink(doc, id) && !classify::has_expanded_attrs(doc, id) {
        if prov.stx == Some(Syntax::Piped) {
            let href = prov.href.as_ref()?;
            return Some((Some(href.len() as i64 + 3), Some(2)));
        }
        return Some((Some(2), Some(2)));
    }
    if let (Some(tsr), Some(content_start)) = (prov.tsr, prov.ext_link_content_start)
        && classify::is_ext_link(doc, id)
        && !classify::is_url_link(doc, id)
    {
        return Some((Some(content_start - tsr.start), Some(1)));
    }
    if classify::is_url_link(doc, id) || classify::is_magic_link(doc, id) {
        return Some((Some(0), Some(0)));
    }
    None
}

/// Fills in whichever of `widths` is unknown from the element's name, link
/// flavour, or explicit overrides.
pub fn compute_tag_widths(
    widths: TagWidths,
    doc: &Document,
    id: NodeId,
    prov: &Provenance,
) -> TagWidths {
    if let Some((open, close)) = prov.ext_tag_widths {
        return (Some(open), Some(close));
    }

    let (mut open, mut close) = widths;
    let name = doc.node_name(id);
    if prov.is_literal_markup() {
        if prov.flags.self_close {
            close = Some(0);
        }
    } else if doc.has_type_of(id, "mw:LanguageVariant") {
        open = Some(2);
        close = Some(2);
    } else if name == "tr" && prov.start_tag_src.is_none() {
        open = Some(0);
        close = Some(0);
    } else {
        let mut implied = implied_widths(name);
        if open.is_none() {
            open = match name {
                "a" => {
                    implied = anchor_widths(doc, id, prov);
                    implied.and_then(|w| w.0)
                }
                "li" | "dd" => list_item_width(doc, id),
                _ => implied.and_then(|w| w.0),
            };
        }
        if close.is_none() {
            close = implied.and_then(|w| w.1);
        }
    }
    (open, close)
}
