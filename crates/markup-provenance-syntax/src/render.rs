//! Renders a processed document back to tree notation, with the pass
//! output as `data-dsr`, `data-first-wt` and `data-parts` attributes.

use markup_provenance_engine::{Document, NodeId, NodeKind};

use crate::attrs;
use crate::parser::VOID_ELEMENTS;

/// Renders the whole document, root included.
pub fn render(doc: &Document) -> String {
    let mut out = String::new();
    render_node(doc, doc.root(), &mut out);
    out
}

/// Renders the children of the root only.
pub fn render_content(doc: &Document) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        render_node(doc, child, &mut out);
    }
    out
}

/// Pending output while walking the tree.
enum Step<'a> {
    Node(NodeId),
    Close(&'a str),
}

fn render_node(doc: &Document, id: NodeId, out: &mut String) {
    let mut stack = vec![Step::Node(id)];
    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Node(id) => id,
            Step::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
                continue;
            }
        };
        match doc.kind(id) {
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                let annotations = attrs::annotations(doc, id);
                let all = el
                    .attrs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .chain(annotations.iter().map(|(k, v)| (*k, v.as_str())));
                for (key, value) in all {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                let is_void = VOID_ELEMENTS.contains(&el.name.as_str());
                if is_void && !doc.has_children(id) {
                    continue;
                }
                stack.push(Step::Close(&el.name));
                let mut child = doc.last_child(id);
                while let Some(c) = child {
                    stack.push(Step::Node(c));
                    child = doc.prev_sibling(c);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use insta::assert_snapshot;
    use markup_provenance_engine::DomSourceRange;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_annotations_after_element_attributes() {
        let mut doc = parse(r#"<p class="x">a &lt; b<br></p>"#, "a < b").unwrap();
        let p = doc.first_child(doc.root()).unwrap();
        doc.provenance_mut(p).dsr = Some(DomSourceRange::new(Some(0), Some(5), Some(0), None));
        assert_snapshot!(render_content(&doc), @r#"<p class="x" data-dsr="0,5,0,null">a &lt; b<br></p>"#);
    }

    #[test]
    fn renders_root_and_comments() {
        let doc = parse("<!--n-->x", "x").unwrap();
        assert_snapshot!(render(&doc), @"<body><!--n-->x</body>");
    }

    #[test]
    fn deep_nesting_renders_without_recursion() {
        let depth = 100_000;
        let tree = format!("{}x{}", "<i>".repeat(depth), "</i>".repeat(depth));
        let doc = parse(&tree, "x").unwrap();
        assert_eq!(render_content(&doc), tree);
    }
}
