use std::fmt;

use serde::Serialize;

use crate::dom::{Document, NodeId, NodeKind};
use crate::source::preview;

/// Attributes worth showing; everything else is provenance detail.
const SHOWN_ATTRS: [&str; 2] = ["about", "typeof"];

#[derive(Debug, Serialize)]
pub struct Snap {
    pub root: NodeSnap,
}

#[derive(Debug, Serialize)]
pub struct NodeSnap {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsr: Option<Vec<Option<i64>>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnap>,
}

pub fn normalize(doc: &Document) -> Snap {
    Snap {
        root: node_snap(doc, doc.root()),
    }
}

fn node_snap(doc: &Document, id: NodeId) -> NodeSnap {
    let prov = doc.provenance(id);
    let (attrs, text) = match doc.kind(id) {
        NodeKind::Element(el) => (
            el.attrs
                .iter()
                .filter(|(k, _)| SHOWN_ATTRS.contains(&k.as_str()))
                .cloned()
                .collect(),
            None,
        ),
        NodeKind::Text(t) | NodeKind::Comment(t) => (Vec::new(), Some(preview(t, 40))),
    };
    NodeSnap {
        name: doc.node_name(id).to_string(),
        dsr: prov.dsr.map(|d| d.to_json_array()),
        attrs,
        text,
        parts: prov.expansion.as_ref().map(ToString::to_string),
        children: doc.children(id).map(|c| node_snap(doc, c)).collect(),
    }
}

impl NodeSnap {
    fn write_outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{}{}", "  ".repeat(depth), self.name)?;
        if let Some(dsr) = &self.dsr {
            let values: Vec<String> = dsr
                .iter()
                .map(|v| v.map_or_else(|| "null".to_string(), |n| n.to_string()))
                .collect();
            write!(f, " [{}]", values.join(","))?;
        }
        for (k, v) in &self.attrs {
            write!(f, " {k}={v:?}")?;
        }
        if let Some(text) = &self.text {
            write!(f, " {text:?}")?;
        }
        if let Some(parts) = &self.parts {
            write!(f, " parts=({parts})")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_outline(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Snap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.write_outline(f, 0)
    }
}
