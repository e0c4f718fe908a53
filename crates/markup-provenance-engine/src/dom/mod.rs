//! # Document Tree
//!
//! An arena of nodes addressed by [`NodeId`] handles. Sibling and parent
//! links are plain handles, so the ancestor walks the passes depend on are
//! index lookups with no ownership cycles.
//!
//! Every node has a [`Provenance`] record in a side table indexed by the
//! same handle. Detached nodes stay in the arena (handles never dangle) but
//! are no longer reachable from the root.

pub mod classify;
pub mod provenance;

use std::fmt;

use xi_rope::Rope;

pub use provenance::{Flags, Provenance, Syntax};

/// Stable handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
        }
    }
}

/// A document tree plus the source text its spans point into.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    provenance: Vec<Provenance>,
    root: NodeId,
    source: Rope,
}

impl Document {
    /// Creates an empty document whose root is a `body` element.
    pub fn new(source: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            provenance: Vec::new(),
            root: NodeId(0),
            source: Rope::from(source),
        };
        doc.root = doc.create_element("body");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn source(&self) -> &Rope {
        &self.source
    }

    pub fn source_len(&self) -> i64 {
        self.source.len() as i64
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        self.provenance.push(Provenance::default());
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            name: name.to_string(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.index()].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(_))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Comment(_))
    }

    /// Lower-case element name, or `#text` / `#comment`.
    pub fn node_name(&self, id: NodeId) -> &str {
        match self.kind(id) {
            NodeKind::Element(el) => &el.name,
            NodeKind::Text(_) => "#text",
            NodeKind::Comment(_) => "#comment",
        }
    }

    pub fn has_name(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.name == name)
    }

    /// Character data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(t) | NodeKind::Comment(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeKind::Text(t) | NodeKind::Comment(t) = &mut self.nodes[id.index()].kind {
            *t = value.into();
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.set_attr(name, value);
        }
    }

    /// The expansion instance id shared by markers and wrapped nodes.
    pub fn about(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "about")
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.remove_attr(name);
        }
    }

    pub fn type_of_tokens(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "typeof")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn has_type_of(&self, id: NodeId, token: &str) -> bool {
        self.type_of_tokens(id).any(|t| t == token)
    }

    /// Adds `token` to the node's typeof unless already present.
    pub fn add_type_of(&mut self, id: NodeId, token: &str, prepend: bool) {
        if token.is_empty() || self.has_type_of(id, token) {
            return;
        }
        let current = self.attr(id, "typeof").unwrap_or_default().trim();
        let value = match (current.is_empty(), prepend) {
            (true, _) => token.to_string(),
            (false, true) => format!("{token} {current}"),
            (false, false) => format!("{current} {token}"),
        };
        self.set_attr(id, "typeof", &value);
    }

    /// Drops every typeof token for which `remove` returns true.
    pub fn strip_type_of(&mut self, id: NodeId, remove: impl Fn(&str) -> bool) {
        let kept: Vec<String> = self
            .type_of_tokens(id)
            .filter(|t| !remove(t))
            .map(str::to_string)
            .collect();
        self.set_attr(id, "typeof", &kept.join(" "));
    }

    pub fn provenance(&self, id: NodeId) -> &Provenance {
        &self.provenance[id.index()]
    }

    pub fn provenance_mut(&mut self, id: NodeId) -> &mut Provenance {
        &mut self.provenance[id.index()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].next
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].prev
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.first_child(id).is_some()
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            let mut child = self.last_child(n);
            while let Some(c) = child {
                stack.push(c);
                child = self.prev_sibling(c);
            }
        }
        out
    }

    /// Unlinks `id` from its parent and siblings. No-op when already detached.
    pub fn remove(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.index()];
            (node.parent, node.prev, node.next)
        };
        if let Some(p) = prev {
            self.nodes[p.index()].next = next;
        } else if let Some(parent) = parent {
            self.nodes[parent.index()].first_child = next;
        }
        if let Some(n) = next {
            self.nodes[n.index()].prev = prev;
        } else if let Some(parent) = parent {
            self.nodes[parent.index()].last_child = prev;
        }
        let node = &mut self.nodes[id.index()];
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    /// Inserts `child` under `parent` before `reference`, or at the end when
    /// `reference` is `None`. The child is detached from any old position first.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if Some(child) == reference {
            return;
        }
        self.remove(child);
        let prev = match reference {
            Some(r) => self.prev_sibling(r),
            None => self.last_child(parent),
        };
        {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(parent);
            node.prev = prev;
            node.next = reference;
        }
        match prev {
            Some(p) => self.nodes[p.index()].next = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        match reference {
            Some(r) => self.nodes[r.index()].prev = Some(child),
            None => self.nodes[parent.index()].last_child = Some(child),
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Appends `text` to `parent`, extending its last child when that is
    /// already a text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        if let Some(last) = self.last_child(parent)
            && let NodeKind::Text(t) = &mut self.nodes[last.index()].kind
        {
            t.push_str(text);
            return last;
        }
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    /// Puts `new` where `old` is and detaches `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if let Some(parent) = self.parent(old) {
            let next = self.next_sibling(old);
            self.remove(old);
            self.insert_before(parent, new, next);
        }
    }

    /// Moves `node` inside `wrapper`, which takes the node's old position.
    pub fn wrap(&mut self, node: NodeId, wrapper: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.insert_before(parent, wrapper, Some(node));
            self.append_child(wrapper, node);
        }
    }

    /// `id` followed by each ancestor up to and including the root.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut n = id;
        while let Some(p) = self.parent(n) {
            path.push(p);
            n = p;
        }
        path
    }

    /// True when `b` is `a` or a following sibling of `a`.
    pub fn in_sibling_order(&self, a: NodeId, b: NodeId) -> bool {
        let mut n = Some(a);
        while let Some(cur) = n {
            if cur == b {
                return true;
            }
            n = self.next_sibling(cur);
        }
        false
    }

    /// True when `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.path_to_root(id).last() == Some(&self.root)
    }
}

pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.doc.next_sibling(cur);
        Some(cur)
    }
}
