use std::collections::HashSet;

use crate::dom::{Document, NodeId};

/// Panics unless every attached node satisfies the span invariants: known
/// bounds are ordered, fostered nodes are zero-width, and children lie
/// within their parent's outer span.
///
/// Containment is not checked below a fostered node. Its content was moved
/// out of place and keeps the offsets it had there.
pub fn check(doc: &Document) {
    let mut in_fostered: HashSet<NodeId> = HashSet::new();
    for id in doc.descendants(doc.root()) {
        let moved = doc
            .parent(id)
            .is_some_and(|p| in_fostered.contains(&p) || doc.provenance(p).flags.fostered);
        if moved {
            in_fostered.insert(id);
        }
        check_node(doc, id, !moved);
    }
}

fn check_node(doc: &Document, id: NodeId, check_containment: bool) {
    let prov = doc.provenance(id);
    let Some(dsr) = prov.dsr else {
        return;
    };
    if let (Some(start), Some(end)) = (dsr.start, dsr.end) {
        assert!(
            start <= end,
            "span out of order on <{}> {id}: {:?}",
            doc.node_name(id),
            dsr.to_json_array()
        );
        if prov.flags.fostered {
            assert_eq!(
                start,
                end,
                "fostered <{}> {id} is not zero-width",
                doc.node_name(id)
            );
        }
    }

    let Some(parent) = doc.parent(id).filter(|_| check_containment) else {
        return;
    };
    let Some(outer) = doc.provenance(parent).dsr else {
        return;
    };
    if let (Some(ps), Some(pe), Some(s), Some(e)) = (outer.start, outer.end, dsr.start, dsr.end) {
        assert!(
            s >= ps && e <= pe,
            "<{}> {id} span {:?} escapes parent <{}> span {:?}",
            doc.node_name(id),
            dsr.to_json_array(),
            doc.node_name(parent),
            outer.to_json_array()
        );
    }
}
