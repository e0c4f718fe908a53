use std::collections::HashMap;

use crate::dom::{NodeId, classify};
use crate::error::EncapsulationError;

use super::{DomRange, RangeBuilder, describe};

/// Rows and row groups may receive migrated whitespace without changing
/// what renders.
const MIGRATION_TARGETS: &[&str] = &["tbody", "tr"];

/// Markers seen so far for one `about` id.
#[derive(Debug, Default)]
struct MarkerPair {
    start_elem: Option<NodeId>,
    end_elem: Option<NodeId>,
}

impl RangeBuilder<'_> {
    /// Finds one candidate range per marker pair under `root`, in document
    /// order of their completion.
    pub fn find_ranges(&mut self, root: NodeId) -> Result<Vec<DomRange>, EncapsulationError> {
        let mut pairs: HashMap<String, MarkerPair> = HashMap::new();
        let mut ranges = Vec::new();

        // One cursor per open level; the top one is the next node to visit.
        let mut cursors = vec![self.doc.first_child(root)];
        while let Some(cursor) = cursors.last_mut() {
            let Some(elem) = *cursor else {
                cursors.pop();
                continue;
            };
            // The element may move once its range is built.
            *cursor = self.doc.next_sibling(elem);
            if !self.doc.is_element(elem) {
                continue;
            }

            // Start markers without a tsr come from nested expansions that
            // are never wrapped themselves.
            let marker = classify::tpl_marker(self.doc, elem)
                .filter(|m| m.end || self.doc.provenance(elem).tsr.is_some());
            let Some(marker) = marker else {
                cursors.push(self.doc.first_child(elem));
                continue;
            };

            let about = self.doc.about(elem).unwrap_or_default().to_string();
            if !marker.end {
                match pairs.get_mut(&about) {
                    Some(pair) => {
                        pair.start_elem = Some(elem);
                        // The end marker was fostered ahead of its start.
                        let Some(end_elem) = pair.end_elem else {
                            return Err(EncapsulationError::UnexpectedStartMarker { about });
                        };
                        ranges.push(self.dom_range(elem, end_elem, end_elem)?);
                    }
                    None => {
                        pairs.insert(
                            about,
                            MarkerPair {
                                start_elem: Some(elem),
                                end_elem: None,
                            },
                        );
                    }
                }
                continue;
            }

            match pairs.get(&about) {
                Some(pair) => {
                    let Some(start_meta) = pair.start_elem else {
                        return Err(EncapsulationError::MissingStartMarker { about });
                    };
                    let end_elem = self.fostered_table_end(start_meta, elem, &about);
                    ranges.push(self.dom_range(start_meta, elem, end_elem)?);
                }
                None => {
                    pairs.insert(
                        about,
                        MarkerPair {
                            start_elem: None,
                            end_elem: Some(elem),
                        },
                    );
                }
            }
        }
        Ok(ranges)
    }

    /// When the whole expansion was fostered out of a table along with its
    /// paragraph, the range has to extend over that table.
    fn fostered_table_end(&mut self, start_meta: NodeId, end_meta: NodeId, about: &str) -> NodeId {
        let mut table = self
            .doc
            .parent(end_meta)
            .and_then(|p| self.doc.next_sibling(p));
        if let Some(t) = table
            && self.doc.is_text(t)
            && self.doc.text(t) == Some("\n")
        {
            table = self.doc.next_sibling(t);
        }
        let Some(table) = table.filter(|&t| self.doc.has_name(t, "table")) else {
            return end_meta;
        };

        let Some(start_parent) = self
            .doc
            .parent(start_meta)
            .filter(|&p| !classify::at_the_top(self.doc, p))
        else {
            return end_meta;
        };
        let parent_prov = self.doc.provenance(start_parent);
        if !parent_prov.flags.fostered {
            return end_meta;
        }

        let backdate = parent_prov.tsr.map(|t| t.start);
        if let Some(start) = backdate
            && let Some(dsr) = self.doc.provenance_mut(table).dsr.as_mut()
            && dsr.start.is_none()
        {
            dsr.start = Some(start);
        }
        self.doc.set_attr(table, "about", about);
        table
    }

    /// Builds the range for a marker pair and normalizes its boundaries so
    /// that `start` is an element the metadata can live on.
    fn dom_range(
        &mut self,
        start_meta: NodeId,
        end_meta: NodeId,
        end_elem: NodeId,
    ) -> Result<DomRange, EncapsulationError> {
        let mut range = self.enclosing_range(start_meta, end_meta, end_elem)?;
        let mut starts_in_fosterable = classify::is_fosterable_position(self.doc, range.start);
        let next = self.doc.next_sibling(range.start);

        if classify::is_tpl_marker_meta(self.doc, range.start) && next == Some(end_elem) {
            // Empty expansion.
            if starts_in_fosterable {
                if let Some(parent) = self.doc.parent(range.start) {
                    range.start = parent;
                    range.end = parent;
                }
                starts_in_fosterable = false;
            } else if let Some(parent) = self.doc.parent(range.start) {
                let empty = self.doc.create_element("span");
                self.doc.insert_before(parent, empty, Some(end_elem));
            }
        }

        if starts_in_fosterable
            && (!self.doc.is_element(range.start)
                || (classify::is_tpl_marker_meta(self.doc, range.start)
                    && next.is_none_or(|n| {
                        !self.doc.is_element(n) || classify::is_tpl_marker_meta(self.doc, n)
                    })))
        {
            self.migrate_fosterable_start(&mut range, next);
        }

        if !self.doc.is_element(range.start) {
            self.elementize_start(&mut range);
        }

        range.start = self.start_considering_fostered(range.start);
        range.flipped = !self.doc.in_sibling_order(range.start, range.end);

        log::trace!(
            target: "wrap",
            "found range {}; flipped? {}; offset: {}; start: {}; end: {}",
            range.id,
            range.flipped,
            range.start_offset,
            describe(self.doc, range.start),
            describe(self.doc, range.end)
        );
        Ok(range)
    }

    /// Only whitespace and comments can sit directly inside a table before
    /// its first row. Move them into the first row (group) so the range can
    /// start there, or give up and widen to the whole table part.
    fn migrate_fosterable_start(&mut self, range: &mut DomRange, next: Option<NodeId>) {
        let Some(parent) = self.doc.parent(range.start) else {
            return;
        };
        let mut no_whitespace = true;
        let mut to_migrate = Vec::new();
        let mut new_start = Some(range.start);
        let mut n = if self.doc.is_element(range.start) {
            next
        } else {
            Some(range.start)
        };
        while let Some(cur) = n {
            if self.doc.is_element(cur) {
                break;
            }
            if self.doc.is_text(cur) {
                no_whitespace = false;
            }
            to_migrate.push(cur);
            n = self.doc.next_sibling(cur);
            new_start = n;
        }

        match new_start {
            Some(target)
                if no_whitespace || MIGRATION_TARGETS.contains(&self.doc.node_name(target)) =>
            {
                let insert_at = self.doc.first_child(target);
                for node in to_migrate {
                    self.doc.insert_before(target, node, insert_at);
                }
                range.start = target;
                self.update_dsr_for_first_range_node(target, range.start_elem);
            }
            _ => {
                range.start = parent;
                range.end = parent;
            }
        }
    }

    /// Makes `range.start` an element: a paragraph holding nothing but this
    /// expansion becomes the range, anything else gets a wrapper span.
    fn elementize_start(&mut self, range: &mut DomRange) {
        let Some(parent) = self.doc.parent(range.start) else {
            return;
        };
        if self.is_single_expansion_paragraph(parent, range) {
            range.start = parent;
            range.end = parent;
            return;
        }
        let span = self.doc.create_element("span");
        self.doc.wrap(range.start, span);
        range.start = span;
        self.update_dsr_for_first_range_node(span, range.start_elem);
    }

    fn is_single_expansion_paragraph(&self, parent: NodeId, range: &DomRange) -> bool {
        if !self.doc.has_name(parent, "p") || classify::at_the_top(self.doc, parent) {
            return false;
        }
        let spans_all = self.doc.first_child(parent) == Some(range.start)
            && self.doc.last_child(parent) == Some(range.end);
        let other_markers = self.doc.children(parent).any(|c| {
            c != range.start_elem && c != range.end_elem && classify::is_tpl_marker_meta(self.doc, c)
        });
        spans_all && !other_markers
    }

    /// A range starting at a table also covers the content fostered out of
    /// that table.
    fn start_considering_fostered(&self, node: NodeId) -> NodeId {
        let mut node = node;
        if self.doc.has_name(node, "table") {
            while let Some(prev) = self.doc.prev_sibling(node) {
                if !self.doc.is_element(prev) || !self.doc.provenance(prev).flags.fostered {
                    break;
                }
                node = prev;
            }
        }
        node
    }

    /// The new first node of a range takes over the start marker's span,
    /// keeping its own end when that reaches further.
    pub(super) fn update_dsr_for_first_range_node(&mut self, target: NodeId, source: NodeId) {
        let src = self.doc.provenance(source);
        let (src_dsr, src_src) = (src.dsr, src.src.clone());
        let tgt = self.doc.provenance_mut(target);
        match (src_dsr, tgt.dsr.as_mut()) {
            (Some(s), Some(t)) if s.end.is_some() && t.end.is_some() && t.end > s.end => {
                t.start = s.start;
            }
            _ => {
                tgt.dsr = src_dsr;
                tgt.src = src_src;
            }
        }
    }

    /// Finds the children of the markers' lowest common ancestor that lie
    /// on the paths to each marker.
    fn enclosing_range(
        &self,
        start_meta: NodeId,
        end_meta: NodeId,
        end_elem: NodeId,
    ) -> Result<DomRange, EncapsulationError> {
        let about = self.doc.about(start_meta).unwrap_or_default();
        let id = about
            .strip_prefix('#')
            .unwrap_or(about)
            .strip_prefix("mwt")
            .unwrap_or(about)
            .to_string();
        let mut range = DomRange {
            id,
            start_offset: self.doc.provenance(start_meta).tsr.map_or(0, |t| t.start),
            start_elem: start_meta,
            end_elem: end_meta,
            start: start_meta,
            end: end_elem,
            flipped: false,
        };

        let start_ancestors = self.doc.path_to_root(start_meta);
        let mut elem = end_elem;
        while let Some(parent) = self.doc.parent(elem) {
            match start_ancestors.iter().position(|&a| a == parent) {
                Some(0) => {
                    return Err(EncapsulationError::CommonAncestorIsStartMarker {
                        range: range.id,
                    });
                }
                Some(i) => {
                    range.start = start_ancestors[i - 1];
                    range.end = elem;
                    break;
                }
                None => elem = parent,
            }
        }
        Ok(range)
    }
}
