use std::collections::{HashMap, HashSet};

use crate::dom::{Document, NodeId, classify};
use crate::error::EncapsulationError;
use crate::expansion::TemplateInfo;
use crate::source::safe_substr;

use super::{CompoundPart, DomRange, RangeBuilder};

/// Range id to the id of the range it is folded into.
type Subsumed = HashMap<String, String>;

impl RangeBuilder<'_> {
    /// Reduces `ranges` to the top-level, pairwise non-overlapping set.
    ///
    /// Nested ranges are dropped and overlapping ones merged into their
    /// predecessor; either way their invocation info is recorded on the
    /// surviving range and their markers are removed.
    pub fn resolve(
        &mut self,
        root: NodeId,
        mut ranges: Vec<DomRange>,
    ) -> Result<Vec<DomRange>, EncapsulationError> {
        self.node_ranges.clear();
        for (i, r) in ranges.iter().enumerate() {
            let (first, last) = r.ordered_bounds();
            let mut n = Some(first);
            while let Some(cur) = n {
                if self.doc.is_element(cur) {
                    self.attach_range(cur, i, &ranges);
                    if cur == last {
                        break;
                    }
                }
                n = self.doc.next_sibling(cur);
            }
        }

        let mut subsumed = self.find_nesting(root, &ranges);

        ranges.sort_by_key(|r| r.start_offset);

        let mut top_level: Vec<DomRange> = Vec::new();
        let mut prev: Option<usize> = None;
        for r in ranges {
            let start_prov = self.doc.provenance(r.start_elem);
            let template_info = start_prov.template.clone();
            if template_info.is_none() && !start_prov.flags.from_foster {
                return Err(EncapsulationError::MissingInvocationInfo { range: r.id });
            }

            let mut cleanup: Option<(NodeId, NodeId)> = None;
            let enclosing = toplevel_enclosing_range(&subsumed, subsumed.get(&r.id))?;
            if let Some(enclosing) = enclosing {
                log::trace!(target: "wrap", "range {} nested in {enclosing}", r.id);
                cleanup = Some((r.start_elem, r.end_elem));
                self.fold_into(&enclosing, &r, template_info);
            } else if let Some(p) = prev
                && ranges_overlap(self.doc, &top_level[p], &r)
            {
                log::trace!(target: "wrap", "range {} overlaps {}", r.id, top_level[p].id);
                if r.flipped {
                    return Err(EncapsulationError::FlippedOverlap { range: r.id });
                }
                let prev_range = &mut top_level[p];
                subsumed.insert(r.id.clone(), prev_range.id.clone());
                cleanup = Some((r.start_elem, prev_range.end_elem));
                prev_range.end = r.end;
                prev_range.end_elem = r.end_elem;
                let prev_id = prev_range.id.clone();
                self.fold_into(&prev_id, &r, template_info);
            } else {
                log::trace!(target: "wrap", "range {} is top-level", r.id);
                if let Some(info) = template_info {
                    self.record_template_info(&r.id, &r, info);
                }
                top_level.push(r);
                prev = Some(top_level.len() - 1);
            }

            if let Some((start_tag, end_tag)) = cleanup {
                self.doc.remove(end_tag);
                self.strip_start_meta(start_tag);
            }
        }
        Ok(top_level)
    }

    fn attach_range(&mut self, node: NodeId, index: usize, ranges: &[DomRange]) {
        let attached = self.node_ranges.entry(node).or_default();
        let id = &ranges[index].id;
        match attached.iter().position(|&i| ranges[i].id == *id) {
            Some(pos) => attached[pos] = index,
            None => attached.push(index),
        }
    }

    fn ranges_at(&self, node: NodeId) -> &[usize] {
        self.node_ranges
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// For each range, walks from its start towards the root looking for
    /// another range that contains it.
    fn find_nesting(&self, root: NodeId, ranges: &[DomRange]) -> Subsumed {
        let mut subsumed = Subsumed::new();
        for r in ranges {
            let mut n = r.start;
            while n != root {
                let here = self.ranges_at(n);
                if !here.is_empty() {
                    if n != r.start {
                        // An ancestor is covered, so r is nested in the
                        // outermost range covering it.
                        if let Some(&outer) = here.iter().min_by_key(|&&i| ranges[i].start_offset) {
                            subsumed.insert(r.id.clone(), ranges[outer].id.clone());
                        }
                        break;
                    }

                    // r.start itself is covered: r is nested only when some
                    // other range also covers r.end.
                    let at_end = self.ranges_at(r.end);
                    let mut found = false;
                    for &oi in here {
                        let other = &ranges[oi];
                        let covers_end = at_end.iter().any(|&ei| ranges[ei].id == other.id);
                        // Of two identical ranges, the later one is subsumed.
                        let identical = r.start == other.start && r.end == other.end;
                        if other.id != r.id
                            && covers_end
                            && (!identical || other.start_offset < r.start_offset)
                            && !introduces_cycle(&r.id, &other.id, &subsumed)
                        {
                            found = true;
                            let current_offset = subsumed.get(&r.id).and_then(|cur| {
                                here.iter()
                                    .find(|&&i| ranges[i].id == *cur)
                                    .map(|&i| ranges[i].start_offset)
                            });
                            if current_offset.is_none_or(|off| other.start_offset < off) {
                                subsumed.insert(r.id.clone(), other.id.clone());
                            }
                        }
                    }
                    if found {
                        break;
                    }
                }
                match self.doc.parent(n) {
                    Some(p) => n = p,
                    None => break,
                }
            }
        }
        subsumed
    }

    /// Records `r`'s invocation under `target` and keeps its marker type
    /// so the target stays recognizable as generated content.
    fn fold_into(&mut self, target: &str, r: &DomRange, template_info: Option<TemplateInfo>) {
        if let Some(marker) = classify::tpl_marker(self.doc, r.start_elem) {
            let types = self.merged_types.entry(target.to_string()).or_default();
            let token = marker.type_token();
            if !types.contains(&token) {
                types.push(token);
            }
        }
        if let Some(info) = template_info {
            self.record_template_info(target, r, info);
        }
    }

    /// Appends `r`'s invocation to the compound list of `compound_id`, with
    /// the source text between it and the previous invocation.
    fn record_template_info(&mut self, compound_id: &str, r: &DomRange, mut info: TemplateInfo) {
        let dp = self.doc.provenance(r.start_elem);
        let dsr = dp.dsr.unwrap_or_default();
        let unwrapped = dp.unwrapped_wt.clone().filter(|wt| !wt.is_empty());
        let is_param = self.doc.has_type_of(r.start_elem, "mw:Param");

        let parts = self.compound.entry(compound_id.to_string()).or_default();
        let prev_end = parts.iter().rev().find_map(|p| p.dsr()).and_then(|d| d.end);
        if let (Some(prev_end), Some(start)) = (prev_end, dsr.start)
            && prev_end < start
        {
            parts.push(CompoundPart::Literal(safe_substr(
                self.doc.source(),
                prev_end,
                start - prev_end,
            )));
        }
        if let Some(wt) = unwrapped {
            parts.push(CompoundPart::Literal(wt));
        }

        // Offsets into argument source are only needed before wrapping.
        for pi in &mut info.param_infos {
            pi.src_offsets = None;
        }
        parts.push(CompoundPart::Invocation {
            dsr,
            info,
            is_param,
        });
    }

    /// Removes a start marker, or strips the marker types from an element
    /// that doubled as one.
    fn strip_start_meta(&mut self, start: NodeId) {
        if self.doc.has_name(start, "meta") {
            self.doc.remove(start);
        } else {
            self.doc.strip_type_of(start, |t| t.starts_with("mw:"));
        }
    }
}

/// Whether `curr` starts before `prev` ends. Ranges are visited in source
/// order and nested ones are already excluded, so both boundaries lie on
/// the same sibling chain when they intersect.
fn ranges_overlap(doc: &Document, prev: &DomRange, curr: &DomRange) -> bool {
    let (_, prev_end) = prev.ordered_bounds();
    let (curr_start, _) = curr.ordered_bounds();
    doc.in_sibling_order(curr_start, prev_end)
}

/// Whether making `start` nested in `end` would close a loop.
fn introduces_cycle(start: &str, end: &str, subsumed: &Subsumed) -> bool {
    let mut visited = HashSet::from([start]);
    let mut elt = subsumed.get(end);
    while let Some(cur) = elt {
        if !visited.insert(cur.as_str()) {
            return true;
        }
        elt = subsumed.get(cur);
    }
    false
}

/// Follows the nesting map from `start` to the outermost enclosing range.
fn toplevel_enclosing_range(
    nesting: &Subsumed,
    start: Option<&String>,
) -> Result<Option<String>, EncapsulationError> {
    let Some(mut id) = start else {
        return Ok(None);
    };
    let mut visited = HashSet::new();
    while let Some(next) = nesting.get(id) {
        if !visited.insert(id) {
            return Err(EncapsulationError::NestingCycle { range: id.clone() });
        }
        id = next;
    }
    Ok(Some(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::diagnostics::Diagnostics;
    use pretty_assertions::assert_eq;

    fn ids(ranges: &[DomRange]) -> Vec<&str> {
        ranges.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn cycle_detection() {
        let mut nesting = Subsumed::new();
        nesting.insert("a".into(), "b".into());
        nesting.insert("b".into(), "c".into());
        assert!(introduces_cycle("c", "a", &nesting));
        assert!(!introduces_cycle("d", "a", &nesting));
        assert_eq!(
            toplevel_enclosing_range(&nesting, Some(&"a".to_string())),
            Ok(Some("c".to_string()))
        );

        nesting.insert("c".into(), "a".into());
        assert!(matches!(
            toplevel_enclosing_range(&nesting, Some(&"a".to_string())),
            Err(EncapsulationError::NestingCycle { .. })
        ));
        assert_eq!(toplevel_enclosing_range(&nesting, None), Ok(None));
    }

    #[test]
    fn nested_range_folds_into_outer() {
        // {{outer|{{inner}}}}
        let mut doc = Document::new("{{outer|{{inner}}}}");
        let root = doc.root();
        let outer_start = start_marker(&mut doc, root, "#mwt1", "outer", 0, 19);
        let div = el(&mut doc, root, "div");
        let inner_start = start_marker(&mut doc, div, "#mwt2", "inner", 8, 17);
        text(&mut doc, div, "x");
        let inner_end = end_marker(&mut doc, div, "#mwt2");
        let outer_end = end_marker(&mut doc, root, "#mwt1");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let ranges = builder.find_ranges(root).unwrap();
        assert_eq!(ids(&ranges), vec!["2", "1"]);
        let top = builder.resolve(root, ranges).unwrap();
        assert_eq!(ids(&top), vec!["1"]);

        let parts = &builder.compound["1"];
        assert_eq!(parts.len(), 2);
        assert_eq!(builder.merged_types["1"], vec!["mw:Transclusion"]);

        assert!(doc.is_attached(outer_start));
        assert!(doc.is_attached(outer_end));
        assert!(!doc.is_attached(inner_start));
        assert!(!doc.is_attached(inner_end));
    }

    #[test]
    fn overlapping_ranges_merge_into_first() {
        // two expansions that split one paragraph between them
        let mut doc = Document::new("{{a}}{{b}}");
        let root = doc.root();
        let s1 = start_marker(&mut doc, root, "#mwt1", "a", 0, 5);
        let p = el(&mut doc, root, "p");
        text(&mut doc, p, "x");
        let e1 = end_marker(&mut doc, p, "#mwt1");
        let s2 = start_marker(&mut doc, p, "#mwt2", "b", 5, 10);
        text(&mut doc, p, "y");
        let e2 = end_marker(&mut doc, root, "#mwt2");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let ranges = builder.find_ranges(root).unwrap();
        let top = builder.resolve(root, ranges).unwrap();
        assert_eq!(ids(&top), vec!["1"]);
        assert_eq!(top[0].start, s1);
        assert_eq!(top[0].end, e2);
        assert_eq!(top[0].end_elem, e2);
        assert_eq!(builder.compound["1"].len(), 2);

        let again = builder.resolve(root, top.clone()).unwrap();
        assert_eq!(again, top);

        assert!(!doc.is_attached(e1));
        assert!(!doc.is_attached(s2));
    }

    #[test]
    fn disjoint_ranges_stay_separate() {
        let mut doc = Document::new("{{a}} {{b}}");
        let root = doc.root();
        start_marker(&mut doc, root, "#mwt1", "a", 0, 5);
        text(&mut doc, root, "x");
        end_marker(&mut doc, root, "#mwt1");
        text(&mut doc, root, " ");
        start_marker(&mut doc, root, "#mwt2", "b", 6, 11);
        text(&mut doc, root, "y");
        end_marker(&mut doc, root, "#mwt2");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let ranges = builder.find_ranges(root).unwrap();
        let top = builder.resolve(root, ranges).unwrap();
        assert_eq!(ids(&top), vec!["1", "2"]);
        assert!(!ranges_overlap(builder.doc, &top[0], &top[1]));

        // Resolving the resolved set changes nothing.
        let again = builder.resolve(root, top.clone()).unwrap();
        assert_eq!(again, top);
    }

    #[test]
    fn identical_ranges_keep_the_earlier_one() {
        let mut doc = Document::new("{{a}}");
        let root = doc.root();
        let p = el(&mut doc, root, "p");
        start_marker(&mut doc, p, "#mwt1", "a", 0, 5);
        start_marker(&mut doc, p, "#mwt2", "b", 1, 4);
        text(&mut doc, p, "x");
        end_marker(&mut doc, p, "#mwt2");
        end_marker(&mut doc, p, "#mwt1");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let mut ranges = builder.find_ranges(root).unwrap();
        // Widen both ranges to the same node pair.
        for r in &mut ranges {
            r.start = p;
            r.end = p;
        }
        let top = builder.resolve(root, ranges).unwrap();
        assert_eq!(ids(&top), vec!["1"]);
    }

    #[test]
    fn missing_invocation_info_is_fatal() {
        let mut doc = Document::new("{{a}}");
        let root = doc.root();
        let sm = start_marker(&mut doc, root, "#mwt1", "a", 0, 5);
        doc.provenance_mut(sm).template = None;
        text(&mut doc, root, "x");
        end_marker(&mut doc, root, "#mwt1");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let ranges = builder.find_ranges(root).unwrap();
        assert_eq!(
            builder.resolve(root, ranges),
            Err(EncapsulationError::MissingInvocationInfo { range: "1".into() })
        );
    }

    #[test]
    fn gap_between_invocations_is_literal() {
        let mut doc = Document::new("{{a}} and {{b}}");
        let root = doc.root();
        start_marker(&mut doc, root, "#mwt1", "a", 0, 5);
        let div = el(&mut doc, root, "div");
        start_marker(&mut doc, div, "#mwt2", "b", 10, 15);
        end_marker(&mut doc, div, "#mwt2");
        end_marker(&mut doc, root, "#mwt1");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let ranges = builder.find_ranges(root).unwrap();
        builder.resolve(root, ranges).unwrap();
        let parts = &builder.compound["1"];
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], CompoundPart::Literal(" and ".into()));
    }

    #[test]
    fn flipped_range_overlapping_its_predecessor_is_fatal() {
        let mut doc = Document::new("{{a}}{{b}}");
        let root = doc.root();
        let s1 = start_marker(&mut doc, root, "#mwt1", "a", 0, 5);
        el(&mut doc, root, "p");
        let b = el(&mut doc, root, "p");
        let e1 = end_marker(&mut doc, root, "#mwt1");
        let c = el(&mut doc, root, "p");
        let s2 = start_marker(&mut doc, root, "#mwt2", "b", 5, 10);
        let e2 = end_marker(&mut doc, root, "#mwt2");
        let first = DomRange {
            id: "1".into(),
            start_offset: 0,
            start_elem: s1,
            end_elem: e1,
            start: s1,
            end: e1,
            flipped: false,
        };
        // The second range's end was fostered ahead of its start, into the
        // middle of the first range.
        let second = DomRange {
            id: "2".into(),
            start_offset: 5,
            start_elem: s2,
            end_elem: e2,
            start: c,
            end: b,
            flipped: true,
        };

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        assert_eq!(
            builder.resolve(root, vec![first, second]),
            Err(EncapsulationError::FlippedOverlap { range: "2".into() })
        );
    }

    #[test]
    fn mutually_covering_ranges_nest_one_way_only() {
        let mut doc = Document::new("{{a}}{{b}}");
        let root = doc.root();
        let s1 = start_marker(&mut doc, root, "#mwt1", "a", 0, 5);
        let a = el(&mut doc, root, "p");
        let s2 = start_marker(&mut doc, root, "#mwt2", "b", 5, 10);
        let c = el(&mut doc, root, "p");
        let e1 = end_marker(&mut doc, root, "#mwt1");
        let e2 = end_marker(&mut doc, root, "#mwt2");
        // Both ranges cover the same run, each starting at the other's end.
        let forward = DomRange {
            id: "1".into(),
            start_offset: 0,
            start_elem: s1,
            end_elem: e1,
            start: a,
            end: c,
            flipped: false,
        };
        let backward = DomRange {
            id: "2".into(),
            start_offset: 5,
            start_elem: s2,
            end_elem: e2,
            start: c,
            end: a,
            flipped: true,
        };

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let top = builder.resolve(root, vec![forward, backward]).unwrap();
        assert_eq!(ids(&top), vec!["2"]);
        assert_eq!(builder.compound["2"].len(), 2);
        assert!(!doc.is_attached(s1));
        assert!(!doc.is_attached(e1));
    }
}
