use crate::diagnostics::{Category, Diagnostics};
use crate::dom::{Document, NodeId, Syntax, classify};
use crate::source::{DomSourceRange, SourceRange};

use super::measure::{decoded_comment_length, indent_pre_correction};
use super::widths::{compute_tag_widths, tsr_spans_tag_dom};

/// Width harvested from an end-tag marker, reusable as the closing width of
/// the element it closes.
#[derive(Debug)]
struct EndTagInfo {
    width: i64,
    node_name: Option<String>,
}

/// A child being resolved, kept while its own subtree is on the stack.
#[derive(Debug)]
struct ChildVisit {
    child: NodeId,
    prev_child: Option<NodeId>,
    orig_ce: Option<i64>,
    is_marker_tag: bool,
    end_tag_info: Option<EndTagInfo>,
    fostered: bool,
    name: String,
    tsr: Option<SourceRange>,
    old_ce: Option<i64>,
    propagate_right: bool,
    st_width: Option<i64>,
    et_width: Option<i64>,
}

/// An element whose children are being visited.
#[derive(Debug)]
struct Frame {
    node: NodeId,
    s: Option<i64>,
    e: Option<i64>,
    dsr_correction: i64,
    depth: usize,
    saved_end_tag_width: Option<i64>,
    cs: Option<i64>,
    ce: Option<i64>,
    next_child: Option<NodeId>,
    /// The child whose subtree sits on the stack above this frame.
    pending: Option<ChildVisit>,
}

enum Step {
    Descend(Frame),
    Done((Option<i64>, Option<i64>)),
}

/// One resolution run over a subtree.
pub(crate) struct DsrComputer<'a> {
    pub(crate) doc: &'a mut Document,
    pub(crate) diagnostics: &'a mut Diagnostics,
    pub(crate) attr_expansion: bool,
    pub(crate) max_depth: usize,
}

impl DsrComputer<'_> {
    /// Source width of a text or comment node as seen from the source side.
    fn leaf_width(&self, id: NodeId) -> i64 {
        match self.doc.text(id) {
            Some(data) if self.doc.is_comment(id) => decoded_comment_length(data),
            Some(text) => text.len() as i64 + indent_pre_correction(self.doc, id),
            None => 0,
        }
    }

    /// A known start that differs from the computed one is expected for
    /// canonicalized links and for the root of an attribute-only expansion.
    fn acceptable_inconsistency(&self, node: NodeId) -> bool {
        if self.doc.is_element(node)
            && (classify::is_url_link(self.doc, node) || classify::is_magic_link(self.doc, node))
        {
            return true;
        }
        self.attr_expansion && classify::at_the_top(self.doc, node)
    }

    /// Assigns spans to every descendant of `node`, whose own content is
    /// known to lie within `[s, e)` (either bound may be unknown), and
    /// returns the node's effective `(start, end)`.
    ///
    /// Children are visited right to left carrying the running end `ce`.
    /// Whenever a child pins down a new end, later siblings are patched
    /// left to right. Subtrees are resolved on an explicit frame stack, so
    /// depth is bounded by memory rather than by the thread's stack.
    pub(crate) fn compute_node(
        &mut self,
        node: NodeId,
        s: Option<i64>,
        e: Option<i64>,
    ) -> (Option<i64>, Option<i64>) {
        let mut stack = vec![self.enter(node, s, e, 0, 0)];
        let mut finished: Option<(Option<i64>, Option<i64>)> = None;

        while let Some(frame) = stack.last_mut() {
            let step = match finished.take() {
                Some(subtree) => self.resume(frame, subtree),
                None => self.advance(frame),
            };
            match step {
                Step::Descend(child) => stack.push(child),
                Step::Done(range) => {
                    stack.pop();
                    finished = Some(range);
                }
            }
        }
        finished.unwrap_or((s, e))
    }

    fn enter(
        &self,
        node: NodeId,
        s: Option<i64>,
        mut e: Option<i64>,
        dsr_correction: i64,
        depth: usize,
    ) -> Frame {
        if e.is_none() && !self.doc.has_children(node) {
            e = s;
        }
        log::trace!(
            target: "dsr",
            "BEG: {} with [s, e]=[{s:?}, {e:?}]",
            self.doc.node_name(node)
        );
        Frame {
            node,
            s,
            e,
            dsr_correction,
            depth,
            saved_end_tag_width: None,
            cs: e,
            ce: e,
            next_child: self.doc.last_child(node),
            pending: None,
        }
    }

    /// Continues a frame after the subtree of its pending child resolved to
    /// `subtree`.
    fn resume(&mut self, f: &mut Frame, subtree: (Option<i64>, Option<i64>)) -> Step {
        if let Some(visit) = f.pending.take() {
            self.after_subtree(f, visit, subtree);
        }
        self.advance(f)
    }

    /// Visits the frame's remaining children until one needs its own
    /// subtree resolved, or all are done.
    fn advance(&mut self, f: &mut Frame) -> Step {
        while let Some(c) = f.next_child {
            if let Some(child_frame) = self.visit_child(f, c) {
                return Step::Descend(child_frame);
            }
        }
        Step::Done(self.leave(f))
    }

    /// Handles child `c` up to the point where its own subtree must be
    /// resolved. Returns the frame for that subtree, or `None` when the
    /// child was finished in place.
    fn visit_child(&mut self, f: &mut Frame, c: NodeId) -> Option<Frame> {
        let mut visit = ChildVisit {
            child: c,
            prev_child: self.doc.prev_sibling(c),
            orig_ce: f.ce,
            is_marker_tag: false,
            end_tag_info: None,
            fostered: false,
            name: String::new(),
            tsr: None,
            old_ce: None,
            propagate_right: false,
            st_width: None,
            et_width: None,
        };
        f.cs = None;

        let end_tsr = if self.doc.is_element(c) {
            self.doc.provenance(c).end_tsr
        } else {
            None
        };
        if let Some(end_tsr) = end_tsr {
            f.ce = Some(end_tsr.end);
        }

        // A stripped quote tag right after a quote element: the element
        // absorbs the stripped tag's source.
        if let Some(next) = self.doc.next_sibling(c)
            && let Some(src_len) = self.stripped_quote_width(c, next)
            && let Some(ce_val) = f.ce
        {
            f.ce = Some(ce_val + src_len);
            f.dsr_correction = src_len;
        }

        log::trace!(
            target: "dsr",
            "     CHILD: {} with [cs, ce]=[{:?}, {:?}]",
            self.doc.node_name(c),
            f.cs,
            f.ce
        );

        if !self.doc.is_element(c) {
            if let Some(ce_val) = f.ce {
                f.cs = Some(ce_val - self.leaf_width(c));
            }
            self.finish_child(f, visit);
            return None;
        }

        let prov = self.doc.provenance(c).clone();
        let tsr = prov.tsr;
        visit.tsr = tsr;
        visit.old_ce = tsr.map(|t| t.end);
        visit.name = self.doc.node_name(c).to_string();
        visit.fostered = prov.flags.fostered;

        if let Some(ce_val) = f.ce
            && prov.flags.auto_inserted_end
            && classify::is_quote_elt(self.doc, c)
        {
            let correction = 3 + visit.name.len() as i64;
            if correction == f.dsr_correction {
                f.ce = Some(ce_val - correction);
                f.dsr_correction = 0;
            }
        }

        if visit.name == "meta" {
            let end_tag = self.doc.has_type_of(c, "mw:EndTag");
            if end_tag || self.doc.has_type_of(c, "mw:TSRMarker") {
                visit.is_marker_tag = true;
                if end_tag {
                    self.copy_end_tag_src_to_table(c, prov.end_tag_src.as_deref());
                }
                if let Some(tsr) = tsr {
                    visit.end_tag_info = Some(EndTagInfo {
                        width: tsr.len(),
                        node_name: self.doc.attr(c, "data-etag").map(str::to_string),
                    });
                    f.cs = Some(tsr.end);
                    f.ce = Some(tsr.end);
                    visit.propagate_right = true;
                }
            } else if let Some(tsr) = tsr {
                // Expansion markers reset the running offsets to the
                // top-level source.
                visit.propagate_right = classify::is_tpl_marker_meta(self.doc, c);
                f.cs = Some(tsr.start);
                f.ce = Some(tsr.end);
            } else if let (true, Some(ce_val), Some(src)) =
                (classify::is_placeholder(self.doc, c), f.ce, prov.src.as_ref())
            {
                f.cs = Some(ce_val - src.len() as i64);
            } else if self
                .doc
                .attr(c, "property")
                .is_some_and(|p| p.contains("mw:objectAttr"))
            {
                f.cs = f.ce;
            }
            if let Some((open, close)) = prov.ext_tag_widths {
                visit.st_width = Some(open);
                visit.et_width = Some(close);
                self.doc.provenance_mut(c).ext_tag_widths = None;
            }
            self.finish_child(f, visit);
            return None;
        }

        if let (true, Some(ce_val), Some(src)) =
            (self.doc.has_type_of(c, "mw:Entity"), f.ce, prov.src.as_ref())
        {
            f.cs = Some(ce_val - src.len() as i64);
            self.finish_child(f, visit);
            return None;
        }

        if let (true, Some(ce_val), Some(src)) =
            (classify::is_placeholder(self.doc, c), f.ce, prov.src.as_ref())
        {
            f.cs = Some(ce_val - src.len() as i64);
        } else {
            if let Some(end_tsr) = prov.end_tsr {
                visit.et_width = Some(end_tsr.len());
            }
            if let Some(tsr) = tsr
                && !prov.flags.auto_inserted_start
            {
                f.cs = Some(tsr.start);
                if tsr_spans_tag_dom(self.doc, c, &prov) {
                    if tsr.end > 0 {
                        f.ce = Some(tsr.end);
                        visit.propagate_right = true;
                    }
                } else {
                    visit.st_width = Some(tsr.len());
                }
                log::trace!(
                    target: "dsr",
                    "     TSR: {tsr:?}; cs: {:?}; ce: {:?}",
                    f.cs,
                    f.ce
                );
            } else if f.s.is_some() && visit.prev_child.is_none() {
                f.cs = f.s;
            }
        }

        let et_seed = visit.et_width.or(f.saved_end_tag_width);
        (visit.st_width, visit.et_width) =
            compute_tag_widths((visit.st_width, et_seed), self.doc, c, &prov);
        if prov.flags.auto_inserted_start {
            visit.st_width = Some(0);
        }
        if prov.flags.auto_inserted_end {
            visit.et_width = Some(0);
        }

        let ccs = f.cs.zip(visit.st_width).map(|(a, b)| a + b);
        let cce = f.ce.zip(visit.et_width).map(|(a, b)| a - b);

        let opaque = classify::is_dom_fragment_wrapper(self.doc, c)
            || self.doc.has_type_of(c, "mw:LanguageVariant")
            || (classify::is_wikilink(self.doc, c) && prov.stx != Some(Syntax::Piped));
        if opaque {
            self.after_subtree(f, visit, (ccs, cce));
            return None;
        }
        if f.depth >= self.max_depth {
            self.diagnostics.emit(
                Category::DsrDepth,
                Some(c),
                &visit.name,
                format!("nesting deeper than {}; subtree left unresolved", self.max_depth),
            );
            self.after_subtree(f, visit, (ccs, cce));
            return None;
        }

        log::trace!(
            target: "dsr",
            "     before-recursing: [cs,ce]=[{:?}, {:?}]; [sw,ew]=[{:?}, {:?}]; subtree-[cs,ce]=[{ccs:?}, {cce:?}]",
            f.cs,
            f.ce,
            visit.st_width,
            visit.et_width
        );
        let child_frame = self.enter(c, ccs, cce, f.dsr_correction, f.depth + 1);
        f.pending = Some(visit);
        Some(child_frame)
    }

    /// Widens the running offsets by the child's tag widths around the span
    /// its subtree resolved to, then finishes the child.
    fn after_subtree(
        &mut self,
        f: &mut Frame,
        visit: ChildVisit,
        (start, end): (Option<i64>, Option<i64>),
    ) {
        if let (Some(sw), Some(start)) = (visit.st_width, start) {
            let new_cs = start - sw;
            if f.cs.is_none_or(|cur| visit.tsr.is_none() && new_cs < cur) {
                f.cs = Some(new_cs);
            }
        }
        if let (Some(ew), Some(end)) = (visit.et_width, end) {
            let new_ce = end + ew;
            if f.ce.is_none_or(|cur| new_ce > cur) {
                f.ce = Some(new_ce);
            }
        }
        self.finish_child(f, visit);
    }

    /// Stores the child's span, patches later siblings and moves the frame
    /// on to the previous sibling.
    fn finish_child(&mut self, f: &mut Frame, visit: ChildVisit) {
        let c = visit.child;
        let mut prev_child = visit.prev_child;

        if self.doc.is_element(c) {
            if f.cs.is_some() || f.ce.is_some() {
                if let Some(ce_val) = f.ce
                    && ce_val < 0
                {
                    if !visit.fostered {
                        self.diagnostics.emit(
                            Category::DsrNegative,
                            Some(c),
                            &visit.name,
                            format!("negative end {ce_val}; resetting to zero"),
                        );
                    }
                    f.ce = Some(0);
                }

                let dsr = if visit.fostered {
                    // Fostered content owns no source width.
                    let anchor = visit.orig_ce.map(|v| v.max(0));
                    DomSourceRange::new(anchor, anchor, None, None)
                } else {
                    DomSourceRange::new(f.cs, f.ce, visit.st_width, visit.et_width)
                };
                self.doc.provenance_mut(c).dsr = Some(dsr);
                log::trace!(
                    target: "dsr",
                    "     UPDATING {} with [{:?}, {:?}]; typeof: {}",
                    visit.name,
                    f.cs,
                    f.ce,
                    self.doc.attr(c, "typeof").unwrap_or_default()
                );
            }

            if let Some(ce_val) = f.ce
                && (visit.propagate_right || visit.old_ce != f.ce || f.e.is_none())
                && !classify::is_tpl_start_marker_meta(self.doc, c)
                && let Some(new_e) = self.propagate_forward(c, ce_val)
            {
                f.e = new_e;
            }
        }

        if visit.fostered {
            f.ce = visit.orig_ce;
        } else {
            f.ce = f.cs;
            f.saved_end_tag_width = visit.end_tag_info.and_then(|info| {
                let prev = self.doc.prev_sibling(c)?;
                (info.node_name.as_deref() == Some(self.doc.node_name(prev)))
                    .then_some(info.width)
            });
        }

        if visit.is_marker_tag {
            prev_child = self.absorb_marker(c, prev_child, &mut f.cs, &mut f.ce);
        }

        f.next_child = prev_child;
    }

    /// Settles the frame's own start once every child is done.
    fn leave(&mut self, f: &mut Frame) -> (Option<i64>, Option<i64>) {
        if f.cs.is_none() {
            f.cs = f.s;
        }

        if let Some(s_val) = f.s
            && f.cs != Some(s_val)
            && !self.acceptable_inconsistency(f.node)
        {
            self.diagnostics.emit(
                Category::DsrInconsistent,
                Some(f.node),
                self.doc.node_name(f.node),
                format!("cs/s mismatch: s={s_val}; cs={:?}", f.cs),
            );
        }

        log::trace!(
            target: "dsr",
            "END: {}, returning: {:?}, {:?}",
            self.doc.node_name(f.node),
            f.cs,
            f.e
        );
        (f.cs, f.e)
    }

    /// Width of a stripped quote tag that `child` must absorb, if `next` is
    /// one and `child` is a quote element.
    fn stripped_quote_width(&self, child: NodeId, next: NodeId) -> Option<i64> {
        if !self.doc.is_element(next)
            || !self.doc.has_type_of(next, "mw:Placeholder/StrippedTag")
            || classify::is_nested_in_list_item(self.doc, next)
            || !classify::is_quote_elt(self.doc, child)
        {
            return None;
        }
        let ndp = self.doc.provenance(next);
        let src = ndp.src.as_ref()?;
        let name = ndp.name.as_deref()?;
        classify::QUOTE_TAGS
            .contains(&name)
            .then_some(src.len() as i64)
    }

    /// An end-tag marker right after a table carries the table's real
    /// closing syntax.
    fn copy_end_tag_src_to_table(&mut self, marker: NodeId, end_tag_src: Option<&str>) {
        let Some(src) = end_tag_src else {
            return;
        };
        if let Some(prev) = self.doc.prev_sibling(marker)
            && self.doc.has_name(prev, "table")
            && !classify::is_literal_markup(self.doc, prev)
        {
            self.doc.provenance_mut(prev).end_tag_src = Some(src.to_string());
        }
    }

    /// Pushes a newly found end offset `ce` forward through the siblings
    /// after `child`, stopping at anything whose start is already trusted.
    /// Returns the new end of the parent when the walk ran off the end.
    fn propagate_forward(&mut self, child: NodeId, ce: i64) -> Option<Option<i64>> {
        let mut sibling = self.doc.next_sibling(child);
        let mut new_ce = Some(ce);
        while let (Some(cur_ce), Some(sib)) = (new_ce, sibling) {
            if classify::is_tpl_start_marker_meta(self.doc, sib) {
                break;
            }
            if self.doc.is_element(sib) {
                let sdp = self.doc.provenance_mut(sib);
                let dsr = sdp.dsr.get_or_insert_with(DomSourceRange::default);
                if sdp.flags.fostered
                    || dsr.start == Some(cur_ce)
                    || (dsr.start.is_some_and(|st| st < cur_ce) && sdp.tsr.is_some())
                {
                    break;
                }
                log::trace!(
                    target: "dsr",
                    "     CHANGING ce.start of {sib} from {:?} to {cur_ce}",
                    dsr.start
                );
                dsr.start = Some(cur_ce);
                if let Some(end) = dsr.end
                    && cur_ce > end
                {
                    dsr.end = Some(cur_ce);
                }
                new_ce = dsr.end;
            } else {
                new_ce = Some(cur_ce + self.leaf_width(sib));
            }
            sibling = self.doc.next_sibling(sib);
        }
        sibling.is_none().then_some(new_ce)
    }

    /// Removes a zero-content marker once its width is harvested, merging
    /// the text runs on either side so later siblings see one node.
    /// Returns the next child to visit.
    fn absorb_marker(
        &mut self,
        marker: NodeId,
        prev_child: Option<NodeId>,
        cs: &mut Option<i64>,
        ce: &mut Option<i64>,
    ) -> Option<NodeId> {
        let mut prev_child = prev_child;
        let next_child = self.doc.next_sibling(marker);
        if let (Some(prev), Some(next)) = (prev_child, next_child)
            && self.doc.is_text(prev)
            && self.doc.is_text(next)
        {
            if let Some(ce_val) = *ce {
                *cs = Some(ce_val - self.leaf_width(prev));
                *ce = *cs;
            }
            let merged = format!(
                "{}{}",
                self.doc.text(prev).unwrap_or_default(),
                self.doc.text(next).unwrap_or_default()
            );
            self.doc.set_text(prev, merged);
            self.doc.remove(next);
            prev_child = self.doc.prev_sibling(prev);
        }
        self.doc.remove(marker);
        prev_child
    }
}
