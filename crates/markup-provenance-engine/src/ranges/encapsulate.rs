use crate::diagnostics::Category;
use crate::dom::{NodeId, classify};
use crate::dsr::measure::non_element_width;
use crate::error::EncapsulationError;
use crate::expansion::{ExpansionInfo, ExpansionPart, Invocation, InvocationKind};
use crate::source::{DomSourceRange, safe_substr};

use super::{CompoundPart, DomRange, RangeBuilder, describe};

impl RangeBuilder<'_> {
    /// Rewrites each top-level range into one tagged run whose first element
    /// carries the merged span and expansion metadata.
    pub fn encapsulate(&mut self, ranges: &[DomRange]) -> Result<(), EncapsulationError> {
        for range in ranges {
            self.encapsulate_range(range)?;
        }
        Ok(())
    }

    fn encapsulate_range(&mut self, range: &DomRange) -> Result<(), EncapsulationError> {
        self.ensure_elements_in_range(range);

        let mut parts = self
            .compound
            .remove(&range.id)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| EncapsulationError::MissingParts {
                range: range.id.clone(),
            })?;

        let target = self.find_encap_target(range)?;

        // Marker types go on the target even when the metadata below cannot
        // be built, so the content is still protected from direct edits.
        let start_elem = range.start_elem;
        if start_elem != target {
            let tokens: Vec<String> = self
                .doc
                .type_of_tokens(start_elem)
                .map(str::to_string)
                .collect();
            for token in tokens.iter().rev() {
                self.doc.add_type_of(target, token, true);
            }
        }
        for token in self.merged_types.remove(&range.id).unwrap_or_default() {
            self.doc.add_type_of(target, token, false);
        }

        let start_prov = self.doc.provenance(range.start);
        let start_fostered = start_prov.flags.fostered;
        let mut span = start_prov.dsr;
        let end_span = self.range_end_dsr(range);

        let mut valid = false;
        if let Some(span) = span.as_mut() {
            if let Some(end_span) = end_span {
                if let Some(end) = end_span.end
                    && span.end.is_none_or(|e| end > e)
                {
                    span.end = Some(end);
                }
                // The start was fostered out of the table that ends the
                // range, so the table's start is the real one.
                if self.doc.has_name(range.end, "table")
                    && let Some(table_start) = end_span.start
                    && (span.start.is_some_and(|s| table_start < s) || start_fostered)
                {
                    span.start = Some(table_start);
                }
            }
            valid = span.is_valid() && span.end >= span.start;
        }

        let mut part_count = None;
        if let Some(span) = span.filter(|_| valid) {
            let (expansion, first_node) = self.build_expansion(range, &mut parts, span);
            part_count = Some(expansion.parts.len());
            let tp = self.doc.provenance_mut(target);
            if first_node.is_some() {
                tp.first_wikitext_node = first_node;
            }
            tp.expansion = Some(expansion);
            if tp.first_wikitext_node.is_none() {
                let inherited = self.doc.provenance(start_elem).first_wikitext_node.clone();
                self.doc.provenance_mut(target).first_wikitext_node = inherited;
            }
        } else {
            self.diagnostics.emit(
                Category::EncapsulationInvalid,
                Some(target),
                self.doc.node_name(target),
                format!(
                    "missing span data for range {}; start: {}; end: {}; start span: {:?}; end span: {:?}",
                    range.id,
                    describe(self.doc, start_elem),
                    describe(self.doc, range.end_elem),
                    span.map(|s| s.to_json_array()),
                    end_span.map(|s| s.to_json_array()),
                ),
            );
        }

        // Fostered content owns no source width unless the range also
        // captured the table it came from.
        if start_fostered
            && part_count.is_none_or(|n| n == 1)
            && let Some(span) = span.as_mut()
        {
            span.end = span.start;
        }

        if let Some(span) = span.filter(|_| valid) {
            let src = span.substr(self.doc.source());
            let tp = self.doc.provenance_mut(target);
            match tp.dsr.as_mut() {
                Some(dsr) => {
                    dsr.start = span.start;
                    dsr.end = span.end;
                }
                None => tp.dsr = Some(span),
            }
            tp.src = src;
        }

        if classify::is_tpl_marker_meta(self.doc, start_elem) {
            self.doc.remove(start_elem);
        }
        self.doc.remove(range.end_elem);
        Ok(())
    }

    /// Turns the compound parts into the final metadata, adding the
    /// literal source before the first and after the last invocation.
    /// Also returns the first-node hint when leading literal text exists.
    fn build_expansion(
        &self,
        range: &DomRange,
        parts: &mut Vec<CompoundPart>,
        span: DomSourceRange,
    ) -> (ExpansionInfo, Option<String>) {
        let (Some(start), Some(end)) = (span.start, span.end) else {
            return (ExpansionInfo::default(), None);
        };
        let source = self.doc.source();

        let mut first_node = None;
        let first_start = parts.iter().find_map(|p| p.dsr()).and_then(|d| d.start);
        if let Some(first_start) = first_start
            && first_start > start
        {
            // Mixed literal and generated content: later serialization
            // needs to know what the block really starts with.
            first_node = self.first_templated_node(range);
            parts.insert(
                0,
                CompoundPart::Literal(safe_substr(source, start, first_start - start)),
            );
        }

        let last_end = parts.iter().rev().find_map(|p| p.dsr()).and_then(|d| d.end);
        if let Some(last_end) = last_end
            && last_end < end
        {
            parts.push(CompoundPart::Literal(safe_substr(
                source,
                last_end,
                end - last_end,
            )));
        }

        let mut info = ExpansionInfo::default();
        let mut index = 0;
        for part in parts.drain(..) {
            match part {
                CompoundPart::Literal(text) => info.parts.push(ExpansionPart::Literal(text)),
                CompoundPart::Invocation {
                    dsr,
                    info: template,
                    is_param,
                } => {
                    let kind = if is_param {
                        InvocationKind::TemplateArg
                    } else if template.func.is_some() {
                        InvocationKind::ParserFunction
                    } else {
                        InvocationKind::Template
                    };
                    info.param_infos.push(template.param_infos.clone());
                    info.parts.push(ExpansionPart::Invocation(Invocation {
                        kind,
                        index,
                        span: dsr,
                        info: template,
                    }));
                    index += 1;
                }
            }
        }
        (info, first_node)
    }

    /// Every top-level node of the range gets the shared `about` id, so all
    /// of them must be elements.
    fn ensure_elements_in_range(&mut self, range: &DomRange) {
        let about = self.doc.about(range.start_elem).unwrap_or_default().to_string();
        let mut n = Some(range.start);
        while let Some(cur) = n {
            let next = self.doc.next_sibling(cur);
            if self.doc.is_element(cur) {
                self.doc.set_attr(cur, "about", &about);
            } else if classify::is_fosterable_position(self.doc, cur) {
                // Only inter-element whitespace and comments can be here;
                // the metadata already captures them.
                self.doc.remove(cur);
            } else {
                let span = self.doc.create_element("span");
                self.doc.set_attr(span, "about", &about);
                self.doc.wrap(cur, span);
            }
            if cur == range.end {
                break;
            }
            n = next;
        }
    }

    /// First element of the range that is not a marker.
    fn find_encap_target(&self, range: &DomRange) -> Result<NodeId, EncapsulationError> {
        let unencapsulatable = || EncapsulationError::Unencapsulatable {
            range: range.id.clone(),
            start: describe(self.doc, range.start_elem),
        };
        let mut target = range.start;
        while classify::is_tpl_marker_meta(self.doc, target) || !self.doc.is_element(target) {
            if target == range.end
                || (!self.doc.is_element(target)
                    && !classify::is_fosterable_position(self.doc, target))
            {
                return Err(unencapsulatable());
            }
            target = self.doc.next_sibling(target).ok_or_else(unencapsulatable)?;
        }
        Ok(target)
    }

    /// Span of the range's last node. A text or comment end is placed after
    /// the nearest preceding element with a known end.
    fn range_end_dsr(&self, range: &DomRange) -> Option<DomSourceRange> {
        let end = range.end;
        if self.doc.is_element(end) {
            return self.doc.provenance(end).dsr;
        }

        let mut offset = 0;
        let mut n = self.doc.prev_sibling(end);
        while let Some(cur) = n {
            if self.doc.is_element(cur) {
                break;
            }
            offset += non_element_width(self.doc, cur).unwrap_or(0);
            n = self.doc.prev_sibling(cur);
        }

        let dsr = n.and_then(|el| self.doc.provenance(el).dsr)?;
        let Some(anchor) = dsr.end else {
            return Some(dsr);
        };
        let width = non_element_width(self.doc, end).unwrap_or(0);
        Some(DomSourceRange::new(
            Some(anchor + offset),
            Some(anchor + offset + width),
            None,
            None,
        ))
    }

    /// Upper-cased name (with its syntax flavour) of the first node the
    /// expansion produced, skipping the marker and any fostered content.
    fn first_templated_node(&self, range: &DomRange) -> Option<String> {
        let mut first = range.start;
        if classify::is_tpl_marker_meta(self.doc, first) {
            first = self.doc.next_sibling(first)?;
        }
        while self.doc.provenance(first).flags.fostered {
            first = self.doc.next_sibling(first)?;
        }
        if self.doc.has_name(first, "meta") {
            return None;
        }
        let name = self.doc.node_name(first).to_uppercase();
        Some(match self.doc.provenance(first).stx {
            Some(stx) => format!("{name}_{}", stx.as_str()),
            None => name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::dom::{Document, Syntax};
    use crate::expansion::ExpansionPart;
    use pretty_assertions::assert_eq;

    fn wrap(doc: &mut Document) -> Result<Diagnostics, EncapsulationError> {
        let mut diags = Diagnostics::new();
        let root = doc.root();
        RangeBuilder::new(doc, &mut diags).execute(root)?;
        Ok(diags)
    }

    #[test]
    fn single_expansion_wraps_its_text() {
        // {{1x|foo}}
        let mut doc = Document::new("{{1x|foo}}");
        let root = doc.root();
        let p = el(&mut doc, root, "p");
        dsr(&mut doc, p, 0, 10);
        let sm = start_marker(&mut doc, p, "#mwt1", "1x", 0, 10);
        let foo = text(&mut doc, p, "foo");
        let em = end_marker(&mut doc, p, "#mwt1");

        let diags = wrap(&mut doc).unwrap();
        assert!(diags.is_empty());
        assert!(!doc.is_attached(sm));
        assert!(!doc.is_attached(em));

        let target = doc.parent(foo).unwrap();
        assert!(doc.has_name(target, "span"));
        assert_eq!(doc.attr(target, "about"), Some("#mwt1"));
        assert_eq!(doc.attr(target, "typeof"), Some("mw:Transclusion"));
        let prov = doc.provenance(target);
        assert_eq!(prov.dsr_start(), Some(0));
        assert_eq!(prov.dsr_end(), Some(10));
        assert_eq!(prov.src.as_deref(), Some("{{1x|foo}}"));
        let expansion = prov.expansion.as_ref().unwrap();
        assert_eq!(expansion.to_string(), "template:1x|1=x@0..10");
    }

    #[test]
    fn leading_and_trailing_literals_are_recorded() {
        // a {{t}} b
        let mut doc = Document::new("a {{t}} b");
        let root = doc.root();
        let p = el(&mut doc, root, "p");
        dsr(&mut doc, p, 0, 9);
        let sm = start_marker(&mut doc, p, "#mwt1", "t", 2, 7);
        text(&mut doc, p, "x");
        end_marker(&mut doc, p, "#mwt1");

        // Pretend an enclosing pass widened the range to the paragraph.
        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let mut ranges = builder.find_ranges(root).unwrap();
        ranges[0].start = p;
        ranges[0].end = p;
        let top = builder.resolve(root, ranges).unwrap();
        builder.encapsulate(&top).unwrap();

        let prov = doc.provenance(p);
        let expansion = prov.expansion.as_ref().unwrap();
        assert_eq!(expansion.to_string(), "\"a \" template:t|1=x@2..7 \" b\"");
        assert_eq!(prov.first_wikitext_node.as_deref(), Some("P"));
        assert_eq!(expansion.reassemble(doc.source()), "a {{t}} b");
        assert!(!doc.is_attached(sm));
    }

    #[test]
    fn parts_are_numbered_and_typed() {
        let mut doc = Document::new("{{a}}{{{b}}}{{#if:c}}");
        let root = doc.root();
        let div = el(&mut doc, root, "div");
        start_marker(&mut doc, div, "#mwt1", "a", 0, 5);
        let p1 = el(&mut doc, div, "p");
        let param = start_marker(&mut doc, p1, "#mwt2", "b", 5, 12);
        doc.set_attr(param, "typeof", "mw:Param");
        end_marker(&mut doc, p1, "#mwt1");
        let func = start_marker(&mut doc, p1, "#mwt3", "#if", 12, 21);
        if let Some(info) = doc.provenance_mut(func).template.as_mut() {
            info.func = Some("if".into());
        }
        let pend = el(&mut doc, p1, "meta");
        doc.set_attr(pend, "typeof", "mw:Param/End");
        doc.set_attr(pend, "about", "#mwt2");
        end_marker(&mut doc, div, "#mwt3");

        wrap(&mut doc).unwrap();
        let target = p1;
        let expansion = doc.provenance(target).expansion.clone().unwrap();
        let kinds: Vec<_> = expansion
            .invocations()
            .map(|inv| (inv.index, inv.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (0, InvocationKind::Template),
                (1, InvocationKind::TemplateArg),
                (2, InvocationKind::ParserFunction),
            ]
        );
        assert_eq!(expansion.param_infos.len(), 3);
    }

    #[test]
    fn invalid_span_is_reported_and_markers_consumed() {
        let mut doc = Document::new("{{t}}");
        let root = doc.root();
        let sm = start_marker(&mut doc, root, "#mwt1", "t", 0, 5);
        doc.provenance_mut(sm).dsr = None;
        let span = el(&mut doc, root, "span");
        text(&mut doc, span, "x");
        let em = end_marker(&mut doc, root, "#mwt1");

        let diags = wrap(&mut doc).unwrap();
        assert_eq!(diags.of(Category::EncapsulationInvalid).count(), 1);
        assert!(doc.provenance(span).expansion.is_none());
        assert_eq!(doc.attr(span, "typeof"), Some("mw:Transclusion"));
        assert!(!doc.is_attached(sm));
        assert!(!doc.is_attached(em));
    }

    #[test]
    fn markers_only_range_is_fatal() {
        let mut doc = Document::new("{{t}}");
        let root = doc.root();
        let table = el(&mut doc, root, "table");
        let sm = start_marker(&mut doc, table, "#mwt1", "t", 0, 5);
        text(&mut doc, table, "\n");
        let em = end_marker(&mut doc, table, "#mwt1");

        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        builder
            .compound
            .insert("1".into(), vec![CompoundPart::Literal("{{t}}".into())]);
        let range = DomRange {
            id: "1".into(),
            start_offset: 0,
            start_elem: sm,
            end_elem: em,
            start: sm,
            end: em,
            flipped: false,
        };
        let err = builder.encapsulate(&[range]).unwrap_err();
        assert!(matches!(err, EncapsulationError::Unencapsulatable { .. }));
    }

    #[test]
    fn range_without_parts_is_fatal() {
        let mut doc = Document::new("x");
        let root = doc.root();
        let span = el(&mut doc, root, "span");
        let mut diags = Diagnostics::new();
        let mut builder = RangeBuilder::new(&mut doc, &mut diags);
        let range = DomRange {
            id: "7".into(),
            start_offset: 0,
            start_elem: span,
            end_elem: span,
            start: span,
            end: span,
            flipped: false,
        };
        let err = builder.encapsulate(&[range]).unwrap_err();
        assert_eq!(
            err,
            EncapsulationError::MissingParts { range: "7".into() }
        );
    }

    #[test]
    fn fostered_single_part_is_zero_width() {
        let mut doc = Document::new("{{t}}");
        let root = doc.root();
        let sm = start_marker(&mut doc, root, "#mwt1", "t", 0, 5);
        doc.provenance_mut(sm).flags.fostered = true;
        let div = el(&mut doc, root, "div");
        doc.provenance_mut(div).flags.fostered = true;
        text(&mut doc, div, "x");
        end_marker(&mut doc, root, "#mwt1");

        wrap(&mut doc).unwrap();
        let prov = doc.provenance(div);
        assert_eq!(prov.dsr_start(), Some(0));
        assert_eq!(prov.dsr_end(), Some(0));
        assert!(prov.expansion.is_some());
    }

    #[test]
    fn text_end_extrapolates_from_previous_element() {
        let mut doc = Document::new("<b>x</b>yz");
        let root = doc.root();
        let b = el(&mut doc, root, "b");
        doc.provenance_mut(b).stx = Some(Syntax::Html);
        dsr(&mut doc, b, 0, 8);
        let c = doc.create_comment("c");
        doc.append_child(root, c);
        let last = text(&mut doc, root, "yz");

        let mut diags = Diagnostics::new();
        let builder = RangeBuilder::new(&mut doc, &mut diags);
        let range = DomRange {
            id: "1".into(),
            start_offset: 0,
            start_elem: b,
            end_elem: last,
            start: b,
            end: last,
            flipped: false,
        };
        let end = builder.range_end_dsr(&range).unwrap();
        assert_eq!(end.start, Some(16));
        assert_eq!(end.end, Some(18));
        assert_eq!(builder.first_templated_node(&range).as_deref(), Some("B_html"));
    }

    #[test]
    fn first_parts_are_literal_free_for_exact_ranges() {
        let mut doc = Document::new("{{t}}");
        let root = doc.root();
        start_marker(&mut doc, root, "#mwt1", "t", 0, 5);
        let div = el(&mut doc, root, "div");
        dsr(&mut doc, div, 0, 5);
        end_marker(&mut doc, root, "#mwt1");

        wrap(&mut doc).unwrap();
        let expansion = doc.provenance(div).expansion.clone().unwrap();
        assert!(
            expansion
                .parts
                .iter()
                .all(|p| matches!(p, ExpansionPart::Invocation(_)))
        );
        assert!(doc.provenance(div).first_wikitext_node.is_none());
    }
}
