use markup_provenance_engine::{
    Category, Diagnostics, Document, DsrOptions, EncapsulationError, NodeId, SourceRange,
    TemplateInfo, process_document, snapshot,
};
use markup_provenance_syntax::{parse, render_content};
use pretty_assertions::assert_eq;

/// Parses a fixture, runs both passes and checks the span invariants and
/// literal round trip on the result.
fn run(tree: &str, source: &str) -> (Document, Diagnostics) {
    let mut doc = parse(tree, source).unwrap();
    let diags = process_document(&mut doc, &DsrOptions::default()).unwrap();
    snapshot::invariants(&doc);
    assert_round_trip(&doc);
    (doc, diags)
}

/// Every encapsulated target reassembles to the source its span covers.
fn assert_round_trip(doc: &Document) {
    for id in doc.descendants(doc.root()) {
        let prov = doc.provenance(id);
        let (Some(expansion), Some(dsr)) = (&prov.expansion, prov.dsr) else {
            continue;
        };
        assert_eq!(
            Some(expansion.reassemble(doc.source())),
            dsr.substr(doc.source()),
            "round trip of <{}> {id}",
            doc.node_name(id)
        );
    }
}

fn nth(doc: &Document, name: &str, n: usize) -> NodeId {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&id| doc.node_name(id) == name)
        .nth(n)
        .unwrap_or_else(|| panic!("no <{name}> #{n}"))
}

fn dsr(doc: &Document, id: NodeId) -> Vec<Option<i64>> {
    doc.provenance(id)
        .dsr
        .map(|d| d.to_json_array())
        .unwrap_or_default()
}

#[test]
fn single_expansion_becomes_one_unit() {
    let (doc, diags) = run(
        concat!(
            r##"<p><meta typeof="mw:Transclusion" about="#mwt1" data-tsr="0,10" data-tpl="1x|foo">"##,
            r##"foo<meta typeof="mw:Transclusion/End" about="#mwt1"></p>"##,
        ),
        "{{1x|foo}}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());
    insta::assert_snapshot!(render_content(&doc), @r##"<p data-dsr="0,10,0,0"><span about="#mwt1" typeof="mw:Transclusion" data-dsr="0,10,null,null" data-parts="template:1x|1=foo@0..10">foo</span></p>"##);

    let span = nth(&doc, "span", 0);
    let expansion = doc.provenance(span).expansion.as_ref().unwrap();
    assert_eq!(expansion.parts.len(), 1);
    assert_eq!(doc.provenance(span).src.as_deref(), Some("{{1x|foo}}"));
}

#[test]
fn adjacent_expansions_stay_separate() {
    let (doc, diags) = run(
        concat!(
            "<p>",
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="0,8" data-tpl="1x|a">a"##,
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1">"##,
            r##"<meta typeof="mw:Transclusion" about="#mwt2" data-tsr="8,16" data-tpl="1x|b">b"##,
            r##"<meta typeof="mw:Transclusion/End" about="#mwt2">"##,
            "</p>",
        ),
        "{{1x|a}}{{1x|b}}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());
    insta::assert_snapshot!(render_content(&doc), @r##"<p data-dsr="0,16,0,0"><span about="#mwt1" typeof="mw:Transclusion" data-dsr="0,8,null,null" data-parts="template:1x|1=a@0..8">a</span><span about="#mwt2" typeof="mw:Transclusion" data-dsr="8,16,null,null" data-parts="template:1x|1=b@8..16">b</span></p>"##);
}

#[test]
fn overlapping_expansions_merge_into_one_unit() {
    let (doc, diags) = run(
        concat!(
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="0,5" data-tpl="a">"##,
            "<p>x</p>",
            r##"<meta typeof="mw:Transclusion" about="#mwt2" data-tsr="5,10" data-tpl="b">"##,
            "<p>y</p>",
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1">"##,
            "<p>z</p>",
            r##"<meta typeof="mw:Transclusion/End" about="#mwt2">"##,
        ),
        "{{a}}{{b}}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());

    let first = nth(&doc, "p", 0);
    assert_eq!(dsr(&doc, first), vec![Some(0), Some(10), Some(0), Some(0)]);
    let expansion = doc.provenance(first).expansion.as_ref().unwrap();
    assert_eq!(expansion.to_string(), "template:a@0..5 template:b@5..10");

    let abouts: Vec<_> = doc
        .children(doc.root())
        .map(|c| doc.attr(c, "about"))
        .collect();
    assert_eq!(abouts, vec![Some("#mwt1"); 3]);
    assert!(doc.children(doc.root()).all(|c| doc.node_name(c) == "p"));
}

#[test]
fn first_item_wrapping_a_nested_list_has_no_opening_width() {
    let (doc, diags) = run(
        concat!(
            "<ul><li><ul><li>",
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="2,10" data-tpl="1x|x">x"##,
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1">"##,
            "</li></ul></li></ul>",
        ),
        "**{{1x|x}}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());

    let outer = nth(&doc, "li", 0);
    let inner = nth(&doc, "li", 1);
    assert_eq!(dsr(&doc, outer), vec![Some(0), Some(10), Some(0), Some(0)]);
    assert_eq!(dsr(&doc, inner), vec![Some(0), Some(10), Some(2), Some(0)]);
    assert_eq!(dsr(&doc, nth(&doc, "span", 0))[..2], [Some(2), Some(10)]);
}

#[test]
fn auto_closed_table_ends_at_its_last_child() {
    let (doc, diags) = run(
        concat!(
            r#"<table data-tsr="0,2" data-flags="auto-inserted-end"><tbody>"#,
            "\n",
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="3,10" data-tpl="row">"##,
            "<tr><td>a</td></tr>",
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1">"##,
            "</tbody></table>",
        ),
        "{|\n{{row}}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());

    let table = nth(&doc, "table", 0);
    assert_eq!(dsr(&doc, table), vec![Some(0), Some(10), Some(2), Some(0)]);
    assert_eq!(
        dsr(&doc, nth(&doc, "tbody", 0)),
        vec![Some(2), Some(10), Some(0), Some(0)]
    );

    let tr = nth(&doc, "tr", 0);
    assert_eq!(dsr(&doc, tr)[..2], [Some(3), Some(10)]);
    assert_eq!(doc.attr(tr, "typeof"), Some("mw:Transclusion"));
    assert_eq!(doc.provenance(tr).src.as_deref(), Some("{{row}}"));
}

#[test]
fn fostered_expansion_is_zero_width_and_leaves_table_alone() {
    let (doc, diags) = run(
        concat!(
            "<p>a</p>\n",
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="5,13" data-tpl="1x|x" data-flags="fostered">"##,
            r#"<p data-flags="fostered">x</p>"#,
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1" data-flags="fostered">"##,
            r#"<table data-tsr="2,4" data-end-tsr="14,16">"#,
            "\n",
            r#"<meta typeof="mw:TransclusionShadow" data-tsr="5,13">"#,
            "\n</table>\n<p>b</p>",
        ),
        "a\n{|\n{{1x|x}}\n|}\nb",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());

    let target = nth(&doc, "p", 1);
    assert_eq!(doc.attr(target, "about"), Some("#mwt1"));
    let span = doc.provenance(target).dsr.unwrap();
    assert_eq!(span.start, span.end);
    assert!(doc.provenance(target).expansion.is_some());

    assert_eq!(
        dsr(&doc, nth(&doc, "table", 0)),
        vec![Some(2), Some(16), Some(2), Some(2)]
    );
    assert_eq!(
        dsr(&doc, nth(&doc, "p", 2)),
        vec![Some(17), Some(18), Some(0), Some(0)]
    );
}

#[test]
fn empty_expansion_gets_a_placeholder_unit() {
    let (doc, diags) = run(
        concat!(
            "<p>a",
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="1,6" data-tpl="e">"##,
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1">"##,
            "</p>",
        ),
        "a{{e}}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());
    let span = nth(&doc, "span", 0);
    assert!(!doc.has_children(span));
    assert_eq!(dsr(&doc, span)[..2], [Some(1), Some(6)]);
}

#[test]
fn mismatched_lengths_are_reported_but_processing_continues() {
    let mut doc = parse("<p>abc</p>", "abcdef").unwrap();
    let diags = process_document(&mut doc, &DsrOptions::default()).unwrap();
    assert_eq!(diags.of(Category::DsrInconsistent).count(), 1);
    assert_eq!(diags.events()[0].node_name, "p");
}

#[test]
fn attribute_expansion_tolerates_root_mismatch() {
    let options = DsrOptions {
        attr_expansion: true,
        ..Default::default()
    };
    let mut doc = parse("abc", "abcdef").unwrap();
    let diags = process_document(&mut doc, &options).unwrap();
    assert!(diags.is_empty(), "{:?}", diags.events());

    let mut doc = parse("abc", "abcdef").unwrap();
    let diags = process_document(&mut doc, &DsrOptions::default()).unwrap();
    assert_eq!(diags.of(Category::DsrInconsistent).count(), 1);
}

#[test]
fn duplicate_start_marker_aborts_the_document() {
    let mut doc = parse(
        concat!(
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="0,5" data-tpl="a">"##,
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="0,5" data-tpl="a">"##,
        ),
        "{{a}}",
    )
    .unwrap();
    let err = process_document(&mut doc, &DsrOptions::default()).unwrap_err();
    assert_eq!(
        err,
        EncapsulationError::UnexpectedStartMarker {
            about: "#mwt1".into()
        }
    );
}

#[test]
fn marker_without_invocation_info_aborts_the_document() {
    let mut doc = parse(
        concat!(
            r##"<meta typeof="mw:Transclusion" about="#mwt1" data-tsr="0,5">"##,
            "<p>x</p>",
            r##"<meta typeof="mw:Transclusion/End" about="#mwt1">"##,
        ),
        "{{a}}",
    )
    .unwrap();
    let err = process_document(&mut doc, &DsrOptions::default()).unwrap_err();
    assert!(matches!(err, EncapsulationError::MissingInvocationInfo { .. }));
}

#[test]
fn fostered_content_keeps_its_offsets_from_inside_the_table() {
    let (doc, diags) = run(
        concat!(
            r#"<div data-flags="fostered"><span data-tsr="3,8">x</span></div>"#,
            r#"<table data-tsr="0,2" data-end-tsr="9,11">"#,
            "\n",
            r#"<meta data-tsr="3,8">"#,
            "\n</table>",
        ),
        "{|\n{{x}}\n|}",
    );
    assert!(diags.is_empty(), "{:?}", diags.events());

    assert_eq!(dsr(&doc, nth(&doc, "div", 0))[..2], [Some(0), Some(0)]);
    assert_eq!(dsr(&doc, nth(&doc, "span", 0))[..2], [Some(3), Some(8)]);
    assert_eq!(
        dsr(&doc, nth(&doc, "table", 0)),
        vec![Some(0), Some(11), Some(2), Some(2)]
    );
}

#[test]
fn deeply_nested_expansion_is_wrapped() {
    let mut doc = Document::new("{{a}}");
    let mut parent = doc.root();
    for _ in 0..200_000 {
        let div = doc.create_element("div");
        doc.append_child(parent, div);
        parent = div;
    }

    let start = doc.create_element("meta");
    doc.set_attr(start, "typeof", "mw:Transclusion");
    doc.set_attr(start, "about", "#mwt1");
    doc.provenance_mut(start).tsr = Some(SourceRange::new(0, 5));
    doc.provenance_mut(start).template = Some(TemplateInfo {
        target: "a".into(),
        ..Default::default()
    });
    doc.append_child(parent, start);
    let x = doc.create_text("x");
    doc.append_child(parent, x);
    let end = doc.create_element("meta");
    doc.set_attr(end, "typeof", "mw:Transclusion/End");
    doc.set_attr(end, "about", "#mwt1");
    doc.append_child(parent, end);

    let options = DsrOptions {
        max_depth: 16,
        ..Default::default()
    };
    let diags = process_document(&mut doc, &options).unwrap();
    assert_eq!(diags.of(Category::DsrDepth).count(), 1);

    let wrapped: Vec<_> = doc.children(parent).collect();
    assert_eq!(wrapped.len(), 1);
    assert!(doc.has_name(wrapped[0], "span"));
    assert_eq!(doc.attr(wrapped[0], "about"), Some("#mwt1"));
    assert!(!doc.is_attached(start));
    assert!(!doc.is_attached(end));
}
