use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use markup_provenance_engine::{Diagnostics, Document, DsrOptions, compute_dsr, process_document};
use markup_provenance_syntax::parse;
use std::hint::black_box;

/// One paragraph per expansion: `{{1x|item N}}` followed by a newline.
fn generate(paragraphs: usize) -> Document {
    let mut source = String::new();
    let mut tree = String::new();
    for i in 0..paragraphs {
        let start = source.len();
        let wt = format!("{{{{1x|item {i}}}}}");
        source.push_str(&wt);
        let end = source.len();
        tree.push_str(&format!(
            concat!(
                r##"<p><meta typeof="mw:Transclusion" about="#mwt{i}" data-tsr="{start},{end}" data-tpl="1x|item {i}">"##,
                r##"item {i}<meta typeof="mw:Transclusion/End" about="#mwt{i}"></p>"##,
            ),
            i = i,
            start = start,
            end = end,
        ));
        if i + 1 < paragraphs {
            source.push('\n');
            tree.push('\n');
        }
    }
    parse(&tree, &source).expect("generated tree parses")
}

fn bench_compute_dsr(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_dsr");
    group.sample_size(20);

    let doc = generate(500);
    group.bench_function("500_paragraphs", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut doc| {
                let root = doc.root();
                let mut diags = Diagnostics::new();
                compute_dsr(&mut doc, root, &DsrOptions::default(), &mut diags);
                black_box(diags);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_process_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_document");
    group.sample_size(20);

    let doc = generate(500);
    group.bench_function("500_expansions", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut doc| {
                let diags = process_document(&mut doc, &DsrOptions::default()).unwrap();
                black_box((doc, diags));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_compute_dsr, bench_process_document);
criterion_main!(benches);
