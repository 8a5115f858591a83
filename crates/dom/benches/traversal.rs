/// Traversal benchmarks
///
/// Measures:
/// - Sibling walks over a wide child list
/// - Selector filtering with and without the compile cache
/// - Snapshot removal of a whole child list
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dom_nav::{Document, DocumentConfig, NodeId, NodeType, TraversableNode};

/// <ul> with `width` <li class="item N"> children, each holding a text node
fn wide_list(config: DocumentConfig, width: usize) -> (Document, NodeId, Vec<NodeId>) {
    let mut doc = Document::with_config(config);
    let ul = doc.create_element("ul");
    doc.append_child(doc.root(), ul).unwrap();

    let mut items = Vec::with_capacity(width);
    for i in 0..width {
        let li = doc.create_element("li");
        doc.set_attribute(li, "class", &format!("item n{}", i % 7)).unwrap();
        let text = doc.create_text(&format!("row {i}"));
        doc.append_child(li, text).unwrap();
        doc.append_child(ul, li).unwrap();
        items.push(li);
    }
    (doc, ul, items)
}

fn bench_sibling_walks(c: &mut Criterion) {
    let mut group = c.benchmark_group("siblings");
    for width in [16usize, 256, 2048] {
        let (doc, _, items) = wide_list(DocumentConfig::default(), width);
        let middle = items[width / 2];

        group.bench_with_input(BenchmarkId::new("previous_all", width), &middle, |b, &id| {
            b.iter(|| doc.node(black_box(id)).unwrap().previous_all(Some(NodeType::Element)))
        });
        group.bench_with_input(BenchmarkId::new("siblings", width), &middle, |b, &id| {
            b.iter(|| doc.node(black_box(id)).unwrap().siblings(None))
        });
    }
    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let uncached = DocumentConfig {
        selector_cache_capacity: 0,
        ..DocumentConfig::default()
    };

    for (label, config) in [("cached", DocumentConfig::default()), ("uncached", uncached)] {
        let (doc, ul, _) = wide_list(config, 512);
        group.bench_function(BenchmarkId::new("class", label), |b| {
            b.iter(|| doc.node(ul).unwrap().filter(black_box("li.n3")))
        });
    }
    group.finish();
}

fn bench_remove_children(c: &mut Criterion) {
    c.bench_function("remove_children_512", |b| {
        b.iter_batched(
            || wide_list(DocumentConfig::default(), 512),
            |(mut doc, ul, _)| {
                let mut children = doc.node(ul).unwrap().children().unwrap();
                children.remove(&mut doc).unwrap();
                doc
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_sibling_walks, bench_filter, bench_remove_children);
criterion_main!(benches);
