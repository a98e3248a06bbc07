use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use docrag::services::{PerformanceMonitor, TextChunker, TypeDetector};

fn sample_document(paragraphs: usize) -> String {
    let paragraph = "Introduction. This section describes the api and the import rules. \
                     Each function returns a value. The documentation lists every class.\n\n";
    paragraph.repeat(paragraphs)
}

fn bench_split(c: &mut Criterion) {
    let chunker = TextChunker::new(Arc::new(PerformanceMonitor::new(1000)));
    let mut group = c.benchmark_group("split");

    for paragraphs in [10, 100, 500] {
        let text = sample_document(paragraphs);
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &text, |b, text| {
            b.iter(|| chunker.split(black_box(text), "bench.txt", 1000, 200))
        });
    }

    group.finish();
}

fn bench_detect(c: &mut Criterion) {
    let detector = TypeDetector::new();
    let text = sample_document(100);
    c.bench_function("detect", |b| b.iter(|| detector.detect(black_box(&text))));
}

criterion_group!(benches, bench_split, bench_detect);
criterion_main!(benches);
