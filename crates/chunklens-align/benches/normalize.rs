use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::Utc;
use chunklens_align::{Viewer, normalize};
use chunklens_document::{ChunkPipeline, ChunkerId};

fn generate_text(size: usize) -> String {
    let sentence = "“Quoted” words   and — dashes\tspread over\n several lines. ";
    let mut text = sentence.repeat(size / sentence.len() + 1);
    let mut cut = size.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}

fn generate_article(paragraphs: usize) -> String {
    let mut html = String::from("<article><h1>Benchmark</h1>");
    for i in 0..paragraphs {
        html.push_str(&format!("<p>Paragraph {i}. {}</p>", generate_text(300)));
    }
    html.push_str("</article>");
    html
}

fn normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for size in [1_000, 10_000, 100_000] {
        let input = generate_text(size);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| normalize(black_box(input)));
        });
    }
    group.finish();
}

fn alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("align");
    for paragraphs in [10, 100] {
        let html = generate_article(paragraphs);
        let chunks = ChunkPipeline::default().chunk_html(&html, ChunkerId::ReadContentPara, Utc::now());
        let viewer = Viewer::new("bench", &html);
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &chunks, |b, chunks| {
            b.iter(|| viewer.align(black_box(chunks)));
        });
    }
    group.finish();
}

criterion_group!(benches, normalization, alignment);
criterion_main!(benches);
