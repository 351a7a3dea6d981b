//! Benchmarks for corpusflower core operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use corpusflower::chunker::{chunk, ChunkerConfig, LengthUnit};
use corpusflower::concordance::{extract_candidate_terms, ConcordanceEngine, TermMatcher};
use corpusflower::embedding::HashEmbedder;
use corpusflower::index::{Metadata, VectorIndex};

/// Generate sample prose for benchmarking
fn generate_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {} tells of a seal pressed in red wax. The psalm was read \
                 aloud at dusk, and the candle burned low. Nobody spoke of the seal \
                 again until the following spring.",
                i
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Benchmark exact cosine search (full scan)
fn bench_vector_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_search");
    let embedder = HashEmbedder::new(384).unwrap_or_default();

    for size in [100, 1000, 10000].iter() {
        let index = VectorIndex::new();
        let batch: Vec<(String, Vec<f32>, Metadata)> = (0..*size)
            .map(|i| {
                let text = format!("passage {} about seals, psalms and candle number {}", i, i % 17);
                (format!("doc.txt::chunk-{}", i), embedder.embed_text(&text), Metadata::new())
            })
            .collect();
        if index.insert_batch(batch).is_err() {
            continue;
        }
        let query = embedder.embed_text("a psalm about a seal");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(index.search(black_box(&query), 10)))
        });
    }
    group.finish();
}

/// Benchmark boundary-aware chunking
fn bench_chunking(c: &mut Criterion) {
    let text = generate_text(100);
    let config = ChunkerConfig::new(1000, 200);
    let tokens = ChunkerConfig::new(250, 50).with_unit(LengthUnit::Tokens);

    c.bench_function("chunk_chars_18kb", |bencher| {
        bencher.iter(|| black_box(chunk("bench.txt", black_box(&text), &config)))
    });

    c.bench_function("chunk_tokens_18kb", |bencher| {
        bencher.iter(|| black_box(chunk("bench.txt", black_box(&text), &tokens)))
    });
}

/// Benchmark concordance scanning and term extraction
fn bench_concordance(c: &mut Criterion) {
    let text = generate_text(100);
    let passages = chunk("bench.txt", &text, &ChunkerConfig::new(1000, 200)).unwrap_or_default();
    let engine = ConcordanceEngine::new(LengthUnit::Chars);

    if let Ok(matcher) = TermMatcher::new("seal") {
        c.bench_function("concordance_scan_seal", |bencher| {
            bencher.iter(|| {
                let hits: usize = passages
                    .iter()
                    .map(|p| engine.scan_with(&matcher, p, 60).len())
                    .sum();
                black_box(hits)
            });
        });
    }

    c.bench_function("extract_candidate_terms", |bencher| {
        bencher.iter(|| {
            for p in &passages {
                black_box(extract_candidate_terms(&p.text, Some("eng")));
            }
        });
    });
}

/// Benchmark feature-hashed embeddings
fn bench_hash_embedding(c: &mut Criterion) {
    let embedder = HashEmbedder::default();
    let text = generate_text(5);

    c.bench_function("hash_embed_passage", |bencher| {
        bencher.iter(|| black_box(embedder.embed_text(black_box(&text))))
    });
}

criterion_group!(
    benches,
    bench_vector_search,
    bench_chunking,
    bench_concordance,
    bench_hash_embedding,
);
criterion_main!(benches);
