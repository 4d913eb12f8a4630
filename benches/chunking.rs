use criterion::{Criterion, criterion_group, criterion_main};
use docs_rag::database::{Comparator, scoring::max_sim};
use docs_rag::embeddings::{Chunker, ChunkingConfig, HashingEmbedder};
use std::hint::black_box;

fn sample_document() -> String {
    let section = "## Configuration\n\
        Settings are read from the configuration file at startup. \
        Each option can be overridden on the command line.\n\
        ### Advanced\n\
        Cache sizes, network timeouts and logging levels are tuned here.\n";
    section.repeat(400)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = sample_document();
    let chunker = Chunker::new(ChunkingConfig::default()).expect("default config is valid");
    c.bench_function("chunking", |b| {
        b.iter(|| chunker.chunk(black_box("bench.md"), black_box(&text)))
    });

    let embedder = HashingEmbedder::new(128);
    let chunks = chunker.chunk("bench.md", &text);
    let document = embedder
        .embed_sync(&chunks[0].text)
        .expect("chunk text is not empty");
    let query = embedder
        .embed_sync("how are network timeouts configured")
        .expect("query is not empty");
    c.bench_function("max_sim", |b| {
        b.iter(|| max_sim(Comparator::Cosine, black_box(&query), black_box(&document)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
