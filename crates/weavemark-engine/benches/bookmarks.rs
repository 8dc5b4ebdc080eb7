use criterion::{Criterion, criterion_group, criterion_main};
use weavemark_engine::naming::bookmark_name;
use weavemark_engine::{
    BlockContent, BlockEngine, DocumentHost, MemoryDocument, SequenceNamer,
};

fn bench_bookmark_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("bookmarks");
    group.sample_size(10);

    let block = BlockContent::table("ItemTemplate", vec!["Title\tState".to_string()]);

    group.bench_function("insert_delete_cycle", |b| {
        b.iter(|| {
            let mut engine =
                BlockEngine::with_namer(MemoryDocument::new(), SequenceNamer::default());
            let names: Vec<String> = (0..20).map(|i| bookmark_name(0, i)).collect();
            for name in &names {
                let at = engine.host().len();
                engine
                    .insert_block_at(std::hint::black_box(&block), name, at)
                    .unwrap();
            }
            for name in &names {
                engine.delete_bookmark_and_content(name).unwrap();
            }
            std::hint::black_box(engine.bookmark_count());
        });
    });

    group.bench_function("probe", |b| {
        let mut engine = BlockEngine::with_namer(MemoryDocument::new(), SequenceNamer::default());
        engine.insert_block_at(&block, "Q 0 W 0", 0).unwrap();
        b.iter(|| {
            let info = engine.read_block_info(std::hint::black_box(&block)).unwrap();
            std::hint::black_box(info);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_bookmark_operations);
criterion_main!(benches);
