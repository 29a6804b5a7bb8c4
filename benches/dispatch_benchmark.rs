use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use castle_pipeline::batch::{partition, BatchDispatcher, BatchObserver, DispatcherConfig};
use castle_pipeline::castle::{to_record, NarrativeGenerator, SourceCastle};
use castle_pipeline::sink::{MemorySink, OutcomeRecord};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

// Keeps log formatting out of the measurement
struct Silent;

impl BatchObserver for Silent {}

fn benchmark_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for size in [100usize, 1_000, 10_000] {
        let items: Vec<String> = (0..size).map(|i| format!("castle-{}", i)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| partition(black_box(items.clone()), 50))
        });
    }

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");
    group.sample_size(20);

    for batch_size in [10usize, 50, 200] {
        group.bench_with_input(
            BenchmarkId::new("memory_sink", batch_size),
            &batch_size,
            |b, &batch_size| {
                b.iter(|| rt.block_on(async {
                    let config = DispatcherConfig::default()
                        .with_batch_size(batch_size)
                        .with_pacing_delay(Duration::ZERO);
                    let dispatcher = BatchDispatcher::new(config, Arc::new(MemorySink::new()))
                        .with_observer(Arc::new(Silent));
                    let items: Vec<String> = (0..1_000).map(|i| format!("castle-{}", i)).collect();

                    dispatcher
                        .run(items, |key: String| async move {
                            Ok::<_, String>(OutcomeRecord::new(key, json!({"ok": true}), 1.0))
                        })
                        .await
                }))
            },
        );
    }

    group.finish();
}

fn benchmark_narrative(c: &mut Criterion) {
    let source = SourceCastle {
        name: "Warwick Castle".to_string(),
        country: "United Kingdom".to_string(),
        location: "Warwick".to_string(),
        architectural_style: "Norman Gothic".to_string(),
        year_built: "1068".to_string(),
        description: "Built by King William after the conquest. Earl Richard held it through the siege and the war that followed.".to_string(),
        ..SourceCastle::default()
    };
    let generator = NarrativeGenerator::new();

    c.bench_function("translate_and_generate", |b| {
        b.iter(|| {
            let record = to_record(black_box(&source));
            black_box(generator.generate(&record))
        })
    });
}

criterion_group!(benches, benchmark_partition, benchmark_dispatch, benchmark_narrative);
criterion_main!(benches);
