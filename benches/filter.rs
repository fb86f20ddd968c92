use criterion::{black_box, criterion_group, criterion_main, Criterion};
use guardia::config::{FilterConfig, MongoDBConfig};
use guardia::filter::Filter;
use guardia::protocol::OpCode;

fn test_filter(enabled: bool) -> Filter {
    Filter::new(
        FilterConfig {
            enabled,
            base_dir: "/tmp".to_string(),
            quota_files: 1000,
            quota_data_size_mb: 10 * 1024,
        },
        MongoDBConfig {
            host: "127.0.0.1".to_string(),
            port: 27017,
            dbname: "bench".to_string(),
            user: String::new(),
            pass: String::new(),
        },
    )
}

fn bench_pass_filter(c: &mut Criterion) {
    let filter = test_filter(true);

    let mut group = c.benchmark_group("pass_filter");

    group.bench_function("mutation_unblocked", |b| {
        b.iter(|| black_box(filter.pass_filter(black_box(OpCode::Insert))));
    });

    group.bench_function("query_always_passes", |b| {
        b.iter(|| black_box(filter.pass_filter(black_box(OpCode::Query))));
    });

    group.finish();
}

fn bench_dirty_event_enqueue(c: &mut Criterion) {
    let filter = test_filter(true);

    c.bench_function("enqueue_dirty_event", |b| {
        b.iter(|| {
            filter.enqueue_dirty_event();
        });
    });
}

criterion_group!(benches, bench_pass_filter, bench_dirty_event_enqueue);
criterion_main!(benches);
