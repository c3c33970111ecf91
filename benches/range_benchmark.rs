use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rangeserver::range::{parse_range, resolve_ranges, RangeList, RangePool};

fn single_range_benchmark(c: &mut Criterion) {
    let mut pool = RangePool::new();
    let mut list = RangeList::new();

    c.bench_function("single_range_parse_resolve", |b| {
        b.iter(|| {
            parse_range(&mut list, &mut pool, black_box("bytes=0-1023")).unwrap();
            resolve_ranges(&mut list, &mut pool, black_box(1 << 20)).unwrap();
            list.reset(&mut pool);
        });
    });
}

fn many_ranges_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_count");

    for count in [1usize, 8, 64].iter() {
        let header = format!(
            "bytes={}",
            (0..*count)
                .map(|i| format!("{}-{}", i * 100, i * 100 + 49))
                .collect::<Vec<_>>()
                .join(",")
        );
        let mut pool = RangePool::new();
        let mut list = RangeList::new();

        group.bench_with_input(BenchmarkId::from_parameter(count), &header, |b, header| {
            b.iter(|| {
                parse_range(&mut list, &mut pool, black_box(header)).unwrap();
                resolve_ranges(&mut list, &mut pool, black_box(1 << 20)).unwrap();
                list.reset(&mut pool);
            });
        });
    }

    group.finish();
}

fn rejected_range_benchmark(c: &mut Criterion) {
    let mut pool = RangePool::new();
    let mut list = RangeList::new();

    c.bench_function("malformed_range_abort", |b| {
        b.iter(|| {
            let _ = parse_range(&mut list, &mut pool, black_box("bytes=0-10,15-9000,33-,-44,9x"));
            list.reset(&mut pool);
        });
    });
}

criterion_group!(
    benches,
    single_range_benchmark,
    many_ranges_benchmark,
    rejected_range_benchmark
);
criterion_main!(benches);
