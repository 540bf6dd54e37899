//! Version parsing and ordering benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sprig_benchmarks::{criterion_config, version_list};
use sprig_core::types::{Version, VersionComparer, VersionComparison, VersionRange};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_parse");
    let inputs = [
        "1.0.0",
        "1.2.3.4",
        "2.0.0-rc.1+build.5",
        "1.0.0-beta.11",
        "10.20.30-alpha.beta.gamma",
    ];

    for input in inputs {
        group.bench_with_input(BenchmarkId::from_parameter(input), input, |b, input| {
            b.iter(|| black_box(Version::parse(black_box(input))))
        });
    }

    group.bench_function("range", |b| {
        b.iter(|| black_box(VersionRange::parse(black_box("[1.0.0-beta, 2.0)"))))
    });

    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_sort");

    for count in [100, 1_000, 10_000] {
        let versions = version_list(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("default", count), &versions, |b, versions| {
            b.iter(|| {
                let mut sorted = versions.clone();
                sorted.sort();
                black_box(sorted)
            })
        });
    }

    group.finish();
}

fn bench_compare_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_compare");
    let versions = version_list(1_000);

    for mode in [
        VersionComparison::Default,
        VersionComparison::Strict,
        VersionComparison::Version,
        VersionComparison::IgnoreMetadata,
    ] {
        let comparer = VersionComparer::new(mode);
        group.bench_function(format!("{:?}", mode), |b| {
            b.iter(|| {
                versions
                    .windows(2)
                    .map(|pair| comparer.compare(&pair[0], &pair[1]))
                    .filter(|ordering| ordering.is_lt())
                    .count()
            })
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_parse, bench_sort, bench_compare_modes
}
criterion_main!(benches);
