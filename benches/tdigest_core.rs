//! Criterion benchmarks for core t-digest operations.
//!
//! Stable run tips:
//!   export RUSTFLAGS="-C target-cpu=native"
//!   export RAYON_NUM_THREADS=8       # or 1 for max stability
//!
//! Discover benches:
//!   cargo bench --bench tdigest_core -- --list
//!
//! Compare storage variants against a saved baseline:
//!   cargo bench --bench tdigest_core -- --save-baseline base
//!   cargo bench --bench tdigest_core -- --baseline base "ingest"

use std::hint::black_box;
use std::sync::Once;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rayon::ThreadPoolBuilder;
use stream_tdigest::tdigest::{ScaleFamily, StorageVariant, TDigest};
use tdigest_testdata::{gen_dataset, DistKind};

/* ------------------------ RAYON INIT (once) ------------------------ */

static RAYON_INIT: Once = Once::new();

fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let builder = match std::env::var("RAYON_NUM_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            Some(n) => ThreadPoolBuilder::new().num_threads(n),
            None => ThreadPoolBuilder::new(),
        };
        let _ = builder.build_global(); // ignore Err if already built
    });
}

/* ------------------------ BUILD HELPERS ------------------------ */

fn build_digest(
    data: &[f64],
    compression: f64,
    variant: StorageVariant,
    scale: ScaleFamily,
) -> TDigest {
    let mut td = TDigest::builder()
        .compression(compression)
        .variant(variant)
        .scale(scale)
        .build()
        .expect("bench config");
    for &x in data {
        td.add(x).expect("finite bench data");
    }
    td.compress();
    td
}

/* ------------------------ BENCH: INGEST ------------------------ */

fn bench_ingest(c: &mut Criterion) {
    init_rayon();

    let data = gen_dataset(DistKind::Mixture, 200_000, 42);
    let mut g = c.benchmark_group("ingest");
    g.throughput(Throughput::Elements(data.len() as u64));
    for variant in StorageVariant::ALL {
        for compression in [100.0, 500.0] {
            let id = BenchmarkId::from_parameter(format!("{variant},δ={compression}"));
            g.bench_with_input(id, &data, |b, data| {
                b.iter(|| black_box(build_digest(data, compression, variant, ScaleFamily::K2)));
            });
        }
    }
    g.finish();
}

/* --------------------- BENCH: QUANTILE ------------------------ */

fn bench_quantile(c: &mut Criterion) {
    init_rayon();

    let data = gen_dataset(DistKind::Mixture, 1_000_000, 123);
    let qs: Vec<f64> = (1..1000).map(|i| (i as f64) / 1000.0).collect();

    let mut g = c.benchmark_group("quantile/batch_1000");
    g.throughput(Throughput::Elements(qs.len() as u64));
    for variant in StorageVariant::ALL {
        let mut td = build_digest(&data, 200.0, variant, ScaleFamily::K2);
        g.bench_function(BenchmarkId::from_parameter(variant), |b| {
            b.iter(|| black_box(td.quantiles(black_box(&qs)).expect("valid qs")));
        });
    }
    g.finish();

    let mut td = build_digest(&data, 200.0, StorageVariant::Default, ScaleFamily::K2);
    let mut g = c.benchmark_group("quantile/single");
    g.bench_function("q=0.5", |b| {
        b.iter(|| black_box(td.quantile(black_box(0.5)).expect("valid q")));
    });
    g.finish();
}

/* ------------------------ BENCH: CDF -------------------------- */

fn bench_cdf(c: &mut Criterion) {
    init_rayon();

    let data = gen_dataset(DistKind::Uniform, 100_000, 4242);

    // Sizes straddle the parallel crossover.
    let sizes = [1usize, 100, 10_000, 100_000, 1_000_000];
    for variant in [StorageVariant::Array, StorageVariant::Tree] {
        let mut td = build_digest(&data, 1_000.0, variant, ScaleFamily::K2);
        let mut group = c.benchmark_group(format!("cdf/sizes/{variant}"));
        for &m in &sizes {
            let xs: Vec<f64> = (0..m).map(|i| (i as f64) / (m as f64)).collect();
            group.throughput(Throughput::Elements(m as u64));
            group.bench_with_input(BenchmarkId::from_parameter(m), &xs, |b, xs| {
                b.iter(|| {
                    let out = td.cdf_many(black_box(xs)).expect("finite probes");
                    // read a middle element to prevent optimizer from discarding the result
                    black_box(out[out.len().saturating_sub(1) / 2])
                });
            });
        }
        group.finish();
    }
}

/* --------------- BENCH: SCALE-FAMILY COMPARE (q=0.95) ------------------ */

fn bench_scales(c: &mut Criterion) {
    init_rayon();

    let data = gen_dataset(DistKind::Mixture, 500_000, 777);
    let mut g = c.benchmark_group("quantile/scale_compare_q95");
    for scale in ScaleFamily::ALL {
        let mut td = build_digest(&data, 200.0, StorageVariant::Default, scale);
        g.bench_function(BenchmarkId::from_parameter(scale), |b| {
            b.iter(|| black_box(td.quantile(black_box(0.95)).expect("valid q")));
        });
    }
    g.finish();
}

/* ------------------------ BENCH: MERGE ------------------------ */

fn bench_merge(c: &mut Criterion) {
    init_rayon();

    let shards: Vec<TDigest> = (0..32)
        .map(|i| {
            let data = gen_dataset(DistKind::Normal, 20_000, 1_000 + i);
            build_digest(&data, 100.0, StorageVariant::Default, ScaleFamily::K2)
        })
        .collect();

    let mut g = c.benchmark_group("merge/32_shards");
    g.bench_function("pairwise", |b| {
        b.iter(|| {
            let mut acc = shards[0].clone();
            for s in &shards[1..] {
                acc.merge(s);
            }
            black_box(acc)
        });
    });
    g.bench_function("k_way", |b| {
        b.iter(|| black_box(TDigest::merge_all(black_box(&shards))));
    });
    g.finish();
}

/* ------------------------ CONFIG (hard-coded timing) ------------------------ */

fn configure() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(2))
        .sample_size(30)
        .without_plots()
}

/* ------------------------ GROUP REGISTRATION ------------------------ */

criterion_group!(
    name = tdigest_benches;
    config = configure();
    targets =
        bench_ingest,
        bench_quantile,
        bench_cdf,
        bench_scales,
        bench_merge
);

criterion_main!(tdigest_benches);
