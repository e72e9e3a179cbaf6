//! Performance benchmarks for road-geometry-lib
//!
//! Run with: cargo bench --package road-geometry-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use road_geometry_lib::{
    Alignment, ComparisonConfig, ComparisonEngine, DesignConstraints, Idealizer, IdealizerConfig,
    Validator, ValidatorConfig,
};

/// Generate a surveyed-looking alignment: tangent, curve, tangent with millimetre noise
fn generate_alignment(num_vertices: usize, offset: f64) -> Alignment {
    let third = num_vertices / 3;
    let radius = 250.0;
    let points = (0..num_vertices).map(|i| {
        let noise = ((i as f64) * 12.9898).sin() * 0.004;
        let z = (i as f64) * 0.02 + ((i as f64) * 78.233).cos() * 0.003;
        let (x, y) = if i < third {
            (i as f64 * 2.0, noise)
        } else if i < 2 * third {
            let a = ((i - third) as f64 * 2.0) / radius;
            let x0 = third as f64 * 2.0;
            (x0 + (radius + noise) * a.sin(), radius - (radius + noise) * a.cos())
        } else {
            let a = (third as f64 * 2.0) / radius;
            let x0 = third as f64 * 2.0 + radius * a.sin();
            let y0 = radius - radius * a.cos();
            let s = (i - 2 * third) as f64 * 2.0;
            (x0 + s * a.cos(), y0 + s * a.sin() + noise)
        };
        (x, y + offset, z)
    });
    Alignment::from_points(points).unwrap()
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_idealize(c: &mut Criterion) {
    let mut group = c.benchmark_group("idealize");
    let idealizer = Idealizer::new(DesignConstraints::default(), IdealizerConfig::conservative());

    for size in [1_000, 10_000, 100_000] {
        let alignment = generate_alignment(size, 0.0);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &alignment, |b, a| {
            b.iter(|| idealizer.idealize(a));
        });
    }

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    let engine = ComparisonEngine::new(&DesignConstraints::default(), ComparisonConfig::default());

    // Roughly 20 km of alignment at a 1 m station step
    let original = generate_alignment(10_000, 0.0);
    let ideal = generate_alignment(10_000, 0.02);
    group.bench_function("10k_vertices", |b| {
        b.iter(|| engine.compare(&original, &ideal));
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.sample_size(20);

    // 100 alignments with 1000 vertices each
    let alignments: Vec<Alignment> = (0..100)
        .map(|i| generate_alignment(1_000, i as f64 * 10.0))
        .collect();
    let validator = Validator::new(ValidatorConfig::default());

    group.throughput(Throughput::Elements(100 * 1_000));
    group.bench_function("parallel_100x1k", |b| {
        b.iter(|| validator.validate_all(alignments.clone()));
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_idealize, bench_compare, bench_batch);

criterion_main!(benches);
