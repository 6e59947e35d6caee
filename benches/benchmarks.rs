use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use posture_guard::engine::{compute_score, CheckRegistry, ScoreWeights};
use posture_guard::probes::{StaticToolLocator, PROBE_IDS};
use posture_guard::report::{JsonReporter, Reporter};
use posture_guard::testing::{MockProbe, TestUtils};
use posture_guard::{Config, Section, Status};

fn full_battery() -> Vec<Status> {
    let mut statuses = vec![Status::Ok; PROBE_IDS.len()];
    statuses[2] = Status::Warn;
    statuses[6] = Status::Critical;
    statuses[13] = Status::Unknown;
    statuses
}

fn benchmark_score(c: &mut Criterion) {
    let results = TestUtils::results_with(&full_battery());
    let equal = ScoreWeights::equal();
    let weighted = ScoreWeights::equal()
        .with_section_weight(Section::Network, 2.0)
        .with_probe_weight("probe-3", 0.5);

    c.bench_function("compute_score_equal", |b| {
        b.iter(|| black_box(compute_score(black_box(&results), &equal)))
    });
    c.bench_function("compute_score_weighted", |b| {
        b.iter(|| black_box(compute_score(black_box(&results), &weighted)))
    });
}

fn benchmark_registry(c: &mut Criterion) {
    c.bench_function("registry_build_mock", |b| {
        b.iter(|| {
            let mut builder = CheckRegistry::builder();
            for id in PROBE_IDS {
                builder
                    .register(Arc::new(MockProbe::new(id, Section::System)))
                    .unwrap();
            }
            black_box(builder.build().unwrap())
        })
    });

    let config = Config::default();
    c.bench_function("registry_from_config", |b| {
        b.iter(|| {
            black_box(CheckRegistry::from_config(&config, Arc::new(StaticToolLocator::none())).unwrap())
        })
    });
}

fn benchmark_render(c: &mut Criterion) {
    let snapshot = TestUtils::snapshot(1);
    let reporter = JsonReporter::new(false);
    c.bench_function("render_json_snapshot", |b| {
        b.iter(|| black_box(reporter.render(black_box(&snapshot)).unwrap()))
    });
}

criterion_group!(benches, benchmark_score, benchmark_registry, benchmark_render);
criterion_main!(benches);
