use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use evalkit::benchmark::BenchmarkRunner;
use evalkit::learners::LearnerKind;
use evalkit::metrics::MetricAggregator;
use evalkit::pipeline::PipelineSpec;
use evalkit::resampling::Resampling;
use evalkit::task::Task;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_task(n_rows: usize, n_features: usize) -> Task {
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let features: Vec<Vec<Option<f64>>> = (0..n_features)
        .map(|_| {
            (0..n_rows)
                .map(|_| (rng.gen::<f64>() > 0.05).then(|| rng.gen::<f64>() * 10.0))
                .collect()
        })
        .collect();

    // Label depends on the first feature plus noise
    let target: Vec<&str> = features[0]
        .iter()
        .map(|v| {
            if v.unwrap_or(5.0) + rng.gen::<f64>() * 2.0 > 6.0 { "yes" } else { "no" }
        })
        .collect();

    let colors = ["red", "green", "blue"];
    let color: Vec<&str> = (0..n_rows).map(|_| colors[rng.gen_range(0..3)]).collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Series::new(format!("feature_{}", i).into(), values).into())
        .collect();
    columns.push(Series::new("color".into(), color).into());
    columns.push(Series::new("target".into(), target).into());

    let df = DataFrame::new(columns).unwrap();
    Task::new("synthetic", df, "target", "yes").unwrap()
}

fn bench_benchmark_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("benchmark_run");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let task = create_classification_task(*n_rows, 8);
        let specs: Vec<PipelineSpec> = ["featureless", "logistic_regression", "decision_tree"]
            .iter()
            .map(|name| PipelineSpec::standard(LearnerKind::from_name(name).unwrap()))
            .collect();

        group.bench_with_input(BenchmarkId::new("5-fold", n_rows), &task, |b, task| {
            b.iter(|| {
                let result = BenchmarkRunner::new(42)
                    .run(black_box(task), &specs, &Resampling::default())
                    .unwrap();
                MetricAggregator::default().aggregate(&result)
            })
        });
    }

    group.finish();
}

fn bench_resampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling");

    for n_rows in [10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("kfold", n_rows), n_rows, |b, &n| {
            b.iter(|| Resampling::KFold { folds: 10 }.split(black_box(n), None, 7).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_benchmark_run, bench_resampling);
criterion_main!(benches);
