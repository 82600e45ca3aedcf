//! Integration test: benchmark runs end-to-end

use evalkit::benchmark::{BenchmarkRunner, CellOutcome, FailureStage};
use evalkit::error::{EvalError, Result};
use evalkit::learners::{Learner, LearnerKind, Predict};
use evalkit::metrics::{ExclusionKind, Metric, MetricAggregator};
use evalkit::pipeline::PipelineSpec;
use evalkit::preprocessing::Step;
use evalkit::resampling::Resampling;
use evalkit::task::Task;
use evalkit::utils::{CancellationToken, ParallelConfig};
use polars::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Passenger-like data with missing numeric and categorical cells
fn passengers(n: usize) -> Task {
    let fare: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 11 == 3 { None } else { Some(((i * 37) % 100) as f64) })
        .collect();
    let age: Vec<f64> = (0..n).map(|i| 18.0 + ((i * 13) % 50) as f64).collect();
    let port: Vec<Option<&str>> = (0..n)
        .map(|i| match i % 7 {
            0 => None,
            1 | 2 | 3 => Some("S"),
            4 | 5 => Some("C"),
            _ => Some("Q"),
        })
        .collect();
    let survived: Vec<&str> = (0..n)
        .map(|i| {
            let f = ((i * 37) % 100) as f64;
            if f > 55.0 || i % 9 == 0 { "yes" } else { "no" }
        })
        .collect();

    let df = df!(
        "fare" => fare,
        "age" => age,
        "port" => port,
        "survived" => survived
    )
    .unwrap();
    Task::new("passengers", df, "survived", "yes").unwrap()
}

fn majority_task() -> Task {
    let x: Vec<f64> = (0..1000).map(|i| ((i * 31) % 97) as f64).collect();
    let y: Vec<&str> = (0..1000).map(|i| if i % 10 == 0 { "pos" } else { "neg" }).collect();
    let df = df!("x" => x, "y" => y).unwrap();
    Task::new("majority", df, "y", "pos").unwrap()
}

#[test]
fn test_featureless_majority_baseline() {
    let task = majority_task();
    assert_eq!(task.positive_count(), 100);

    let specs = vec![PipelineSpec::new(LearnerKind::Featureless)];
    let result = BenchmarkRunner::new(42)
        .run(&task, &specs, &Resampling::StratifiedKFold { folds: 5 })
        .unwrap();
    assert_eq!(result.n_completed(), 5);

    let report = MetricAggregator::default().aggregate(&result);
    let value = |m| report.value("featureless", m).unwrap();

    assert_eq!(value(Metric::Recall), 0.0);
    assert_eq!(value(Metric::FalsePositiveRate), 0.0);
    assert!((value(Metric::Accuracy) - 0.9).abs() < 1e-9);
    assert!((value(Metric::ClassificationError) - 0.1).abs() < 1e-9);
    assert_eq!(value(Metric::FalseNegativeRate), 1.0);
    assert_eq!(value(Metric::Auc), 0.5);
    assert_eq!(value(Metric::Mcc), 0.0);

    // No positive predictions on any fold: precision is excluded everywhere, with a reason
    let scores = report.pipeline("featureless").unwrap();
    assert_eq!(report.value("featureless", Metric::Precision), None);
    let precision: Vec<_> = scores
        .exclusions
        .iter()
        .filter(|e| e.metric == Metric::Precision)
        .collect();
    assert_eq!(precision.len(), 5);
    assert!(precision
        .iter()
        .all(|e| e.kind == ExclusionKind::Undefined && e.reason == "no positive predictions"));
}

#[test]
fn test_all_learners_complete_on_mixed_data() {
    let task = passengers(150);
    let specs: Vec<PipelineSpec> = LearnerKind::all().into_iter().map(PipelineSpec::standard).collect();

    let result = BenchmarkRunner::new(7)
        .run(&task, &specs, &Resampling::KFold { folds: 3 })
        .unwrap();

    assert!(result.rejected().is_empty());
    assert_eq!(result.n_cells(), specs.len() * 3);
    assert!(result.failures().is_empty(), "failures: {:?}", result.failures());

    let report = MetricAggregator::default().aggregate(&result);
    for spec in &specs {
        let acc = report.value(&spec.id(), Metric::Accuracy).unwrap();
        assert!((0.0..=1.0).contains(&acc));
    }
}

#[test]
fn test_concurrent_and_sequential_runs_agree() {
    let task = passengers(120);
    let specs: Vec<PipelineSpec> = LearnerKind::all().into_iter().map(PipelineSpec::standard).collect();
    let resampling = Resampling::KFold { folds: 4 };

    let parallel = BenchmarkRunner::new(99)
        .with_parallel(ParallelConfig::new().with_jobs(4))
        .run(&task, &specs, &resampling)
        .unwrap();
    let sequential = BenchmarkRunner::new(99)
        .with_parallel(ParallelConfig::sequential())
        .run(&task, &specs, &resampling)
        .unwrap();

    for ((key_a, a), (key_b, b)) in parallel.cells().zip(sequential.cells()) {
        assert_eq!(key_a, key_b);
        assert_eq!(
            a.prediction().map(|p| &p.scores),
            b.prediction().map(|p| &p.scores),
            "cell {:?} differs",
            key_a
        );
    }

    let aggregator = MetricAggregator::default();
    assert_eq!(
        aggregator.aggregate(&parallel).pipelines,
        aggregator.aggregate(&sequential).pipelines
    );
}

#[test]
fn test_repeated_runs_are_identical() {
    let task = passengers(90);
    let specs = vec![PipelineSpec::standard(LearnerKind::from_name("random_forest").unwrap())];
    let runner = BenchmarkRunner::new(5);

    let a = runner.run(&task, &specs, &Resampling::default()).unwrap();
    let b = runner.run(&task, &specs, &Resampling::default()).unwrap();
    for fold in a.folds() {
        let id = specs[0].id();
        assert_eq!(
            a.cell(&id, fold.id).and_then(|c| c.prediction()).map(|p| &p.scores),
            b.cell(&id, fold.id).and_then(|c| c.prediction()).map(|p| &p.scores)
        );
    }
}

#[test]
fn test_incompatible_pipeline_is_rejected_and_others_run() {
    let task = passengers(60);
    let specs = vec![
        PipelineSpec::new(LearnerKind::from_name("logistic_regression").unwrap()),
        PipelineSpec::new(LearnerKind::from_name("decision_tree").unwrap()),
    ];

    let result = BenchmarkRunner::new(1)
        .run(&task, &specs, &Resampling::KFold { folds: 3 })
        .unwrap();
    assert!(result.rejected().contains_key("logistic_regression"));
    assert_eq!(result.n_completed(), 3);

    let report = MetricAggregator::default().aggregate(&result);
    let rejected = report.pipeline("logistic_regression").unwrap();
    assert!(rejected.rejected.is_some());
    assert!(report.value("decision_tree", Metric::Accuracy).is_some());
}

#[test]
fn test_insufficient_data_is_fatal() {
    let df = df!("x" => &[1.0, 2.0, 3.0], "y" => &["a", "b", "a"]).unwrap();
    let task = Task::new("tiny", df, "y", "a").unwrap();
    let specs = vec![PipelineSpec::new(LearnerKind::Featureless)];

    let err = BenchmarkRunner::new(0)
        .run(&task, &specs, &Resampling::KFold { folds: 5 })
        .unwrap_err();
    assert!(matches!(err, EvalError::InsufficientData(_)));
}

/// Learner that either fails to fit or predicts a constant
struct Scripted {
    name: &'static str,
    fail: bool,
}

struct Constant;

impl Predict for Constant {
    fn predict_proba(&self, features: &DataFrame) -> Result<Vec<f64>> {
        Ok(vec![0.75; features.height()])
    }
}

impl Learner for Scripted {
    type Model = Constant;

    fn id(&self) -> String {
        self.name.to_string()
    }

    fn check_compatible(&self, _task: &Task) -> Result<()> {
        Ok(())
    }

    fn fit(&self, _features: &DataFrame, _truth: &[bool], _seed: u64) -> Result<Constant> {
        if self.fail {
            Err(EvalError::FitFailure("solver did not converge".to_string()))
        } else {
            Ok(Constant)
        }
    }
}

#[test]
fn test_failed_cells_do_not_abort_siblings() {
    let task = passengers(60);
    let learners = vec![
        Scripted { name: "broken", fail: true },
        Scripted { name: "constant", fail: false },
    ];

    let result = BenchmarkRunner::new(3)
        .run(&task, &learners, &Resampling::KFold { folds: 3 })
        .unwrap();
    assert_eq!(result.n_cells(), 6);
    assert_eq!(result.n_completed(), 3);

    match result.cell("broken", 0) {
        Some(CellOutcome::Failed(failure)) => {
            assert_eq!(failure.stage, FailureStage::Fit);
            assert!(failure.message.contains("did not converge"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let report = MetricAggregator::new(vec![Metric::Accuracy, Metric::Recall]).aggregate(&result);
    let broken = report.pipeline("broken").unwrap();
    assert_eq!(broken.failures.len(), 3);
    assert_eq!(report.value("broken", Metric::Accuracy), None);
    assert_eq!(report.value("constant", Metric::Recall), Some(1.0));
}

#[test]
fn test_constant_features_leave_intercept_only_models() {
    let x = vec![1.0; 40];
    let y: Vec<&str> = (0..40).map(|i| if i % 4 == 0 { "pos" } else { "neg" }).collect();
    let task = Task::new("flat", df!("x" => x, "y" => y).unwrap(), "y", "pos").unwrap();
    let specs: Vec<PipelineSpec> = LearnerKind::all().into_iter().map(PipelineSpec::standard).collect();

    let result = BenchmarkRunner::new(11)
        .run(&task, &specs, &Resampling::StratifiedKFold { folds: 4 })
        .unwrap();
    assert!(result.failures().is_empty(), "failures: {:?}", result.failures());
    assert_eq!(result.n_completed(), specs.len() * 4);

    // every fold is predicted all-negative: 7/10, 7/10, 8/10, 8/10
    let report = MetricAggregator::new(vec![Metric::Accuracy]).aggregate(&result);
    for name in ["featureless", "logistic_regression", "lda"] {
        let spec = specs.iter().find(|s| s.learner().name() == name).unwrap();
        let acc = report.value(&spec.id(), Metric::Accuracy).unwrap();
        assert!((acc - 0.75).abs() < 1e-9, "{}: {}", name, acc);
    }
}

#[test]
fn test_schema_mismatch_fails_only_the_affected_cell() {
    let n = 30;
    let port: Vec<&str> = (0..n)
        .map(|i| if i == 7 { "Q" } else if i % 2 == 0 { "S" } else { "C" })
        .collect();
    let fare: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let y: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "yes" } else { "no" }).collect();
    let df = df!("port" => port, "fare" => fare, "y" => y).unwrap();
    let task = Task::new("ports", df, "y", "yes").unwrap();

    let tree = LearnerKind::from_name("decision_tree").unwrap();
    let specs = vec![
        PipelineSpec::new(tree.clone())
            .with_step(Step::AlignSchema { other_bucket: None })
            .with_id("strict_tree"),
        PipelineSpec::standard(tree),
    ];
    let bucketed = specs[1].id();

    let result = BenchmarkRunner::new(8)
        .run(&task, &specs, &Resampling::KFold { folds: 3 })
        .unwrap();

    for fold in result.folds() {
        let strict = result.cell("strict_tree", fold.id).unwrap();
        if fold.test.contains(&7) {
            match strict {
                CellOutcome::Failed(failure) => {
                    assert_eq!(failure.stage, FailureStage::Predict);
                    assert!(failure.message.contains("unseen category 'Q'"), "{}", failure.message);
                }
                other => panic!("expected a failed cell, got {:?}", other),
            }
        } else {
            assert!(strict.is_completed(), "fold {}: {:?}", fold.id, strict);
        }
        assert!(result.cell(&bucketed, fold.id).unwrap().is_completed());
    }
    assert_eq!(result.failures().len(), 1);
}

/// Learner that fires the run's cancellation token during its second fit
struct CancelsMidRun {
    token: CancellationToken,
    fits: AtomicUsize,
}

impl Learner for CancelsMidRun {
    type Model = Constant;

    fn id(&self) -> String {
        "cancels".to_string()
    }

    fn check_compatible(&self, _task: &Task) -> Result<()> {
        Ok(())
    }

    fn fit(&self, _features: &DataFrame, _truth: &[bool], _seed: u64) -> Result<Constant> {
        if self.fits.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            self.token.cancel();
        }
        Ok(Constant)
    }
}

#[test]
fn test_cancellation_keeps_completed_cells() {
    let task = passengers(60);
    let token = CancellationToken::new();
    let learners = vec![CancelsMidRun {
        token: token.clone(),
        fits: AtomicUsize::new(0),
    }];

    let result = BenchmarkRunner::new(4)
        .with_parallel(ParallelConfig::sequential())
        .with_cancellation(token)
        .run(&task, &learners, &Resampling::KFold { folds: 3 })
        .unwrap();

    for fold_id in [0, 1] {
        let prediction = result.cell("cancels", fold_id).unwrap().prediction().unwrap();
        assert_eq!(prediction.len(), result.folds()[fold_id].test.len());
        assert!(prediction.scores.iter().all(|&s| s == 0.75));
    }
    assert_eq!(result.cell("cancels", 2), Some(&CellOutcome::Cancelled));

    let report = MetricAggregator::new(vec![Metric::Accuracy]).aggregate(&result);
    let scores = report.pipeline("cancels").unwrap();
    assert_eq!(scores.cancelled_folds, vec![2]);
    assert_eq!(scores.summaries[&Metric::Accuracy].n_folds, 2);
    assert!(scores.failures.is_empty());
}
