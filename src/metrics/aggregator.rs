//! Fold-level scoring and aggregation into a report

use super::Metric;
use crate::benchmark::{BenchmarkResult, CellOutcome, FailureStage};
use crate::error::{EvalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Mean and spread of one metric over the folds where it was defined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// `None` when no fold produced a value
    pub mean: Option<f64>,
    /// Sample standard deviation; needs two contributing folds
    pub std: Option<f64>,
    /// Folds that contributed a value
    pub n_folds: usize,
}

impl MetricSummary {
    fn from_values(values: &[f64]) -> Self {
        let n = values.len();
        let mean = (n > 0).then(|| values.iter().sum::<f64>() / n as f64);
        let std = mean.filter(|_| n >= 2).map(|m| {
            let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        Self {
            mean,
            std,
            n_folds: n,
        }
    }
}

/// Why a fold produced no value for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionKind {
    /// The test partition lacks a class the metric needs
    Degenerate,
    /// Both classes are present but the predictions leave the metric undefined
    Undefined,
}

/// A fold left out of one metric's average
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldExclusion {
    pub fold_id: usize,
    pub metric: Metric,
    pub kind: ExclusionKind,
    pub reason: String,
}

/// A fold whose cell failed and contributed to no metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldFailure {
    pub fold_id: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// Aggregated scores for one pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineScores {
    pub pipeline_id: String,
    pub summaries: BTreeMap<Metric, MetricSummary>,
    pub exclusions: Vec<FoldExclusion>,
    pub failures: Vec<FoldFailure>,
    pub cancelled_folds: Vec<usize>,
    /// Set when the pipeline was rejected before running
    pub rejected: Option<String>,
}

impl PipelineScores {
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        self.summaries.get(&metric).and_then(|s| s.mean)
    }
}

/// Per-pipeline averaged metrics for one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    pub task_id: String,
    pub metrics: Vec<Metric>,
    pub pipelines: Vec<PipelineScores>,
    pub n_folds: usize,
    pub generated_at: DateTime<Utc>,
}

impl MetricReport {
    pub fn pipeline(&self, pipeline_id: &str) -> Option<&PipelineScores> {
        self.pipelines.iter().find(|p| p.pipeline_id == pipeline_id)
    }

    /// Averaged value of `metric` for `pipeline_id`
    pub fn value(&self, pipeline_id: &str, metric: Metric) -> Option<f64> {
        self.pipeline(pipeline_id).and_then(|p| p.mean(metric))
    }

    /// pipeline id → metric name → mean, omitting undefined means
    pub fn as_table(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.pipelines
            .iter()
            .map(|p| {
                let row = p
                    .summaries
                    .iter()
                    .filter_map(|(metric, s)| s.mean.map(|m| (metric.name().to_string(), m)))
                    .collect();
                (p.pipeline_id.clone(), row)
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per pipeline with a mean and std column per metric; undefined cells are empty
    pub fn to_csv(&self) -> Result<String> {
        let fmt_opt = |v: Option<f64>| v.map(|x| format!("{:.6}", x)).unwrap_or_default();
        let csv_error = |e: csv::Error| EvalError::SerializationError(e.to_string());

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

        let mut header = vec!["pipeline".to_string()];
        for metric in &self.metrics {
            header.push(metric.name().to_string());
            header.push(format!("{}_std", metric.name()));
        }
        header.push("failed_folds".to_string());
        header.push("rejected".to_string());
        writer.write_record(&header).map_err(csv_error)?;

        for p in &self.pipelines {
            let mut record = vec![p.pipeline_id.clone()];
            for metric in &self.metrics {
                let summary = p.summaries.get(metric);
                record.push(fmt_opt(summary.and_then(|s| s.mean)));
                record.push(fmt_opt(summary.and_then(|s| s.std)));
            }
            record.push(p.failures.len().to_string());
            record.push(p.rejected.clone().unwrap_or_default());
            writer.write_record(&record).map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EvalError::SerializationError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| EvalError::SerializationError(e.to_string()))
    }

    /// Write JSON or CSV depending on the file extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => self.to_csv()?,
            Some("json") => self.to_json()?,
            other => {
                return Err(EvalError::ConfigError(format!(
                    "unsupported report format {:?}, use .json or .csv",
                    other.unwrap_or("")
                )))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Scores every completed cell and averages per pipeline
#[derive(Debug, Clone)]
pub struct MetricAggregator {
    metrics: Vec<Metric>,
}

impl Default for MetricAggregator {
    fn default() -> Self {
        Self::new(Metric::ALL.to_vec())
    }
}

impl MetricAggregator {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn aggregate(&self, result: &BenchmarkResult) -> MetricReport {
        let mut pipelines: Vec<PipelineScores> = result
            .pipeline_ids()
            .iter()
            .map(|id| self.aggregate_pipeline(result, id))
            .collect();

        for (id, reason) in result.rejected() {
            pipelines.push(PipelineScores {
                pipeline_id: id.clone(),
                summaries: BTreeMap::new(),
                exclusions: Vec::new(),
                failures: Vec::new(),
                cancelled_folds: Vec::new(),
                rejected: Some(reason.clone()),
            });
        }

        MetricReport {
            task_id: result.task_id().to_string(),
            metrics: self.metrics.clone(),
            pipelines,
            n_folds: result.folds().len(),
            generated_at: Utc::now(),
        }
    }

    fn aggregate_pipeline(&self, result: &BenchmarkResult, pipeline_id: &str) -> PipelineScores {
        let mut values: BTreeMap<Metric, Vec<f64>> =
            self.metrics.iter().map(|&m| (m, Vec::new())).collect();
        let mut exclusions = Vec::new();
        let mut failures = Vec::new();
        let mut cancelled_folds = Vec::new();

        for fold in result.folds() {
            match result.cell(pipeline_id, fold.id) {
                Some(CellOutcome::Completed(prediction)) => {
                    for &metric in &self.metrics {
                        match metric.evaluate(&prediction.scores, &prediction.predicted, &prediction.truth) {
                            Ok(v) => values.entry(metric).or_default().push(v),
                            Err(e) => {
                                let (kind, reason) = match e {
                                    EvalError::UndefinedMetric { reason, .. } => {
                                        (ExclusionKind::Undefined, reason)
                                    }
                                    EvalError::DegenerateFold { reason, .. } => {
                                        (ExclusionKind::Degenerate, reason)
                                    }
                                    other => (ExclusionKind::Degenerate, other.to_string()),
                                };
                                debug!(pipeline = pipeline_id, fold = fold.id, %metric, ?kind, %reason, "Fold excluded");
                                exclusions.push(FoldExclusion {
                                    fold_id: fold.id,
                                    metric,
                                    kind,
                                    reason,
                                });
                            }
                        }
                    }
                }
                Some(CellOutcome::Failed(failure)) => failures.push(FoldFailure {
                    fold_id: fold.id,
                    stage: failure.stage,
                    message: failure.message.clone(),
                }),
                Some(CellOutcome::Cancelled) | None => cancelled_folds.push(fold.id),
            }
        }

        PipelineScores {
            pipeline_id: pipeline_id.to_string(),
            summaries: values
                .into_iter()
                .map(|(m, v)| (m, MetricSummary::from_values(&v)))
                .collect(),
            exclusions,
            failures,
            cancelled_folds,
            rejected: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_statistics() {
        let s = MetricSummary::from_values(&[0.5, 0.7, 0.9]);
        assert!((s.mean.unwrap() - 0.7).abs() < 1e-12);
        assert!((s.std.unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(s.n_folds, 3);

        let single = MetricSummary::from_values(&[0.4]);
        assert_eq!(single.std, None);

        let empty = MetricSummary::from_values(&[]);
        assert_eq!(empty.mean, None);
    }

    fn report_with(pipelines: Vec<PipelineScores>) -> MetricReport {
        MetricReport {
            task_id: "t".to_string(),
            metrics: vec![Metric::Accuracy],
            pipelines,
            n_folds: 3,
            generated_at: Utc::now(),
        }
    }

    fn scores(id: &str, accuracy: Option<f64>, rejected: Option<&str>) -> PipelineScores {
        let mut summaries = BTreeMap::new();
        if let Some(acc) = accuracy {
            summaries.insert(Metric::Accuracy, MetricSummary::from_values(&[acc, acc]));
        }
        PipelineScores {
            pipeline_id: id.to_string(),
            summaries,
            exclusions: Vec::new(),
            failures: Vec::new(),
            cancelled_folds: Vec::new(),
            rejected: rejected.map(str::to_string),
        }
    }

    #[test]
    fn test_csv_quotes_fields_with_commas() {
        let report = report_with(vec![
            scores("scale,tree", Some(0.8), None),
            scores("logreg", None, Some("categorical, missing")),
        ]);
        let csv = report.to_csv().unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, vec!["pipeline", "accuracy", "accuracy_std", "failed_folds", "rejected"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "scale,tree");
        assert_eq!(&rows[0][1], "0.800000");
        assert_eq!(&rows[0][2], "0.000000");
        assert_eq!(&rows[1][0], "logreg");
        assert_eq!(&rows[1][1], "");
        assert_eq!(&rows[1][4], "categorical, missing");
    }
}
