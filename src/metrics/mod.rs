//! Evaluation metrics and report aggregation

mod aggregator;
mod classification;

pub use aggregator::{
    ExclusionKind, FoldExclusion, FoldFailure, MetricAggregator, MetricReport, MetricSummary, PipelineScores,
};
pub use classification::{roc_auc, ConfusionMatrix, Metric};
