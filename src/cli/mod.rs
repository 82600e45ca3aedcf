//! evalkit command-line interface
//!
//! Benchmark the built-in learners on a dataset and tune one of them.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::benchmark::CellOutcome;
use crate::config::EvaluationConfig;
use crate::learners::{Learner, LearnerKind};
use crate::metrics::{Metric, MetricAggregator, MetricReport};
use crate::optimizer::{OptimizeDirection, SearchSpace, Tuner};
use crate::pipeline::PipelineSpec;
use crate::task::Task;
use crate::utils::{DataLoader, DatasetSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "evalkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible benchmarking and tuning of binary classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cross-validate several learners on one dataset
    Benchmark {
        #[command(flatten)]
        task: TaskArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Learners to compare, comma separated (default: all built-in learners)
        #[arg(short, long, value_delimiter = ',')]
        learners: Vec<String>,

        /// Write the metric report (.json or .csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Random-search the hyperparameters of one learner
    Tune {
        #[command(flatten)]
        task: TaskArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Learner to tune
        #[arg(short, long, default_value = "decision_tree")]
        learner: String,

        /// Number of trials
        #[arg(long)]
        trials: Option<usize>,

        /// Search space JSON file (default: built-in bounds for the learner)
        #[arg(long)]
        space: Option<PathBuf>,

        /// Write the tuning archive as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Dataset and label options
#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// Input data file (CSV or TSV)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Target column name
    #[arg(short, long)]
    pub target: String,

    /// Target value treated as the positive class
    #[arg(short, long)]
    pub positive: String,
}

/// Options overriding the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration JSON file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Keep the class ratio in every fold
    #[arg(long)]
    pub stratify: bool,

    /// Single split with this training fraction instead of k-fold
    #[arg(long)]
    pub holdout: Option<f64>,

    /// Base random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Target metric (accuracy, auc, ce, fpr, fnr, precision, recall, mcc)
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Override the metric direction (minimize, maximize)
    #[arg(long)]
    pub direction: Option<String>,

    /// Worker threads
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl RunArgs {
    /// Load the configuration file, if any, and apply flags on top
    pub fn resolve(&self) -> anyhow::Result<EvaluationConfig> {
        let mut config = match &self.config {
            Some(path) => EvaluationConfig::from_json_file(path)?,
            None => EvaluationConfig::default(),
        };

        if let Some(folds) = self.folds {
            config.folds = folds;
        }
        if self.stratify {
            config.stratify = true;
        }
        if let Some(ratio) = self.holdout {
            config.holdout_ratio = Some(ratio);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(metric) = &self.metric {
            config.target_metric = metric.parse()?;
        }
        if let Some(direction) = &self.direction {
            config.direction = Some(match direction.to_lowercase().as_str() {
                "minimize" | "min" => OptimizeDirection::Minimize,
                "maximize" | "max" => OptimizeDirection::Maximize,
                other => anyhow::bail!("Invalid direction: {}", other),
            });
        }
        if let Some(jobs) = self.jobs {
            config.n_jobs = Some(jobs);
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_task(args: &TaskArgs) -> anyhow::Result<Task> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(&args.data)?;
    let id = args
        .data
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("task")
        .to_string();
    let task = Task::new(id, df, &args.target, &args.positive)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        task.n_rows(),
        task.n_features(),
        start.elapsed()
    ));
    Ok(task)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_benchmark(
    task_args: &TaskArgs,
    run: &RunArgs,
    learners: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Benchmark");

    let config = run.resolve()?;
    let task = load_task(task_args)?;

    let learners = if learners.is_empty() {
        LearnerKind::all()
    } else {
        learners
            .iter()
            .map(|name| LearnerKind::from_name(name.trim()))
            .collect::<crate::error::Result<Vec<_>>>()?
    };
    let specs: Vec<PipelineSpec> = learners.into_iter().map(PipelineSpec::standard).collect();
    let resampling = config.resampling();

    step_run(&format!("Running {} pipelines on {}", specs.len(), resampling));
    let start = Instant::now();
    let result = config.runner().run(&task, &specs, &resampling)?;
    step_done(&format!(
        "{}/{} cells in {:?}",
        result.n_completed(),
        result.n_cells(),
        start.elapsed()
    ));

    let report = MetricAggregator::default().aggregate(&result);
    print_report(&report);

    for (key, outcome) in result.cells() {
        if let CellOutcome::Failed(failure) = outcome {
            println!(
                "  {} {} fold {}: {}",
                "failed".red(),
                key.pipeline_id,
                key.fold_id,
                dim(&failure.message)
            );
        }
    }

    let target = config.target_metric;
    let direction = config.direction.unwrap_or_else(|| target.direction());
    let best = report
        .pipelines
        .iter()
        .filter_map(|p| p.mean(target).map(|v| (p, v)))
        .fold(None, |best: Option<(&str, f64)>, (p, v)| match best {
            Some((_, incumbent)) if !direction.is_better(v, incumbent) => best,
            _ => Some((p.pipeline_id.as_str(), v)),
        });
    if let Some((id, value)) = best {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            id.white().bold(),
            muted(&format!("{}:", target)),
            value
        );
    }

    if let Some(path) = output {
        report.save(path)?;
        println!("  {} {}", ok("✓"), format!("report → {}", path.display()));
    }

    println!();
    Ok(())
}

fn print_report(report: &MetricReport) {
    let short = |m: &Metric| match m {
        Metric::Accuracy => "acc",
        Metric::Auc => "auc",
        Metric::ClassificationError => "ce",
        Metric::FalsePositiveRate => "fpr",
        Metric::FalseNegativeRate => "fnr",
        Metric::Precision => "prec",
        Metric::Recall => "recall",
        Metric::Mcc => "mcc",
    };

    println!();
    print!("  {:<36}", muted("Pipeline"));
    for metric in &report.metrics {
        print!(" {:>7}", muted(short(metric)));
    }
    println!();
    println!("  {}", dim(&"─".repeat(36 + 8 * report.metrics.len())));

    for p in &report.pipelines {
        print!("  {:<36}", p.pipeline_id);
        if let Some(reason) = &p.rejected {
            println!(" {}", format!("rejected: {}", reason).yellow());
            continue;
        }
        for metric in &report.metrics {
            print!(" {:>7}", fmt_score(p.mean(*metric)));
        }
        println!();
    }
    println!("  {}", dim(&"─".repeat(36 + 8 * report.metrics.len())));
}

pub fn cmd_tune(
    task_args: &TaskArgs,
    run: &RunArgs,
    learner: &str,
    trials: Option<usize>,
    space_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Tune");

    let mut config = run.resolve()?;
    if let Some(n) = trials {
        config.trial_budget = n;
    }
    config.validate()?;

    let task = load_task(task_args)?;
    let learner = LearnerKind::from_name(learner)?;
    let space = match space_path {
        Some(path) => serde_json::from_str::<SearchSpace>(&std::fs::read_to_string(path)?)?,
        None => config.search_space(&learner),
    };
    let template = PipelineSpec::standard(learner);
    let resampling = config.resampling();

    step_run(&format!(
        "Tuning {} over {} trials",
        template.id().cyan(),
        config.trial_budget
    ));
    let start = Instant::now();
    let result = Tuner::new(config.tuner_config()).tune(
        &task,
        &template,
        &space,
        &resampling,
        config.target_metric,
    )?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<6} {:>10} {:>8}  {}",
        muted("Trial"),
        muted(result.target_metric.name()),
        muted("Time"),
        muted("Parameters")
    );
    println!("  {}", dim(&"─".repeat(56)));

    for trial in result.archive.trials() {
        let params = trial
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        let marker = if Some(trial.trial_id) == result.best_index {
            ok("*")
        } else {
            dim(" ")
        };
        println!(
            "  {}{:<5} {:>10} {:>7.2}s  {}",
            marker,
            trial.trial_id,
            fmt_score(trial.value),
            trial.duration_secs,
            dim(&params)
        );
        if let Some(err) = &trial.error {
            println!("         {}", err.red());
        }
    }
    println!("  {}", dim(&"─".repeat(56)));

    match result.best() {
        Some(best) => {
            println!();
            println!(
                "  {} trial {} {} {}",
                ok("best"),
                best.trial_id.to_string().white().bold(),
                muted(&format!("{} ({:?}):", result.target_metric, result.direction)),
                fmt_score(best.value)
            );
        }
        None => println!("  {}", "no trial produced a value".yellow()),
    }

    if let Some(path) = output {
        result.save_json(path)?;
        println!("  {} {}", ok("✓"), format!("archive → {}", path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_auto(data_path)?;
    let summary = DatasetSummary::from_frame(&df);

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_cols);
    println!();

    println!("  {:<20} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(40)));

    for col in &summary.columns {
        println!(
            "  {:<20} {:<12} {:>6}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count
        );
    }

    println!();
    Ok(())
}
