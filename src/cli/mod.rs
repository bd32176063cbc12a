//! fairfit CLI Module
//!
//! Command-line interface for fitness evaluation and bias mitigation search.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{FailurePolicy, FairfitConfig};
use crate::data::{load_dataset, DataPreparer, DefaultPreparer};
use crate::fitness::FitnessEvaluator;
use crate::mitigation::{TechniqueContext, TechniqueEntry, TechniqueId, TechniqueRegistry};
use crate::optimization::ModelOptimizer;
use crate::training::ModelKind;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fairfit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fairness-aware fitness evaluation and bias mitigation search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train one model on a held-out split and report its fitness
    Evaluate {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Binary target column
        #[arg(short, long)]
        target: String,

        /// Protected attribute column
        #[arg(short, long)]
        protected: String,

        /// Model kind (logistic_regression, random_forest, svm, knn, gradient_boosting)
        #[arg(short, long, default_value = "logistic_regression")]
        model: String,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Search bias mitigation techniques for the lowest fitness
    Optimize {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Binary target column
        #[arg(short, long)]
        target: String,

        /// Protected attribute column
        #[arg(short, long)]
        protected: String,

        /// Base model kind
        #[arg(short, long, default_value = "logistic_regression")]
        model: String,

        /// Comma-separated techniques, tried in order (default: all)
        #[arg(long)]
        techniques: Option<String>,

        /// Directory for model artifacts
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Record failing techniques and keep searching
        #[arg(long)]
        continue_on_error: bool,

        /// Run techniques in parallel
        #[arg(long)]
        parallel: bool,

        /// Wall-clock limit per technique in seconds
        #[arg(long)]
        timeout_secs: Option<f64>,
    },

    /// List model kinds and techniques
    Models,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FairfitConfig> {
    Ok(match path {
        Some(p) => FairfitConfig::from_json_file(p)?,
        None => FairfitConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_evaluate(
    data_path: &Path,
    target: &str,
    protected: &str,
    model: &str,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Evaluate");
    let config = load_config(config_path)?;
    let kind: ModelKind = model.parse()?;

    step_run("Loading data");
    let start = Instant::now();
    let dataset = load_dataset(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", dataset.n_rows(), dataset.n_columns(), start.elapsed()));

    step_run(&format!("Training {}", kind.as_str().cyan()));
    let start = Instant::now();
    let evaluator = FitnessEvaluator::new(config.fitness);
    let breakdown = evaluator.evaluate(&dataset, protected, target, kind)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    line_box_top();
    line_box_center(&format!("{}", breakdown.params.to_string().white().bold()));
    line_box_sep();
    line_box(&kv("Train rows        ", &breakdown.n_train.to_string()));
    line_box(&kv("Test rows         ", &breakdown.n_test.to_string()));
    line_box_empty();
    line_box(&kv("Accuracy          ", &format!("{:.4}", breakdown.performance.accuracy)));
    line_box(&kv("Precision         ", &format!("{:.4}", breakdown.performance.precision)));
    line_box(&kv("Recall            ", &format!("{:.4}", breakdown.performance.recall)));
    line_box(&kv("F1                ", &format!("{:.4}", breakdown.performance.f1)));
    line_box(&kv("Performance       ", &format!("{:.4}", breakdown.performance.score)));
    line_box_empty();
    line_box(&kv("Disparity         ", &format!("{:.4}", breakdown.fairness.disparity)));
    line_box(&kv("Statistical parity", &format!("{:.4}", breakdown.fairness.statistical_parity)));
    line_box(&kv("Equal opportunity ", &format!("{:.4}", breakdown.fairness.equal_opportunity)));
    line_box(&kv("Fairness          ", &format!("{:.4}", breakdown.fairness.total())));
    line_box_sep();
    line_box(&format!("{} {}", ok("Fitness           "), format!("{:.4}", breakdown.fitness).white().bold()));
    line_box_bottom();
    println!();

    Ok(())
}

/// Flags given on the command line for `optimize`
pub struct OptimizeArgs<'a> {
    pub data: &'a Path,
    pub target: &'a str,
    pub protected: &'a str,
    pub model: &'a str,
    pub techniques: Option<&'a str>,
    pub output_dir: &'a Path,
    pub config: Option<&'a Path>,
    pub continue_on_error: bool,
    pub parallel: bool,
    pub timeout_secs: Option<f64>,
}

pub fn cmd_optimize(args: OptimizeArgs<'_>) -> anyhow::Result<()> {
    section("Optimize");
    let config = load_config(args.config)?;
    let kind: ModelKind = args.model.parse()?;

    let mut search = config.search.clone();
    if args.continue_on_error {
        search = search.with_failure_policy(FailurePolicy::Continue);
    }
    if args.parallel {
        search = search.with_parallel(true);
    }
    if let Some(secs) = args.timeout_secs {
        search = search.with_timeout(secs);
    }

    let entries = match args.techniques {
        Some(list) => TechniqueEntry::parse_list(list),
        None => TechniqueId::ALL.iter().copied().map(TechniqueEntry::from).collect(),
    };
    for entry in &entries {
        if let TechniqueEntry::Unknown(name) = entry {
            println!("  {} {}", muted("skipping unknown technique"), name.yellow());
        }
    }

    step_run("Loading data");
    let start = Instant::now();
    let dataset = load_dataset(args.data)?;
    let prepared = DefaultPreparer::new().prepare(&dataset, args.target, args.protected)?;
    step_done(&format!("{} rows × {} cols in {:?}", prepared.n_rows(), prepared.n_columns(), start.elapsed()));

    let ctx = TechniqueContext::from_dataset(&prepared, args.protected, args.target, args.output_dir)?;
    let optimizer = ModelOptimizer::new(TechniqueRegistry::builtin_with(config.tuning), search);

    step_run(&format!("Searching with {}", kind.as_str().cyan()));
    let start = Instant::now();
    let outcome = optimizer.optimize(kind, &entries, &ctx)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<26} {:>11} {:>9} {:>9} {:>9}",
        muted("Technique"),
        muted("Performance"),
        muted("Fairness"),
        muted("Fitness"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(68)));
    for eval in &outcome.evaluations {
        let marker = if outcome.best_technique() == Some(eval.technique) { ok("●") } else { dim("·") };
        println!(
            "  {} {:<24} {:>11.4} {:>9.4} {:>9.4} {:>8.2}s",
            marker,
            eval.technique.as_str(),
            eval.performance.score,
            eval.fairness.total(),
            eval.fitness,
            eval.duration_secs
        );
    }
    for failure in &outcome.failures {
        println!("  {} {:<24} {}", "✗".red(), failure.technique.as_str(), failure.error.red());
    }
    println!("  {}", dim(&"─".repeat(68)));

    println!();
    match &outcome.best {
        Some(best) => println!(
            "  {} {} {} {:.4} {}",
            ok("best"),
            best.technique.as_str().white().bold(),
            muted("fitness:"),
            outcome.best_fitness,
            dim(&format!("artifacts in {}", args.output_dir.display()))
        ),
        None => println!("  {}", "No technique produced a model".yellow()),
    }
    println!();

    Ok(())
}

pub fn cmd_models() -> anyhow::Result<()> {
    section("Model kinds");
    for kind in ModelKind::ALL {
        println!("  {} {:<22} {}", accent("›"), kind.as_str(), dim(&kind.default_params().to_string()));
    }

    section("Techniques");
    let registry = TechniqueRegistry::builtin();
    for id in registry.ids() {
        println!("  {} {}", accent("›"), id.as_str());
    }
    println!();
    Ok(())
}
