use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "scorelint",
    version,
    about = "Layout-quality evaluation for rendered music notation"
)]
pub struct Cli {
    /// Evaluation configuration JSON; stock thresholds when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score SVG pages of one rendering
    Evaluate(EvaluateArgs),
    /// List overlapping elements matching a selector
    Overlaps(OverlapsArgs),
    /// Run a fixture corpus and evaluate split gates
    Run(RunArgs),
    /// Compare two grayscale renderings
    Compare(CompareArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Pages of the rendering, in order
    #[arg(required = true)]
    pub pages: Vec<PathBuf>,

    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct OverlapsArgs {
    pub svg: PathBuf,

    #[arg(long)]
    pub selector: String,

    #[arg(long, default_value_t = 0.0)]
    pub padding: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_area: f64,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Fixture manifest; sources resolve against its directory
    #[arg(long, required_unless_present = "bundle", conflicts_with = "bundle")]
    pub manifest: Option<PathBuf>,

    /// ZIP bundle holding fixtures.json and the sources
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Gate configuration JSON
    #[arg(long)]
    pub gates: Option<PathBuf>,

    /// Where to write conformance-report.json and conformance-report.md
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub item_budget_ms: Option<u64>,

    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    pub baseline: PathBuf,
    pub candidate: PathBuf,

    #[arg(long, default_value_t = 16)]
    pub pixel_threshold: u8,

    #[arg(long, default_value_t = 0.01)]
    pub max_diff_ratio: f64,

    #[arg(long, default_value_t = 0.98)]
    pub min_ssim: f64,
}
