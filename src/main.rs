mod cli;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scorelint::conformance::{sweep_pages, ConformanceRunner, Corpus, PrerenderedMarkup, RunOptions, WorkerPool};
use scorelint::gate::{evaluate_gates, GateConfig};
use scorelint::raster::{load_grayscale, PerceptualSentinel, RasterOptions};
use scorelint::{EvaluationConfig, OverlapOptions, QualityScorer, SvgDocument, WaiverSet};

use crate::cli::{Cli, Commands, CompareArgs, EvaluateArgs, OverlapsArgs, RunArgs};

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EvaluationConfig::load(path)
            .with_context(|| format!("loading evaluation config {}", path.display()))?,
        None => EvaluationConfig::default(),
    };

    match cli.command {
        Commands::Evaluate(args) => evaluate(args, &config),
        Commands::Overlaps(args) => overlaps(args),
        Commands::Run(args) => run_corpus(args, &config),
        Commands::Compare(args) => compare(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn pool(workers: Option<usize>) -> WorkerPool {
    workers.map(WorkerPool::new).unwrap_or_default()
}

fn evaluate(args: EvaluateArgs, config: &EvaluationConfig) -> Result<ExitCode> {
    let pages = args
        .pages
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())))
        .collect::<Result<Vec<String>>>()?;

    let mut merged: Option<scorelint::quality::QualityMetrics> = None;
    for (path, outcome) in args.pages.iter().zip(sweep_pages(&pages, config, &pool(args.workers))) {
        let Some(result) = outcome.into_value() else {
            bail!("analysis of {} did not complete", path.display());
        };
        let metrics = result.with_context(|| format!("analyzing {}", path.display()))?;
        merged = Some(match merged {
            Some(acc) => acc.merge(&metrics),
            None => metrics,
        });
    }
    let Some(metrics) = merged else {
        bail!("no pages given");
    };

    let report = QualityScorer::new(config.quality.clone()).score(&metrics, &[], &WaiverSet::default(), None);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

fn overlaps(args: OverlapsArgs) -> Result<ExitCode> {
    let markup = std::fs::read_to_string(&args.svg).with_context(|| format!("reading {}", args.svg.display()))?;
    let doc = SvgDocument::parse(&markup).with_context(|| format!("parsing {}", args.svg.display()))?;
    let elements = doc.select_str(&args.selector)?;
    let options = OverlapOptions {
        padding: args.padding,
        min_overlap_area: args.min_area,
    };
    let found = scorelint::detect_overlaps(&elements, &options);
    info!(elements = elements.len(), overlaps = found.len(), selector = %args.selector, "overlap scan done");
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(ExitCode::SUCCESS)
}

fn run_corpus(args: RunArgs, config: &EvaluationConfig) -> Result<ExitCode> {
    let corpus = match (&args.manifest, &args.bundle) {
        (Some(manifest), _) => {
            Corpus::from_manifest(manifest).with_context(|| format!("loading manifest {}", manifest.display()))?
        }
        (None, Some(bundle)) => {
            Corpus::from_bundle(bundle).with_context(|| format!("loading bundle {}", bundle.display()))?
        }
        (None, None) => bail!("either --manifest or --bundle is required"),
    };
    let gates = args
        .gates
        .as_ref()
        .map(|path| GateConfig::load(path).with_context(|| format!("loading gates {}", path.display())))
        .transpose()?;

    let options = RunOptions {
        workers: args.workers.unwrap_or_else(|| WorkerPool::default().workers),
        item_budget: args.item_budget_ms.map(Duration::from_millis),
        deadline: args.deadline_secs.map(Duration::from_secs),
        ..RunOptions::default()
    };
    let report = ConformanceRunner::new(config, &PrerenderedMarkup).run(&corpus, &options);

    if let Some(dir) = &args.out_dir {
        report
            .write_reports(dir)
            .with_context(|| format!("writing reports to {}", dir.display()))?;
    } else {
        print!("{}", report.to_markdown());
    }

    let Some(gates) = gates else {
        return Ok(ExitCode::SUCCESS);
    };
    let outcome = evaluate_gates(&report, &gates);
    if outcome.passed {
        info!(splits = outcome.splits.len(), "all gates passed");
        Ok(ExitCode::SUCCESS)
    } else {
        let violations = outcome.violations().count();
        error!(violations, "gates failed");
        Ok(ExitCode::FAILURE)
    }
}

fn compare(args: CompareArgs) -> Result<ExitCode> {
    let baseline = load_grayscale(&args.baseline).with_context(|| format!("loading {}", args.baseline.display()))?;
    let candidate = load_grayscale(&args.candidate).with_context(|| format!("loading {}", args.candidate.display()))?;
    let sentinel = PerceptualSentinel {
        max_diff_ratio: args.max_diff_ratio,
        min_ssim: args.min_ssim,
    };
    let options = RasterOptions {
        pixel_threshold: args.pixel_threshold,
    };
    let verdict = sentinel.check(&baseline, &candidate, &options)?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    for violation in &verdict.violations {
        warn!(%violation, "sentinel violated");
    }
    Ok(if verdict.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
