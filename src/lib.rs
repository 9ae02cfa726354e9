//! scorelint: layout-quality evaluation for rendered music notation.
//!
//! Takes SVG pages produced by a score renderer, extracts element geometry,
//! detects collisions and engraving defects, scores each rendering on seven
//! quality dimensions, and aggregates fixture corpora into deterministic
//! conformance reports with split gates.
//!
//! # Example
//! ```no_run
//! use scorelint::{evaluate_markup, EvaluationConfig};
//!
//! let svg = std::fs::read_to_string("page-1.svg").unwrap();
//! let report = evaluate_markup(&svg, &EvaluationConfig::default()).unwrap();
//! println!("weighted score: {:.2}", report.weighted_score);
//! println!("catastrophic: {}", report.catastrophic_readability);
//! ```

pub mod config;
pub mod conformance;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod model;
pub mod notation;
pub mod overlap;
pub mod quality;
pub mod raster;

pub use config::EvaluationConfig;
pub use error::{Error, Result};
pub use geometry::{extract_bounds, SvgDocument};
pub use model::*;
pub use overlap::{detect_overlaps, CollisionAuditConfig, CollisionAuditResult, OverlapOptions};
pub use quality::{QualityReport, QualityScorer, WaiverSet};

/// Score a single SVG page with no diagnostics, waivers or audit.
pub fn evaluate_markup(markup: &str, config: &EvaluationConfig) -> Result<QualityReport> {
    let analysis = conformance::analyze_page(markup, config, None)?;
    Ok(QualityScorer::new(config.quality.clone()).score(&analysis.metrics, &[], &WaiverSet::default(), None))
}
