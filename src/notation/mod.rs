//! Notation geometry analyzer. Classifies SVG elements into notation roles
//! and runs the notation-aware checks over them.
//!
//! A [`NotationGeometrySnapshot`] is built once per page; the checks below
//! are pure functions over its role lists.

pub mod curves;
pub mod intrusion;
pub mod layout;
pub mod snapshot;
pub mod spacing;
pub mod systems;

pub use curves::{detect_steep_curves, CurveAnomaly, CurveOptions};
pub use intrusion::{
    detect_barline_intrusions, detect_flag_beam_overlaps, BarlineIntrusion, FlagBeamOverlap,
    IntrusionOptions,
};
pub use layout::{content_usage, detect_overflow, min_stave_gap, ContentUsage};
pub use snapshot::{CurveCandidate, NotationGeometrySnapshot, RoleSelectors};
pub use spacing::{analyze_measure_spacing, BandSummary, MeasureSpacingSample, SpacingOptions};
pub use systems::{crop_region, group_systems, CropOptions, CropRegion, EdgePadding, SystemBounds};
