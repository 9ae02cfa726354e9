//! Evaluation configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the stock thresholds. The value is built once and passed by
//! reference; nothing reads configuration from global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::notation::{CurveOptions, IntrusionOptions, RoleSelectors, SpacingOptions};
use crate::quality::{CollisionScanOptions, QualityConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub roles: RoleSelectors,
    pub intrusion: IntrusionOptions,
    pub spacing: SpacingOptions,
    pub curves: CurveOptions,
    pub collisions: CollisionScanOptions,
    /// How far an element may poke past the viewport before it counts as overflow
    pub overflow_tolerance: f64,
    pub quality: QualityConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            roles: RoleSelectors::default(),
            intrusion: IntrusionOptions::default(),
            spacing: SpacingOptions::default(),
            curves: CurveOptions::default(),
            collisions: CollisionScanOptions::default(),
            overflow_tolerance: 0.5,
            quality: QualityConfig::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Json {
            path: origin.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Dimension;

    #[test]
    fn empty_object_is_default() {
        let config = EvaluationConfig::from_json("{}", "inline").unwrap();
        assert_eq!(config, EvaluationConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = EvaluationConfig::from_json(
            r#"{
                "roles": {"notehead": ".nh"},
                "intrusion": {"min_right_extension": 2.0},
                "quality": {"critical_dimensions": ["Q2"]}
            }"#,
            "inline",
        )
        .unwrap();
        assert_eq!(config.roles.notehead, ".nh");
        assert_eq!(config.roles.stem, ".vf-stem");
        assert_eq!(config.intrusion.min_right_extension, 2.0);
        assert_eq!(config.intrusion.min_vertical_overlap, 3.0);
        assert_eq!(config.quality.critical_dimensions, vec![Dimension::Collision]);
        assert_eq!(config.quality.weights.rhythm_spacing, 0.20);
    }

    #[test]
    fn malformed_json_names_its_origin() {
        let err = EvaluationConfig::from_json("{", "eval.json").unwrap_err();
        assert!(err.to_string().contains("eval.json"));
    }
}
