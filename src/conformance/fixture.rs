//! Fixture manifest: what to render and what outcome to expect.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::selector::Selector;
use crate::overlap::CollisionAuditConfig;
use crate::quality::WaiverSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Pass,
    Fail,
}

impl Expectation {
    pub fn as_str(self) -> &'static str {
        match self {
            Expectation::Pass => "pass",
            Expectation::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureStatus {
    #[default]
    Active,
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDeclaration {
    pub id: String,
    /// Source path relative to the corpus root
    pub path: String,
    pub expected: Expectation,
    #[serde(default)]
    pub status: FixtureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_audit: Option<CollisionAuditConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waivers: Vec<String>,
}

impl FixtureDeclaration {
    /// First path component, or `uncategorized` for top-level fixtures.
    pub fn category(&self) -> String {
        let trimmed = self.path.trim_start_matches("./");
        match trimmed.split_once('/') {
            Some((first, _)) if !first.is_empty() => first.to_string(),
            _ => "uncategorized".to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == FixtureStatus::Active
    }

    /// Known waivers plus the raw strings that matched none.
    pub fn parsed_waivers(&self) -> (WaiverSet, Vec<String>) {
        WaiverSet::parse(&self.waivers)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureManifest {
    pub fixtures: Vec<FixtureDeclaration>,
}

impl FixtureManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        let manifest: FixtureManifest = serde_json::from_str(text).map_err(|source| Error::Json {
            path: origin.to_string(),
            source,
        })?;
        manifest.validate(origin)?;
        Ok(manifest)
    }

    /// Stops at the first violation.
    pub fn validate(&self, origin: &str) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (i, fixture) in self.fixtures.iter().enumerate() {
            let field = |name: &str| format!("fixtures[{i}].{name}");

            if fixture.id.trim().is_empty() {
                return Err(Error::schema(origin, field("id"), "must not be empty"));
            }
            if !seen.insert(fixture.id.as_str()) {
                return Err(Error::schema(
                    origin,
                    field("id"),
                    format!("duplicate id '{}'", fixture.id),
                ));
            }
            if fixture.path.trim().is_empty() {
                return Err(Error::schema(origin, field("path"), "must not be empty"));
            }
            if let Some(ref audit) = fixture.collision_audit {
                if let Err(err) = Selector::parse(&audit.selector) {
                    return Err(Error::schema(origin, field("collision_audit.selector"), err.to_string()));
                }
                if audit.padding < 0.0 {
                    return Err(Error::schema(origin, field("collision_audit.padding"), "must be >= 0"));
                }
                if audit.min_overlap_area < 0.0 {
                    return Err(Error::schema(
                        origin,
                        field("collision_audit.min_overlap_area"),
                        "must be >= 0",
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FixtureDeclaration> {
        self.fixtures.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Waiver;

    const MANIFEST: &str = r#"{
        "fixtures": [
            {"id": "clean-scale", "path": "lilypond/scale.svg", "expected": "pass"},
            {
                "id": "dense-chords",
                "path": "chords.svg",
                "expected": "fail",
                "status": "skip",
                "parse_mode": "lenient",
                "collision_audit": {"selector": ".vf-notehead", "max_overlaps": 2},
                "waivers": ["critical_collision", "bogus"]
            }
        ]
    }"#;

    #[test]
    fn loads_and_defaults_fields() {
        let manifest = FixtureManifest::from_json(MANIFEST, "fixtures.json").unwrap();
        let clean = manifest.get("clean-scale").unwrap();
        assert!(clean.is_active());
        assert_eq!(clean.category(), "lilypond");
        assert_eq!(clean.parse_mode, None);

        let dense = manifest.get("dense-chords").unwrap();
        assert!(!dense.is_active());
        assert_eq!(dense.category(), "uncategorized");
        let audit = dense.collision_audit.as_ref().unwrap();
        assert_eq!((audit.padding, audit.max_overlaps), (0.0, 2));
        let (waivers, unknown) = dense.parsed_waivers();
        assert!(waivers.contains(Waiver::CriticalCollision));
        assert_eq!(unknown, vec!["bogus".to_string()]);
    }

    #[test]
    fn schema_errors_name_the_field() {
        let dup = r#"{"fixtures": [
            {"id": "a", "path": "a.svg", "expected": "pass"},
            {"id": "a", "path": "b.svg", "expected": "pass"}
        ]}"#;
        match FixtureManifest::from_json(dup, "m.json") {
            Err(Error::FixtureSchema { file, field, .. }) => {
                assert_eq!(file, "m.json");
                assert_eq!(field, "fixtures[1].id");
            }
            other => panic!("expected schema error, got {other:?}"),
        }

        let bad_selector = r#"{"fixtures": [
            {"id": "a", "path": "a.svg", "expected": "pass", "collision_audit": {"selector": "g > path"}}
        ]}"#;
        assert!(matches!(
            FixtureManifest::from_json(bad_selector, "m.json"),
            Err(Error::FixtureSchema { .. })
        ));

        let negative = r#"{"fixtures": [
            {"id": "a", "path": "a.svg", "expected": "pass", "collision_audit": {"selector": "g", "padding": -1}}
        ]}"#;
        assert!(matches!(
            FixtureManifest::from_json(negative, "m.json"),
            Err(Error::FixtureSchema { .. })
        ));

        let empty_path = r#"{"fixtures": [{"id": "a", "path": " ", "expected": "pass"}]}"#;
        assert!(matches!(
            FixtureManifest::from_json(empty_path, "m.json"),
            Err(Error::FixtureSchema { .. })
        ));
    }

    #[test]
    fn unknown_expectation_is_a_json_error() {
        let bad = r#"{"fixtures": [{"id": "a", "path": "a.svg", "expected": "maybe"}]}"#;
        assert!(matches!(FixtureManifest::from_json(bad, "m.json"), Err(Error::Json { .. })));
    }
}
