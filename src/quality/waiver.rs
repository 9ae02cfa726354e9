//! Fixture waivers.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Known waiver kinds. Fixture declarations are parsed into these at load
/// time; nothing past the boundary sees a raw waiver string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Waiver {
    CriticalCollision,
    CatastrophicReadability,
}

impl Waiver {
    pub fn as_str(self) -> &'static str {
        match self {
            Waiver::CriticalCollision => "critical-collision",
            Waiver::CatastrophicReadability => "catastrophic-readability",
        }
    }

    /// Case-insensitive; `_` and `-` are interchangeable.
    pub fn parse(raw: &str) -> Option<Waiver> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "critical-collision" => Some(Waiver::CriticalCollision),
            "catastrophic-readability" => Some(Waiver::CatastrophicReadability),
            _ => None,
        }
    }
}

impl fmt::Display for Waiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WaiverSet(BTreeSet<Waiver>);

impl WaiverSet {
    /// Parse raw strings; unrecognized ones are returned separately.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> (WaiverSet, Vec<String>) {
        let mut set = BTreeSet::new();
        let mut unknown = Vec::new();
        for entry in raw {
            match Waiver::parse(entry.as_ref()) {
                Some(waiver) => {
                    set.insert(waiver);
                }
                None => unknown.push(entry.as_ref().to_string()),
            }
        }
        (WaiverSet(set), unknown)
    }

    pub fn contains(&self, waiver: Waiver) -> bool {
        self.0.contains(&waiver)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Waiver> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Waiver> for WaiverSet {
    fn from_iter<I: IntoIterator<Item = Waiver>>(iter: I) -> Self {
        WaiverSet(iter.into_iter().collect())
    }
}
