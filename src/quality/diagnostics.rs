//! Diagnostic code categories.
//!
//! Codes are free text from the parse and render collaborators. The
//! upper-cased code is split into words on `_`, `-`, `.`, `:` and
//! whitespace, and a code belongs to a category when one of the category's
//! fragments appears as a run of whole words. A word also matches its
//! plural (`TIES` for `TIE`), but never a longer word that merely contains
//! it (`SYSTEM` is not `STEM`). One code may fall into several categories
//! (`TEXT_OVERFLOW` is both text and layout).

use serde::Serialize;

use crate::model::{Diagnostic, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    Collision,
    StemBeam,
    Spanner,
    Text,
    UnsupportedSymbol,
    Layout,
}

impl DiagnosticCategory {
    pub const ALL: [DiagnosticCategory; 6] = [
        DiagnosticCategory::Collision,
        DiagnosticCategory::StemBeam,
        DiagnosticCategory::Spanner,
        DiagnosticCategory::Text,
        DiagnosticCategory::UnsupportedSymbol,
        DiagnosticCategory::Layout,
    ];

    pub fn fragments(self) -> &'static [&'static str] {
        match self {
            DiagnosticCategory::Collision => &["COLLISION", "OVERLAP"],
            DiagnosticCategory::StemBeam => &["STEM", "BEAM", "FLAG", "REST"],
            DiagnosticCategory::Spanner => &[
                "TIE", "SLUR", "SPANNER", "HAIRPIN", "WEDGE", "OCTAVE_SHIFT", "TUPLET",
            ],
            DiagnosticCategory::Text => &["TEXT", "LYRIC", "DIRECTION", "HARMONY", "CREDIT", "WORDS"],
            DiagnosticCategory::UnsupportedSymbol => &["UNSUPPORTED", "FAILED", "MISSING_GLYPH", "UNKNOWN_SYMBOL"],
            DiagnosticCategory::Layout => &["LAYOUT", "OVERFLOW", "SYSTEM", "PAGE"],
        }
    }

    pub fn matches(self, code: &str) -> bool {
        let upper = code.to_ascii_uppercase();
        let words = code_words(&upper);
        self.fragments().iter().any(|fragment| {
            let wanted: Vec<&str> = fragment.split('_').collect();
            words
                .windows(wanted.len())
                .any(|run| run.iter().zip(&wanted).all(|(word, want)| word_matches(word, want)))
        })
    }
}

fn code_words(code: &str) -> Vec<&str> {
    code.split(|c: char| matches!(c, '_' | '-' | '.' | ':') || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect()
}

fn word_matches(word: &str, wanted: &str) -> bool {
    word == wanted || word.strip_suffix('S') == Some(wanted)
}

/// Categories of a diagnostic code, in declaration order.
pub fn categorize(code: &str) -> Vec<DiagnosticCategory> {
    DiagnosticCategory::ALL
        .into_iter()
        .filter(|c| c.matches(code))
        .collect()
}

/// Per-category tallies over warning and error diagnostics. Info
/// diagnostics never count against a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub collision: usize,
    pub stem_beam: usize,
    pub spanner: usize,
    pub text: usize,
    pub unsupported_symbol: usize,
    pub layout: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl DiagnosticCounts {
    pub fn tally(diagnostics: &[Diagnostic]) -> Self {
        let mut counts = Self::default();
        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => continue,
            }
            for category in categorize(&diagnostic.code) {
                *counts.slot(category) += 1;
            }
        }
        counts
    }

    pub fn get(&self, category: DiagnosticCategory) -> usize {
        match category {
            DiagnosticCategory::Collision => self.collision,
            DiagnosticCategory::StemBeam => self.stem_beam,
            DiagnosticCategory::Spanner => self.spanner,
            DiagnosticCategory::Text => self.text,
            DiagnosticCategory::UnsupportedSymbol => self.unsupported_symbol,
            DiagnosticCategory::Layout => self.layout,
        }
    }

    fn slot(&mut self, category: DiagnosticCategory) -> &mut usize {
        match category {
            DiagnosticCategory::Collision => &mut self.collision,
            DiagnosticCategory::StemBeam => &mut self.stem_beam,
            DiagnosticCategory::Spanner => &mut self.spanner,
            DiagnosticCategory::Text => &mut self.text,
            DiagnosticCategory::UnsupportedSymbol => &mut self.unsupported_symbol,
            DiagnosticCategory::Layout => &mut self.layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_categories() {
        assert_eq!(categorize("render_collision_detected"), vec![DiagnosticCategory::Collision]);
        assert_eq!(
            categorize("TEXT_OVERFLOW"),
            vec![DiagnosticCategory::Text, DiagnosticCategory::Layout]
        );
        assert_eq!(categorize("RENDER_UNSUPPORTED_SYMBOL"), vec![DiagnosticCategory::UnsupportedSymbol]);
        assert_eq!(categorize("PARSE_SLUR_UNMATCHED"), vec![DiagnosticCategory::Spanner]);
        assert!(categorize("MUSICXML_VERSION").is_empty());
    }

    #[test]
    fn fragments_match_whole_words_only() {
        assert_eq!(categorize("RENDER_SYSTEM_OVERFLOW"), vec![DiagnosticCategory::Layout]);
        assert!(categorize("MUSICXML_PROPERTIES_IGNORED").is_empty());
        assert!(categorize("PARSE_INTEREST_FOREST").is_empty());
        assert_eq!(categorize("TEXT_CONTEXT_X"), vec![DiagnosticCategory::Text]);
        assert!(categorize("CONTEXT_LOST").is_empty());
    }

    #[test]
    fn multi_word_fragments_need_adjacent_words() {
        assert_eq!(categorize("render.missing-glyph"), vec![DiagnosticCategory::UnsupportedSymbol]);
        assert!(categorize("MISSING_CLEF_GLYPH").is_empty());
        assert_eq!(categorize("PARSE_OCTAVE_SHIFT_OPEN"), vec![DiagnosticCategory::Spanner]);
        assert_eq!(categorize("RENDER_TIES_CLIPPED"), vec![DiagnosticCategory::Spanner]);
    }

    #[test]
    fn tally_skips_info() {
        let diagnostics = vec![
            Diagnostic::new("BEAM_SLOPE_CLAMPED", Severity::Warning, "clamped"),
            Diagnostic::new("STEM_DIRECTION_GUESSED", Severity::Info, "guessed"),
            Diagnostic::new("RENDER_FAILED", Severity::Error, "boom"),
        ];
        let counts = DiagnosticCounts::tally(&diagnostics);
        assert_eq!(counts.stem_beam, 1);
        assert_eq!(counts.unsupported_symbol, 1);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.errors, 1);
        assert_eq!(counts.get(DiagnosticCategory::Collision), 0);
    }
}
