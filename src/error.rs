//! Error type shared by every fallible scorelint operation.
//!
//! Only input malformation surfaces here. Analysis degradation (an element
//! whose bounds cannot be computed) is skipped silently, and gate violations
//! are ordinary report data.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("markup parse error: {0}")]
    Markup(#[from] roxmltree::Error),

    #[error("unsupported root element <{0}>, expected <svg>")]
    NotSvg(String),

    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("{file}: field '{field}': {message}")]
    FixtureSchema {
        file: String,
        field: String,
        message: String,
    },

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("fixture bundle error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("raster dimensions differ: {baseline_width}x{baseline_height} vs {candidate_width}x{candidate_height}")]
    RasterSize {
        baseline_width: u32,
        baseline_height: u32,
        candidate_width: u32,
        candidate_height: u32,
    },

    #[error("raster of {width}x{height} pixels exceeds the limit of {max_pixels} pixels")]
    RasterTooLarge { width: f64, height: f64, max_pixels: u64 },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn schema(
        file: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::FixtureSchema {
            file: file.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}
