//! Raster comparison: pixel diff and windowed SSIM between two grayscale
//! renderings, plus the sentinel verdict built on top of them.
//!
//! Real rasterization of SVG is a collaborator behind [`Rasterizer`].
//! [`BoxRasterizer`] is a deterministic stand-in that paints the bounding
//! box of every leaf element, which is enough to catch gross layout shifts.

use std::path::Path;

use image::{imageops, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::selector::Selector;
use crate::geometry::{bounds_in_root_space, SvgDocument};
use crate::model::BoundingBox;
use crate::notation::CropRegion;

const SSIM_WINDOW: u32 = 8;
const SSIM_C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const SSIM_C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// 64 megapixels; a letter page at 600 dpi is about 34.
pub const MAX_RASTER_PIXELS: u64 = 1 << 26;

const PAPER: Luma<u8> = Luma([255]);
const INK: Luma<u8> = Luma([0]);

pub trait Rasterizer {
    fn rasterize(&self, markup: &str) -> Result<GrayImage>;
}

/// Paints leaf-element boxes in black on white, scaled from the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRasterizer {
    pub pixels_per_unit: f64,
}

impl Default for BoxRasterizer {
    fn default() -> Self {
        Self { pixels_per_unit: 1.0 }
    }
}

impl Rasterizer for BoxRasterizer {
    fn rasterize(&self, markup: &str) -> Result<GrayImage> {
        let doc = SvgDocument::parse(markup)?;
        let any = Selector::parse("*")?;
        let boxes: Vec<BoundingBox> = doc
            .matching_nodes(&any)
            .filter(|n| !n.children().any(|c| c.is_element()))
            .filter_map(bounds_in_root_space)
            .collect();

        let frame = match doc.viewport() {
            Some(vp) => vp.as_box(),
            None => boxes
                .iter()
                .copied()
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default(),
        };
        let scale = self.pixels_per_unit.max(f64::MIN_POSITIVE);
        let (width, height) = canvas_size(frame.width * scale, frame.height * scale)?;

        let mut img = GrayImage::from_pixel(width, height, PAPER);
        for b in &boxes {
            let x0 = ((b.x - frame.x) * scale).floor().max(0.0) as u32;
            let y0 = ((b.y - frame.y) * scale).floor().max(0.0) as u32;
            let x1 = (((b.right() - frame.x) * scale).ceil().max(0.0) as u32).min(width);
            let y1 = (((b.bottom() - frame.y) * scale).ceil().max(0.0) as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, INK);
                }
            }
        }
        debug!(width, height, boxes = boxes.len(), "rasterized element boxes");
        Ok(img)
    }
}

/// Pixel dimensions for a frame, refusing canvases over [`MAX_RASTER_PIXELS`].
fn canvas_size(width: f64, height: f64) -> Result<(u32, u32)> {
    let too_large = || Error::RasterTooLarge {
        width,
        height,
        max_pixels: MAX_RASTER_PIXELS,
    };
    if !width.is_finite() || !height.is_finite() {
        return Err(too_large());
    }
    let w = width.ceil().max(1.0);
    let h = height.ceil().max(1.0);
    if w > u32::MAX as f64 || h > u32::MAX as f64 {
        return Err(too_large());
    }
    let (w, h) = (w as u32, h as u32);
    match u64::from(w).checked_mul(u64::from(h)) {
        Some(pixels) if pixels <= MAX_RASTER_PIXELS => Ok((w, h)),
        _ => Err(too_large()),
    }
}

// ─── Comparison ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Absolute luma difference above which a pixel counts as differing
    pub pixel_threshold: u8,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { pixel_threshold: 16 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterComparison {
    pub width: u32,
    pub height: u32,
    pub differing_pixels: u64,
    pub diff_ratio: f64,
    pub mean_abs_diff: f64,
    pub ssim: f64,
}

pub fn compare_images(baseline: &GrayImage, candidate: &GrayImage, options: &RasterOptions) -> Result<RasterComparison> {
    if baseline.dimensions() != candidate.dimensions() {
        return Err(Error::RasterSize {
            baseline_width: baseline.width(),
            baseline_height: baseline.height(),
            candidate_width: candidate.width(),
            candidate_height: candidate.height(),
        });
    }
    let (width, height) = baseline.dimensions();
    let total = u64::from(width) * u64::from(height);

    let mut differing_pixels = 0u64;
    let mut abs_sum = 0u64;
    for (a, b) in baseline.pixels().zip(candidate.pixels()) {
        let d = a[0].abs_diff(b[0]);
        abs_sum += u64::from(d);
        if d > options.pixel_threshold {
            differing_pixels += 1;
        }
    }

    let (diff_ratio, mean_abs_diff) = if total == 0 {
        (0.0, 0.0)
    } else {
        (differing_pixels as f64 / total as f64, abs_sum as f64 / total as f64)
    };

    Ok(RasterComparison {
        width,
        height,
        differing_pixels,
        diff_ratio,
        mean_abs_diff,
        ssim: ssim(baseline, candidate),
    })
}

/// Mean SSIM over non-overlapping 8×8 windows; partial edge windows are
/// included. Identical (and empty) images score 1.
fn ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    let (width, height) = a.dimensions();
    let mut sum = 0.0;
    let mut windows = 0usize;

    for wy in (0..height).step_by(SSIM_WINDOW as usize) {
        for wx in (0..width).step_by(SSIM_WINDOW as usize) {
            let x_end = (wx + SSIM_WINDOW).min(width);
            let y_end = (wy + SSIM_WINDOW).min(height);
            let n = f64::from((x_end - wx) * (y_end - wy));

            let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for y in wy..y_end {
                for x in wx..x_end {
                    let pa = f64::from(a.get_pixel(x, y)[0]);
                    let pb = f64::from(b.get_pixel(x, y)[0]);
                    sa += pa;
                    sb += pb;
                    saa += pa * pa;
                    sbb += pb * pb;
                    sab += pa * pb;
                }
            }
            let (ma, mb) = (sa / n, sb / n);
            let va = saa / n - ma * ma;
            let vb = sbb / n - mb * mb;
            let cov = sab / n - ma * mb;
            sum += ((2.0 * ma * mb + SSIM_C1) * (2.0 * cov + SSIM_C2))
                / ((ma * ma + mb * mb + SSIM_C1) * (va + vb + SSIM_C2));
            windows += 1;
        }
    }

    if windows == 0 {
        1.0
    } else {
        sum / windows as f64
    }
}

/// Cut a region out of an image; the region is clamped to the image.
pub fn crop_image(img: &GrayImage, region: CropRegion) -> GrayImage {
    let x = region.x.min(img.width());
    let y = region.y.min(img.height());
    let width = region.width.min(img.width() - x);
    let height = region.height.min(img.height() - y);
    imageops::crop_imm(img, x, y, width, height).to_image()
}

pub fn load_grayscale(path: &Path) -> Result<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}

// ─── Sentinel ───────────────────────────────────────────────────────

/// Tolerances for a fixture compared against a stored raster baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptualSentinel {
    pub max_diff_ratio: f64,
    pub min_ssim: f64,
}

impl Default for PerceptualSentinel {
    fn default() -> Self {
        Self {
            max_diff_ratio: 0.01,
            min_ssim: 0.98,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentinelVerdict {
    pub passed: bool,
    pub comparison: RasterComparison,
    pub violations: Vec<String>,
}

impl PerceptualSentinel {
    pub fn judge(&self, comparison: RasterComparison) -> SentinelVerdict {
        let mut violations = Vec::new();
        if comparison.diff_ratio > self.max_diff_ratio {
            violations.push(format!(
                "diff ratio {:.4} above {:.4}",
                comparison.diff_ratio, self.max_diff_ratio
            ));
        }
        if comparison.ssim < self.min_ssim {
            violations.push(format!("SSIM {:.4} below {:.4}", comparison.ssim, self.min_ssim));
        }
        SentinelVerdict {
            passed: violations.is_empty(),
            comparison,
            violations,
        }
    }

    pub fn check(&self, baseline: &GrayImage, candidate: &GrayImage, options: &RasterOptions) -> Result<SentinelVerdict> {
        Ok(self.judge(compare_images(baseline, candidate, options)?))
    }
}
