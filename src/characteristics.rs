//! Coarse image classification: simple graphic, photo, or mixed.
//!
//! There are two ways in, kept deliberately separate because they answer
//! from different evidence:
//!
//! - [`from_pixels`] counts occupied buckets in a 768-bucket per-channel RGB
//!   histogram of a decoded buffer.
//! - [`from_metadata`] reads the complexity and brightness signals the
//!   extractor already computed.

use crate::format::Format;
use crate::metadata::{ComplexityLevel, ImageMetadata};
use image::DynamicImage;
use serde::Serialize;

/// At most this many occupied histogram buckets: a flat graphic.
const SIMPLE_MAX_BUCKETS: usize = 48;
/// More than this many occupied buckets: photographic.
const PHOTO_MIN_BUCKETS: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    SimpleGraphic,
    Photo,
    Mixed,
}

impl ImageType {
    pub fn name(self) -> &'static str {
        match self {
            Self::SimpleGraphic => "simple_graphic",
            Self::Photo => "photo",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageCharacteristics {
    pub is_simple_graphic: bool,
    pub is_photo_like: bool,
    /// Occupied histogram buckets; 0 when derived from metadata.
    pub color_count: usize,
    /// In [0, 1].
    pub complexity_score: f64,
    pub has_transparency: bool,
}

impl ImageCharacteristics {
    /// Simple wins over photo when both flags are set.
    pub fn image_type(&self) -> ImageType {
        if self.is_simple_graphic {
            ImageType::SimpleGraphic
        } else if self.is_photo_like {
            ImageType::Photo
        } else {
            ImageType::Mixed
        }
    }

    /// Output formats worth trying, most promising first.
    pub fn recommended_formats(&self) -> Vec<Format> {
        match (self.is_simple_graphic, self.has_transparency) {
            (true, true) => vec![Format::Png, Format::Webp],
            (true, false) => vec![Format::Png, Format::Webp, Format::Jpeg],
            (false, true) => vec![Format::Webp, Format::Png],
            (false, false) => vec![Format::Jpeg, Format::Webp],
        }
    }
}

/// Spread of bucket counts, normalized by the pixel total and capped at 1.
fn histogram_complexity(histogram: &[u64]) -> f64 {
    let total: u64 = histogram.iter().sum();
    if total == 0 || histogram.is_empty() {
        return 0.0;
    }
    let len = histogram.len() as f64;
    let mean = total as f64 / len;
    let variance = histogram
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / len;
    (variance.sqrt() / total as f64).min(1.0)
}

/// Classify a decoded buffer.
pub fn from_pixels(image: &DynamicImage) -> ImageCharacteristics {
    let rgb = image.to_rgb8();
    let mut histogram = vec![0u64; 768];
    for p in rgb.pixels() {
        histogram[p[0] as usize] += 1;
        histogram[256 + p[1] as usize] += 1;
        histogram[512 + p[2] as usize] += 1;
    }
    let color_count = histogram.iter().filter(|&&c| c > 0).count();

    ImageCharacteristics {
        is_simple_graphic: color_count <= SIMPLE_MAX_BUCKETS,
        is_photo_like: color_count > PHOTO_MIN_BUCKETS,
        color_count,
        complexity_score: histogram_complexity(&histogram),
        has_transparency: image.color().has_alpha(),
    }
}

/// Classify from signals the extractor already computed.
pub fn from_metadata(metadata: &ImageMetadata) -> ImageCharacteristics {
    let mut simple = false;
    let mut photo = false;
    let mut complexity_score = 0.0;

    if let Some(c) = &metadata.complexity {
        let level = c.overall_complexity();
        simple = level == ComplexityLevel::VeryLow;
        photo = level.is_high();
        if c.color_diversity < 0.1 {
            simple = true;
        } else if c.color_diversity > 0.5 {
            photo = true;
        }
        complexity_score = c.texture_complexity;
    }

    // Photos spread across the mid-tones.
    if metadata.brightness().is_some_and(|b| b.mid_ratio > 0.3) {
        photo = true;
    }

    ImageCharacteristics {
        is_simple_graphic: simple,
        is_photo_like: photo,
        color_count: 0,
        complexity_score,
        has_transparency: metadata.basic.has_transparency,
    }
}
