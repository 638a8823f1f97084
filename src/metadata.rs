//! Image metadata extraction.
//!
//! [`extract`] decodes an image once and produces an [`ImageMetadata`]: the
//! basic facts every decision needs, plus four optional sub-records.
//!
//! ```text
//! basic       dimensions, format, color mode, transparency, size, frames
//! exif        camera, lens, capture dates, exposure     (Option)
//! icc         profile description, color space, size   (Option)
//! histogram   256-bucket R/G/B/luminance counts        (Option)
//! complexity  edge density, color diversity, texture   (Option)
//! ```
//!
//! ## Failure policy
//!
//! `basic` is all-or-nothing: if the file cannot be read or decoded,
//! extraction fails. Each optional sub-record has its own helper that logs at
//! debug level and returns `None` instead of failing the whole extraction.
//!
//! Width and height are measured *after* EXIF orientation is applied, so a
//! portrait photo stored sideways reports portrait dimensions.

use crate::codec::{Codec, CodecError, ColorMode, DecodedImage, exif, icc};
use crate::format::Format;
use chrono::NaiveDateTime;
use image::DynamicImage;
use image::metadata::Orientation;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("decoded image has no pixels: {}", .0.display())]
    Empty(PathBuf),
}

// =============================================================================
// Model
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrientation {
    Landscape,
    Portrait,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicInfo {
    pub path: PathBuf,
    pub byte_size: u64,
    pub format: Format,
    pub color_mode: ColorMode,
    pub width: u32,
    pub height: u32,
    pub has_transparency: bool,
    pub frame_count: u32,
}

impl BasicInfo {
    pub fn total_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    pub fn orientation(&self) -> ImageOrientation {
        use std::cmp::Ordering;
        match self.width.cmp(&self.height) {
            Ordering::Greater => ImageOrientation::Landscape,
            Ordering::Less => ImageOrientation::Portrait,
            Ordering::Equal => ImageOrientation::Square,
        }
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    pub fn size_mb(&self) -> f64 {
        self.byte_size as f64 / (1024.0 * 1024.0)
    }

    pub fn human_size(&self) -> String {
        human_size(self.byte_size)
    }
}

/// Binary-unit size, e.g. `1.5 MiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} Bytes");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExifData {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub datetime_original: Option<NaiveDateTime>,
    pub datetime_digitized: Option<NaiveDateTime>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    /// f-number.
    pub aperture: Option<f64>,
    pub shutter_speed: Option<String>,
    pub iso: Option<u32>,
    pub flash: Option<String>,
    pub white_balance: Option<String>,
    pub exposure_mode: Option<String>,
    pub scene_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IccProfile {
    pub description: String,
    pub color_space: String,
    pub byte_size: usize,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub creation_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub red: Vec<u64>,
    pub green: Vec<u64>,
    pub blue: Vec<u64>,
    pub luminance: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrightnessStats {
    /// Mean luminance in [0, 1].
    pub mean_brightness: f64,
    /// Share of pixels with luminance in [0, 85).
    pub dark_ratio: f64,
    /// Share of pixels with luminance in [85, 170).
    pub mid_ratio: f64,
    /// Share of pixels with luminance in [170, 256).
    pub bright_ratio: f64,
}

impl Histogram {
    pub fn brightness(&self) -> Option<BrightnessStats> {
        let total: u64 = self.luminance.iter().sum();
        if total == 0 {
            return None;
        }
        let total_f = total as f64;
        let weighted: f64 = self
            .luminance
            .iter()
            .enumerate()
            .map(|(i, &c)| i as f64 * c as f64)
            .sum();
        let band = |range: std::ops::Range<usize>| -> f64 {
            self.luminance
                .get(range.start..range.end.min(self.luminance.len()))
                .map(|s| s.iter().sum::<u64>() as f64)
                .unwrap_or(0.0)
                / total_f
        };
        Some(BrightnessStats {
            mean_brightness: weighted / total_f / 255.0,
            dark_ratio: band(0..85),
            mid_ratio: band(85..170),
            bright_ratio: band(170..256),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::VeryHigh)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

/// Complexity signals, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplexityMetrics {
    pub edge_density: f64,
    pub color_diversity: f64,
    pub texture_complexity: f64,
    pub compression_difficulty: f64,
}

impl ComplexityMetrics {
    /// Bucket the mean of edge density, color diversity and texture.
    pub fn overall_complexity(&self) -> ComplexityLevel {
        let mean = (self.edge_density + self.color_diversity + self.texture_complexity) / 3.0;
        if mean >= 0.8 {
            ComplexityLevel::VeryHigh
        } else if mean >= 0.6 {
            ComplexityLevel::High
        } else if mean >= 0.4 {
            ComplexityLevel::Medium
        } else if mean >= 0.2 {
            ComplexityLevel::Low
        } else {
            ComplexityLevel::VeryLow
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub basic: BasicInfo,
    pub exif: Option<ExifData>,
    pub icc: Option<IccProfile>,
    pub histogram: Option<Histogram>,
    pub complexity: Option<ComplexityMetrics>,
}

impl ImageMetadata {
    /// Metadata with only the basic record, for callers that build one by hand.
    pub fn from_basic(basic: BasicInfo) -> Self {
        Self {
            basic,
            exif: None,
            icc: None,
            histogram: None,
            complexity: None,
        }
    }

    pub fn overall_complexity(&self) -> Option<ComplexityLevel> {
        self.complexity.map(|c| c.overall_complexity())
    }

    pub fn brightness(&self) -> Option<BrightnessStats> {
        self.histogram.as_ref().and_then(Histogram::brightness)
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Decode `path` and extract its metadata.
pub fn extract(codec: &dyn Codec, path: &Path) -> Result<ImageMetadata, MetadataError> {
    let decoded = codec.decode(path).map_err(|source| MetadataError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    extract_decoded(codec, path, &decoded)
}

/// Extract metadata from an image the caller already decoded.
pub fn extract_decoded(
    codec: &dyn Codec,
    path: &Path,
    decoded: &DecodedImage,
) -> Result<ImageMetadata, MetadataError> {
    let byte_size = std::fs::metadata(path)
        .map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    let info = &decoded.info;
    let pixels: Cow<'_, DynamicImage> = if info.orientation == Orientation::NoTransforms {
        Cow::Borrowed(&decoded.pixels)
    } else {
        Cow::Owned(codec.exif_transpose(decoded.pixels.clone(), info.orientation))
    };
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(MetadataError::Empty(path.to_path_buf()));
    }

    let format = match info.format {
        Format::Other => Format::from_path(path).unwrap_or(Format::Other),
        known => known,
    };

    let basic = BasicInfo {
        path: path.to_path_buf(),
        byte_size,
        format,
        color_mode: info.color_mode,
        width: pixels.width(),
        height: pixels.height(),
        has_transparency: info.color_mode.has_alpha() || info.transparency,
        frame_count: info.frame_count.max(1),
    };

    Ok(ImageMetadata {
        exif: exif_data(info.exif.as_deref()),
        icc: icc_profile(info.icc.as_deref(), info.color_mode),
        histogram: histogram(&pixels),
        complexity: complexity(&pixels),
        basic,
    })
}

fn parse_datetime(raw: Option<&str>) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw?, "%Y:%m:%d %H:%M:%S").ok()
}

fn ratio((num, den): (u32, u32)) -> Option<f64> {
    (den != 0).then(|| f64::from(num) / f64::from(den))
}

fn shutter_speed((num, den): (u32, u32)) -> String {
    if num == 1 {
        format!("1/{den}")
    } else {
        format!("{num}/{den}")
    }
}

fn lookup(code: u32, table: &[&str]) -> String {
    table
        .get(code as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Unknown({code})"))
}

/// EXIF sub-record. `None` when there is no block or no tag parsed.
fn exif_data(block: Option<&[u8]>) -> Option<ExifData> {
    let Some(tags) = exif::parse(block?) else {
        debug!("EXIF block present but not parseable");
        return None;
    };
    if tags.is_empty() {
        return None;
    }

    let data = ExifData {
        camera_make: tags.ascii(exif::TAG_MAKE).map(str::to_string),
        camera_model: tags.ascii(exif::TAG_MODEL).map(str::to_string),
        lens_model: tags.ascii(exif::TAG_LENS_MODEL).map(str::to_string),
        datetime_original: parse_datetime(tags.ascii(exif::TAG_DATETIME_ORIGINAL))
            .or_else(|| parse_datetime(tags.ascii(exif::TAG_DATETIME))),
        datetime_digitized: parse_datetime(tags.ascii(exif::TAG_DATETIME_DIGITIZED)),
        focal_length: tags.rational(exif::TAG_FOCAL_LENGTH).and_then(ratio),
        aperture: tags.rational(exif::TAG_FNUMBER).and_then(ratio),
        shutter_speed: tags.rational(exif::TAG_EXPOSURE_TIME).map(shutter_speed),
        iso: tags.unsigned(exif::TAG_ISO),
        flash: tags.unsigned(exif::TAG_FLASH).map(|v| {
            if v & 1 == 1 { "Fired" } else { "No Flash" }.to_string()
        }),
        white_balance: tags
            .unsigned(exif::TAG_WHITE_BALANCE)
            .map(|v| lookup(v, &["Auto", "Manual"])),
        exposure_mode: tags
            .unsigned(exif::TAG_EXPOSURE_MODE)
            .map(|v| lookup(v, &["Auto", "Manual", "Auto bracket"])),
        scene_type: tags.unsigned(exif::TAG_SCENE_CAPTURE_TYPE).map(|v| {
            lookup(
                v,
                &[
                    "Standard",
                    "Landscape",
                    "Portrait",
                    "Night scene",
                    "Sports",
                    "Close-up",
                    "Fireworks",
                ],
            )
        }),
    };
    // Tags we do not model (orientation, resolution...) do not count.
    (data != ExifData::default()).then_some(data)
}

fn guess_color_space(mode: ColorMode) -> &'static str {
    match mode {
        ColorMode::Rgb | ColorMode::Rgba => "RGB",
        ColorMode::Cmyk => "CMYK",
        ColorMode::L | ColorMode::LA => "Grayscale",
        ColorMode::Palette => "Indexed",
        _ => "Unknown",
    }
}

fn icc_profile(data: Option<&[u8]>, mode: ColorMode) -> Option<IccProfile> {
    let data = data.filter(|d| !d.is_empty())?;
    let header = icc::parse(data);
    if header.color_space.is_none() {
        debug!(bytes = data.len(), "ICC header unreadable, guessing color space from mode");
    }
    Some(IccProfile {
        description: header.description.unwrap_or_else(|| "Unknown".to_string()),
        color_space: header
            .color_space
            .unwrap_or_else(|| guess_color_space(mode))
            .to_string(),
        byte_size: data.len(),
        data: data.to_vec(),
        creation_date: header.created,
    })
}

/// ITU-R 601-2 luma, integer arithmetic.
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000) as u8
}

fn histogram(image: &DynamicImage) -> Option<Histogram> {
    let rgb = image.to_rgb8();
    if rgb.is_empty() {
        debug!("histogram skipped for empty buffer");
        return None;
    }
    let mut h = Histogram {
        red: vec![0; 256],
        green: vec![0; 256],
        blue: vec![0; 256],
        luminance: vec![0; 256],
    };
    for p in rgb.pixels() {
        let [r, g, b] = p.0;
        h.red[r as usize] += 1;
        h.green[g as usize] += 1;
        h.blue[b as usize] += 1;
        h.luminance[luma(r, g, b) as usize] += 1;
    }
    Some(h)
}

fn complexity(image: &DynamicImage) -> Option<ComplexityMetrics> {
    let rgb = image.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let total = w * h;
    if total == 0 {
        debug!("complexity skipped for empty buffer");
        return None;
    }

    let gray: Vec<f64> = rgb
        .pixels()
        .map(|p| (f64::from(p[0]) + f64::from(p[1]) + f64::from(p[2])) / 3.0)
        .collect();

    let mean_abs = |sum: f64, count: usize| if count == 0 { 0.0 } else { sum / count as f64 };
    let mut dx = 0.0;
    let mut dy = 0.0;
    for y in 0..h {
        let row = &gray[y * w..(y + 1) * w];
        dx += row.windows(2).map(|p| (p[1] - p[0]).abs()).sum::<f64>();
        if y + 1 < h {
            let next = &gray[(y + 1) * w..(y + 2) * w];
            dy += row.iter().zip(next).map(|(a, b)| (b - a).abs()).sum::<f64>();
        }
    }
    let edge_density = (mean_abs(dx, (w - 1) * h) + mean_abs(dy, w * (h - 1))) / 255.0;

    let unique: HashSet<[u8; 3]> = rgb.pixels().map(|p| p.0).collect();
    let color_diversity = (unique.len() as f64 / total as f64).min(1.0);

    let mean = gray.iter().sum::<f64>() / total as f64;
    let variance = gray.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / total as f64;
    let texture_complexity = variance.sqrt() / 255.0;

    Some(ComplexityMetrics {
        edge_density,
        color_diversity,
        texture_complexity,
        compression_difficulty: 0.4 * edge_density
            + 0.3 * color_diversity
            + 0.3 * texture_complexity,
    })
}
