//! Compression strategy selection.
//!
//! [`CompressionStrategy::select_optimal`] turns extracted metadata (and an
//! optional user request) into a [`CompressionDecision`]. It is a pure
//! function of its inputs: no I/O, no pixel access.
//!
//! ## Decision order
//!
//! The first rule that applies wins:
//!
//! 1. **User override**: an explicit quality means the user decided.
//! 2. **Skip guard**: tiny files, and already-compact JPEG/WebP/PNG, are
//!    left alone because re-encoding them tends to grow them.
//! 3. **Original-format optimization**: JPEG, PNG and WebP inputs stay in
//!    their own format.
//! 4. **Heuristic matrix** over transparency, graphic/photo class, file
//!    size and complexity.

use crate::characteristics::{self, ImageCharacteristics};
use crate::config::EngineConfig;
use crate::format::Format;
use crate::metadata::{ComplexityLevel, ImageMetadata};
use crate::types::{CompressionConfig, CompressionDecision, QualityMode, StrategyType};
use tracing::debug;

const MB: f64 = 1024.0 * 1024.0;

/// Quality used for simple graphics that stay JPEG, and for photos when
/// size is preferred over fidelity.
const MODERATE_JPEG_QUALITY: u8 = 75;
const SIMPLE_WEBP_QUALITY: u8 = 80;
const LARGE_WEBP_QUALITY: u8 = 85;
const TRANSPARENT_WEBP_QUALITY: u8 = 90;

pub struct CompressionStrategy<'a> {
    config: &'a EngineConfig,
}

impl<'a> CompressionStrategy<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn select_optimal(
        &self,
        metadata: &ImageMetadata,
        request: Option<&CompressionConfig>,
    ) -> CompressionDecision {
        if let Some(request) = request
            && let QualityMode::Custom(quality) = request.quality_mode
        {
            return CompressionDecision::new(
                StrategyType::Lossy,
                self.suggest_format(metadata, request.target_format),
                Some(quality),
                "user-specified configuration",
            );
        }

        let decision = self.analyze(metadata);
        debug!(
            strategy = decision.strategy_type.name(),
            format = ?decision.recommended_format,
            quality = ?decision.recommended_quality,
            reason = %decision.reason,
            "Compression decision"
        );
        decision
    }

    fn analyze(&self, metadata: &ImageMetadata) -> CompressionDecision {
        let basic = &metadata.basic;
        if self.should_skip(metadata) {
            let format = Format::ALL.contains(&basic.format).then_some(basic.format);
            return CompressionDecision::skip(
                format,
                "already compact, re-encoding would likely grow it",
            );
        }

        if let Some(decision) = original_format_decision(metadata) {
            return decision;
        }

        let traits = characteristics::from_metadata(metadata);
        self.heuristic(metadata, &traits)
    }

    /// Skip guard. Thresholds come from `[thresholds]`.
    pub fn should_skip(&self, metadata: &ImageMetadata) -> bool {
        let t = &self.config.thresholds;
        let basic = &metadata.basic;
        let size = basic.byte_size;

        if size < t.skip_min_bytes {
            return true;
        }
        if matches!(basic.format, Format::Webp | Format::Jpeg) && size < t.skip_compact_bytes {
            return true;
        }
        if basic.format == Format::Png && size < t.skip_png_bytes {
            let pixels = basic.total_pixels();
            let bytes_per_pixel = if pixels > 0 {
                size as f64 / pixels as f64
            } else {
                0.0
            };
            return bytes_per_pixel < t.png_simple_bytes_per_pixel;
        }
        false
    }

    fn heuristic(
        &self,
        metadata: &ImageMetadata,
        traits: &ImageCharacteristics,
    ) -> CompressionDecision {
        let basic = &metadata.basic;
        let large = basic.size_mb() > self.config.compression.size_threshold_mb;
        let complex = metadata
            .overall_complexity()
            .is_some_and(ComplexityLevel::is_high);

        if basic.has_transparency {
            return if large {
                CompressionDecision::new(
                    StrategyType::Lossy,
                    Format::Webp,
                    Some(TRANSPARENT_WEBP_QUALITY),
                    "large transparent image, lossy WebP keeps alpha",
                )
            } else {
                CompressionDecision::new(
                    StrategyType::Lossless,
                    Format::Png,
                    None,
                    "transparent image, lossless PNG",
                )
            };
        }

        if traits.is_simple_graphic {
            return simple_graphic_decision(metadata);
        }

        if traits.is_photo_like {
            return if large || complex {
                let quality = if self.config.strategy.prefer_quality {
                    self.config.compression.jpeg_quality
                } else {
                    MODERATE_JPEG_QUALITY
                };
                CompressionDecision::new(
                    StrategyType::Lossy,
                    Format::Jpeg,
                    Some(quality),
                    "large or complex photo, lossy JPEG",
                )
            } else {
                CompressionDecision::new(
                    StrategyType::Lossless,
                    Format::Webp,
                    None,
                    "small photo, lossless WebP",
                )
            };
        }

        if large {
            return CompressionDecision::new(
                StrategyType::Lossy,
                Format::Webp,
                Some(self.config.compression.webp_quality),
                "large file, lossy WebP",
            );
        }

        CompressionDecision::new(
            StrategyType::Lossless,
            Format::Webp,
            None,
            "small or medium file, lossless WebP",
        )
    }

    /// Output format for `metadata`. A user preference always wins.
    pub fn suggest_format(&self, metadata: &ImageMetadata, preference: Option<Format>) -> Format {
        if let Some(format) = preference {
            return format;
        }
        let prefer_quality = self.config.strategy.prefer_quality;
        let traits = characteristics::from_metadata(metadata);

        if metadata.basic.has_transparency {
            if prefer_quality { Format::Webp } else { Format::Png }
        } else if traits.is_photo_like {
            if prefer_quality { Format::Webp } else { Format::Jpeg }
        } else if traits.is_simple_graphic {
            Format::Png
        } else {
            Format::Webp
        }
    }
}

fn original_format_decision(metadata: &ImageMetadata) -> Option<CompressionDecision> {
    let decision = match metadata.basic.format {
        Format::Jpeg => CompressionDecision::new(
            StrategyType::Lossless,
            Format::Jpeg,
            None,
            "JPEG re-encoded with optimized tables",
        ),
        Format::Png => CompressionDecision::new(
            StrategyType::Lossless,
            Format::Png,
            None,
            "PNG recompressed at the best level",
        ),
        Format::Webp if metadata.basic.size_mb() < 0.2 => CompressionDecision::new(
            StrategyType::Lossless,
            Format::Webp,
            None,
            "small WebP, lossless re-encode",
        ),
        Format::Webp => CompressionDecision::new(
            StrategyType::Lossy,
            Format::Webp,
            Some(LARGE_WEBP_QUALITY),
            "WebP, high-quality lossy re-encode",
        ),
        _ => return None,
    };
    Some(decision)
}

fn simple_graphic_decision(metadata: &ImageMetadata) -> CompressionDecision {
    let size_mb = metadata.basic.size_mb();
    if metadata.basic.format == Format::Jpeg && size_mb > 0.1 {
        return CompressionDecision::new(
            StrategyType::Lossy,
            Format::Jpeg,
            Some(MODERATE_JPEG_QUALITY),
            "JPEG graphic, moderate quality keeps the format",
        );
    }
    if estimate_color_count(metadata) <= 64 && size_mb < 0.05 {
        return CompressionDecision::new(
            StrategyType::Lossless,
            Format::Png,
            None,
            "tiny graphic with few colors, lossless PNG",
        );
    }
    CompressionDecision::new(
        StrategyType::Lossy,
        Format::Webp,
        Some(SIMPLE_WEBP_QUALITY),
        "simple graphic, moderate-quality WebP",
    )
}

/// Rough palette size from pixel count and complexity.
pub fn estimate_color_count(metadata: &ImageMetadata) -> u64 {
    let pixels = metadata.basic.total_pixels();
    if pixels == 0 {
        return 1024;
    }
    match metadata.overall_complexity() {
        Some(ComplexityLevel::VeryLow) => (pixels / 1000).clamp(16, 256),
        Some(level) if level.is_high() => (pixels / 10).min(65_536),
        _ => (pixels / 100).min(4096),
    }
}

/// Expected output/input size ratio for `format`, in [0.05, 1].
pub fn estimate_compression_ratio(
    format: Format,
    metadata: &ImageMetadata,
    quality: Option<u8>,
) -> f64 {
    let traits = characteristics::from_metadata(metadata);
    let mut ratio = match format {
        Format::Jpeg if traits.is_photo_like => 0.1,
        Format::Jpeg => 0.2,
        Format::Png if traits.is_simple_graphic => 0.3,
        Format::Png => 0.6,
        Format::Webp if traits.is_photo_like => 0.08,
        Format::Webp => 0.15,
        _ => 0.5,
    };

    if let Some(q) = quality {
        let factor = f64::from(q) / 100.0;
        match format {
            Format::Jpeg => ratio *= 0.5 + factor * 0.5,
            Format::Webp if q < 100 => ratio *= 0.3 + factor * 0.7,
            _ => {}
        }
    }

    if traits.is_simple_graphic {
        ratio *= 0.7;
    } else if traits.is_photo_like {
        ratio *= 1.2;
    }
    if metadata.basic.has_transparency {
        ratio *= 1.3;
    }
    ratio.clamp(0.05, 1.0)
}
