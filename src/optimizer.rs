//! Per-format parameter refinement.
//!
//! The builder in [`crate::formats`] only looks at the request. This pass
//! also looks at the image: its class (photo, simple graphic, mixed), pixel
//! count, byte size and transparency. Each format has one refine function;
//! [`CompressionOptimizer::optimize`] picks it with an exhaustive match.
//!
//! The pass is total. A parameter set that does not match the target
//! format is returned unchanged with a warning.

use crate::characteristics::{self, ImageCharacteristics};
use crate::codec::{
    AvifParams, ColorMode, EncodeParams, HeifParams, JpegParams, PngParams, Subsampling,
    WebpParams,
};
use crate::format::Format;
use crate::metadata::{BasicInfo, ImageMetadata};
use crate::types::CompressionConfig;
use tracing::warn;

const MB: f64 = 1024.0 * 1024.0;
const TWO_MP: u64 = 2_000_000;
const FOUR_MP: u64 = 4_000_000;
const JPEG_RESTART_INTERVAL: u16 = 64;

#[derive(Debug, Default, Clone, Copy)]
pub struct CompressionOptimizer;

impl CompressionOptimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(
        &self,
        format: Format,
        config: &CompressionConfig,
        metadata: &ImageMetadata,
        base: EncodeParams,
    ) -> EncodeParams {
        let traits = characteristics::from_metadata(metadata);
        let basic = &metadata.basic;
        match (format, base) {
            (Format::Jpeg, EncodeParams::Jpeg(p)) => {
                EncodeParams::Jpeg(refine_jpeg(p, config, basic, &traits))
            }
            (Format::Png, EncodeParams::Png(p)) => EncodeParams::Png(refine_png(p, basic, &traits)),
            (Format::Webp, EncodeParams::Webp(p)) => {
                EncodeParams::Webp(refine_webp(p, basic, &traits))
            }
            (Format::Avif, EncodeParams::Avif(p)) => {
                EncodeParams::Avif(refine_avif(p, basic, &traits))
            }
            (Format::Heif, EncodeParams::Heif(p)) => EncodeParams::Heif(refine_heif(p, &traits)),
            (Format::Gif | Format::Bmp | Format::Tiff | Format::Other, base) => base,
            (format, base) => {
                warn!(
                    to = format.name(),
                    params = base.format().name(),
                    "Encode parameters do not match target format, leaving them unchanged"
                );
                base
            }
        }
    }
}

fn refine_jpeg(
    mut p: JpegParams,
    config: &CompressionConfig,
    basic: &BasicInfo,
    traits: &ImageCharacteristics,
) -> JpegParams {
    if config.is_lossless() && basic.format == Format::Jpeg {
        return JpegParams {
            optimize: true,
            ..JpegParams::default()
        };
    }

    let quality = p.quality.unwrap_or(85);
    let size_mb = basic.byte_size as f64 / MB;
    let pixels = basic.total_pixels();

    if basic.format != Format::Jpeg || size_mb > 1.0 || quality < 80 {
        p.optimize = true;
    }

    if traits.is_photo_like {
        if pixels > TWO_MP {
            p.progressive = true;
            p.subsampling = Some(match quality {
                90.. => Subsampling::S444,
                75.. => Subsampling::S422,
                _ => Subsampling::S420,
            });
        } else {
            p.subsampling = Some(Subsampling::S444);
        }
        if quality >= 95 {
            p.keep_rgb = true;
        }
    } else if traits.is_simple_graphic {
        p.optimize = true;
        p.progressive = false;
        p.subsampling = Some(Subsampling::S444);
    }

    if size_mb > 5.0 {
        p.optimize = true;
        p.progressive = true;
    }

    if pixels > FOUR_MP && quality >= 80 {
        p.restart_interval = Some(JPEG_RESTART_INTERVAL);
    }
    p
}

fn refine_png(mut p: PngParams, basic: &BasicInfo, traits: &ImageCharacteristics) -> PngParams {
    p.optimize = true;
    if traits.is_simple_graphic {
        p.compress_level = 9;
        if !basic.has_transparency && matches!(basic.color_mode, ColorMode::Rgb | ColorMode::L) {
            p.bits = Some(8);
        }
    } else if traits.is_photo_like {
        p.compress_level = 6;
    } else {
        p.compress_level = 7;
    }

    let pixels = basic.total_pixels();
    if pixels > FOUR_MP {
        p.compress_level = p.compress_level.min(6);
    } else if pixels < 100_000 {
        p.compress_level = 9;
    }

    if basic.has_transparency && basic.color_mode == ColorMode::Rgba {
        p.bits = Some(8);
    }
    if basic.byte_size as f64 / MB > 2.0 {
        p.compress_level = 9;
    }
    p
}

fn refine_webp(mut p: WebpParams, basic: &BasicInfo, traits: &ImageCharacteristics) -> WebpParams {
    if p.lossless {
        p.exact = true;
        p.method = 6;
        if traits.is_simple_graphic {
            p.quality = 100;
        } else if basic.total_pixels() > TWO_MP {
            p.method = 4;
            p.quality = 80;
        } else {
            p.quality = 90;
        }
        return p;
    }

    let q = p.quality;
    let passes = match q {
        90.. => 10,
        70.. => 6,
        _ => 4,
    };
    if traits.is_photo_like {
        p.method = 6;
        p.segments = Some(4);
        p.sns_strength = Some(50);
        p.filter_strength = Some(60);
        p.filter_sharpness = Some(0);
        p.filter_type = Some(1);
        p.pass = Some(passes);
    } else if traits.is_simple_graphic {
        p.method = 6;
        p.segments = Some(1);
        p.filter_type = Some(0);
        p.pass = Some(6);
    } else {
        p.pass = Some(passes);
        p.alpha_quality = Some(match q {
            90.. => q.saturating_add(5).min(100),
            70.. => q,
            _ => q.saturating_sub(10).max(50),
        });
    }

    if basic.has_transparency {
        p.alpha_quality = Some(p.alpha_quality.unwrap_or(q).max(80));
    }

    let size_mb = basic.byte_size as f64 / MB;
    if size_mb > 3.0 {
        p.autofilter = true;
        p.method = 6;
    } else if size_mb < 0.5 {
        p.method = 6;
    }
    p
}

fn refine_avif(mut p: AvifParams, basic: &BasicInfo, traits: &ImageCharacteristics) -> AvifParams {
    p.speed = if traits.is_photo_like {
        if basic.total_pixels() > FOUR_MP { 4 } else { 2 }
    } else if traits.is_simple_graphic {
        1
    } else {
        4
    };
    if p.quality >= 95 {
        p.speed = 1;
    }
    p
}

fn refine_heif(mut p: HeifParams, traits: &ImageCharacteristics) -> HeifParams {
    if traits.is_photo_like && p.quality < 90 {
        p.quality = (p.quality + 5).min(100);
    } else if traits.is_simple_graphic && p.quality > 70 {
        p.quality = (p.quality - 5).max(70);
    }
    p
}
