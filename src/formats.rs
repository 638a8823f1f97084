//! Base encoder parameters per target format.
//!
//! [`build`] maps a target format and the request's quality to a starting
//! [`EncodeParams`]. The optimizer refines these afterwards using image
//! characteristics; this module only knows about the request.
//!
//! | Format | No quality (lossless intent) | Explicit quality |
//! |---|---|---|
//! | JPEG | copy JPEG input; 75 from modern formats; else 85 | clamp, 100 → 98 |
//! | PNG | level 9, 8-bit | same (quality is reported, not applied) |
//! | WEBP | lossless, effort 30, method 2, exact | method 6, alpha quality by tier |
//! | AVIF | lossless, speed 4 | speed and subsampling by tier |
//! | HEIF | quality 100 | clamp |
//! | GIF/BMP/TIFF | passthrough | passthrough |

use crate::codec::{
    AvifParams, EncodeParams, HeifParams, JpegParams, PngParams, Subsampling, WebpParams,
};
use crate::format::Format;
use crate::types::CompressionConfig;
use tracing::{info, warn};

/// What the builder decided for one target.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Encode {
        params: EncodeParams,
        /// Quality to report on the result.
        effective_quality: Option<u8>,
    },
    /// Re-encoding would only lose quality; copy the input instead.
    CopyOriginal(String),
}

pub fn build(format: Format, config: &CompressionConfig, input_format: Format) -> BuildOutcome {
    let quality = config.effective_quality();
    let (params, effective_quality) = match format {
        Format::Jpeg => return jpeg(config, input_format),
        Format::Png => (EncodeParams::Png(png(config)), quality),
        Format::Webp => {
            let params = webp(quality);
            let effective = params.quality;
            (EncodeParams::Webp(params), quality.map(|_| effective))
        }
        Format::Avif => {
            let params = avif(quality);
            let effective = params.quality;
            (EncodeParams::Avif(params), quality.map(|_| effective))
        }
        Format::Heif => {
            let params = HeifParams {
                quality: quality.map_or(100, clamp_quality),
            };
            let effective = params.quality;
            (EncodeParams::Heif(params), quality.map(|_| effective))
        }
        Format::Gif | Format::Bmp | Format::Tiff | Format::Other => {
            (EncodeParams::Passthrough { target: format }, quality)
        }
    };
    BuildOutcome::Encode {
        params,
        effective_quality,
    }
}

fn clamp_quality(q: u8) -> u8 {
    q.clamp(1, 100)
}

fn jpeg(config: &CompressionConfig, input_format: Format) -> BuildOutcome {
    let requested = config.effective_quality();
    let quality = match requested {
        None if input_format == Format::Jpeg => {
            info!("JPEG input in lossless mode, keeping the original");
            return BuildOutcome::CopyOriginal(
                "JPEG input would only lose quality when re-encoded".to_string(),
            );
        }
        None if input_format.is_modern() => {
            warn!(
                from = input_format.name(),
                "Converting an efficient format to JPEG may grow the file"
            );
            75
        }
        None => 85,
        Some(q) => {
            let q = clamp_quality(q);
            if q == 100 {
                warn!("JPEG quality 100 disables compression stages, using 98");
                98
            } else {
                q
            }
        }
    };

    let subsampling = if quality >= 85 {
        Subsampling::S422
    } else {
        Subsampling::S420
    };

    BuildOutcome::Encode {
        params: EncodeParams::Jpeg(JpegParams {
            quality: Some(quality),
            optimize: config.optimize,
            progressive: requested.is_some() && config.progressive,
            subsampling: Some(subsampling),
            strip_metadata: config.strip_metadata,
            ..JpegParams::default()
        }),
        effective_quality: Some(quality),
    }
}

fn png(config: &CompressionConfig) -> PngParams {
    PngParams {
        compress_level: 9,
        optimize: config.optimize,
        bits: Some(8),
        icc_profile: None,
    }
}

fn webp(quality: Option<u8>) -> WebpParams {
    let Some(q) = quality.map(clamp_quality) else {
        // Low effort: high-effort lossless tends to grow small inputs.
        return WebpParams {
            lossless: true,
            quality: 30,
            method: 2,
            exact: true,
            ..WebpParams::default()
        };
    };
    let alpha_quality = if q >= 85 {
        100
    } else if q >= 70 {
        (q + 10).min(100)
    } else {
        q
    };
    WebpParams {
        quality: q,
        method: 6,
        alpha_quality: Some(alpha_quality),
        ..WebpParams::default()
    }
}

fn avif(quality: Option<u8>) -> AvifParams {
    let Some(q) = quality.map(clamp_quality) else {
        return AvifParams {
            lossless: true,
            quality: 100,
            speed: 4,
            subsampling: None,
        };
    };
    let speed = match q {
        90.. => 2,
        70.. => 4,
        _ => 6,
    };
    let subsampling = match q {
        95.. => Subsampling::S444,
        80.. => Subsampling::S422,
        _ => Subsampling::S420,
    };
    AvifParams {
        lossless: false,
        quality: q,
        speed,
        subsampling: Some(subsampling),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lossless() -> CompressionConfig {
        CompressionConfig::new("in.png")
    }

    fn custom(q: u8) -> CompressionConfig {
        CompressionConfig::new("in.png").with_quality(q).unwrap()
    }

    fn encode(outcome: BuildOutcome) -> (EncodeParams, Option<u8>) {
        match outcome {
            BuildOutcome::Encode {
                params,
                effective_quality,
            } => (params, effective_quality),
            BuildOutcome::CopyOriginal(reason) => panic!("unexpected copy: {reason}"),
        }
    }

    fn jpeg_params(outcome: BuildOutcome) -> (JpegParams, Option<u8>) {
        match encode(outcome) {
            (EncodeParams::Jpeg(p), q) => (p, q),
            (other, _) => panic!("expected JPEG params, got {other:?}"),
        }
    }

    #[test]
    fn lossless_jpeg_input_copies() {
        let outcome = build(Format::Jpeg, &lossless(), Format::Jpeg);
        assert!(matches!(outcome, BuildOutcome::CopyOriginal(_)));
    }

    #[test]
    fn lossless_jpeg_from_modern_uses_75() {
        let (p, q) = jpeg_params(build(Format::Jpeg, &lossless(), Format::Webp));
        assert_eq!(q, Some(75));
        assert!(!p.progressive);
        assert_eq!(p.subsampling, Some(Subsampling::S420));
    }

    #[test]
    fn lossless_jpeg_from_png_uses_85() {
        let (p, q) = jpeg_params(build(Format::Jpeg, &lossless(), Format::Png));
        assert_eq!(q, Some(85));
        assert_eq!(p.subsampling, Some(Subsampling::S422));
    }

    #[test]
    fn jpeg_quality_100_becomes_98() {
        let (p, q) = jpeg_params(build(Format::Jpeg, &custom(100), Format::Png));
        assert_eq!(q, Some(98));
        assert_eq!(p.quality, Some(98));
        assert!(p.progressive);
        assert!(p.optimize);
    }

    #[test]
    fn jpeg_strip_metadata_propagates() {
        let mut config = custom(70);
        config.strip_metadata = true;
        config.progressive = false;
        let (p, _) = jpeg_params(build(Format::Jpeg, &config, Format::Png));
        assert!(p.strip_metadata);
        assert!(!p.progressive);
        assert_eq!(p.subsampling, Some(Subsampling::S420));
    }

    #[test]
    fn png_defaults() {
        let (params, q) = encode(build(Format::Png, &custom(50), Format::Jpeg));
        assert_eq!(params, EncodeParams::Png(PngParams::default()));
        assert_eq!(q, Some(50));
    }

    #[test]
    fn webp_lossless_and_lossy() {
        let (params, q) = encode(build(Format::Webp, &lossless(), Format::Png));
        assert_eq!(q, None);
        let EncodeParams::Webp(p) = params else { panic!() };
        assert!(p.lossless && p.exact);
        assert_eq!((p.quality, p.method), (30, 2));

        for (quality, alpha) in [(90, 100), (75, 85), (95, 100), (50, 50)] {
            let (params, q) = encode(build(Format::Webp, &custom(quality), Format::Png));
            assert_eq!(q, Some(quality));
            let EncodeParams::Webp(p) = params else { panic!() };
            assert_eq!(p.alpha_quality, Some(alpha), "quality {quality}");
            assert_eq!(p.method, 6);
        }
    }

    #[test]
    fn avif_tiers() {
        let (params, _) = encode(build(Format::Avif, &lossless(), Format::Png));
        let EncodeParams::Avif(p) = params else { panic!() };
        assert!(p.lossless);
        assert_eq!((p.quality, p.speed), (100, 4));

        let cases = [
            (96, 2, Subsampling::S444),
            (85, 4, Subsampling::S422),
            (75, 4, Subsampling::S420),
            (40, 6, Subsampling::S420),
        ];
        for (quality, speed, sub) in cases {
            let (params, _) = encode(build(Format::Avif, &custom(quality), Format::Png));
            let EncodeParams::Avif(p) = params else { panic!() };
            assert_eq!((p.speed, p.subsampling), (speed, Some(sub)), "quality {quality}");
        }
    }

    #[test]
    fn heif_quality() {
        let (params, q) = encode(build(Format::Heif, &lossless(), Format::Png));
        assert_eq!(params, EncodeParams::Heif(HeifParams { quality: 100 }));
        assert_eq!(q, None);
        let (params, _) = encode(build(Format::Heif, &custom(40), Format::Png));
        assert_eq!(params, EncodeParams::Heif(HeifParams { quality: 40 }));
    }

    #[test]
    fn plain_formats_pass_through() {
        let (params, q) = encode(build(Format::Gif, &custom(60), Format::Png));
        assert_eq!(params, EncodeParams::Passthrough { target: Format::Gif });
        assert_eq!(q, Some(60));
    }
}
