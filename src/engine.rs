//! The compression executor.
//!
//! [`CompressionEngine::process`] runs one request through a fixed sequence
//! of stages and always hands back a [`CompressionResult`]:
//!
//! ```text
//! Validate → Extract → (Decide) → Transform → Encode → PostProcess → Done
//!     └──────────┴─────────┴───────────┴──────────┴──────────┴──→ Failed
//! ```
//!
//! - **Decide** only runs when the caller gave neither a format nor a
//!   quality. A skip decision copies the input verbatim.
//! - **Transform** applies EXIF orientation, the optional resize and the
//!   color-mode preparation for the target format.
//! - **Encode** builds base parameters, refines them and hands them to the
//!   codec. The builder may instead ask for a verbatim copy.
//! - **PostProcess** drops the `_compress` suffix when a lossless run gained
//!   almost nothing, and replaces the output with a copy of the input when
//!   it came out larger than the input.
//!
//! Any error after validation becomes a failed result; a partially written
//! output is removed first.

use crate::codec::{Codec, DecodedImage, EncodeParams};
use crate::color;
use crate::config::EngineConfig;
use crate::error::{CompressError, Result};
use crate::format::Format;
use crate::formats::{self, BuildOutcome};
use crate::metadata::{self, ImageMetadata};
use crate::optimizer::CompressionOptimizer;
use crate::resize;
use crate::strategy::CompressionStrategy;
use crate::types::{CompressionConfig, CompressionDecision, CompressionResult, QualityMode};
use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Link between the parameter builder and the executor.
#[derive(Debug)]
pub enum EncodeDecision {
    Encode {
        params: EncodeParams,
        quality: Option<u8>,
    },
    CopyOriginal(String),
    Fail(CompressError),
}

/// Where the current run writes, and whether it has written yet.
struct Attempt {
    destination: PathBuf,
    wrote: bool,
}

pub struct CompressionEngine<'a> {
    config: &'a EngineConfig,
    codec: &'a dyn Codec,
    strategy: CompressionStrategy<'a>,
    optimizer: CompressionOptimizer,
}

impl<'a> CompressionEngine<'a> {
    pub fn new(config: &'a EngineConfig, codec: &'a dyn Codec) -> Self {
        Self {
            config,
            codec,
            strategy: CompressionStrategy::new(config),
            optimizer: CompressionOptimizer::new(),
        }
    }

    /// Compress one file. Never fails: errors come back as a result with
    /// `success == false`.
    pub fn process(&self, request: &CompressionConfig) -> CompressionResult {
        let input = &request.input_path;
        let mut attempt = Attempt {
            destination: request.output_path_for(input, None, false),
            wrote: false,
        };

        if !input.exists() {
            let err = CompressError::NotFound(input.clone());
            err.log(input);
            return CompressionResult::failed(input, &attempt.destination, 0, err.to_string());
        }

        match self.run(request, &mut attempt) {
            Ok(result) => result,
            Err(err) => {
                err.log(input);
                if attempt.wrote && attempt.destination != *input && attempt.destination.exists() {
                    if let Err(e) = fs::remove_file(&attempt.destination) {
                        warn!(path = %attempt.destination.display(), "Could not remove partial output: {e}");
                    }
                }
                let original_size = fs::metadata(input).map(|m| m.len()).unwrap_or(0);
                CompressionResult::failed(input, &attempt.destination, original_size, err.to_string())
            }
        }
    }

    fn run(&self, request: &CompressionConfig, attempt: &mut Attempt) -> Result<CompressionResult> {
        let input = &request.input_path;
        let decoded = self.codec.decode(input)?;
        let metadata = metadata::extract_decoded(self.codec, input, &decoded)?;
        let dimensions = (metadata.basic.width, metadata.basic.height);
        // A quality filled in by the strategy below does not count as the caller's.
        let explicit_quality = request.effective_quality().is_some();

        let mut effective = Cow::Borrowed(request);
        if request.target_format.is_none() && request.is_lossless() {
            let decision = self.strategy.select_optimal(&metadata, Some(request));
            if decision.skip_compression {
                return self.copy_original(request, attempt, dimensions, &decision.reason);
            }
            info!(
                path = %input.display(),
                strategy = decision.strategy_type.name(),
                format = ?decision.recommended_format,
                quality = ?decision.recommended_quality,
                "{}",
                decision.reason
            );
            effective = Cow::Owned(apply_decision(request, &decision));
        }
        let request = effective.as_ref();
        attempt.destination = request.output_path_for(input, None, false);

        let target = match request.target_format.unwrap_or(metadata.basic.format) {
            Format::Other => Format::Jpeg,
            known => known,
        };

        let (pixels, original_dims, was_resized) = self.transform(decoded, request, target);

        let (mut params, quality) = match self.decide_encoding(target, request, &metadata) {
            EncodeDecision::Encode { params, quality } => (params, quality),
            EncodeDecision::CopyOriginal(reason) => {
                return self.copy_original(request, attempt, dimensions, &reason);
            }
            EncodeDecision::Fail(err) => return Err(err),
        };
        if let Some(icc) = &metadata.icc
            && !request.strip_metadata
        {
            params.attach_icc(&icc.data);
        }

        if let Some(parent) = attempt.destination.parent() {
            fs::create_dir_all(parent)?;
        }
        attempt.wrote = true;
        debug!(path = %attempt.destination.display(), ?params, "Encoding");
        self.codec.encode(&pixels, &params, &attempt.destination)?;

        let original_size = metadata.basic.byte_size;
        let compressed_size = fs::metadata(&attempt.destination)?.len();
        let compressed_size = self.post_process(
            request,
            attempt,
            target,
            explicit_quality,
            (original_size, compressed_size),
        )?;

        Ok(CompressionResult {
            success: true,
            error: None,
            input_path: input.clone(),
            output_path: attempt.destination.clone(),
            original_size,
            compressed_size,
            format_used: target.name().to_string(),
            quality_used: quality,
            was_resized,
            original_dimensions: Some(original_dims),
            final_dimensions: Some((pixels.width(), pixels.height())),
        })
    }

    /// Orient, resize and color-prepare. Returns the pixels, the dimensions
    /// before resizing and whether a resize happened.
    fn transform(
        &self,
        decoded: DecodedImage,
        request: &CompressionConfig,
        target: Format,
    ) -> (image::DynamicImage, (u32, u32), bool) {
        let DecodedImage { mut pixels, info } = decoded;
        if request.keep_orientation {
            pixels = self.codec.exif_transpose(pixels, info.orientation);
        }
        let original = (pixels.width(), pixels.height());

        let mut was_resized = false;
        if let Some(bounds) = request.resize.as_ref().filter(|r| r.has_bounds())
            && let Some((w, h)) = resize::fit_within(original, bounds)
        {
            debug!(from = ?original, to = ?(w, h), "Resizing");
            pixels = self.codec.resize(&pixels, w, h);
            was_resized = (pixels.width(), pixels.height()) != original;
        }

        let pixels = color::prepare_for_format(pixels, info.color_mode, info.transparency, target);
        (pixels, original, was_resized)
    }

    /// Build and refine parameters for `target`.
    pub fn decide_encoding(
        &self,
        target: Format,
        request: &CompressionConfig,
        metadata: &ImageMetadata,
    ) -> EncodeDecision {
        if !self.codec.supports(target) {
            return EncodeDecision::Fail(CompressError::UnsupportedFormat(format!(
                "{} cannot be encoded by this codec",
                target.name()
            )));
        }
        match formats::build(target, request, metadata.basic.format) {
            BuildOutcome::CopyOriginal(reason) => EncodeDecision::CopyOriginal(reason),
            BuildOutcome::Encode {
                params,
                effective_quality,
            } => EncodeDecision::Encode {
                params: self.optimizer.optimize(target, request, metadata, params),
                quality: effective_quality,
            },
        }
    }

    fn post_process(
        &self,
        request: &CompressionConfig,
        attempt: &mut Attempt,
        target: Format,
        explicit_quality: bool,
        (original_size, compressed_size): (u64, u64),
    ) -> Result<u64> {
        let input = &request.input_path;
        let thresholds = &self.config.thresholds;

        let gain = if original_size > 0 {
            (original_size as f64 - compressed_size as f64) / original_size as f64
        } else {
            0.0
        };
        if request.is_lossless()
            && gain < thresholds.negligible_gain_ratio
            && request.output_path.is_none()
        {
            let plain = request.output_path_for(input, Some(target), true);
            if plain.exists() {
                debug!(path = %plain.display(), "Plain name taken, keeping the suffix");
            } else if plain != attempt.destination && plain != *input {
                match fs::rename(&attempt.destination, &plain) {
                    Ok(()) => {
                        debug!(to = %plain.display(), "Negligible gain, dropping the suffix");
                        attempt.destination = plain;
                    }
                    Err(e) => warn!(
                        path = %attempt.destination.display(),
                        "Could not rename output, keeping the name: {e}"
                    ),
                }
            }
        }

        let threshold = if explicit_quality {
            thresholds.fallback_threshold_custom
        } else {
            thresholds.fallback_threshold_auto
        };
        if compressed_size as f64 > original_size as f64 * threshold {
            info!(
                path = %input.display(),
                growth = format!("{:.1}%", (compressed_size as f64 / original_size.max(1) as f64 - 1.0) * 100.0),
                "Output grew, keeping the original bytes"
            );
            if attempt.destination != *input {
                fs::remove_file(&attempt.destination)?;
                fs::copy(input, &attempt.destination)?;
            }
            return Ok(original_size);
        }
        Ok(compressed_size)
    }

    /// Copy the input verbatim to the destination and report it as skipped.
    fn copy_original(
        &self,
        request: &CompressionConfig,
        attempt: &mut Attempt,
        dimensions: (u32, u32),
        reason: &str,
    ) -> Result<CompressionResult> {
        let input = &request.input_path;
        attempt.destination = request.output_path_for(input, None, false);
        if let Some(parent) = attempt.destination.parent() {
            fs::create_dir_all(parent)?;
        }
        if attempt.destination != *input {
            attempt.wrote = true;
            fs::copy(input, &attempt.destination)?;
        }
        let size = fs::metadata(input)?.len();
        info!(path = %input.display(), "Skipped: {reason}");
        Ok(CompressionResult::skipped(
            input,
            &attempt.destination,
            size,
            dimensions,
            reason,
        ))
    }
}

/// Fold a strategy decision into the request.
fn apply_decision(request: &CompressionConfig, decision: &CompressionDecision) -> CompressionConfig {
    let mut applied = request.clone();
    if let Some(format) = decision.recommended_format {
        applied.target_format = Some(format);
    }
    if let Some(quality) = decision.recommended_quality {
        applied.quality_mode = QualityMode::Custom(quality);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::backend::tests::{MockCodec, RecordedOp};
    use crate::codec::ColorMode;
    use crate::test_helpers::write_bytes;
    use crate::types::{CompressOptions, FORMAT_SKIPPED, FORMAT_UNKNOWN, ResizeConfig, StrategyType};
    use crate::validation::ConfigBuilder;
    use image::{DynamicImage, RgbImage, Rgb};
    use std::path::Path;
    use tempfile::TempDir;

    const KB: usize = 1024;

    /// Process a default lossless request for `input`.
    fn compress_path(config: &EngineConfig, codec: &dyn Codec, input: &Path) -> CompressionResult {
        CompressionEngine::new(config, codec).process(&CompressionConfig::new(input))
    }

    /// An input file of `size` bytes; the mock ignores its content.
    fn input(tmp: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = tmp.path().join(name);
        write_bytes(&path, size);
        path
    }

    /// A mock decoding to a busy image, so classification sees a photo.
    fn photo_codec(format: Format, encoded: usize) -> MockCodec {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x * y) % 256) as u8])
        }));
        MockCodec::new(64, 64, format, encoded).with_image(img, ColorMode::Rgb)
    }

    fn encodes(codec: &MockCodec) -> Vec<RecordedOp> {
        codec
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Encode { .. }))
            .collect()
    }

    // =========================================================================
    // Validate / skip
    // =========================================================================

    #[test]
    fn missing_input_fails_with_path() {
        let config = EngineConfig::default();
        let codec = MockCodec::new(10, 10, Format::Png, 10);
        let result = compress_path(&config, &codec, Path::new("/nope/missing.png"));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("/nope/missing.png"));
        assert_eq!(result.format_used, FORMAT_UNKNOWN);
        assert!(codec.get_operations().is_empty());
    }

    #[test]
    fn tiny_file_is_copied_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "icon.png", 2 * KB);
        let config = EngineConfig::default();
        let codec = MockCodec::new(16, 16, Format::Png, 100);

        let result = compress_path(&config, &codec, &path);
        assert!(result.success);
        assert_eq!(result.format_used, FORMAT_SKIPPED);
        assert!(result.error.as_deref().unwrap().starts_with("skipped: "));
        assert_eq!(result.compressed_size, result.original_size);
        assert_eq!(fs::read(&result.output_path).unwrap(), fs::read(&path).unwrap());
        assert_eq!(result.output_path, tmp.path().join("icon_compress.png"));
        assert_eq!(codec.encode_count(), 0);
    }

    #[test]
    fn lossless_jpeg_is_copied_not_reencoded() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.jpg", 200 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Jpeg, 10 * KB);

        let result = compress_path(&config, &codec, &path);
        assert!(result.success);
        assert_eq!(result.format_used, FORMAT_SKIPPED);
        assert_eq!(codec.encode_count(), 0);
        assert_eq!(fs::read(&result.output_path).unwrap().len(), 200 * KB);
    }

    // =========================================================================
    // Encode path
    // =========================================================================

    #[test]
    fn explicit_quality_and_format_are_honored() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.png", 300 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Png, 40 * KB);
        let mut request = CompressionConfig::new(&path).with_quality(70).unwrap();
        request.target_format = Some(Format::Webp);

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.format_used, "WEBP");
        assert_eq!(result.quality_used, Some(70));
        assert_eq!(result.output_path, tmp.path().join("photo_compress_70.webp"));
        assert_eq!(result.compressed_size, 40 * KB as u64);
        assert!(matches!(
            encodes(&codec)[0],
            RecordedOp::Encode { format: Format::Webp, quality: Some(70), .. }
        ));
    }

    #[test]
    fn strategy_decision_is_applied() {
        let tmp = TempDir::new().unwrap();
        // Large BMP with no transparency: not an original-format case.
        let path = input(&tmp, "scan.bmp", 6 * 1024 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Bmp, 100 * KB);

        let result = compress_path(&config, &codec, &path);
        assert!(result.success, "{:?}", result.error);
        assert_ne!(result.format_used, "BMP");
        assert!(result.quality_used.is_some());
        assert!(result.compressed_size < result.original_size);
    }

    #[test]
    fn unknown_format_targets_jpeg() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "blob.dat", 300 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Other, 10 * KB);
        let request = CompressionConfig::new(&path).with_quality(80).unwrap();

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.format_used, "JPEG");
        assert_eq!(result.output_path, tmp.path().join("blob_compress_80.dat"));
    }

    #[test]
    fn resize_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "big.png", 300 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Png, 10 * KB);
        let mut request = CompressionConfig::new(&path).with_quality(80).unwrap();
        request.resize = Some(ResizeConfig::new(Some(32), None).unwrap());

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.was_resized);
        assert_eq!(result.original_dimensions, Some((64, 64)));
        assert_eq!(result.final_dimensions, Some((32, 32)));
        assert!(codec
            .get_operations()
            .contains(&RecordedOp::Resize { width: 32, height: 32 }));
    }

    #[test]
    fn resize_within_bounds_does_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "big.png", 300 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Png, 10 * KB);
        let mut request = CompressionConfig::new(&path).with_quality(80).unwrap();
        request.resize = Some(ResizeConfig::new(Some(100), Some(100)).unwrap());

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(!result.was_resized);
        assert_eq!(result.final_dimensions, Some((64, 64)));
    }

    // =========================================================================
    // Post-process
    // =========================================================================

    #[test]
    fn growth_falls_back_to_original_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.png", 100 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Png, 150 * KB);
        let mut request = CompressionConfig::new(&path).with_quality(90).unwrap();
        request.target_format = Some(Format::Webp);

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.success);
        assert_eq!(result.compressed_size, result.original_size);
        assert_eq!(fs::read(&result.output_path).unwrap(), fs::read(&path).unwrap());
    }

    #[test]
    fn custom_quality_tolerates_small_growth() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.png", 100 * KB);
        let config = EngineConfig::default();
        // +1%: below the 2% custom threshold.
        let codec = photo_codec(Format::Png, 101 * KB);
        let mut request = CompressionConfig::new(&path).with_quality(90).unwrap();
        request.target_format = Some(Format::Webp);

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert_eq!(result.compressed_size, 101 * KB as u64);

        // fallback_to_original does not tighten the threshold for an explicit quality.
        request.fallback_to_original = true;
        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert_eq!(result.compressed_size, 101 * KB as u64);
    }

    #[test]
    fn modern_to_legacy_with_quality_keeps_small_growth() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.webp", 100 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Webp, 101 * KB);
        let options = CompressOptions {
            quality: Some(80),
            ..CompressOptions::default()
        };
        let request = ConfigBuilder::new(&config, &codec)
            .build(&path, None, None, Some("jpeg"), &options)
            .unwrap();
        assert!(request.fallback_to_original);

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.compressed_size, 101 * KB as u64);
        assert_eq!(fs::read(&result.output_path).unwrap().len(), 101 * KB);
    }

    #[test]
    fn auto_quality_uses_the_strict_threshold() {
        let tmp = TempDir::new().unwrap();
        // Large BMP: the strategy picks a lossy format and fills in a quality.
        let path = input(&tmp, "scan.bmp", 6 * 1024 * KB);
        let config = EngineConfig::default();
        // +1% growth: above 0.5%, below 2%.
        let codec = photo_codec(Format::Bmp, 6 * 1024 * KB * 101 / 100);

        let result = compress_path(&config, &codec, &path);
        assert!(result.success, "{:?}", result.error);
        assert!(result.quality_used.is_some());
        assert_eq!(result.compressed_size, result.original_size);
    }

    #[test]
    fn negligible_lossless_gain_drops_suffix() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "art.tiff", 300 * KB);
        let out = tmp.path().join("out");
        let config = EngineConfig::default();
        // 2% smaller: below the 5% negligible-gain ratio.
        let codec = photo_codec(Format::Tiff, 294 * KB);
        let mut request = CompressionConfig::new(&path);
        request.target_format = Some(Format::Webp);
        request.output_dir = Some(out.clone());

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output_path, out.join("art.webp"));
        assert!(result.output_path.exists());
        assert!(!out.join("art_compress.webp").exists());
    }

    #[test]
    fn negligible_gain_keeps_an_existing_plain_file() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "art.tiff", 300 * KB);
        let user_file = tmp.path().join("art.webp");
        fs::write(&user_file, b"not ours, keep this").unwrap();
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Tiff, 294 * KB);
        let mut request = CompressionConfig::new(&path);
        request.target_format = Some(Format::Webp);

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(fs::read(&user_file).unwrap(), b"not ours, keep this");
        assert_eq!(result.output_path, tmp.path().join("art_compress.webp"));
        assert_eq!(fs::read(&result.output_path).unwrap().len(), 294 * KB);
    }

    #[test]
    fn explicit_output_path_is_never_renamed() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "art.tiff", 300 * KB);
        let explicit = tmp.path().join("exact_name.webp");
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Tiff, 294 * KB);
        let mut request = CompressionConfig::new(&path);
        request.target_format = Some(Format::Webp);
        request.output_path = Some(explicit.clone());

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert_eq!(result.output_path, explicit);
        assert!(explicit.exists());
    }

    // =========================================================================
    // Failure
    // =========================================================================

    #[test]
    fn encode_failure_removes_partial_output() {
        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.png", 300 * KB);
        let config = EngineConfig::default();
        let codec = photo_codec(Format::Png, 10 * KB).failing_encode();
        let request = CompressionConfig::new(&path).with_quality(80).unwrap();

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(!result.success);
        assert_eq!(result.compressed_size, 0);
        assert_eq!(result.format_used, FORMAT_UNKNOWN);
        assert_eq!(result.output_path, tmp.path().join("photo_compress_80.png"));
        assert!(!result.output_path.exists());
        assert!(path.exists());
    }

    #[test]
    fn unsupported_target_fails() {
        struct NoHeif(MockCodec);
        impl Codec for NoHeif {
            fn decode(&self, p: &Path) -> std::result::Result<DecodedImage, crate::codec::CodecError> {
                self.0.decode(p)
            }
            fn encode(
                &self,
                i: &DynamicImage,
                e: &EncodeParams,
                p: &Path,
            ) -> std::result::Result<(), crate::codec::CodecError> {
                self.0.encode(i, e, p)
            }
            fn resize(&self, i: &DynamicImage, w: u32, h: u32) -> DynamicImage {
                self.0.resize(i, w, h)
            }
            fn exif_transpose(&self, i: DynamicImage, o: image::metadata::Orientation) -> DynamicImage {
                self.0.exif_transpose(i, o)
            }
            fn formats_supported(&self) -> &[Format] {
                &[Format::Jpeg, Format::Png]
            }
        }

        let tmp = TempDir::new().unwrap();
        let path = input(&tmp, "photo.png", 300 * KB);
        let config = EngineConfig::default();
        let codec = NoHeif(photo_codec(Format::Png, 10 * KB));
        let mut request = CompressionConfig::new(&path).with_quality(80).unwrap();
        request.target_format = Some(Format::Heif);

        let result = CompressionEngine::new(&config, &codec).process(&request);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("HEIF"));
        assert_eq!(codec.0.encode_count(), 0);
    }

    #[test]
    fn decision_folding() {
        let request = CompressionConfig::new("a.png");
        let decision = CompressionDecision::new(StrategyType::Lossy, Format::Webp, Some(85), "r");
        let applied = apply_decision(&request, &decision);
        assert_eq!(applied.target_format, Some(Format::Webp));
        assert_eq!(applied.effective_quality(), Some(85));

        let lossless = CompressionDecision::new(StrategyType::Lossless, Format::Png, None, "r");
        let applied = apply_decision(&request, &lossless);
        assert!(applied.is_lossless());
        assert_eq!(applied.target_format, Some(Format::Png));
    }
}
