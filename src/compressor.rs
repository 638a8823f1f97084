//! Public façade.
//!
//! [`ImageCompressor`] owns the engine configuration and a codec and exposes
//! one method per kind of request. None of them return `Err`: validation
//! and processing failures come back inside the typed result with
//! `success == false`, so a CLI or service can serialize them unchanged.
//!
//! [`image_info`](ImageCompressor::image_info) is the exception. It is a
//! query rather than a compression and reports its failure as a
//! [`CompressError`].

use crate::batch::BatchProcessor;
use crate::characteristics::{self, ImageCharacteristics, ImageType};
use crate::codec::{Codec, RustCodec};
use crate::config::EngineConfig;
use crate::engine::CompressionEngine;
use crate::error::{CompressError, Result};
use crate::format::Format;
use crate::metadata::{
    self, BrightnessStats, ComplexityLevel, ComplexityMetrics, ExifData, IccProfile,
    ImageOrientation,
};
use crate::strategy::{self, CompressionStrategy};
use crate::types::{
    CompressOptions, CompressionConfig, CompressionDecision, CompressionOutcome,
    CompressionResponse, CompressionResult, MultiFormatResult,
};
use crate::validation::ConfigBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory used for multi-format output when the caller gives none.
const DEFAULT_MULTI_DIR: &str = "output";

pub struct ImageCompressor<C: Codec = RustCodec> {
    config: EngineConfig,
    codec: C,
}

impl ImageCompressor<RustCodec> {
    /// Stock configuration with the production codec.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default(), RustCodec::new())
    }
}

impl<C: Codec> ImageCompressor<C> {
    pub fn new(config: EngineConfig, codec: C) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn builder(&self) -> ConfigBuilder<'_> {
        ConfigBuilder::new(&self.config, &self.codec)
    }

    /// Compress one file to one format.
    pub fn compress_image(
        &self,
        input: &Path,
        output_path: Option<&Path>,
        output_dir: Option<&Path>,
        format: Option<&str>,
        options: &CompressOptions,
    ) -> CompressionResult {
        let request = match self
            .builder()
            .validate_and_build(input, output_path, output_dir, format, options)
        {
            Ok(request) => request,
            Err(e) => return rejected(input, output_path, output_dir, &e),
        };
        CompressionEngine::new(&self.config, &self.codec).process(&request)
    }

    /// Compress one file to each of `formats` under `output_dir`
    /// (default: `output/` next to the input).
    pub fn compress_multi_format(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        formats: &[String],
        options: &CompressOptions,
    ) -> MultiFormatResult {
        let failed = |error: String| MultiFormatResult {
            success: false,
            error: Some(error),
            input_path: input.to_path_buf(),
            results: Vec::new(),
        };

        if !input.is_file() {
            let e = CompressError::NotFound(input.to_path_buf());
            e.log(input);
            return failed(e.to_string());
        }
        let formats = match self.builder().validate_and_normalize_formats(formats) {
            Ok(formats) => formats,
            Err(e) => return failed(e.to_string()),
        };
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_multi_dir(input));
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            return failed(format!("cannot create {}: {e}", output_dir.display()));
        }

        let results: Vec<CompressionResult> = formats
            .iter()
            .map(|format| {
                self.compress_image(input, None, Some(&output_dir), Some(format.name()), options)
            })
            .collect();
        let success = results.iter().any(|r| r.success);
        let result = MultiFormatResult {
            success,
            error: (!success).then(|| "all formats failed".to_string()),
            input_path: input.to_path_buf(),
            results,
        };
        if let Some(best) = result.best_result() {
            info!(path = %input.display(), best = %best.format_used, "{}", best.summary());
        }
        result
    }

    /// Compress every image in a directory. Two or more formats produce one
    /// merged batch.
    pub fn compress_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        formats: &[String],
        options: &CompressOptions,
        recursive: bool,
    ) -> CompressionResponse {
        let processor = BatchProcessor::new(&self.config, &self.codec);
        let batch = match formats {
            [] => processor.process_directory(input_dir, output_dir, None, options, recursive),
            [format] => {
                processor.process_directory(input_dir, output_dir, Some(format.as_str()), options, recursive)
            }
            _ => processor.process_directory_multi(input_dir, output_dir, formats, options, recursive),
        };
        CompressionResponse::batch(batch)
    }

    /// Dispatch on what `input` is.
    ///
    /// | Input | Formats | Result |
    /// |---|---|---|
    /// | file | 0 or 1 | single; `output` is the file path, or a directory if one exists there |
    /// | file | 2+ | multi-format; `output` is the directory |
    /// | directory | any | batch; `output` is the directory |
    pub fn compress_universal(
        &self,
        input: &Path,
        output: Option<&Path>,
        formats: &[String],
        options: &CompressOptions,
        recursive: bool,
    ) -> CompressionResponse {
        if input.is_file() {
            return match formats {
                [] | [_] => {
                    let format = formats.first().map(String::as_str);
                    let (output_path, output_dir) = match output {
                        Some(out) if out.is_dir() => (None, Some(out)),
                        other => (other, None),
                    };
                    CompressionResponse::single(self.compress_image(
                        input,
                        output_path,
                        output_dir,
                        format,
                        options,
                    ))
                }
                _ => CompressionResponse::multi_format(
                    self.compress_multi_format(input, output, formats, options),
                ),
            };
        }
        if input.is_dir() {
            return self.compress_directory(input, output, formats, options, recursive);
        }

        let (error, cause) = if input.exists() {
            ("unsupported path type", CompressError::validation("input_path", "unsupported path type"))
        } else {
            ("input path does not exist", CompressError::NotFound(input.to_path_buf()))
        };
        CompressionResponse {
            success: false,
            result: CompressionOutcome::Single(rejected(input, output, None, &cause)),
            error: Some(error.to_string()),
        }
    }

    /// Everything the engine knows about one image, without writing anything.
    pub fn image_info(&self, path: &Path) -> Result<ImageInfoReport> {
        if !path.exists() {
            return Err(CompressError::NotFound(path.to_path_buf()));
        }
        let decoded = self.codec.decode(path)?;
        let metadata = metadata::extract_decoded(&self.codec, path, &decoded)?;
        let pixel_class = characteristics::from_pixels(&decoded.pixels);
        let metadata_class = characteristics::from_metadata(&metadata);
        let decision = CompressionStrategy::new(&self.config)
            .select_optimal(&metadata, Some(&CompressionConfig::new(path)));

        let estimated_ratios = metadata_class
            .recommended_formats()
            .into_iter()
            .map(|format| FormatEstimate {
                format,
                ratio: strategy::estimate_compression_ratio(format, &metadata, None),
            })
            .collect();

        let basic = &metadata.basic;
        Ok(ImageInfoReport {
            path: path.to_path_buf(),
            format: basic.format,
            color_mode: basic.color_mode.name(),
            width: basic.width,
            height: basic.height,
            byte_size: basic.byte_size,
            human_size: basic.human_size(),
            total_pixels: basic.total_pixels(),
            aspect_ratio: basic.aspect_ratio(),
            orientation: basic.orientation(),
            has_transparency: basic.has_transparency,
            frame_count: basic.frame_count,
            is_animated: basic.is_animated(),
            exif: metadata.exif.clone(),
            icc: metadata.icc.clone(),
            brightness: metadata.brightness(),
            complexity: metadata.complexity,
            overall_complexity: metadata.overall_complexity(),
            hard_to_compress: metadata.complexity.map(|c| {
                c.compression_difficulty >= self.config.compression.complexity_threshold
            }),
            image_type: pixel_class.image_type(),
            pixel_characteristics: pixel_class,
            metadata_characteristics: metadata_class,
            estimated_ratios,
            decision,
        })
    }
}

/// Serializable answer to [`ImageCompressor::image_info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfoReport {
    pub path: PathBuf,
    pub format: Format,
    pub color_mode: &'static str,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub human_size: String,
    pub total_pixels: u64,
    pub aspect_ratio: f64,
    pub orientation: ImageOrientation,
    pub has_transparency: bool,
    pub frame_count: u32,
    pub is_animated: bool,
    pub exif: Option<ExifData>,
    pub icc: Option<IccProfile>,
    pub brightness: Option<BrightnessStats>,
    pub complexity: Option<ComplexityMetrics>,
    pub overall_complexity: Option<ComplexityLevel>,
    /// Compression difficulty at or above `complexity_threshold`.
    pub hard_to_compress: Option<bool>,
    /// Class from the decoded pixels.
    pub image_type: ImageType,
    pub pixel_characteristics: ImageCharacteristics,
    /// Class from the extracted metadata, the one the strategy uses.
    pub metadata_characteristics: ImageCharacteristics,
    pub estimated_ratios: Vec<FormatEstimate>,
    /// What a plain `compress` would do with this image.
    pub decision: CompressionDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormatEstimate {
    pub format: Format,
    /// Expected output size over input size.
    pub ratio: f64,
}

fn default_multi_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or(Path::new(""))
        .join(DEFAULT_MULTI_DIR)
}

/// Failed result for a request that never reached the engine.
fn rejected(
    input: &Path,
    output_path: Option<&Path>,
    output_dir: Option<&Path>,
    error: &CompressError,
) -> CompressionResult {
    error.log(input);
    let output = match output_path {
        Some(path) => path.to_path_buf(),
        None => {
            let mut request = CompressionConfig::new(input);
            request.output_dir = output_dir.map(Path::to_path_buf);
            request.output_path_for(input, None, false)
        }
    };
    let size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);
    CompressionResult::failed(input, output, size, error.to_string())
}
