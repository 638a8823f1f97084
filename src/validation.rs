//! Input validation and request building.
//!
//! Everything a caller passes in (format names, quality, bounds, paths) is
//! checked here before the engine sees it. The result is a
//! [`CompressionConfig`] the engine can trust.

use crate::codec::Codec;
use crate::config::EngineConfig;
use crate::error::{CompressError, Result};
use crate::format::Format;
use crate::types::{CompressOptions, CompressionConfig, ResizeConfig};
use std::path::Path;
use tracing::warn;

pub struct ConfigBuilder<'a> {
    codec: &'a dyn Codec,
    max_dimension: u32,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(config: &EngineConfig, codec: &'a dyn Codec) -> Self {
        Self {
            codec,
            max_dimension: config.thresholds.max_dimension,
        }
    }

    /// Build a request without touching the filesystem.
    pub fn build(
        &self,
        input: &Path,
        output_path: Option<&Path>,
        output_dir: Option<&Path>,
        format: Option<&str>,
        options: &CompressOptions,
    ) -> Result<CompressionConfig> {
        let mut config = CompressionConfig::new(input);
        config.output_path = output_path.map(Path::to_path_buf);
        config.output_dir = output_dir.map(Path::to_path_buf);
        config.target_format = format.map(|f| self.validate_format(f)).transpose()?;

        if let Some(quality) = validate_quality(options.quality)? {
            config = config.with_quality(quality)?;
        }

        let max_width = self.validate_dimension("max_width", options.max_width)?;
        let max_height = self.validate_dimension("max_height", options.max_height)?;
        if max_width.is_some() || max_height.is_some() {
            config.resize = Some(ResizeConfig::new(max_width, max_height)?);
        }

        config.fallback_to_original = config.is_lossless() || modern_to_legacy(input, config.target_format);
        Ok(config)
    }

    /// [`build`](Self::build), after checking that `input` is an existing file.
    pub fn validate_and_build(
        &self,
        input: &Path,
        output_path: Option<&Path>,
        output_dir: Option<&Path>,
        format: Option<&str>,
        options: &CompressOptions,
    ) -> Result<CompressionConfig> {
        if !input.exists() {
            return Err(CompressError::NotFound(input.to_path_buf()));
        }
        if !input.is_file() {
            return Err(CompressError::validation(
                "input_path",
                format!("{} is not a file", input.display()),
            ));
        }
        self.build(input, output_path, output_dir, format, options)
    }

    /// Parse a format name (case-insensitive, `JPG` accepted) and check the
    /// codec can write it.
    pub fn validate_format(&self, name: &str) -> Result<Format> {
        let supported = || {
            self.codec
                .formats_supported()
                .iter()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match Format::parse(name) {
            Some(format) if self.codec.supports(format) => Ok(format),
            _ => Err(CompressError::validation(
                "format",
                format!("'{name}' is not supported, choose from {}", supported()),
            )),
        }
    }

    /// Validate every entry, drop invalid ones with a warning, and dedupe
    /// in order. Fails when nothing valid is left.
    pub fn validate_and_normalize_formats(&self, names: &[String]) -> Result<Vec<Format>> {
        if names.is_empty() {
            return Err(CompressError::validation("formats", "no formats given"));
        }
        let mut formats = Vec::with_capacity(names.len());
        for name in names {
            match self.validate_format(name) {
                Ok(format) if !formats.contains(&format) => formats.push(format),
                Ok(_) => {}
                Err(e) => warn!("Skipping format: {e}"),
            }
        }
        if formats.is_empty() {
            return Err(CompressError::validation(
                "formats",
                format!("none of {names:?} is supported"),
            ));
        }
        Ok(formats)
    }

    fn validate_dimension(&self, field: &str, value: Option<u32>) -> Result<Option<u32>> {
        match value {
            Some(0) => Err(CompressError::validation(field, "must be positive")),
            Some(v) if v > self.max_dimension => Err(CompressError::validation(
                field,
                format!("{v} exceeds the limit of {}", self.max_dimension),
            )),
            other => Ok(other),
        }
    }
}

fn validate_quality(quality: Option<u32>) -> Result<Option<u8>> {
    match quality {
        None => Ok(None),
        Some(q @ 1..=100) => Ok(Some(q as u8)),
        Some(q) => Err(CompressError::validation(
            "quality",
            format!("must be between 1 and 100, got {q}"),
        )),
    }
}

/// Modern input converted to JPEG or PNG easily grows.
fn modern_to_legacy(input: &Path, target: Option<Format>) -> bool {
    let input_is_modern = Format::from_path(input).is_some_and(Format::is_modern);
    input_is_modern && matches!(target, Some(Format::Jpeg | Format::Png))
}
