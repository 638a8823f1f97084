//! Shared types passed between the engine, the batch driver and the façade.
//!
//! Requests flow in as [`CompressionConfig`]; everything that comes back out
//! is serializable so the CLI can print it as JSON unchanged.

use crate::error::{CompressError, Result};
use crate::format::Format;
use crate::metadata::human_size;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How hard the caller wants us to squeeze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "quality", rename_all = "lowercase")]
pub enum QualityMode {
    /// No explicit quality: keep fidelity, let the strategy pick a format.
    Lossless,
    /// Explicit quality, 1..=100.
    Custom(u8),
}

/// Optional bounding box for the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResizeConfig {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub maintain_aspect_ratio: bool,
    pub upscale_allowed: bool,
}

impl ResizeConfig {
    /// Bounds must be positive when present.
    pub fn new(max_width: Option<u32>, max_height: Option<u32>) -> Result<Self> {
        if max_width == Some(0) {
            return Err(CompressError::validation("max_width", "must be positive"));
        }
        if max_height == Some(0) {
            return Err(CompressError::validation("max_height", "must be positive"));
        }
        Ok(Self {
            max_width,
            max_height,
            maintain_aspect_ratio: true,
            upscale_allowed: false,
        })
    }

    pub fn has_bounds(&self) -> bool {
        self.max_width.is_some() || self.max_height.is_some()
    }
}

/// Caller knobs shared by every entry point, before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressOptions {
    pub quality: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

/// One compression request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionConfig {
    pub input_path: PathBuf,
    /// Exact destination. Wins over `output_dir` and disables renaming.
    pub output_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub quality_mode: QualityMode,
    pub target_format: Option<Format>,
    pub resize: Option<ResizeConfig>,
    pub optimize: bool,
    pub progressive: bool,
    pub strip_metadata: bool,
    pub keep_orientation: bool,
    /// Set for lossless and modern-to-legacy requests, where growth is
    /// expected. The engine falls back on growth either way; the threshold
    /// depends only on whether a quality was given.
    pub fallback_to_original: bool,
}

impl CompressionConfig {
    /// Lossless request with default options.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: None,
            output_dir: None,
            quality_mode: QualityMode::Lossless,
            target_format: None,
            resize: None,
            optimize: true,
            progressive: true,
            strip_metadata: false,
            keep_orientation: true,
            fallback_to_original: false,
        }
    }

    /// Switch to custom mode. Quality must be in 1..=100.
    pub fn with_quality(mut self, quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(CompressError::validation(
                "quality",
                format!("must be between 1 and 100, got {quality}"),
            ));
        }
        self.quality_mode = QualityMode::Custom(quality);
        Ok(self)
    }

    pub fn effective_quality(&self) -> Option<u8> {
        match self.quality_mode {
            QualityMode::Lossless => None,
            QualityMode::Custom(q) => Some(q),
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.quality_mode == QualityMode::Lossless
    }

    pub fn should_resize(&self) -> bool {
        self.resize.as_ref().is_some_and(ResizeConfig::has_bounds)
    }

    /// Where output for `original` should go. See [`crate::naming`].
    pub fn output_path_for(
        &self,
        original: &Path,
        format_override: Option<Format>,
        skip_suffix: bool,
    ) -> PathBuf {
        crate::naming::output_path(self, original, format_override, skip_suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    Lossless,
    Lossy,
    Adaptive,
    Skip,
}

impl StrategyType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lossless => "lossless",
            Self::Lossy => "lossy",
            Self::Adaptive => "adaptive",
            Self::Skip => "skip",
        }
    }
}

/// What the strategy selector recommends for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionDecision {
    pub strategy_type: StrategyType,
    pub recommended_quality: Option<u8>,
    /// `None` only for skip decisions on an unrecognised input format.
    pub recommended_format: Option<Format>,
    pub reason: String,
    pub skip_compression: bool,
}

impl CompressionDecision {
    pub fn new(
        strategy_type: StrategyType,
        format: Format,
        quality: Option<u8>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            strategy_type,
            recommended_quality: quality,
            recommended_format: Some(format),
            reason: reason.into(),
            skip_compression: false,
        }
    }

    pub fn skip(format: Option<Format>, reason: impl Into<String>) -> Self {
        Self {
            strategy_type: StrategyType::Skip,
            recommended_quality: None,
            recommended_format: format,
            reason: reason.into(),
            skip_compression: true,
        }
    }
}

/// `format_used` for a file we left untouched.
pub const FORMAT_SKIPPED: &str = "SKIPPED";
/// `format_used` for a failed run.
pub const FORMAT_UNKNOWN: &str = "UNKNOWN";

/// Outcome of compressing one file to one format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionResult {
    pub success: bool,
    pub error: Option<String>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub original_size: u64,
    pub compressed_size: u64,
    pub format_used: String,
    pub quality_used: Option<u8>,
    pub was_resized: bool,
    pub original_dimensions: Option<(u32, u32)>,
    pub final_dimensions: Option<(u32, u32)>,
}

impl CompressionResult {
    /// A failed run: nothing written, sizes zeroed except the input's.
    pub fn failed(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        original_size: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            input_path: input_path.into(),
            output_path: output_path.into(),
            original_size,
            compressed_size: 0,
            format_used: FORMAT_UNKNOWN.to_string(),
            quality_used: None,
            was_resized: false,
            original_dimensions: None,
            final_dimensions: None,
        }
    }

    /// The input was copied verbatim to `output_path`.
    pub fn skipped(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        size: u64,
        dimensions: (u32, u32),
        reason: &str,
    ) -> Self {
        Self {
            success: true,
            error: Some(format!("skipped: {reason}")),
            input_path: input_path.into(),
            output_path: output_path.into(),
            original_size: size,
            compressed_size: size,
            format_used: FORMAT_SKIPPED.to_string(),
            quality_used: None,
            was_resized: false,
            original_dimensions: Some(dimensions),
            final_dimensions: Some(dimensions),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.format_used == FORMAT_SKIPPED
    }

    pub fn size_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }

    /// Percentage of the input saved, 0..=100.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.size_saved() as f64 / self.original_size as f64 * 100.0
    }

    pub fn summary(&self) -> String {
        if !self.success {
            return format!("failed: {}", self.error.as_deref().unwrap_or("unknown error"));
        }
        format!(
            "{} → {} ({:.1}% saved)",
            human_size(self.original_size),
            human_size(self.compressed_size),
            self.compression_ratio()
        )
    }
}

/// Aggregate accessors shared by multi-format and batch results.
pub trait ResultCollection {
    fn results(&self) -> &[CompressionResult];

    fn total_count(&self) -> usize {
        self.results().len()
    }

    fn success_count(&self) -> usize {
        self.results().iter().filter(|r| r.success).count()
    }

    fn failure_count(&self) -> usize {
        self.total_count() - self.success_count()
    }

    /// Percentage, 0 for an empty collection.
    fn success_rate(&self) -> f64 {
        match self.total_count() {
            0 => 0.0,
            n => self.success_count() as f64 / n as f64 * 100.0,
        }
    }

    fn total_original_size(&self) -> u64 {
        self.results().iter().map(|r| r.original_size).sum()
    }

    fn total_compressed_size(&self) -> u64 {
        self.results()
            .iter()
            .filter(|r| r.success)
            .map(|r| r.compressed_size)
            .sum()
    }

    fn total_size_saved(&self) -> u64 {
        self.results()
            .iter()
            .filter(|r| r.success)
            .map(CompressionResult::size_saved)
            .sum()
    }

    fn overall_compression_ratio(&self) -> f64 {
        match self.total_original_size() {
            0 => 0.0,
            total => self.total_size_saved() as f64 / total as f64 * 100.0,
        }
    }
}

/// One input compressed to several formats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiFormatResult {
    pub success: bool,
    pub error: Option<String>,
    pub input_path: PathBuf,
    pub results: Vec<CompressionResult>,
}

impl ResultCollection for MultiFormatResult {
    fn results(&self) -> &[CompressionResult] {
        &self.results
    }
}

impl MultiFormatResult {
    /// The successful result that saved the most bytes.
    pub fn best_result(&self) -> Option<&CompressionResult> {
        self.results
            .iter()
            .filter(|r| r.success)
            .max_by_key(|r| r.size_saved())
    }
}

/// How a directory run spread its work over the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// One job per file, pool capped at the file count.
    Isolated,
    /// Rayon splits the file list freely.
    Shared,
}

impl ExecutorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::Shared => "shared",
        }
    }
}

/// Every file of a directory run, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub error: Option<String>,
    pub input_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub executor: Option<ExecutorKind>,
    pub results: Vec<CompressionResult>,
}

impl ResultCollection for BatchResult {
    fn results(&self) -> &[CompressionResult] {
        &self.results
    }
}

impl BatchResult {
    pub fn failed(input_dir: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            input_dir: input_dir.into(),
            output_dir: None,
            executor: None,
            results: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        if !self.success {
            return format!(
                "batch failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        }
        format!(
            "processed {}/{} files ({:.1}% success), saved {}",
            self.success_count(),
            self.total_count(),
            self.success_rate(),
            human_size(self.total_size_saved())
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompressionOutcome {
    Single(CompressionResult),
    MultiFormat(MultiFormatResult),
    Batch(BatchResult),
}

/// What the universal entry point returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionResponse {
    pub success: bool,
    pub result: CompressionOutcome,
    pub error: Option<String>,
}

impl CompressionResponse {
    pub fn single(result: CompressionResult) -> Self {
        Self {
            success: result.success,
            error: if result.success { None } else { result.error.clone() },
            result: CompressionOutcome::Single(result),
        }
    }

    pub fn multi_format(result: MultiFormatResult) -> Self {
        Self {
            success: result.success,
            error: result.error.clone(),
            result: CompressionOutcome::MultiFormat(result),
        }
    }

    pub fn batch(result: BatchResult) -> Self {
        Self {
            success: result.success,
            error: result.error.clone(),
            result: CompressionOutcome::Batch(result),
        }
    }
}
