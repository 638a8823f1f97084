//! Engine configuration.
//!
//! Every tunable the decision heuristics use lives in [`EngineConfig`]. There
//! is no global instance: the CLI builds one and passes it by reference into
//! the strategy selector, the optimizer and the engine.
//!
//! ## Loading order
//!
//! 1. Stock defaults (serialized to a TOML value)
//! 2. A user file, merged on top: `--config <FILE>`, or `pixsqueeze.toml` in
//!    the working directory when present
//! 3. Environment overrides: `PIXSQUEEZE_JPEG_QUALITY`,
//!    `PIXSQUEEZE_WEBP_QUALITY`, `PIXSQUEEZE_MAX_WORKERS`
//! 4. [`EngineConfig::validate`]
//!
//! ## Configuration Options
//!
//! ```toml
//! [compression]
//! jpeg_quality = 85             # Quality for photographic lossy JPEG
//! webp_quality = 75             # Quality for large non-photo WebP
//! png_compress_level = 6        # zlib level for PNG (0-9)
//! size_threshold_mb = 5.0       # Above this a file counts as "large"
//! complexity_threshold = 0.7
//!
//! [strategy]
//! prefer_quality = true         # Prefer WebP over JPEG/PNG when suggesting
//!
//! [thresholds]
//! skip_min_bytes = 5120         # Never touch files smaller than this
//! skip_compact_bytes = 51200    # JPEG/WebP below this are left alone
//! skip_png_bytes = 102400       # PNG below this may be left alone...
//! png_simple_bytes_per_pixel = 1.5  # ...when also this compact
//! negligible_gain_ratio = 0.05  # Lossless gains below this drop the suffix
//! fallback_threshold_auto = 1.005
//! fallback_threshold_custom = 1.02
//! max_dimension = 50000
//!
//! [processing]
//! max_workers = 4               # Omit for auto (CPU cores)
//! isolation_file_count = 20
//! isolation_avg_mb = 5.0
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "pixsqueeze.toml";

pub const ENV_JPEG_QUALITY: &str = "PIXSQUEEZE_JPEG_QUALITY";
pub const ENV_WEBP_QUALITY: &str = "PIXSQUEEZE_WEBP_QUALITY";
pub const ENV_MAX_WORKERS: &str = "PIXSQUEEZE_MAX_WORKERS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid environment variable {name}: {value:?}")]
    Env { name: String, value: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub compression: CompressionSettings,
    pub strategy: StrategySettings,
    pub thresholds: Thresholds,
    pub processing: ProcessingConfig,
}

/// Default qualities and size/complexity cut-offs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionSettings {
    pub jpeg_quality: u8,
    pub webp_quality: u8,
    pub png_compress_level: u8,
    /// Files above this many megabytes count as large.
    pub size_threshold_mb: f64,
    pub complexity_threshold: f64,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            webp_quality: 75,
            png_compress_level: 6,
            size_threshold_mb: 5.0,
            complexity_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategySettings {
    /// Favor WebP when suggesting formats.
    pub prefer_quality: bool,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            prefer_quality: true,
        }
    }
}

/// Byte and ratio thresholds for skipping, renaming and falling back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub skip_min_bytes: u64,
    pub skip_compact_bytes: u64,
    pub skip_png_bytes: u64,
    pub png_simple_bytes_per_pixel: f64,
    pub negligible_gain_ratio: f64,
    /// Output may exceed the input by this factor before we fall back, when
    /// the caller gave no explicit quality.
    pub fallback_threshold_auto: f64,
    /// Same, when the caller asked for a quality.
    pub fallback_threshold_custom: f64,
    pub max_dimension: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            skip_min_bytes: 5 * 1024,
            skip_compact_bytes: 50 * 1024,
            skip_png_bytes: 100 * 1024,
            png_simple_bytes_per_pixel: 1.5,
            negligible_gain_ratio: 0.05,
            fallback_threshold_auto: 1.005,
            fallback_threshold_custom: 1.02,
            max_dimension: 50_000,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
    /// Batches with more files than this use isolated work units.
    pub isolation_file_count: usize,
    /// Batches whose average file is larger than this (MB) use isolated work units.
    pub isolation_avg_mb: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            isolation_file_count: 20,
            isolation_avg_mb: 5.0,
        }
    }
}

fn check(ok: bool, msg: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Validation(msg.into()))
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        let t = &self.thresholds;
        check(
            (1..=100).contains(&c.jpeg_quality),
            "compression.jpeg_quality must be 1-100",
        )?;
        check(
            (1..=100).contains(&c.webp_quality),
            "compression.webp_quality must be 1-100",
        )?;
        check(
            c.png_compress_level <= 9,
            "compression.png_compress_level must be 0-9",
        )?;
        check(
            c.size_threshold_mb > 0.0,
            "compression.size_threshold_mb must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&c.complexity_threshold),
            "compression.complexity_threshold must be 0-1",
        )?;
        check(
            t.skip_min_bytes > 0 && t.skip_compact_bytes > 0 && t.skip_png_bytes > 0,
            "thresholds.skip_*_bytes must be positive",
        )?;
        check(
            t.png_simple_bytes_per_pixel > 0.0,
            "thresholds.png_simple_bytes_per_pixel must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&t.negligible_gain_ratio),
            "thresholds.negligible_gain_ratio must be 0-1",
        )?;
        check(
            t.fallback_threshold_auto >= 1.0 && t.fallback_threshold_custom >= 1.0,
            "thresholds.fallback_threshold_* must be at least 1.0",
        )?;
        check(t.max_dimension > 0, "thresholds.max_dimension must be positive")?;
        check(
            self.processing.max_workers != Some(0),
            "processing.max_workers must be at least 1",
        )?;
        check(
            self.processing.isolation_avg_mb > 0.0,
            "processing.isolation_avg_mb must be positive",
        )?;
        Ok(())
    }

    /// Apply `PIXSQUEEZE_*` overrides read through `lookup`.
    ///
    /// Takes the lookup as a function so tests do not touch the process
    /// environment.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::Env {
                name: name.to_string(),
                value,
            })
        }

        if let Some(v) = lookup(ENV_JPEG_QUALITY) {
            self.compression.jpeg_quality = parse(ENV_JPEG_QUALITY, v)?;
        }
        if let Some(v) = lookup(ENV_WEBP_QUALITY) {
            self.compression.webp_quality = parse(ENV_WEBP_QUALITY, v)?;
        }
        if let Some(v) = lookup(ENV_MAX_WORKERS) {
            self.processing.max_workers = Some(parse(ENV_MAX_WORKERS, v)?);
        }
        Ok(())
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(EngineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` into `base`. Tables merge key by key;
/// anything else in the overlay replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut merged), toml::Value::Table(top)) => {
            for (key, value) in top {
                let value = match merged.remove(&key) {
                    Some(below) => merge_toml(below, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Read an explicit config file. Missing files are an error.
pub fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Read `pixsqueeze.toml` from `dir` if there is one.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Merge an optional overlay onto `base`, apply env overrides and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<EngineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let mut config: EngineConfig = merged.try_into()?;
    config.apply_env_overrides(env)?;
    config.validate()?;
    Ok(config)
}

/// Load the engine config the way the CLI does.
///
/// `explicit` is the `--config` path; without it `pixsqueeze.toml` in `dir`
/// is used when present.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<EngineConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_config_file(path)?),
        None => load_raw_config(dir)?,
    };
    resolve_config(stock_defaults_value()?, overlay, |name| {
        std::env::var(name).ok()
    })
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixsqueeze configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# pixsqueeze reads ./pixsqueeze.toml when present, or the file given with
# --config. Environment variables override the file:
#   PIXSQUEEZE_JPEG_QUALITY, PIXSQUEEZE_WEBP_QUALITY, PIXSQUEEZE_MAX_WORKERS
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Default qualities used when pixsqueeze picks a lossy strategy itself.
# ---------------------------------------------------------------------------
[compression]
# JPEG quality for large or complex photographs (1-100).
jpeg_quality = 85
# WebP quality for large images that are neither photos nor graphics (1-100).
webp_quality = 75
# zlib compression level for PNG output (0-9).
png_compress_level = 6
# Files larger than this (in MB) are treated as "large".
size_threshold_mb = 5.0
# Complexity score (0-1) above which an image counts as complex.
complexity_threshold = 0.7

# ---------------------------------------------------------------------------
# Strategy preferences
# ---------------------------------------------------------------------------
[strategy]
# Prefer WebP over JPEG/PNG when suggesting an output format.
prefer_quality = true

# ---------------------------------------------------------------------------
# Safety thresholds
# ---------------------------------------------------------------------------
[thresholds]
# Files smaller than this many bytes are never recompressed.
skip_min_bytes = 5120
# JPEG and WebP files smaller than this are already compact.
skip_compact_bytes = 51200
# PNG files smaller than this are skipped when they are also below
# png_simple_bytes_per_pixel.
skip_png_bytes = 102400
png_simple_bytes_per_pixel = 1.5
# Lossless runs saving less than this fraction keep the plain file name.
negligible_gain_ratio = 0.05
# Output larger than input times this factor is replaced by the original.
# "auto" applies when no quality was requested, "custom" when one was.
fallback_threshold_auto = 1.005
fallback_threshold_custom = 1.02
# Largest accepted --max-width / --max-height.
max_dimension = 50000

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel workers. Omit to use all CPU cores.
# Values larger than the core count are clamped down.
# max_workers = 4
# Directory runs switch to one-file-per-job scheduling above either limit.
isolation_file_count = 20
isolation_avg_mb = 5.0
"##
}
