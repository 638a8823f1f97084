//! Output file naming.
//!
//! An explicit `output_path` always wins. Otherwise the name is built from
//! the input stem, a quality suffix and the target format's extension:
//!
//! - `photo.png`, lossless, no target → `photo_compress.png`
//! - `photo.png`, quality 80, WEBP    → `photo_compress_80.webp`
//! - `photo.png`, lossless, suffix skipped → `photo.png` (in the output dir)
//!
//! The directory is `output_dir` when set, else the input's parent.

use crate::format::Format;
use crate::types::{CompressionConfig, QualityMode};
use std::path::{Path, PathBuf};

/// Suffix appended to the stem: `_compress` or `_compress_{q}`.
pub fn quality_suffix(mode: QualityMode) -> String {
    match mode {
        QualityMode::Lossless => "_compress".to_string(),
        QualityMode::Custom(q) => format!("_compress_{q}"),
    }
}

/// Extension with the leading dot. Override beats target; else the input's own.
fn extension(config: &CompressionConfig, original: &Path, format_override: Option<Format>) -> String {
    match format_override.or(config.target_format) {
        Some(format) => format.extension().to_string(),
        None => original
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    }
}

pub fn output_path(
    config: &CompressionConfig,
    original: &Path,
    format_override: Option<Format>,
    skip_suffix: bool,
) -> PathBuf {
    if let Some(explicit) = &config.output_path {
        return explicit.clone();
    }

    let dir = config
        .output_dir
        .clone()
        .or_else(|| original.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mut name = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !skip_suffix {
        name.push_str(&quality_suffix(config.quality_mode));
    }
    name.push_str(&extension(config, original, format_override));
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CompressionConfig {
        CompressionConfig::new("/photos/cat.PNG")
    }

    #[test]
    fn lossless_keeps_input_extension() {
        let c = config();
        assert_eq!(
            output_path(&c, &c.input_path, None, false),
            PathBuf::from("/photos/cat_compress.PNG")
        );
    }

    #[test]
    fn custom_quality_in_suffix() {
        let c = config().with_quality(80).unwrap();
        assert_eq!(
            output_path(&c, &c.input_path, Some(Format::Webp), false),
            PathBuf::from("/photos/cat_compress_80.webp")
        );
    }

    #[test]
    fn target_format_sets_extension() {
        let mut c = config();
        c.target_format = Some(Format::Jpeg);
        assert_eq!(
            output_path(&c, &c.input_path, None, false),
            PathBuf::from("/photos/cat_compress.jpg")
        );
    }

    #[test]
    fn override_beats_target() {
        let mut c = config();
        c.target_format = Some(Format::Jpeg);
        assert_eq!(
            output_path(&c, &c.input_path, Some(Format::Tiff), false),
            PathBuf::from("/photos/cat_compress.tiff")
        );
    }

    #[test]
    fn output_dir_and_skip_suffix() {
        let mut c = config();
        c.output_dir = Some("/out".into());
        assert_eq!(
            output_path(&c, &c.input_path, None, true),
            PathBuf::from("/out/cat.PNG")
        );
    }

    #[test]
    fn explicit_output_path_wins() {
        let mut c = config();
        c.output_path = Some("/elsewhere/x.bin".into());
        c.output_dir = Some("/out".into());
        assert_eq!(
            output_path(&c, &c.input_path, Some(Format::Png), false),
            PathBuf::from("/elsewhere/x.bin")
        );
    }

    #[test]
    fn extensionless_input() {
        let c = CompressionConfig::new("/photos/raw");
        assert_eq!(
            output_path(&c, &c.input_path, None, false),
            PathBuf::from("/photos/raw_compress")
        );
    }
}
