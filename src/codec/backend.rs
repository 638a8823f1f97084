//! Codec trait and shared types.
//!
//! The [`Codec`] trait is the only way the engine touches pixels: decode a
//! file into a buffer plus side information, encode a buffer with typed
//! parameters, resize, and undo EXIF orientation.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests use the recording
//! `MockCodec` in this module's test submodule.

use super::params::EncodeParams;
use crate::format::Format;
use image::DynamicImage;
use image::metadata::Orientation;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported format: {0}")]
    Unsupported(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel layout of the source file, before any decoder expansion.
///
/// Names follow the usual single-letter mode codes (`"P"` for palette,
/// `"1"` for bilevel) so they read naturally in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    #[serde(rename = "1")]
    Bilevel,
    L,
    LA,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
    #[serde(rename = "CMYK")]
    Cmyk,
    #[serde(rename = "P")]
    Palette,
    #[serde(rename = "OTHER")]
    Other,
}

impl ColorMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bilevel => "1",
            Self::L => "L",
            Self::LA => "LA",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
            Self::Cmyk => "CMYK",
            Self::Palette => "P",
            Self::Other => "OTHER",
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::LA | Self::Rgba)
    }
}

/// Everything a decoder reports besides the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SideInfo {
    /// Format sniffed from the file contents; `Format::Other` when unknown.
    pub format: Format,
    pub color_mode: ColorMode,
    /// Raw TIFF-structured EXIF block.
    pub exif: Option<Vec<u8>>,
    pub icc: Option<Vec<u8>>,
    /// A transparency key (PNG tRNS or a palette transparency index) was present.
    pub transparency: bool,
    pub frame_count: u32,
    pub orientation: Orientation,
}

impl Default for SideInfo {
    fn default() -> Self {
        Self {
            format: Format::Other,
            color_mode: ColorMode::Rgb,
            exif: None,
            icc: None,
            transparency: false,
            frame_count: 1,
            orientation: Orientation::NoTransforms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub info: SideInfo,
}

/// Trait for image codecs.
///
/// Implementations must be `Sync`: one instance serves every rayon worker
/// in a batch run.
pub trait Codec: Sync {
    /// Decode a file into pixels plus side information. Orientation is
    /// reported, not applied.
    fn decode(&self, path: &Path) -> Result<DecodedImage, CodecError>;

    /// Encode `image` with `params` and write it to `path`.
    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
        path: &Path,
    ) -> Result<(), CodecError>;

    /// Resample to exactly `width` x `height`.
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Rotate/flip so the pixels display upright.
    fn exif_transpose(&self, image: DynamicImage, orientation: Orientation) -> DynamicImage;

    /// Output formats this codec can encode.
    fn formats_supported(&self) -> &[Format];

    fn supports(&self, format: Format) -> bool {
        self.formats_supported().contains(&format)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    const ALL_FORMATS: &[Format] = &[
        Format::Jpeg,
        Format::Png,
        Format::Webp,
        Format::Avif,
        Format::Heif,
        Format::Gif,
        Format::Bmp,
        Format::Tiff,
    ];

    /// Mock codec that records operations and writes fixed-size outputs.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockCodec {
        pub image: DynamicImage,
        pub info: SideInfo,
        /// Bytes written per encode call.
        pub encoded_size: usize,
        pub fail_encode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(String),
        Encode {
            output: String,
            format: Format,
            quality: Option<u8>,
            width: u32,
            height: u32,
        },
        Resize {
            width: u32,
            height: u32,
        },
        ExifTranspose,
    }

    impl MockCodec {
        /// Decodes to a `width` x `height` RGB buffer and writes
        /// `encoded_size` bytes on encode.
        pub fn new(width: u32, height: u32, format: Format, encoded_size: usize) -> Self {
            Self {
                image: DynamicImage::new_rgb8(width, height),
                info: SideInfo {
                    format,
                    ..SideInfo::default()
                },
                encoded_size,
                fail_encode: false,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn with_image(mut self, image: DynamicImage, color_mode: ColorMode) -> Self {
            self.image = image;
            self.info.color_mode = color_mode;
            self
        }

        pub fn failing_encode(mut self) -> Self {
            self.fail_encode = true;
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Encode { .. }))
                .count()
        }
    }

    impl Codec for MockCodec {
        fn decode(&self, path: &Path) -> Result<DecodedImage, CodecError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(path.to_string_lossy().to_string()));
            if !path.exists() {
                return Err(CodecError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "mock: no such file",
                )));
            }
            Ok(DecodedImage {
                pixels: self.image.clone(),
                info: self.info.clone(),
            })
        }

        fn encode(
            &self,
            image: &DynamicImage,
            params: &EncodeParams,
            path: &Path,
        ) -> Result<(), CodecError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                output: path.to_string_lossy().to_string(),
                format: params.format(),
                quality: params.quality(),
                width: image.width(),
                height: image.height(),
            });
            if self.fail_encode {
                std::fs::write(path, b"partial")?;
                return Err(CodecError::ProcessingFailed("mock encode failure".into()));
            }
            std::fs::write(path, vec![0u8; self.encoded_size])?;
            Ok(())
        }

        fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Resize { width, height });
            image.resize_exact(width, height, image::imageops::FilterType::Nearest)
        }

        fn exif_transpose(&self, image: DynamicImage, _orientation: Orientation) -> DynamicImage {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::ExifTranspose);
            image
        }

        fn formats_supported(&self) -> &[Format] {
            ALL_FORMATS
        }
    }

    #[test]
    fn mock_records_decode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        std::fs::write(&path, b"x").unwrap();

        let codec = MockCodec::new(40, 30, Format::Png, 10);
        let decoded = codec.decode(&path).unwrap();
        assert_eq!(decoded.pixels.width(), 40);
        assert_eq!(decoded.info.format, Format::Png);

        let ops = codec.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Decode(p) if p.ends_with("a.png")));
    }

    #[test]
    fn mock_decode_missing_file_errors() {
        let codec = MockCodec::new(1, 1, Format::Png, 1);
        assert!(codec.decode(Path::new("/nonexistent/a.png")).is_err());
    }

    #[test]
    fn mock_encode_writes_configured_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out.jpg");
        let codec = MockCodec::new(8, 8, Format::Png, 123);
        let params = EncodeParams::Jpeg(crate::codec::JpegParams {
            quality: Some(80),
            ..Default::default()
        });

        codec
            .encode(&DynamicImage::new_rgb8(8, 8), &params, &out)
            .unwrap();

        assert_eq!(std::fs::metadata(&out).unwrap().len(), 123);
        assert!(matches!(
            &codec.get_operations()[0],
            RecordedOp::Encode {
                format: Format::Jpeg,
                quality: Some(80),
                ..
            }
        ));
    }

    #[test]
    fn color_mode_alpha() {
        assert!(ColorMode::Rgba.has_alpha());
        assert!(ColorMode::LA.has_alpha());
        assert!(!ColorMode::Palette.has_alpha());
        assert_eq!(ColorMode::Palette.name(), "P");
    }
}
