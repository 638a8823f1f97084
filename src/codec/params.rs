//! Encode parameter types.
//!
//! These structs describe *what* the encoder should do, not *how*. The
//! [`formats`](crate::formats) builder produces a base set, the
//! [`optimizer`](crate::optimizer) refines it, and a [`Codec`](super::Codec)
//! carries it out. Keeping them as plain data lets the engine be tested
//! against a mock codec that only records what it was asked to do.
//!
//! ## Types
//!
//! - [`EncodeParams`]: one variant per target format.
//! - [`Subsampling`]: chroma subsampling for JPEG and AVIF.
//! - [`JpegParams`], [`PngParams`], [`WebpParams`], [`AvifParams`], [`HeifParams`].

use crate::format::Format;
use serde::Serialize;

/// Chroma subsampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Subsampling {
    #[serde(rename = "4:4:4")]
    S444,
    #[serde(rename = "4:2:2")]
    S422,
    #[serde(rename = "4:2:0")]
    S420,
}

impl Subsampling {
    pub fn label(self) -> &'static str {
        match self {
            Self::S444 => "4:4:4",
            Self::S422 => "4:2:2",
            Self::S420 => "4:2:0",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JpegParams {
    /// `None` means re-encode without touching quality (lossless intent).
    pub quality: Option<u8>,
    pub optimize: bool,
    pub progressive: bool,
    pub subsampling: Option<Subsampling>,
    /// Keep full chroma resolution regardless of `subsampling`.
    pub keep_rgb: bool,
    /// Restart interval in MCU blocks.
    pub restart_interval: Option<u16>,
    pub strip_metadata: bool,
    #[serde(skip)]
    pub icc_profile: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PngParams {
    /// zlib level, 0..=9.
    pub compress_level: u8,
    pub optimize: bool,
    /// Force this bit depth per channel.
    pub bits: Option<u8>,
    #[serde(skip)]
    pub icc_profile: Option<Vec<u8>>,
}

impl Default for PngParams {
    fn default() -> Self {
        Self {
            compress_level: 9,
            optimize: true,
            bits: Some(8),
            icc_profile: None,
        }
    }
}

/// WebP settings. In lossless mode `quality` is the encoder effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebpParams {
    pub lossless: bool,
    pub quality: u8,
    /// 0 (fast) ..= 6 (slowest, smallest).
    pub method: u8,
    /// Preserve RGB values under fully transparent pixels.
    pub exact: bool,
    pub alpha_quality: Option<u8>,
    pub segments: Option<u8>,
    pub sns_strength: Option<u8>,
    pub filter_strength: Option<u8>,
    pub filter_sharpness: Option<u8>,
    pub filter_type: Option<u8>,
    pub pass: Option<u8>,
    pub autofilter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvifParams {
    pub lossless: bool,
    pub quality: u8,
    /// 1 (slowest, best) ..= 10.
    pub speed: u8,
    pub subsampling: Option<Subsampling>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeifParams {
    pub quality: u8,
}

/// Final encoder instructions for one output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "UPPERCASE")]
pub enum EncodeParams {
    Jpeg(JpegParams),
    Png(PngParams),
    Webp(WebpParams),
    Avif(AvifParams),
    Heif(HeifParams),
    /// Formats without tunables (GIF, BMP, TIFF).
    Passthrough { target: Format },
}

impl EncodeParams {
    pub fn format(&self) -> Format {
        match self {
            Self::Jpeg(_) => Format::Jpeg,
            Self::Png(_) => Format::Png,
            Self::Webp(_) => Format::Webp,
            Self::Avif(_) => Format::Avif,
            Self::Heif(_) => Format::Heif,
            Self::Passthrough { target } => *target,
        }
    }

    /// Quality the encoder will use, for reporting. `None` for lossless paths.
    pub fn quality(&self) -> Option<u8> {
        match self {
            Self::Jpeg(p) => p.quality,
            Self::Webp(p) if !p.lossless => Some(p.quality),
            Self::Avif(p) if !p.lossless => Some(p.quality),
            Self::Heif(p) => Some(p.quality),
            _ => None,
        }
    }

    /// Carry the source ICC profile into formats whose encoder can embed it.
    ///
    /// JPEG params built with `strip_metadata` stay bare.
    pub fn attach_icc(&mut self, profile: &[u8]) {
        match self {
            Self::Jpeg(p) if !p.strip_metadata => p.icc_profile = Some(profile.to_vec()),
            Self::Png(p) => p.icc_profile = Some(profile.to_vec()),
            _ => {}
        }
    }
}
