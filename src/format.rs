//! Image format identifiers shared by every stage.
//!
//! Formats are plain upper-case names on the wire (`"JPEG"`, `"WEBP"`) so
//! results serialize the same way users type them. Parsing is
//! case-insensitive and resolves the `JPG` alias.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    Jpeg,
    Png,
    Webp,
    Avif,
    Heif,
    Gif,
    Bmp,
    Tiff,
    Other,
}

impl Format {
    /// Every named format, in the order they are listed to users.
    pub const ALL: &'static [Format] = &[
        Format::Jpeg,
        Format::Png,
        Format::Webp,
        Format::Avif,
        Format::Heif,
        Format::Gif,
        Format::Bmp,
        Format::Tiff,
    ];

    /// Parse a user-supplied format name. `None` for anything unknown.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Some(Self::Jpeg),
            "PNG" => Some(Self::Png),
            "WEBP" => Some(Self::Webp),
            "AVIF" => Some(Self::Avif),
            "HEIF" | "HEIC" => Some(Self::Heif),
            "GIF" => Some(Self::Gif),
            "BMP" => Some(Self::Bmp),
            "TIFF" | "TIF" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "heif" | "heic" => Some(Self::Heif),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WEBP",
            Self::Avif => "AVIF",
            Self::Heif => "HEIF",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::Other => "OTHER",
        }
    }

    /// Preferred extension, with the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Webp => ".webp",
            Self::Avif => ".avif",
            Self::Heif => ".heif",
            Self::Gif => ".gif",
            Self::Bmp => ".bmp",
            Self::Tiff => ".tiff",
            Self::Other => ".jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Heif => "image/heif",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Other => "application/octet-stream",
        }
    }

    /// Efficient modern formats. Converting these to a legacy format usually
    /// grows the file.
    pub fn is_modern(self) -> bool {
        matches!(self, Self::Webp | Self::Avif | Self::Heif)
    }

    pub fn supports_transparency(self) -> bool {
        matches!(
            self,
            Self::Png | Self::Webp | Self::Gif | Self::Tiff | Self::Avif | Self::Heif
        )
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
