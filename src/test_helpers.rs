//! Shared fixtures for the unit tests.
//!
//! Every fixture is generated on the fly into a caller-provided path, so
//! tests never depend on checked-in binaries.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let photo = tmp.path().join("photo.jpg");
//! write_gradient_jpeg(&photo, 120, 80, 90);
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

// =========================================================================
// Image fixtures
// =========================================================================

/// Smooth RGB gradient saved as a baseline JPEG at `quality`.
pub fn write_gradient_jpeg(path: &Path, width: u32, height: u32, quality: u8) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let writer = BufWriter::new(File::create(path).unwrap());
    JpegEncoder::new_with_quality(writer, quality)
        .encode_image(&img)
        .unwrap();
}

/// RGBA PNG with an opaque left half and a half-transparent right half.
pub fn write_rgba_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([40, 40, 200, 100])
        }
    })
    .save(path)
    .unwrap();
}

/// Single-color RGB PNG.
pub fn write_solid_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([30, 120, 60]))
        .save(path)
        .unwrap();
}

/// Pseudo-random RGB PNG. Noise barely compresses, so the file is large
/// enough to get past the skip guard.
pub fn write_noise_png(path: &Path, width: u32, height: u32) {
    let mut state: u32 = 0x2545_f491;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    RgbImage::from_fn(width, height, |_, _| {
        let v = next();
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    })
    .save(path)
    .unwrap();
}

/// Write `size` filler bytes; for tests where the codec is a mock.
pub fn write_bytes(path: &Path, size: usize) {
    std::fs::write(path, vec![7u8; size]).unwrap();
}
