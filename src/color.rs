//! Color-mode preparation before encoding.
//!
//! Each target format accepts a different set of pixel layouts. This module
//! converts a decoded buffer into one the target encoder handles well:
//!
//! | Target | Conversion |
//! |---|---|
//! | JPEG | alpha composited onto an edge-sampled background; everything to RGB |
//! | PNG | palette expanded; CMYK to RGB; gray-looking RGB to L |
//! | WEBP, AVIF, HEIF | palette expanded; LA to RGBA; L to RGB |
//! | others | unchanged |
//!
//! The decoder has already expanded palettes into RGB(A) buffers, so the
//! source [`ColorMode`] is passed alongside to know where a buffer came from.

use crate::codec::ColorMode;
use crate::format::Format;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba};

/// Fallback background for JPEG compositing.
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Minimum opaque edge samples needed to trust the sampled background.
const MIN_EDGE_SAMPLES: usize = 3;

pub fn prepare_for_format(
    image: DynamicImage,
    mode: ColorMode,
    transparency: bool,
    target: Format,
) -> DynamicImage {
    match target {
        Format::Jpeg => prepare_for_jpeg(image, mode, transparency),
        Format::Png => prepare_for_png(image, mode, transparency),
        Format::Webp | Format::Avif | Format::Heif => prepare_for_modern(image, mode, transparency),
        Format::Gif | Format::Bmp | Format::Tiff | Format::Other => image,
    }
}

fn prepare_for_jpeg(image: DynamicImage, mode: ColorMode, transparency: bool) -> DynamicImage {
    let has_alpha = mode.has_alpha() || (mode == ColorMode::Palette && transparency);
    if !has_alpha || !image.color().has_alpha() {
        return match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
    }

    // Palette sources have no meaningful edge color.
    let background = if mode.has_alpha() {
        edge_background(&image)
    } else {
        WHITE
    };
    DynamicImage::ImageRgb8(composite(&image, background))
}

/// Average color of opaque pixels sampled along all four edges.
pub(crate) fn edge_background(image: &DynamicImage) -> Rgb<u8> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return WHITE;
    }
    let step = (w.min(h) / 10).max(1) as usize;
    let mut samples: Vec<[u8; 4]> = Vec::new();
    let mut sample = |x: u32, y: u32| {
        let Rgba(p) = image.get_pixel(x, y);
        if p[3] > 128 {
            samples.push(p);
        }
    };
    for x in (0..w).step_by(step) {
        sample(x, 0);
        sample(x, h - 1);
    }
    for y in (0..h).step_by(step) {
        sample(0, y);
        sample(w - 1, y);
    }

    if samples.len() < MIN_EDGE_SAMPLES {
        return WHITE;
    }
    let n = samples.len() as u64;
    let channel = |i: usize| (samples.iter().map(|p| u64::from(p[i])).sum::<u64>() / n) as u8;
    Rgb([channel(0), channel(1), channel(2)])
}

/// Paste `image` over a solid background. Any non-zero alpha keeps the
/// source pixel.
fn composite(image: &DynamicImage, background: Rgb<u8>) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        if a > 0 { Rgb([r, g, b]) } else { background }
    })
}

fn expand_palette(image: DynamicImage, transparency: bool) -> DynamicImage {
    if transparency {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

fn prepare_for_png(image: DynamicImage, mode: ColorMode, transparency: bool) -> DynamicImage {
    match mode {
        ColorMode::Palette => expand_palette(image, transparency),
        ColorMode::Cmyk => DynamicImage::ImageRgb8(image.to_rgb8()),
        ColorMode::Rgb if looks_grayscale(&image) => DynamicImage::ImageLuma8(image.to_luma8()),
        _ => image,
    }
}

/// Sample up to 100 pixels along the diagonal; gray when all have R == G == B.
pub(crate) fn looks_grayscale(image: &DynamicImage) -> bool {
    let (w, h) = image.dimensions();
    let pixels = u64::from(w) * u64::from(h);
    if pixels == 0 {
        return false;
    }
    let count = (pixels / 100).clamp(1, 100);
    (0..count).all(|i| {
        let x = (u64::from(w) * i / count) as u32;
        let y = (u64::from(h) * i / count) as u32;
        let Rgba([r, g, b, _]) = image.get_pixel(x, y);
        r == g && g == b
    })
}

fn prepare_for_modern(image: DynamicImage, mode: ColorMode, transparency: bool) -> DynamicImage {
    match mode {
        ColorMode::Palette => expand_palette(image, transparency),
        ColorMode::LA => DynamicImage::ImageRgba8(image.to_rgba8()),
        ColorMode::L | ColorMode::Bilevel => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    }
}
