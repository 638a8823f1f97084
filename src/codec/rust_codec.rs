//! Production codec built on the `image` crate ecosystem.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` + `ImageDecoder` side info |
//! | Decode (AVIF) | [`avif`](super::avif): `avif-parse` + `rav1d` |
//! | EXIF orientation | `ImageDecoder::orientation`, falling back to our IFD reader |
//! | Encode → JPEG | `jpeg-encoder` (sampling, progressive, Huffman optimization, restart markers, ICC) |
//! | Encode → PNG | `PngEncoder` (with ICC when kept) |
//! | Encode → WebP | `webp` crate (libwebp, lossless and lossy) |
//! | Encode → AVIF | `AvifEncoder` (rav1e), chroma pre-filtered to the requested subsampling |
//! | Encode → GIF / BMP / TIFF | `DynamicImage::write_to` |
//! | Resize | `resize_exact` with `Lanczos3` |
//!
//! HEIF is recognised everywhere else in the crate but has no encoder or
//! decoder here, so it is absent from [`Codec::formats_supported`].

use super::avif;
use super::backend::{Codec, CodecError, ColorMode, DecodedImage, SideInfo};
use super::exif;
use super::params::{AvifParams, EncodeParams, JpegParams, PngParams, Subsampling, WebpParams};
use crate::format::Format;
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifDecoder;
use image::codecs::png::{self, CompressionType, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    AnimationDecoder, DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageError,
    ImageFormat, ImageReader,
};
use jpeg_encoder::{ColorType, Encoder as JpegWriter, SamplingFactor};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Quality used when a JPEG is re-encoded without an explicit quality.
const JPEG_REENCODE_QUALITY: u8 = 95;

const ENCODABLE: &[Format] = &[
    Format::Jpeg,
    Format::Png,
    Format::Webp,
    Format::Avif,
    Format::Gif,
    Format::Bmp,
    Format::Tiff,
];

/// Extensions whose decoders are compiled in.
///
/// `ImageFormat::reading_enabled()` reports `true` for AVIF when only the
/// encoder is built, so AVIF is added by hand: it goes through our own
/// decoder.
const DECODE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

static INPUT_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut exts: Vec<&'static str> = DECODE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect();
    exts.push("avif");
    exts
});

/// Lower-case file extensions the batch driver should pick up.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &INPUT_EXTENSIONS
}

/// Codec backed by `image`, `webp` and `rav1d`.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

fn image_error(path: &Path, err: ImageError) -> CodecError {
    match err {
        ImageError::IoError(io) => CodecError::Io(io),
        ImageError::Unsupported(u) => {
            CodecError::Unsupported(format!("{}: {u}", path.display()))
        }
        other => CodecError::ProcessingFailed(format!("{}: {other}", path.display())),
    }
}

fn format_of(fmt: ImageFormat) -> Format {
    match fmt {
        ImageFormat::Jpeg => Format::Jpeg,
        ImageFormat::Png => Format::Png,
        ImageFormat::WebP => Format::Webp,
        ImageFormat::Avif => Format::Avif,
        ImageFormat::Gif => Format::Gif,
        ImageFormat::Bmp => Format::Bmp,
        ImageFormat::Tiff => Format::Tiff,
        _ => Format::Other,
    }
}

fn color_mode_of(color: ExtendedColorType, format: Format) -> ColorMode {
    use ExtendedColorType as E;
    match color {
        E::L1 => ColorMode::Bilevel,
        E::L2 | E::L4 | E::L8 | E::L16 => ColorMode::L,
        E::La1 | E::La2 | E::La4 | E::La8 | E::La16 => ColorMode::LA,
        E::Rgb1 | E::Rgb2 | E::Rgb4 | E::Rgb8 | E::Rgb16 | E::Rgb32F => ColorMode::Rgb,
        E::Rgba1 | E::Rgba2 | E::Rgba4 | E::Rgba8 | E::Rgba16 | E::Rgba32F => ColorMode::Rgba,
        E::Cmyk8 => ColorMode::Cmyk,
        // The PNG decoder reports indexed images as Unknown(bit depth).
        E::Unknown(_) if format == Format::Png => ColorMode::Palette,
        _ => ColorMode::Other,
    }
}

/// Any pixel that is not fully opaque.
fn has_translucent_pixel(image: &DynamicImage) -> bool {
    match image {
        DynamicImage::ImageRgba8(buf) => buf.pixels().any(|p| p[3] < u8::MAX),
        DynamicImage::ImageLumaA8(buf) => buf.pixels().any(|p| p[1] < u8::MAX),
        other if other.color().has_alpha() => other.to_rgba8().pixels().any(|p| p[3] < u8::MAX),
        _ => false,
    }
}

fn gif_frame_count(path: &Path) -> Option<u32> {
    let reader = BufReader::new(File::open(path).ok()?);
    let decoder = GifDecoder::new(reader).ok()?;
    Some(decoder.into_frames().count() as u32)
}

fn orientation_from_exif(block: Option<&[u8]>) -> Option<Orientation> {
    let tags = exif::parse(block?)?;
    Orientation::from_exif(tags.unsigned(exif::TAG_ORIENTATION)? as u8)
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, CodecError> {
    Ok(BufWriter::new(File::create(path)?))
}

fn sampling_factor(p: &JpegParams) -> SamplingFactor {
    if p.keep_rgb {
        return SamplingFactor::F_1_1;
    }
    match p.subsampling {
        Some(Subsampling::S444) => SamplingFactor::F_1_1,
        Some(Subsampling::S422) => SamplingFactor::F_2_1,
        Some(Subsampling::S420) | None => SamplingFactor::F_2_2,
    }
}

fn encode_jpeg(image: &DynamicImage, p: &JpegParams, path: &Path) -> Result<(), CodecError> {
    let jpeg_err = |e: jpeg_encoder::EncodingError| {
        CodecError::ProcessingFailed(format!("{}: {e}", path.display()))
    };
    let (width, height) = match (u16::try_from(image.width()), u16::try_from(image.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(CodecError::Unsupported(format!(
                "{}x{} exceeds the JPEG size limit",
                image.width(),
                image.height()
            )));
        }
    };
    // JPEG carries no alpha; anything that is not gray or RGB goes to RGB8.
    let (pixels, color): (Cow<'_, [u8]>, ColorType) = match image {
        DynamicImage::ImageLuma8(buf) => (Cow::Borrowed(buf.as_raw().as_slice()), ColorType::Luma),
        DynamicImage::ImageRgb8(buf) => (Cow::Borrowed(buf.as_raw().as_slice()), ColorType::Rgb),
        other => (Cow::Owned(other.to_rgb8().into_raw()), ColorType::Rgb),
    };

    let mut encoder = JpegWriter::new(
        create_writer(path)?,
        p.quality.unwrap_or(JPEG_REENCODE_QUALITY),
    );
    encoder.set_sampling_factor(sampling_factor(p));
    encoder.set_progressive(p.progressive);
    encoder.set_optimized_huffman_tables(p.optimize);
    if let Some(interval) = p.restart_interval {
        encoder.set_restart_interval(interval);
    }
    if let Some(icc) = &p.icc_profile
        && encoder.add_icc_profile(icc).is_err()
    {
        debug!("JPEG encoder rejected ICC profile");
    }
    encoder
        .encode(&pixels, width, height, color)
        .map_err(jpeg_err)
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_png(image: &DynamicImage, p: &PngParams, path: &Path) -> Result<(), CodecError> {
    let img: Cow<'_, DynamicImage> = match (p.bits, image) {
        (Some(8), DynamicImage::ImageLuma16(_)) => Cow::Owned(image.to_luma8().into()),
        (Some(8), DynamicImage::ImageLumaA16(_)) => Cow::Owned(image.to_luma_alpha8().into()),
        (Some(8), DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_)) => {
            Cow::Owned(image.to_rgb8().into())
        }
        (Some(8), DynamicImage::ImageRgba16(_) | DynamicImage::ImageRgba32F(_)) => {
            Cow::Owned(image.to_rgba8().into())
        }
        _ => Cow::Borrowed(image),
    };
    // Optimize searches the best filter per row; otherwise one fixed filter.
    let filter = if p.optimize {
        png::FilterType::Adaptive
    } else {
        png::FilterType::Sub
    };
    let mut encoder =
        PngEncoder::new_with_quality(create_writer(path)?, png_compression(p.compress_level), filter);
    if let Some(icc) = &p.icc_profile
        && encoder.set_icc_profile(icc.clone()).is_err()
    {
        debug!("PNG encoder rejected ICC profile");
    }
    img.write_with_encoder(encoder)
        .map_err(|e| image_error(path, e))
}

fn encode_webp(image: &DynamicImage, p: &WebpParams, path: &Path) -> Result<(), CodecError> {
    let (w, h) = (image.width(), image.height());
    let rgba;
    let rgb;
    let encoder = if image.color().has_alpha() {
        rgba = image.to_rgba8();
        webp::Encoder::from_rgba(&rgba, w, h)
    } else {
        rgb = image.to_rgb8();
        webp::Encoder::from_rgb(&rgb, w, h)
    };

    let mut config = webp::WebPConfig::new()
        .map_err(|_| CodecError::ProcessingFailed("failed to create WebPConfig".into()))?;
    config.lossless = i32::from(p.lossless);
    config.quality = f32::from(p.quality);
    config.method = i32::from(p.method);
    config.exact = i32::from(p.exact);
    config.autofilter = i32::from(p.autofilter);
    if let Some(v) = p.alpha_quality {
        config.alpha_quality = i32::from(v);
    }
    if let Some(v) = p.segments {
        config.segments = i32::from(v);
    }
    if let Some(v) = p.sns_strength {
        config.sns_strength = i32::from(v);
    }
    if let Some(v) = p.filter_strength {
        config.filter_strength = i32::from(v);
    }
    if let Some(v) = p.filter_sharpness {
        config.filter_sharpness = i32::from(v);
    }
    if let Some(v) = p.filter_type {
        config.filter_type = i32::from(v);
    }
    if let Some(v) = p.pass {
        config.pass = i32::from(v);
    }

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| CodecError::ProcessingFailed(format!("WebP encode failed: {e:?}")))?;
    std::fs::write(path, &*memory)?;
    Ok(())
}

/// Block size for each chroma subsampling mode, as (horizontal, vertical).
fn chroma_block(mode: Subsampling) -> (u32, u32) {
    match mode {
        Subsampling::S444 => (1, 1),
        Subsampling::S422 => (2, 1),
        Subsampling::S420 => (2, 2),
    }
}

/// Average Cb/Cr over each chroma block while keeping per-pixel luma
/// (BT.601, full range). `channels` is 3 or 4; alpha is untouched.
///
/// The AVIF encoder always writes 4:4:4, so the requested subsampling is
/// applied to the pixels before encoding.
fn subsample_chroma(raw: &mut [u8], width: u32, height: u32, channels: usize, mode: Subsampling) {
    let (bw, bh) = chroma_block(mode);
    if (bw, bh) == (1, 1) {
        return;
    }
    let index = |x: u32, y: u32| (y as usize * width as usize + x as usize) * channels;
    for by in (0..height).step_by(bh as usize) {
        for bx in (0..width).step_by(bw as usize) {
            let block: Vec<(u32, u32)> = (by..(by + bh).min(height))
                .flat_map(|y| (bx..(bx + bw).min(width)).map(move |x| (x, y)))
                .collect();
            let (mut cb, mut cr) = (0.0f32, 0.0f32);
            for &(x, y) in &block {
                let i = index(x, y);
                let (r, g, b) = (f32::from(raw[i]), f32::from(raw[i + 1]), f32::from(raw[i + 2]));
                cb += -0.168_736 * r - 0.331_264 * g + 0.5 * b;
                cr += 0.5 * r - 0.418_688 * g - 0.081_312 * b;
            }
            let n = block.len() as f32;
            let (cb, cr) = (cb / n, cr / n);
            for &(x, y) in &block {
                let i = index(x, y);
                let (r, g, b) = (f32::from(raw[i]), f32::from(raw[i + 1]), f32::from(raw[i + 2]));
                let luma = 0.299 * r + 0.587 * g + 0.114 * b;
                raw[i] = (luma + 1.402 * cr).round().clamp(0.0, 255.0) as u8;
                raw[i + 1] = (luma - 0.344_136 * cb - 0.714_136 * cr).round().clamp(0.0, 255.0) as u8;
                raw[i + 2] = (luma + 1.772 * cb).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn encode_avif(image: &DynamicImage, p: &AvifParams, path: &Path) -> Result<(), CodecError> {
    let subsampling = p.subsampling.filter(|_| !p.lossless);
    let img: Cow<'_, DynamicImage> = match (image, subsampling) {
        (DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_), None) => Cow::Borrowed(image),
        (other, Some(mode)) if other.color().has_alpha() => {
            let mut buf = other.to_rgba8();
            let (w, h) = buf.dimensions();
            subsample_chroma(&mut buf, w, h, 4, mode);
            Cow::Owned(buf.into())
        }
        (other, Some(mode)) => {
            let mut buf = other.to_rgb8();
            let (w, h) = buf.dimensions();
            subsample_chroma(&mut buf, w, h, 3, mode);
            Cow::Owned(buf.into())
        }
        (other, None) if other.color().has_alpha() => Cow::Owned(other.to_rgba8().into()),
        (other, None) => Cow::Owned(other.to_rgb8().into()),
    };
    let quality = if p.lossless { 100 } else { p.quality };
    let encoder = AvifEncoder::new_with_speed_quality(create_writer(path)?, p.speed, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| image_error(path, e))
}

fn encode_plain(image: &DynamicImage, target: Format, path: &Path) -> Result<(), CodecError> {
    let (fmt, img): (ImageFormat, Cow<'_, DynamicImage>) = match target {
        Format::Gif => (ImageFormat::Gif, Cow::Owned(image.to_rgba8().into())),
        Format::Bmp if image.color().has_alpha() => {
            (ImageFormat::Bmp, Cow::Owned(image.to_rgba8().into()))
        }
        Format::Bmp => (ImageFormat::Bmp, Cow::Owned(image.to_rgb8().into())),
        Format::Tiff => (ImageFormat::Tiff, Cow::Borrowed(image)),
        other => {
            return Err(CodecError::Unsupported(format!(
                "no plain encoder for {other}"
            )));
        }
    };
    let mut writer = create_writer(path)?;
    img.write_to(&mut writer, fmt)
        .map_err(|e| image_error(path, e))
}

impl Codec for RustCodec {
    fn decode(&self, path: &Path) -> Result<DecodedImage, CodecError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let sniffed = reader.format();
        let by_extension = Format::from_path(path);

        if sniffed == Some(ImageFormat::Avif)
            || (sniffed.is_none() && by_extension == Some(Format::Avif))
        {
            let pixels = avif::decode(&std::fs::read(path)?)?;
            return Ok(DecodedImage {
                pixels,
                info: SideInfo {
                    format: Format::Avif,
                    ..SideInfo::default()
                },
            });
        }

        let format = sniffed.map(format_of).unwrap_or(Format::Other);
        let mut decoder = reader.into_decoder().map_err(|e| image_error(path, e))?;
        let exif_block = decoder.exif_metadata().ok().flatten();
        let icc = decoder.icc_profile().ok().flatten();
        let orientation = match decoder.orientation() {
            Ok(Orientation::NoTransforms) | Err(_) => {
                orientation_from_exif(exif_block.as_deref()).unwrap_or(Orientation::NoTransforms)
            }
            Ok(o) => o,
        };
        let color_mode = color_mode_of(decoder.original_color_type(), format);
        let pixels = DynamicImage::from_decoder(decoder).map_err(|e| image_error(path, e))?;

        let color_mode = if format == Format::Gif {
            ColorMode::Palette
        } else {
            color_mode
        };
        // Alpha the source mode does not explain came from a transparency key.
        let transparency = !color_mode.has_alpha()
            && pixels.color().has_alpha()
            && has_translucent_pixel(&pixels);
        let frame_count = match format {
            Format::Gif => gif_frame_count(path).unwrap_or(1).max(1),
            _ => 1,
        };

        Ok(DecodedImage {
            pixels,
            info: SideInfo {
                format,
                color_mode,
                exif: exif_block,
                icc,
                transparency,
                frame_count,
                orientation,
            },
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
        path: &Path,
    ) -> Result<(), CodecError> {
        match params {
            EncodeParams::Jpeg(p) => encode_jpeg(image, p, path),
            EncodeParams::Png(p) => encode_png(image, p, path),
            EncodeParams::Webp(p) => encode_webp(image, p, path),
            EncodeParams::Avif(p) => encode_avif(image, p, path),
            EncodeParams::Heif(_) => Err(CodecError::Unsupported(
                "HEIF encoding is not available in this build".into(),
            )),
            EncodeParams::Passthrough { target } => encode_plain(image, *target, path),
        }
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn exif_transpose(&self, image: DynamicImage, orientation: Orientation) -> DynamicImage {
        let mut image = image;
        image.apply_orientation(orientation);
        image
    }

    fn formats_supported(&self) -> &[Format] {
        ENCODABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::params::Subsampling;
    use crate::test_helpers::{write_gradient_jpeg, write_rgba_png};
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff", "avif"] {
            assert!(exts.contains(expected), "expected {expected} in {exts:?}");
        }
    }

    #[test]
    fn heif_is_not_encodable() {
        let codec = RustCodec::new();
        assert!(!codec.supports(Format::Heif));
        assert!(codec.supports(Format::Webp));
    }

    #[test]
    fn decode_jpeg_side_info() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        write_gradient_jpeg(&path, 120, 80, 90);

        let decoded = RustCodec::new().decode(&path).unwrap();
        assert_eq!(decoded.pixels.width(), 120);
        assert_eq!(decoded.pixels.height(), 80);
        assert_eq!(decoded.info.format, Format::Jpeg);
        assert_eq!(decoded.info.color_mode, ColorMode::Rgb);
        assert!(!decoded.info.transparency);
        assert_eq!(decoded.info.frame_count, 1);
    }

    #[test]
    fn decode_sniffs_content_over_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("misnamed.bmp");
        write_gradient_jpeg(&path, 10, 10, 80);
        let decoded = RustCodec::new().decode(&path).unwrap();
        assert_eq!(decoded.info.format, Format::Jpeg);
    }

    #[test]
    fn decode_rgba_png_reports_alpha_mode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logo.png");
        write_rgba_png(&path, 32, 32);

        let decoded = RustCodec::new().decode(&path).unwrap();
        assert_eq!(decoded.info.format, Format::Png);
        assert_eq!(decoded.info.color_mode, ColorMode::Rgba);
        assert!(!decoded.info.transparency);
    }

    #[test]
    fn decode_grayscale_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("gray.png");
        GrayImage::from_pixel(16, 16, Luma([100])).save(&path).unwrap();

        let decoded = RustCodec::new().decode(&path).unwrap();
        assert_eq!(decoded.info.color_mode, ColorMode::L);
    }

    #[test]
    fn decode_nonexistent_file_errors() {
        let result = RustCodec::new().decode(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(CodecError::Io(_))));
    }

    #[test]
    fn decode_garbage_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("junk.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(RustCodec::new().decode(&path).is_err());
    }

    #[test]
    fn encode_jpeg_drops_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out.jpg");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, Rgba([10, 200, 30, 128])));
        let params = EncodeParams::Jpeg(JpegParams {
            quality: Some(80),
            optimize: true,
            progressive: true,
            subsampling: Some(Subsampling::S420),
            ..Default::default()
        });

        let codec = RustCodec::new();
        codec.encode(&img, &params, &out).unwrap();
        let back = codec.decode(&out).unwrap();
        assert_eq!(back.info.format, Format::Jpeg);
        assert!(!back.pixels.color().has_alpha());
        assert_eq!((back.pixels.width(), back.pixels.height()), (20, 10));
    }

    #[test]
    fn encode_png_keeps_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out.png");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 0])));

        let codec = RustCodec::new();
        codec
            .encode(&img, &EncodeParams::Png(PngParams::default()), &out)
            .unwrap();
        let back = codec.decode(&out).unwrap();
        assert!(back.pixels.color().has_alpha());
    }

    #[test]
    fn encode_webp_lossless_keeps_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out.webp");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(16, 16, |x, _| {
            Rgba([x as u8 * 10, 0, 0, if x < 8 { 0 } else { 255 }])
        }));
        let params = EncodeParams::Webp(WebpParams {
            lossless: true,
            quality: 30,
            method: 2,
            exact: true,
            ..Default::default()
        });

        let codec = RustCodec::new();
        codec.encode(&img, &params, &out).unwrap();
        let back = codec.decode(&out).unwrap();
        assert_eq!(back.info.format, Format::Webp);
        assert!(back.pixels.color().has_alpha());
    }

    #[test]
    fn encode_webp_lossy_rgb() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("src.jpg");
        write_gradient_jpeg(&src, 64, 48, 90);
        let out = tmp.path().join("out.webp");

        let codec = RustCodec::new();
        let img = codec.decode(&src).unwrap().pixels;
        let params = EncodeParams::Webp(WebpParams {
            quality: 75,
            method: 6,
            segments: Some(4),
            pass: Some(6),
            ..Default::default()
        });
        codec.encode(&img, &params, &out).unwrap();
        assert!(std::fs::metadata(&out).unwrap().len() > 0);
    }

    #[test]
    fn encode_then_decode_avif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out.avif");
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 5) as u8, 128])
        }));
        let params = EncodeParams::Avif(AvifParams {
            lossless: false,
            quality: 80,
            speed: 10,
            subsampling: None,
        });

        let codec = RustCodec::new();
        codec.encode(&img, &params, &out).unwrap();
        let back = codec.decode(&out).unwrap();
        assert_eq!(back.info.format, Format::Avif);
        assert_eq!((back.pixels.width(), back.pixels.height()), (64, 48));
    }

    #[test]
    fn encode_heif_is_unsupported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let params = EncodeParams::Heif(crate::codec::HeifParams { quality: 90 });
        let result = RustCodec::new().encode(
            &DynamicImage::new_rgb8(4, 4),
            &params,
            &tmp.path().join("x.heif"),
        );
        assert!(matches!(result, Err(CodecError::Unsupported(_))));
    }

    #[test]
    fn encode_plain_formats() {
        let tmp = tempfile::TempDir::new().unwrap();
        let codec = RustCodec::new();
        let img = DynamicImage::new_rgb8(12, 12);
        for (fmt, name) in [(Format::Gif, "a.gif"), (Format::Bmp, "a.bmp"), (Format::Tiff, "a.tiff")] {
            let out = tmp.path().join(name);
            codec
                .encode(&img, &EncodeParams::Passthrough { target: fmt }, &out)
                .unwrap();
            assert_eq!(codec.decode(&out).unwrap().info.format, fmt);
        }
    }

    #[test]
    fn gif_is_palette_mode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("a.gif");
        let codec = RustCodec::new();
        codec
            .encode(
                &DynamicImage::new_rgb8(6, 6),
                &EncodeParams::Passthrough { target: Format::Gif },
                &out,
            )
            .unwrap();
        let decoded = codec.decode(&out).unwrap();
        assert_eq!(decoded.info.color_mode, ColorMode::Palette);
        assert_eq!(decoded.info.frame_count, 1);
    }

    #[test]
    fn exif_transpose_rotates() {
        let codec = RustCodec::new();
        let img = DynamicImage::new_rgb8(30, 10);
        let rotated = codec.exif_transpose(img, Orientation::Rotate90);
        assert_eq!((rotated.width(), rotated.height()), (10, 30));
    }

    #[test]
    fn resize_is_exact() {
        let codec = RustCodec::new();
        let resized = codec.resize(&DynamicImage::new_rgb8(100, 50), 40, 20);
        assert_eq!((resized.width(), resized.height()), (40, 20));
    }

    #[test]
    fn orientation_fallback_reads_exif_block() {
        use crate::codec::exif::tests::{build_tiff, short};
        let block = build_tiff(&[short(exif::TAG_ORIENTATION, 8)], &[]);
        assert_eq!(
            orientation_from_exif(Some(&block)),
            Some(Orientation::Rotate270)
        );
        assert_eq!(orientation_from_exif(None), None);
    }

    /// Colorful, busy pixels so chroma settings matter.
    fn busy_rgb(width: u32, height: u32) -> DynamicImage {
        let mut state = 0x2545_F491u32;
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let n = (state >> 26) as u32;
            image::Rgb([
                ((x * 255 / width) + n).min(255) as u8,
                ((y * 255 / height) + n).min(255) as u8,
                (((x ^ y) & 0xFF) as u8).wrapping_add(n as u8),
            ])
        }))
    }

    fn has_marker(bytes: &[u8], marker: u8) -> bool {
        bytes.windows(2).any(|w| w == [0xFF, marker])
    }

    fn encode_to_bytes(img: &DynamicImage, params: EncodeParams, name: &str) -> Vec<u8> {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join(name);
        RustCodec::new().encode(img, &params, &out).unwrap();
        std::fs::read(&out).unwrap()
    }

    #[test]
    fn jpeg_params_reach_the_encoder() {
        let img = busy_rgb(256, 256);
        let baseline = encode_to_bytes(
            &img,
            EncodeParams::Jpeg(JpegParams {
                quality: Some(70),
                subsampling: Some(Subsampling::S420),
                ..Default::default()
            }),
            "baseline.jpg",
        );
        let tuned = encode_to_bytes(
            &img,
            EncodeParams::Jpeg(JpegParams {
                quality: Some(70),
                optimize: true,
                progressive: true,
                subsampling: Some(Subsampling::S444),
                restart_interval: Some(64),
                ..Default::default()
            }),
            "tuned.jpg",
        );

        assert_ne!(baseline, tuned);
        // SOF0 baseline, SOF2 progressive, DRI restart interval.
        assert!(has_marker(&baseline, 0xC0));
        assert!(!has_marker(&baseline, 0xDD));
        assert!(has_marker(&tuned, 0xC2));
        assert!(has_marker(&tuned, 0xDD));
        assert!(image::load_from_memory(&tuned).is_ok());
    }

    #[test]
    fn jpeg_full_chroma_is_larger() {
        let img = busy_rgb(128, 128);
        let with = |subsampling| {
            encode_to_bytes(
                &img,
                EncodeParams::Jpeg(JpegParams {
                    quality: Some(85),
                    subsampling: Some(subsampling),
                    ..Default::default()
                }),
                "out.jpg",
            )
            .len()
        };
        assert!(with(Subsampling::S444) > with(Subsampling::S420));
    }

    #[test]
    fn jpeg_sampling_factor_mapping() {
        let params = |subsampling, keep_rgb| JpegParams {
            subsampling,
            keep_rgb,
            ..Default::default()
        };
        assert!(matches!(sampling_factor(&params(Some(Subsampling::S444), false)), SamplingFactor::F_1_1));
        assert!(matches!(sampling_factor(&params(Some(Subsampling::S422), false)), SamplingFactor::F_2_1));
        assert!(matches!(sampling_factor(&params(Some(Subsampling::S420), false)), SamplingFactor::F_2_2));
        assert!(matches!(sampling_factor(&params(None, false)), SamplingFactor::F_2_2));
        assert!(matches!(sampling_factor(&params(Some(Subsampling::S420), true)), SamplingFactor::F_1_1));
    }

    #[test]
    fn chroma_subsampling_blends_neighbours() {
        // Red next to blue in one 2x1 block.
        let mut raw = vec![255, 0, 0, 255, 0, 0, 255, 40];
        subsample_chroma(&mut raw, 2, 1, 4, Subsampling::S422);
        assert!((i32::from(raw[0]) - i32::from(raw[4])).abs() < 60);
        assert!(raw[0] < 200 && raw[6] < 200);
        // Alpha untouched.
        assert_eq!((raw[3], raw[7]), (255, 40));

        let mut gray = vec![90, 90, 90, 200, 200, 200];
        subsample_chroma(&mut gray, 2, 1, 3, Subsampling::S420);
        assert_eq!(gray, vec![90, 90, 90, 200, 200, 200]);

        let mut untouched = vec![255, 0, 0, 0, 0, 255];
        subsample_chroma(&mut untouched, 2, 1, 3, Subsampling::S444);
        assert_eq!(untouched, vec![255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn avif_subsampling_changes_the_output() {
        let img = busy_rgb(64, 64);
        let params = |subsampling| {
            EncodeParams::Avif(AvifParams {
                lossless: false,
                quality: 70,
                speed: 10,
                subsampling,
            })
        };
        let full = encode_to_bytes(&img, params(None), "full.avif");
        let reduced = encode_to_bytes(&img, params(Some(Subsampling::S420)), "reduced.avif");
        assert_ne!(full, reduced);
    }

    #[test]
    fn png_filter_choice_is_lossless() {
        let img = busy_rgb(32, 32);
        for optimize in [true, false] {
            let bytes = encode_to_bytes(
                &img,
                EncodeParams::Png(PngParams {
                    optimize,
                    ..PngParams::default()
                }),
                "out.png",
            );
            let back = image::load_from_memory(&bytes).unwrap();
            assert_eq!(back.to_rgb8(), img.to_rgb8());
        }
    }

    #[test]
    fn png_levels_map_to_compression_types() {
        assert!(matches!(png_compression(1), CompressionType::Fast));
        assert!(matches!(png_compression(6), CompressionType::Default));
        assert!(matches!(png_compression(9), CompressionType::Best));
    }
}
