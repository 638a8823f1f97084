//! AVIF decoding via `avif-parse` (container) and `rav1d` (AV1 bitstream).
//!
//! The `image` crate's `avif` feature only builds the encoder; decoding would
//! need the C dav1d library. `rav1d` is a pure Rust port exposing the same
//! C-style API, so the unsafe surface lives here and nowhere else.

use super::backend::CodecError;
use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;
use std::ptr::NonNull;

fn failed(msg: impl Into<String>) -> CodecError {
    CodecError::ProcessingFailed(msg.into())
}

/// Dimensions from the container, without decoding the bitstream.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), CodecError> {
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| failed(format!("AVIF container: {e:?}")))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| failed(format!("AVIF sequence header: {e:?}")))?;
    Ok((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Decode the primary item of an AVIF file into an 8-bit RGB buffer.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| failed(format!("AVIF container: {e:?}")))?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr =
        NonNull::new(settings.as_mut_ptr()).ok_or_else(|| failed("rav1d settings"))?;
    // SAFETY: dav1d_default_settings fully initialises the struct it is given.
    let mut settings = unsafe {
        dav1d::dav1d_default_settings(settings_ptr);
        settings.assume_init()
    };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    // SAFETY: both pointers reference live locals.
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(failed(format!("rav1d open ({})", rc.0)));
    }

    let decoded = (|| {
        let mut data = Dav1dData::default();
        // SAFETY: data_create returns a buffer of exactly av1.len() bytes or null.
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(failed("rav1d data_create"));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(failed(format!("rav1d send_data ({})", rc.0)));
        }

        // SAFETY: an all-zero Dav1dPicture is the documented empty state.
        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(failed(format!("rav1d get_picture ({})", rc.0)));
        }
        let rgb = picture_to_rgb(&pic);
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut pic)) };
        rgb
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };

    let (width, height, rgb) = decoded?;
    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| failed("AVIF buffer size mismatch"))
}

/// Convert the planes of a decoded picture into interleaved RGB8.
fn picture_to_rgb(pic: &Dav1dPicture) -> Result<(u32, u32, Vec<u8>), CodecError> {
    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| failed("rav1d picture without plane data"))
    };

    let y = plane(0)?;
    let (chroma, ss_x, ss_y) = match pic.p.layout {
        DAV1D_PIXEL_LAYOUT_I400 => (None, false, false),
        DAV1D_PIXEL_LAYOUT_I420 => (Some((plane(1)?, plane(2)?)), true, true),
        DAV1D_PIXEL_LAYOUT_I422 => (Some((plane(1)?, plane(2)?)), true, false),
        DAV1D_PIXEL_LAYOUT_I444 => (Some((plane(1)?, plane(2)?)), false, false),
        other => return Err(failed(format!("unsupported AVIF pixel layout {other}"))),
    };

    let planes = Planes {
        y,
        chroma,
        y_stride: pic.stride[0],
        uv_stride: pic.stride[1],
        bpc: pic.p.bpc as u32,
        ss_x,
        ss_y,
    };
    Ok((width, height, planes.to_rgb(width, height)))
}

struct Planes {
    y: *const u8,
    chroma: Option<(*const u8, *const u8)>,
    y_stride: isize,
    uv_stride: isize,
    bpc: u32,
    ss_x: bool,
    ss_y: bool,
}

impl Planes {
    /// Sample one plane value; 10/12-bit samples are stored as u16.
    fn sample(&self, base: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        // SAFETY: x < width and y < height of the plane being read; strides
        // come from the decoder.
        unsafe {
            if self.bpc <= 8 {
                *base.offset(y as isize * stride + x as isize) as f32
            } else {
                base.offset(y as isize * stride + x as isize * 2)
                    .cast::<u16>()
                    .read_unaligned() as f32
            }
        }
    }

    /// BT.601 YCbCr to RGB, scaled down to 8 bits.
    fn to_rgb(&self, width: u32, height: u32) -> Vec<u8> {
        let scale = 255.0 / ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let mut out = Vec::with_capacity((width * height * 3) as usize);

        for row in 0..height {
            for col in 0..width {
                let luma = self.sample(self.y, self.y_stride, col, row);
                let rgb = match self.chroma {
                    None => [luma; 3],
                    Some((u, v)) => {
                        let cx = if self.ss_x { col / 2 } else { col };
                        let cy = if self.ss_y { row / 2 } else { row };
                        let cb = self.sample(u, self.uv_stride, cx, cy) - center;
                        let cr = self.sample(v, self.uv_stride, cx, cy) - center;
                        [
                            luma + 1.402 * cr,
                            luma - 0.344_136 * cb - 0.714_136 * cr,
                            luma + 1.772 * cb,
                        ]
                    }
                };
                out.extend(rgb.iter().map(|c| (c * scale).clamp(0.0, 255.0) as u8));
            }
        }
        out
    }
}
