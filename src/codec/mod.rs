//! Codec layer: everything that touches encoded bytes.
//!
//! | Piece | Purpose |
//! |---|---|
//! | [`Codec`] | Trait the engine codes against (decode, encode, resize, orient) |
//! | [`RustCodec`] | Production implementation on `image`, `webp`, `rav1d` |
//! | [`EncodeParams`] | Typed per-format encoder settings |
//! | `exif` / `icc` | Small byte-level readers for side-channel metadata |
//!
//! The split mirrors the rest of the crate: decisions are pure functions over
//! plain data, and the codec is the single boundary with pixel work.

mod avif;
pub mod backend;
pub(crate) mod exif;
pub(crate) mod icc;
pub mod params;
pub mod rust_codec;

pub use backend::{Codec, CodecError, ColorMode, DecodedImage, SideInfo};
pub use params::{
    AvifParams, EncodeParams, HeifParams, JpegParams, PngParams, Subsampling, WebpParams,
};
pub use rust_codec::{RustCodec, supported_input_extensions};
