//! # pixsqueeze
//!
//! Adaptive image compression that never makes your images bigger. Each
//! input is inspected before anything is encoded, a strategy is picked from
//! what the inspection found, and the encoded result is compared with the
//! original before it is kept.
//!
//! # Architecture: Inspect, Decide, Encode, Verify
//!
//! ```text
//! 1. Inspect   file      →  ImageMetadata        (basic, EXIF, ICC, histogram, complexity)
//! 2. Decide    metadata  →  CompressionDecision  (skip / lossless / lossy / adaptive)
//! 3. Encode    decision  →  output file          (orient → resize → color prep → encode)
//! 4. Verify    output    →  CompressionResult    (fallback to the original when bigger)
//! ```
//!
//! Stages 1 and 2 never write anything, so `pixsqueeze info` can show the
//! decision a `compress` would make. Stage 4 is what makes the "never
//! bigger" promise hold: an output that did not shrink the file is replaced
//! by a verbatim copy of the input.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | The [`codec::Codec`] trait and the pure-Rust backend: decode, encode, probe, EXIF/ICC reading |
//! | [`metadata`] | Metadata extraction: basic info, EXIF, ICC, histogram, complexity |
//! | [`characteristics`] | Simple-graphic / photo / mixed classification |
//! | [`strategy`] | Skip rules and strategy/format/quality selection |
//! | [`formats`] | Per-format encode parameter builders |
//! | [`optimizer`] | Quality tuning from image complexity and size |
//! | [`color`] | Color-mode preparation for the target format (alpha flattening, grayscale detection) |
//! | [`resize`] | Fit-within resize rule |
//! | [`engine`] | Per-file state machine: decide, transform, encode, verify, fall back |
//! | [`batch`] | Directory traversal and concurrent dispatch |
//! | [`compressor`] | Public façade: single, multi-format, directory, universal, info |
//! | [`validation`] | Request validation and [`types::CompressionConfig`] building |
//! | [`naming`] | `<stem>_compress[_<q>].<ext>` output names |
//! | [`config`] | `pixsqueeze.toml` loading, merging, env overrides, validation |
//! | [`types`] | Requests, decisions, results and responses (all serializable) |
//! | [`format`] | The closed set of image formats |
//! | [`error`] | Crate-level error type |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Original Is the Floor
//!
//! Every path through [`engine`] ends in one of three places: a smaller
//! output, a verbatim copy of the input, or a failure that leaves nothing
//! behind. A copy is a success. Thresholds for "not smaller" are slightly
//! above 1.0 so an output that merely matches the input is still discarded.
//!
//! ## Codec Behind a Trait
//!
//! All pixel I/O goes through [`codec::Codec`]. The engine, batch driver and
//! façade take `&dyn Codec` or a generic `C: Codec`, so tests swap in a mock
//! that records every call and never touches an encoder. The shipped
//! [`codec::RustCodec`] is pure Rust apart from `libwebp` for lossy WebP:
//! no ImageMagick, no system libraries to install.
//!
//! ## Results, Not Panics
//!
//! Per-file failures are data. A batch of a thousand files with one corrupt
//! JPEG returns 999 successes and one failed [`types::CompressionResult`]
//! carrying the error message. Only configuration errors and `info` on an
//! unreadable file surface as `Err`.
//!
//! ## Executor Choice
//!
//! A batch with many files, or with large files on average, runs one file
//! per worker so a single huge decode cannot starve the pool of small jobs.
//! Everything else shares a work-stealing pool. The choice is recorded on the
//! [`types::BatchResult`].

pub mod batch;
pub mod characteristics;
pub mod codec;
pub mod color;
pub mod compressor;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod formats;
pub mod metadata;
pub mod naming;
pub mod optimizer;
pub mod output;
pub mod resize;
pub mod strategy;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;
