//! Crate-level error type.
//!
//! Module errors ([`CodecError`], [`MetadataError`], [`ConfigError`]) convert
//! into [`CompressError`] with `?`. Public entry points never hand a
//! `CompressError` to callers directly: they fold it into a result record
//! with `success = false` and the error's display text.

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::metadata::MetadataError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("processing failed: {0}")]
    Processing(String),
    #[error("input path does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CompressError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Log at the level this kind of failure deserves.
    pub fn log(&self, path: &std::path::Path) {
        match self {
            Self::NotFound(_) | Self::UnsupportedFormat(_) => {
                tracing::warn!(path = %path.display(), "{self}")
            }
            _ => tracing::error!(path = %path.display(), "{self}"),
        }
    }
}

pub type Result<T, E = CompressError> = std::result::Result<T, E>;
