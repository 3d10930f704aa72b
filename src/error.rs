// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the decode pipeline.

use std::fmt;

/// Result type alias for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Main error type for the decode pipeline.
///
/// Only the first two variants originate inside the pipeline itself; the rest
/// come from the collaborators around it (configuration, images, metadata,
/// inference backends and dump files).
#[derive(Debug)]
pub enum DecodeError {
    /// Non-positive frame or input size. Fatal to the call, no partial output.
    InvalidDimensions(String),
    /// An output tensor whose rank or shape cannot be classified. Fatal to the frame.
    UnsupportedTensorShape(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Error reading or resizing an image.
    ImageError(String),
    /// Error parsing export metadata.
    MetadataError(String),
    /// Error reported by an inference backend.
    InferenceError(String),
    /// Error parsing a JSON class table or output dump.
    ParseError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions(msg) => write!(f, "Invalid dimensions: {msg}"),
            Self::UnsupportedTensorShape(msg) => write!(f, "Unsupported tensor shape: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::MetadataError(msg) => write!(f, "Metadata error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
