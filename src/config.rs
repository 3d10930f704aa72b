// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decode configuration.
//!
//! This module defines the [`DecodeConfig`] struct, which holds the constants of a
//! decode session: the square input size, the confidence and Non-Maximum Suppression
//! (NMS) thresholds, and the output cap. A config is immutable once handed to a
//! [`DetectionPipeline`](crate::DetectionPipeline).

use crate::error::{DecodeError, Result};

/// Default square input size of the network.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default minimum score for a candidate to survive decoding.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// Default `IoU` above which a same-class box is suppressed.
pub const DEFAULT_IOU: f64 = 0.45;

/// Default cap on detections kept per frame.
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

/// Configuration for decoding detector outputs.
///
/// Uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use yolo_decode::DecodeConfig;
///
/// let config = DecodeConfig::new()
///     .with_confidence(0.5)
///     .with_iou(0.45)
///     .with_max_detections(100)
///     .with_input_size(640);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    /// Confidence threshold for detections (0.0 to 1.0).
    /// Candidates whose best score is lower than this value are discarded.
    pub confidence_threshold: f64,
    /// Intersection over Union (IoU) threshold for NMS (0.0 to 1.0).
    pub iou_threshold: f64,
    /// Maximum number of detections kept per frame.
    pub max_detections: usize,
    /// Side of the square input tensor in pixels.
    pub input_size: u32,
    /// Whether to also produce an FP16 copy of the input tensor.
    pub half: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
            max_detections: DEFAULT_MAX_DETECTIONS,
            input_size: DEFAULT_INPUT_SIZE,
            half: false,
        }
    }
}

impl DecodeConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The minimum confidence score (0.0 to 1.0).
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the `IoU` threshold for Non-Maximum Suppression.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The `IoU` threshold (0.0 to 1.0).
    #[must_use]
    pub const fn with_iou(mut self, threshold: f64) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of detections to keep.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the square input size.
    #[must_use]
    pub const fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// Enable or disable the FP16 copy of the input tensor.
    #[must_use]
    pub const fn with_half(mut self, half: bool) -> Self {
        self.half = half;
        self
    }

    /// Check that the configuration can drive a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDimensions`] for a zero input size and
    /// [`DecodeError::ConfigError`] for thresholds outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(DecodeError::InvalidDimensions(
                "input size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DecodeError::ConfigError(format!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DecodeError::ConfigError(format!(
                "IoU threshold {} is outside [0, 1]",
                self.iou_threshold
            )));
        }
        Ok(())
    }
}
