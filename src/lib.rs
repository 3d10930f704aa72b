// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # YOLO Detection Decode
//!
//! Decodes the raw output tensors of YOLO-style object detectors into de-duplicated,
//! labeled boxes in the pixel space of the source frame.
//!
//! Detector exports disagree on output conventions. This crate handles all of the
//! common ones without per-model configuration:
//!
//! - **Combined or split outputs** - a single `[1, N, fields]` / `[1, fields, N]`
//!   tensor, or separate box and score tensors
//! - **Objectness present or absent** - inferred from the field count, settled by the
//!   class table when one is available
//! - **Logits or probabilities** - score vectors outside `[0, 1]` get the sigmoid
//! - **Letterboxed inputs** - boxes are mapped back through the scale and padding
//!   used to fit the frame into the square network input
//!
//! The forward pass itself is an external collaborator behind [`InferenceBackend`].
//! An ONNX Runtime implementation ships behind the `onnx` feature.
//!
//! ## Quick Start
//!
//! ```rust
//! use yolo_decode::{ClassNames, DecodeConfig, DetectionPipeline, FrameSize};
//! use yolo_decode::{ModelOutputs, RawTensor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DecodeConfig::new().with_confidence(0.25).with_iou(0.45);
//! let names = ClassNames::from_json_str(r#"["person", "car"]"#)?;
//! let pipeline = DetectionPipeline::new(config, names)?;
//!
//! // A 1280x720 frame letterboxed into a 640x640 input.
//! let frame = FrameSize::new(1280, 720)?;
//! let letterbox = pipeline.letterbox(frame)?;
//!
//! // One candidate row: cx, cy, w, h, then a score per class.
//! let outputs = ModelOutputs::new().with(
//!     "output0",
//!     RawTensor::new(vec![320.0, 320.0, 100.0, 50.0, 0.9, 0.1], &[1, 1, 6])?,
//! );
//!
//! let result = pipeline.decode(&outputs, &letterbox, frame)?;
//! for det in &result.detections {
//!     println!("{} {:.2} {:?}", pipeline.class_names().name(det.class_id), det.score, det.xyxy());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Decode a JSON dump of raw outputs captured from a 1280x720 frame
//! yolo-decode decode --outputs dump.json --width 1280 --height 720 --classes classes.json
//!
//! # Emit detections as JSON
//! yolo-decode decode --outputs dump.json --width 1280 --height 720 --json
//!
//! # Run an ONNX model on an image or directory (requires the `onnx` feature)
//! yolo-decode predict --model yolo11n.onnx --source images/
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`preprocessing`] | Letterbox geometry and the planar input tensor |
//! | [`tensor`] | Raw output tensors and their shapes |
//! | [`layout`] | Combined / split output layout normalization |
//! | [`decode`] | Activation detection and best-class scoring |
//! | [`coords`] | Mapping boxes back into frame pixels |
//! | [`nms`] | Greedy per-class Non-Maximum Suppression |
//! | [`pipeline`] | [`DetectionPipeline`] and the [`InferenceBackend`] seam |
//! | [`results`] | Output types ([`Detection`], [`FrameResult`], [`ClassNames`]) |
//! | [`metadata`] | Export metadata parsing |
//! | [`config`] | [`DecodeConfig`] thresholds and sizes |
//! | [`error`] | Error types ([`DecodeError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `onnx` | ONNX Runtime backend and the `predict` command |

// Modules
#[cfg(feature = "onnx")]
#[cfg_attr(docsrs, doc(cfg(feature = "onnx")))]
pub mod backend;
pub mod config;
pub mod coords;
pub mod decode;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod nms;
pub mod pipeline;
pub mod preprocessing;
pub mod results;
pub mod tensor;

// Re-export main types for convenience
pub use config::DecodeConfig;
pub use error::{DecodeError, Result};
pub use layout::Layout;
pub use metadata::ExportMetadata;
pub use pipeline::{DetectionPipeline, InferenceBackend};
pub use preprocessing::{FrameSize, Letterbox, PreprocessResult, TensorData, preprocess_image};
pub use results::{ClassNames, Detection, FrameResult, Speed};
pub use tensor::{ModelOutputs, RawTensor, TensorShape};

#[cfg(feature = "onnx")]
pub use backend::OnnxBackend;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "yolo-decode");
    }
}
