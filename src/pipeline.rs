// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detection pipeline.
//!
//! [`DetectionPipeline`] chains the stages of a frame: letterbox preprocessing, the
//! external forward pass behind [`InferenceBackend`], layout normalization, score
//! decoding, coordinate mapping and per-class NMS.
//!
//! Decoding is a pure function of the configuration, the class table, the outputs and
//! the letterbox, so a pipeline can be shared across threads and frames can be
//! decoded independently.
//!
//! # Example
//!
//! ```rust
//! use yolo_decode::{ClassNames, DecodeConfig, DetectionPipeline, FrameSize, Letterbox};
//! use yolo_decode::{ModelOutputs, RawTensor};
//!
//! let pipeline = DetectionPipeline::new(DecodeConfig::default(), ClassNames::default())?;
//! let frame = FrameSize::new(640, 640)?;
//! let letterbox = Letterbox::for_frame(frame, 640)?;
//!
//! let row = vec![320.0, 320.0, 100.0, 50.0, 1.0, 0.9];
//! let outputs = ModelOutputs::new().with("output0", RawTensor::new(row, &[1, 1, 6])?);
//!
//! let result = pipeline.decode(&outputs, &letterbox, frame)?;
//! assert_eq!(result.len(), 1);
//! # Ok::<(), yolo_decode::DecodeError>(())
//! ```

use std::time::Instant;

use image::DynamicImage;
use rayon::prelude::*;

use crate::config::DecodeConfig;
use crate::coords::map_candidate;
use crate::decode::decode;
use crate::error::Result;
use crate::layout::normalize;
use crate::nms::nms_per_class;
use crate::preprocessing::{FrameSize, Letterbox, PreprocessResult, TensorData, preprocess_image};
use crate::results::{ClassNames, Detection, FrameResult};
use crate::tensor::ModelOutputs;

/// The forward pass of a detector.
///
/// Implementations receive the planar `[1, 3, S, S]` input tensor and return every
/// named output in session order.
pub trait InferenceBackend {
    /// Run the model on one input tensor.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`DecodeError::InferenceError`](crate::DecodeError::InferenceError).
    fn run(&mut self, input: &TensorData) -> Result<ModelOutputs>;
}

impl<F> InferenceBackend for F
where
    F: FnMut(&TensorData) -> Result<ModelOutputs>,
{
    fn run(&mut self, input: &TensorData) -> Result<ModelOutputs> {
        self(input)
    }
}

/// Decodes raw detector outputs into per-frame detections.
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    config: DecodeConfig,
    class_names: ClassNames,
}

impl DetectionPipeline {
    /// Create a pipeline.
    ///
    /// An empty `class_names` table leaves the objectness question to the field-count
    /// heuristic and labels detections `cls_<id>`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`DecodeConfig::validate`].
    pub fn new(config: DecodeConfig, class_names: ClassNames) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            class_names,
        })
    }

    /// The pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// The class name table.
    #[must_use]
    pub const fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    /// Letterbox this pipeline applies to a frame of size `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDimensions`](crate::DecodeError::InvalidDimensions)
    /// only for an impossible input size, which `new` already rejects.
    pub fn letterbox(&self, frame: FrameSize) -> Result<Letterbox> {
        Letterbox::for_frame(frame, self.config.input_size)
    }

    /// Letterbox `image` and build its input tensor.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty image or a failed resize.
    pub fn prepare(&self, image: &DynamicImage) -> Result<PreprocessResult> {
        preprocess_image(image, self.config.input_size, self.config.half)
    }

    /// Decode the outputs of one frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedTensorShape`](crate::DecodeError::UnsupportedTensorShape)
    /// if the outputs match no known layout. An output without class scores decodes
    /// to an empty result.
    pub fn decode(
        &self,
        outputs: &ModelOutputs,
        letterbox: &Letterbox,
        frame: FrameSize,
    ) -> Result<FrameResult> {
        let start = Instant::now();
        let detections = self.detections(outputs, letterbox, frame)?;
        let mut result = FrameResult::new(detections, frame);
        result.speed.postprocess = Some(elapsed_ms(start));
        Ok(result)
    }

    /// Run the full chain on `image` with `backend` doing the forward pass.
    ///
    /// # Errors
    ///
    /// Returns preprocessing, backend and decoding errors unchanged.
    pub fn run<B>(&self, backend: &mut B, image: &DynamicImage) -> Result<FrameResult>
    where
        B: InferenceBackend + ?Sized,
    {
        let start = Instant::now();
        let prepared = self.prepare(image)?;
        let preprocess = elapsed_ms(start);

        let start = Instant::now();
        let outputs = backend.run(&prepared.tensor)?;
        let inference = elapsed_ms(start);

        let mut result = self.decode(&outputs, &prepared.letterbox, prepared.frame)?;
        result.speed.preprocess = Some(preprocess);
        result.speed.inference = Some(inference);
        Ok(result)
    }

    /// Decode independent frames in parallel.
    ///
    /// Results are returned in input order; one failing frame does not affect others.
    pub fn decode_batch(
        &self,
        frames: &[(ModelOutputs, Letterbox, FrameSize)],
    ) -> Vec<Result<FrameResult>> {
        frames
            .par_iter()
            .map(|(outputs, letterbox, frame)| self.decode(outputs, letterbox, *frame))
            .collect()
    }

    fn detections(
        &self,
        outputs: &ModelOutputs,
        letterbox: &Letterbox,
        frame: FrameSize,
    ) -> Result<Vec<Detection>> {
        let layout = normalize(outputs)?;
        let candidates = decode(
            &layout,
            self.class_names.len(),
            self.config.confidence_threshold,
        );
        let mapped = candidates
            .iter()
            .filter_map(|c| map_candidate(c, letterbox, frame))
            .collect();
        Ok(nms_per_class(
            mapped,
            self.config.iou_threshold,
            self.config.max_detections,
        ))
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::error::DecodeError;
    use crate::tensor::RawTensor;

    fn single_row(row: Vec<f64>) -> ModelOutputs {
        let no = row.len();
        ModelOutputs::new().with("output0", RawTensor::new(row, &[1, 1, no]).unwrap())
    }

    fn square_frame() -> (FrameSize, Letterbox) {
        let frame = FrameSize::new(640, 640).unwrap();
        (frame, Letterbox::for_frame(frame, 640).unwrap())
    }

    #[test]
    fn test_end_to_end_single_candidate() {
        let pipeline = DetectionPipeline::new(DecodeConfig::default(), ClassNames::default()).unwrap();
        let (frame, letterbox) = square_frame();
        let outputs = single_row(vec![320.0, 320.0, 100.0, 50.0, 1.0, 0.9]);

        let result = pipeline.decode(&outputs, &letterbox, frame).unwrap();
        assert_eq!(result.len(), 1);
        let det = result.detections[0];
        assert_eq!(det.xyxy(), [270.0, 295.0, 370.0, 345.0]);
        assert!((det.score - 0.9).abs() < 1e-12);
        assert_eq!(det.class_id, 0);
        assert!(result.speed.postprocess.is_some());
    }

    #[test]
    fn test_class_table_disables_objectness() {
        let names = ClassNames::new(vec!["person".to_string(), "car".to_string()]);
        let pipeline = DetectionPipeline::new(DecodeConfig::default(), names).unwrap();
        let (frame, letterbox) = square_frame();
        let outputs = single_row(vec![320.0, 320.0, 100.0, 50.0, 0.9, 0.1]);

        let result = pipeline.decode(&outputs, &letterbox, frame).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.detections[0].class_id, 0);
        assert!((result.detections[0].score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_empty_class_space_is_empty_result() {
        let pipeline = DetectionPipeline::new(DecodeConfig::default(), ClassNames::default()).unwrap();
        let (frame, letterbox) = square_frame();
        let outputs = ModelOutputs::new().with(
            "output0",
            RawTensor::new(vec![1.0; 8], &[2, 4]).unwrap(),
        );
        assert!(pipeline.decode(&outputs, &letterbox, frame).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_shape_is_error() {
        let pipeline = DetectionPipeline::new(DecodeConfig::default(), ClassNames::default()).unwrap();
        let (frame, letterbox) = square_frame();
        let outputs = ModelOutputs::new().with("output0", RawTensor::new(vec![0.0; 6], &[6]).unwrap());
        assert!(matches!(
            pipeline.decode(&outputs, &letterbox, frame),
            Err(DecodeError::UnsupportedTensorShape(_))
        ));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = DecodeConfig::new().with_iou(2.0);
        assert!(DetectionPipeline::new(config, ClassNames::default()).is_err());
    }

    #[test]
    fn test_run_with_closure_backend() {
        let pipeline = DetectionPipeline::new(
            DecodeConfig::new().with_input_size(64),
            ClassNames::default(),
        )
        .unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(128, 64, Rgb([0, 0, 0])));

        let mut seen_shape = Vec::new();
        let mut backend = |input: &TensorData| -> Result<ModelOutputs> {
            seen_shape = input.shape().to_vec();
            // The frame is 128x64, so scale 0.5 and pad_y 16.
            Ok(single_row(vec![32.0, 32.0, 16.0, 16.0, 0.8, 1.0]))
        };

        let result = pipeline.run(&mut backend, &image).unwrap();
        assert_eq!(seen_shape, vec![1, 3, 64, 64]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.detections[0].xyxy(), [48.0, 16.0, 80.0, 48.0]);
        assert!(result.speed.preprocess.is_some());
        assert!(result.speed.inference.is_some());
    }

    #[test]
    fn test_decode_batch_keeps_order() {
        let pipeline = DetectionPipeline::new(DecodeConfig::default(), ClassNames::default()).unwrap();
        let (frame, letterbox) = square_frame();
        let frames = vec![
            (single_row(vec![320.0, 320.0, 100.0, 50.0, 1.0, 0.9]), letterbox, frame),
            (single_row(vec![320.0, 320.0, 100.0, 50.0, 1.0, 0.1]), letterbox, frame),
            (
                ModelOutputs::new().with("bad", RawTensor::new(vec![0.0], &[1]).unwrap()),
                letterbox,
                frame,
            ),
        ];

        let results = pipeline.decode_batch(&frames);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 1);
        assert!(results[1].as_ref().unwrap().is_empty());
        assert!(results[2].is_err());
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DetectionPipeline>();
    }
}
