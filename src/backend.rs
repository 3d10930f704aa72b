// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime inference backend.
//!
//! [`OnnxBackend`] loads an exported detector and implements [`InferenceBackend`] by
//! returning every session output, in session order, as a [`RawTensor`].

use std::collections::HashMap;
use std::path::Path;

use half::f16;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{DynValue, TensorRef};

use crate::error::{DecodeError, Result};
use crate::metadata::ExportMetadata;
use crate::pipeline::InferenceBackend;
use crate::preprocessing::TensorData;
use crate::tensor::{ModelOutputs, RawTensor};

/// Metadata keys Ultralytics writes as individual ONNX properties.
const PROPERTY_KEYS: [&str; 8] = [
    "metadata",
    "model_metadata",
    "description",
    "version",
    "task",
    "stride",
    "imgsz",
    "names",
];

/// A detector running on ONNX Runtime.
pub struct OnnxBackend {
    /// ONNX Runtime session.
    session: Session,
    /// Export metadata (class names, input size).
    metadata: ExportMetadata,
    /// Input tensor name.
    input_name: String,
    /// Output tensor names in session order.
    output_names: Vec<String>,
}

impl OnnxBackend {
    /// Load a model from an ONNX file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX model file.
    /// * `num_threads` - Intra-op threads; `0` lets ONNX Runtime decide.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InferenceError`] if the file is missing or the session
    /// cannot be created, and [`DecodeError::MetadataError`] for malformed metadata.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DecodeError::InferenceError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| session_error("create session builder", &e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| session_error("set optimization level", &e))?
            .with_intra_threads(num_threads)
            .map_err(|e| session_error("set intra-thread count", &e))?
            .commit_from_file(path)
            .map_err(|e| session_error("load model", &e))?;

        let metadata = Self::extract_metadata(&session)?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        Ok(Self {
            session,
            metadata,
            input_name,
            output_names,
        })
    }

    /// Collect the export metadata properties. Models without any get defaults.
    fn extract_metadata(session: &Session) -> Result<ExportMetadata> {
        let model_metadata = session
            .metadata()
            .map_err(|e| session_error("read model metadata", &e))?;

        let properties: HashMap<String, String> = PROPERTY_KEYS
            .iter()
            .filter_map(|key| {
                model_metadata
                    .custom(key)
                    .ok()
                    .flatten()
                    .map(|value| ((*key).to_string(), value))
            })
            .collect();

        if properties.is_empty() {
            return Ok(ExportMetadata::default());
        }
        ExportMetadata::from_onnx_metadata(&properties)
    }

    /// The model's export metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ExportMetadata {
        &self.metadata
    }

    /// Output names in session order.
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(&mut self, input: &TensorData) -> Result<ModelOutputs> {
        let outputs = match input {
            TensorData::Float32(tensor) => {
                let contiguous = tensor.as_standard_layout();
                let tensor = TensorRef::from_array_view(&contiguous)
                    .map_err(|e| session_error("create input tensor", &e))?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(|e| session_error("run inference", &e))?
            }
            TensorData::Float16(tensor) => {
                let contiguous = tensor.as_standard_layout();
                let tensor = TensorRef::from_array_view(&contiguous)
                    .map_err(|e| session_error("create input tensor", &e))?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(|e| session_error("run inference", &e))?
            }
        };

        let mut result = ModelOutputs::new();
        for name in &self.output_names {
            let value = outputs.get(name.as_str()).ok_or_else(|| {
                DecodeError::InferenceError(format!("Output '{name}' not found"))
            })?;
            result.push(name.clone(), extract_tensor(value)?);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for OnnxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxBackend")
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .field("num_classes", &self.metadata.names.len())
            .field("imgsz", &self.metadata.imgsz)
            .finish_non_exhaustive()
    }
}

/// Copy an FP32 or FP16 output into a [`RawTensor`].
fn extract_tensor(value: &DynValue) -> Result<RawTensor> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        return RawTensor::from_f32(data, &dims(shape)?);
    }
    let (shape, data) = value
        .try_extract_tensor::<f16>()
        .map_err(|e| session_error("extract output", &e))?;
    RawTensor::from_f16(data, &dims(shape)?)
}

/// Convert ONNX dimensions, rejecting unresolved dynamic axes.
fn dims(shape: &[i64]) -> Result<Vec<usize>> {
    shape
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| {
                DecodeError::UnsupportedTensorShape(format!("dynamic dimension {d} in {shape:?}"))
            })
        })
        .collect()
}

fn session_error(action: &str, err: &ort::Error) -> DecodeError {
    DecodeError::InferenceError(format!("Failed to {action}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = OnnxBackend::load("nonexistent.onnx", 0);
        assert!(matches!(result, Err(DecodeError::InferenceError(_))));
    }

    #[test]
    fn test_dims_rejects_dynamic_axes() {
        assert_eq!(dims(&[1, 84, 8400]).unwrap(), vec![1, 84, 8400]);
        assert!(matches!(
            dims(&[1, -1, 6]),
            Err(DecodeError::UnsupportedTensorShape(_))
        ));
    }
}
