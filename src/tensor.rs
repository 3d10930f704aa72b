// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Raw model output tensors.
//!
//! Inference backends hand back a set of named, flat float buffers with a shape list.
//! This module wraps them in a fixed-arity [`TensorShape`] whose accessors fail fast
//! with [`DecodeError::UnsupportedTensorShape`] instead of indexing out of range.

use std::fmt;

use half::f16;

use crate::error::{DecodeError, Result};

/// Highest tensor rank accepted from a backend.
pub const MAX_RANK: usize = 4;

/// Shape of a tensor with rank between 1 and [`MAX_RANK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    dims: [usize; MAX_RANK],
    rank: usize,
}

impl TensorShape {
    /// Create a shape from a dimension list.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedTensorShape`] for rank 0 or rank above [`MAX_RANK`].
    pub fn new(dims: &[usize]) -> Result<Self> {
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(DecodeError::UnsupportedTensorShape(format!(
                "rank {} outside 1..={MAX_RANK} for shape {dims:?}",
                dims.len()
            )));
        }
        let mut fixed = [0; MAX_RANK];
        fixed[..dims.len()].copy_from_slice(dims);
        Ok(Self {
            dims: fixed,
            rank: dims.len(),
        })
    }

    /// Number of dimensions.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// The dimensions as a slice of length [`rank`](Self::rank).
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.rank]
    }

    /// Size of `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedTensorShape`] if `axis` is not below the rank.
    pub fn dim(&self, axis: usize) -> Result<usize> {
        self.dims().get(axis).copied().ok_or_else(|| {
            DecodeError::UnsupportedTensorShape(format!("axis {axis} out of range for {self}"))
        })
    }

    /// Total number of elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.dims().iter().product()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dims().iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("x"))
    }
}

/// A flat, row-major output buffer with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
    data: Vec<f64>,
    shape: TensorShape,
}

impl RawTensor {
    /// Create a tensor, checking that `data` holds exactly one value per element.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedTensorShape`] for an invalid rank or a data
    /// length that disagrees with the shape.
    pub fn new(data: Vec<f64>, shape: &[usize]) -> Result<Self> {
        let shape = TensorShape::new(shape)?;
        if data.len() != shape.num_elements() {
            return Err(DecodeError::UnsupportedTensorShape(format!(
                "shape {shape} needs {} values, got {}",
                shape.num_elements(),
                data.len()
            )));
        }
        Ok(Self { data, shape })
    }

    /// Create a tensor from an FP32 buffer.
    ///
    /// # Errors
    ///
    /// Same as [`RawTensor::new`].
    pub fn from_f32(data: &[f32], shape: &[usize]) -> Result<Self> {
        Self::new(data.iter().copied().map(f64::from).collect(), shape)
    }

    /// Create a tensor from an FP16 buffer.
    ///
    /// # Errors
    ///
    /// Same as [`RawTensor::new`].
    pub fn from_f16(data: &[f16], shape: &[usize]) -> Result<Self> {
        Self::new(data.iter().map(|v| f64::from(v.to_f32())).collect(), shape)
    }

    /// Flat data in row-major order.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Tensor shape.
    #[must_use]
    pub const fn shape(&self) -> &TensorShape {
        &self.shape
    }
}

/// Ordered, named collection of model outputs.
///
/// Order matters: it is the backend's output order, and the combined-layout fallback
/// reads the first tensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutputs {
    tensors: Vec<(String, RawTensor)>,
}

impl ModelOutputs {
    /// Create an empty output set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named output.
    pub fn push(&mut self, name: impl Into<String>, tensor: RawTensor) {
        self.tensors.push((name.into(), tensor));
    }

    /// Append a named output, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, tensor: RawTensor) -> Self {
        self.push(name, tensor);
        self
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Check if there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Look up an output by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RawTensor> {
        self.tensors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Iterate over `(name, tensor)` pairs in output order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawTensor)> {
        self.tensors.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Iterate over the tensors in output order.
    pub fn tensors(&self) -> impl Iterator<Item = &RawTensor> {
        self.tensors.iter().map(|(_, t)| t)
    }
}

impl<S: Into<String>> FromIterator<(S, RawTensor)> for ModelOutputs {
    fn from_iter<I: IntoIterator<Item = (S, RawTensor)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }
}
