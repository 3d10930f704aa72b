// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Letterbox geometry and input tensor construction.
//!
//! A source frame of arbitrary size is scaled uniformly to fit a square network input
//! and centered on a neutral gray canvas. The resulting [`Letterbox`] records the
//! scale and padding so detections can be mapped back into frame pixels later.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::borrow::Cow;

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use half::f16;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{DecodeError, Result};

// ================================================================================================
// Constants
// ================================================================================================

/// Letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Normalized letterbox padding color (114/255 ≈ 0.447).
const LETTERBOX_NORM: f32 = 114.0 / 255.0;

/// Number of color planes in the input tensor.
const CHANNELS: usize = 3;

// ================================================================================================
// Types
// ================================================================================================

/// Dimensions of a source frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
}

impl FrameSize {
    /// Create frame dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDimensions`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions(format!(
                "frame must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Dimensions of an image.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDimensions`] for an empty image.
    pub fn of(image: &DynamicImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height)
    }
}

/// Scale and padding mapping a frame into the square network input.
///
/// Invariant: `scale = min(input_size / width, input_size / height)` and the padding
/// centers the scaled frame inside the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Uniform scale from frame pixels to input pixels.
    pub scale: f64,
    /// Left padding in input pixels.
    pub pad_x: f64,
    /// Top padding in input pixels.
    pub pad_y: f64,
    /// Width of the scaled frame inside the input.
    pub new_width: u32,
    /// Height of the scaled frame inside the input.
    pub new_height: u32,
    /// Side of the square input.
    pub input_size: u32,
}

impl Letterbox {
    /// Compute the letterbox for a `frame_width` x `frame_height` frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDimensions`] if any argument is zero.
    pub fn compute(frame_width: u32, frame_height: u32, input_size: u32) -> Result<Self> {
        if input_size == 0 {
            return Err(DecodeError::InvalidDimensions(
                "input size must be positive".to_string(),
            ));
        }
        let frame = FrameSize::new(frame_width, frame_height)?;

        let size = f64::from(input_size);
        let (width, height) = (f64::from(frame.width), f64::from(frame.height));
        let scale = (size / width).min(size / height);

        let new_width = (width * scale).round() as u32;
        let new_height = (height * scale).round() as u32;

        // Integer halving floors the padding, leaving any odd pixel on the right/bottom
        let pad_x = input_size.saturating_sub(new_width) / 2;
        let pad_y = input_size.saturating_sub(new_height) / 2;

        Ok(Self {
            scale,
            pad_x: f64::from(pad_x),
            pad_y: f64::from(pad_y),
            new_width,
            new_height,
            input_size,
        })
    }

    /// Compute the letterbox for a frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDimensions`] for a zero input size.
    pub fn for_frame(frame: FrameSize, input_size: u32) -> Result<Self> {
        Self::compute(frame.width, frame.height, input_size)
    }

    /// Map a frame-space point into input space.
    #[must_use]
    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        (x.mul_add(self.scale, self.pad_x), y.mul_add(self.scale, self.pad_y))
    }

    /// Map an input-space point back into frame space.
    ///
    /// Padding is removed before scaling; swapping the two shifts every box.
    #[must_use]
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Input tensor data that can be either FP32 or FP16.
#[derive(Debug, Clone)]
pub enum TensorData {
    /// 32-bit floating point tensor.
    Float32(Array4<f32>),
    /// 16-bit floating point tensor.
    Float16(Array4<f16>),
}

impl TensorData {
    /// Get the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Float32(t) => t.shape(),
            Self::Float16(t) => t.shape(),
        }
    }

    /// Get the FP32 tensor, if this is one.
    #[must_use]
    pub const fn as_f32(&self) -> Option<&Array4<f32>> {
        match self {
            Self::Float32(t) => Some(t),
            Self::Float16(_) => None,
        }
    }
}

/// Result of preprocessing a frame: the input tensor and the geometry to undo it.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Planar `[1, 3, S, S]` tensor, RGB order, normalized to [0, 1].
    pub tensor: TensorData,
    /// Letterbox applied to the frame.
    pub letterbox: Letterbox,
    /// Source frame dimensions.
    pub frame: FrameSize,
}

// ================================================================================================
// Public API Functions
// ================================================================================================

/// Preprocess a frame for inference.
///
/// # Arguments
///
/// * `image` - Source frame.
/// * `input_size` - Side of the square network input.
/// * `half` - If true, the tensor is converted to FP16.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidDimensions`] for an empty frame or zero input size,
/// and [`DecodeError::ImageError`] if resizing fails.
pub fn preprocess_image(
    image: &DynamicImage,
    input_size: u32,
    half: bool,
) -> Result<PreprocessResult> {
    let frame = FrameSize::of(image)?;
    let letterbox = Letterbox::for_frame(frame, input_size)?;
    let tensor = letterbox_image(image, &letterbox)?;

    let tensor = if half {
        TensorData::Float16(tensor_f32_to_f16(&tensor))
    } else {
        TensorData::Float32(tensor)
    };

    Ok(PreprocessResult {
        tensor,
        letterbox,
        frame,
    })
}

/// Build the planar input tensor for `image` under `letterbox`.
///
/// The canvas is filled with [`LETTERBOX_COLOR`], the frame is resized to the
/// letterbox extent and composited at the padding offset, and each channel is
/// written to its own contiguous plane (R, then G, then B).
///
/// # Errors
///
/// Returns [`DecodeError::InvalidDimensions`] for an empty image and
/// [`DecodeError::ImageError`] if resizing fails.
pub fn letterbox_image(image: &DynamicImage, letterbox: &Letterbox) -> Result<Array4<f32>> {
    let frame = FrameSize::of(image)?;

    // Fast path: already RGB8, borrow bytes without converting
    let src: Cow<'_, [u8]> = match image {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb.as_raw()),
        _ => Cow::Owned(image.to_rgb8().into_raw()),
    };

    // Extreme aspect ratios can round one side to zero
    let dst_w = letterbox.new_width.max(1);
    let dst_h = letterbox.new_height.max(1);
    let resized = resize_rgb(src, frame, dst_w, dst_h)?;

    let size = letterbox.input_size as usize;
    let plane_len = size * size;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    let (dst_w, dst_h) = (dst_w as usize, dst_h as usize);

    let mut data = vec![LETTERBOX_NORM; CHANNELS * plane_len];
    data.par_chunks_mut(plane_len)
        .enumerate()
        .for_each(|(channel, plane)| {
            for y in 0..dst_h.min(size.saturating_sub(pad_y)) {
                let src_row = &resized[y * dst_w * CHANNELS..(y + 1) * dst_w * CHANNELS];
                let dst_row = &mut plane[(pad_y + y) * size..(pad_y + y + 1) * size];
                for x in 0..dst_w.min(size.saturating_sub(pad_x)) {
                    dst_row[pad_x + x] = f32::from(src_row[x * CHANNELS + channel]) / 255.0;
                }
            }
        });

    Array4::from_shape_vec((1, CHANNELS, size, size), data)
        .map_err(|e| DecodeError::ImageError(format!("Failed to build input tensor: {e}")))
}

/// Resize a packed RGB8 buffer with bilinear filtering.
fn resize_rgb(src: Cow<'_, [u8]>, frame: FrameSize, dst_w: u32, dst_h: u32) -> Result<Vec<u8>> {
    if frame.width == dst_w && frame.height == dst_h {
        return Ok(src.into_owned());
    }

    let src_image = Image::from_vec_u8(frame.width, frame.height, src.into_owned(), PixelType::U8x3)
        .map_err(|e| DecodeError::ImageError(format!("Failed to wrap source frame: {e}")))?;
    let mut dst_image = Image::new(dst_w, dst_h, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| DecodeError::ImageError(format!("Failed to resize frame: {e}")))?;

    Ok(dst_image.into_vec())
}

/// Convert f32 tensor to f16 tensor.
fn tensor_f32_to_f16(tensor: &Array4<f32>) -> Array4<f16> {
    tensor.mapv(f16::from_f32)
}
