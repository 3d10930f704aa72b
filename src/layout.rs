// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Output tensor layout normalization.
//!
//! Detector exports disagree on how they lay out their predictions. Some emit a single
//! combined tensor of `[1, N, fields]` or `[1, fields, N]`, others split box geometry and
//! class scores into two tensors. [`normalize`] classifies a set of outputs and returns
//! row-major `[N, fields]` matrices, so the decoder only ever sees one candidate per row.

use ndarray::Array2;

use crate::error::{DecodeError, Result};
use crate::tensor::{ModelOutputs, RawTensor};

/// Inclusive range of last-axis sizes treated as a per-candidate field count in a
/// rank-3 combined tensor. Anything outside it is read as the candidate axis.
pub const COMBINED_FIELDS_RANGE: std::ops::RangeInclusive<usize> = 6..=4096;

/// Number of box geometry fields (`cx, cy, w, h`).
pub const BOX_FIELDS: usize = 4;

/// Normalized view of a detector's outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Single tensor, one candidate per row: `[N, no]`.
    Combined {
        /// Candidate rows of `no` fields each.
        rows: Array2<f64>,
    },
    /// Separate box and score tensors sharing the candidate axis.
    Split {
        /// `[N, 4]` box geometry in input-space `cx, cy, w, h`.
        boxes: Array2<f64>,
        /// `[N, nc]` class scores.
        scores: Array2<f64>,
    },
}

impl Layout {
    /// Number of candidates `N`.
    #[must_use]
    pub fn num_candidates(&self) -> usize {
        match self {
            Self::Combined { rows } => rows.nrows(),
            Self::Split { boxes, .. } => boxes.nrows(),
        }
    }

    /// Check whether this is the split layout.
    #[must_use]
    pub const fn is_split(&self) -> bool {
        matches!(self, Self::Split { .. })
    }
}

/// Classify `outputs` and produce a normalized [`Layout`].
///
/// With two or more tensors, a rank-3 tensor with a 4 at axis 1 or 2 is taken as the box
/// tensor and another rank-3 tensor as the score tensor. When several qualify the last
/// one in output order wins, except that a box-shaped output whose name contains `box`
/// is preferred as the box tensor and a 4-wide score tensor is accepted when nothing
/// else remains. Without both, the first tensor is decoded as combined.
///
/// # Errors
///
/// Returns [`DecodeError::UnsupportedTensorShape`] for an empty output set or any
/// tensor whose shape does not match a known layout. Nothing is guessed.
pub fn normalize(outputs: &ModelOutputs) -> Result<Layout> {
    if let Some((boxes, scores)) = split_pair(outputs) {
        return split_layout(boxes, scores);
    }

    let first = outputs.tensors().next().ok_or_else(|| {
        DecodeError::UnsupportedTensorShape("model produced no outputs".to_string())
    })?;
    combined_layout(first)
}

fn is_box_shaped(tensor: &RawTensor) -> bool {
    let dims = tensor.shape().dims();
    dims[1] == BOX_FIELDS || dims[2] == BOX_FIELDS
}

/// Pick the box and score tensors among the rank-3 outputs.
///
/// A 4-class score tensor is box-shaped too, so a box-shaped output named like a box
/// tensor is preferred. Scores are any other rank-3 output, preferring one that is
/// not box-shaped.
fn split_pair(outputs: &ModelOutputs) -> Option<(&RawTensor, &RawTensor)> {
    let rank3: Vec<(&str, &RawTensor)> = outputs
        .iter()
        .filter(|(_, t)| t.shape().rank() == 3)
        .collect();

    let boxes = rank3
        .iter()
        .rposition(|(name, t)| is_box_shaped(t) && name.to_lowercase().contains("box"))
        .or_else(|| rank3.iter().rposition(|(_, t)| is_box_shaped(t)))?;

    let others = || {
        rank3
            .iter()
            .enumerate()
            .filter(move |&(i, _)| i != boxes)
            .map(|(_, &(_, t))| t)
    };
    let scores = others()
        .filter(|t| !is_box_shaped(t))
        .last()
        .or_else(|| others().last())?;

    Some((rank3[boxes].1, scores))
}

fn split_layout(boxes: &RawTensor, scores: &RawTensor) -> Result<Layout> {
    let b = boxes.shape().dims();
    let boxes = if b[0] == 1 && b[2] == BOX_FIELDS {
        matrix(boxes.data(), b[1], BOX_FIELDS)?
    } else if b[0] == 1 && b[1] == BOX_FIELDS {
        transpose(boxes.data(), BOX_FIELDS, b[2])?
    } else {
        return Err(DecodeError::UnsupportedTensorShape(format!(
            "boxes tensor {}",
            boxes.shape()
        )));
    };
    let n = boxes.nrows();

    let s = scores.shape().dims();
    let scores = if s[0] == 1 && s[1] == n {
        matrix(scores.data(), n, s[2])?
    } else if s[0] == 1 && s[2] == n {
        transpose(scores.data(), s[1], n)?
    } else {
        return Err(DecodeError::UnsupportedTensorShape(format!(
            "scores tensor {} does not match {n} boxes",
            scores.shape()
        )));
    };

    Ok(Layout::Split { boxes, scores })
}

fn combined_layout(tensor: &RawTensor) -> Result<Layout> {
    let shape = tensor.shape();
    let rows = match *shape.dims() {
        [1, a, b] if COMBINED_FIELDS_RANGE.contains(&b) => matrix(tensor.data(), a, b)?,
        [1, a, b] => transpose(tensor.data(), a, b)?,
        [n, no] => matrix(tensor.data(), n, no)?,
        _ => {
            return Err(DecodeError::UnsupportedTensorShape(format!(
                "output tensor {shape}"
            )));
        }
    };
    Ok(Layout::Combined { rows })
}

fn matrix(data: &[f64], rows: usize, cols: usize) -> Result<Array2<f64>> {
    Array2::from_shape_vec((rows, cols), data.to_vec())
        .map_err(|e| DecodeError::UnsupportedTensorShape(format!("{rows}x{cols}: {e}")))
}

/// Transpose a row-major `[rows, cols]` buffer into a new row-major `[cols, rows]` matrix.
///
/// # Errors
///
/// Returns [`DecodeError::UnsupportedTensorShape`] if `data` does not hold `rows * cols`
/// values.
pub fn transpose(data: &[f64], rows: usize, cols: usize) -> Result<Array2<f64>> {
    let source = matrix(data, rows, cols)?;
    Ok(source.t().as_standard_layout().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(shape: &[usize]) -> RawTensor {
        let len = shape.iter().product();
        #[allow(clippy::cast_precision_loss)]
        let data = (0..len).map(|v| v as f64).collect();
        RawTensor::new(data, shape).unwrap()
    }

    #[test]
    fn test_transpose() {
        let t = transpose(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(t.dim(), (3, 2));
        assert!(t.is_standard_layout());
        assert_eq!(t.as_slice().unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_split_layout() {
        let outputs = ModelOutputs::new()
            .with("boxes", tensor(&[1, 300, 4]))
            .with("scores", tensor(&[1, 300, 80]));
        let layout = normalize(&outputs).unwrap();
        assert!(layout.is_split());
        assert_eq!(layout.num_candidates(), 300);
        if let Layout::Split { boxes, scores } = layout {
            assert_eq!(boxes.dim(), (300, 4));
            assert_eq!(scores.dim(), (300, 80));
        }
    }

    #[test]
    fn test_split_transposed_boxes_match() {
        let n = 300;
        let direct = tensor(&[1, n, 4]);
        let flipped = transpose(direct.data(), n, 4).unwrap();
        let flipped = RawTensor::new(flipped.iter().copied().collect(), &[1, 4, n]).unwrap();

        let a = normalize(
            &ModelOutputs::new()
                .with("boxes", direct)
                .with("scores", tensor(&[1, n, 2])),
        )
        .unwrap();
        let b = normalize(
            &ModelOutputs::new()
                .with("scores", tensor(&[1, 2, n]))
                .with("boxes", flipped),
        )
        .unwrap();

        match (a, b) {
            (Layout::Split { boxes: ba, .. }, Layout::Split { boxes: bb, .. }) => {
                assert_eq!(ba, bb);
            }
            _ => panic!("expected split layouts"),
        }
    }

    #[test]
    fn test_split_four_classes() {
        let boxes = RawTensor::new(
            vec![10.0, 10.0, 4.0, 4.0, 30.0, 30.0, 4.0, 4.0],
            &[1, 2, 4],
        )
        .unwrap();
        let scores =
            RawTensor::new(vec![0.9, 0.0, 0.0, 0.0, 0.0, 0.8, 0.0, 0.0], &[1, 2, 4]).unwrap();

        for outputs in [
            ModelOutputs::new()
                .with("boxes", boxes.clone())
                .with("scores", scores.clone()),
            ModelOutputs::new()
                .with("scores", scores.clone())
                .with("boxes", boxes.clone()),
        ] {
            let Layout::Split { boxes: b, scores: s } = normalize(&outputs).unwrap() else {
                panic!("expected split layout");
            };
            assert_eq!(b.as_slice().unwrap(), boxes.data());
            assert_eq!(s.as_slice().unwrap(), scores.data());
        }
    }

    #[test]
    fn test_split_unnamed_prefers_non_box_shaped_scores() {
        let outputs = ModelOutputs::new()
            .with("output0", tensor(&[1, 10, 4]))
            .with("output1", tensor(&[1, 10, 3]));
        let Layout::Split { boxes, scores } = normalize(&outputs).unwrap() else {
            panic!("expected split layout");
        };
        assert_eq!(boxes.dim(), (10, 4));
        assert_eq!(scores.dim(), (10, 3));
    }

    #[test]
    fn test_split_scores_mismatch_is_error() {
        let outputs = ModelOutputs::new()
            .with("boxes", tensor(&[1, 300, 4]))
            .with("scores", tensor(&[1, 299, 80]));
        assert!(matches!(
            normalize(&outputs),
            Err(DecodeError::UnsupportedTensorShape(_))
        ));
    }

    #[test]
    fn test_split_bad_batch_is_error() {
        let outputs = ModelOutputs::new()
            .with("boxes", tensor(&[2, 10, 4]))
            .with("scores", tensor(&[1, 10, 3]));
        assert!(normalize(&outputs).is_err());
    }

    #[test]
    fn test_combined_channels_last() {
        let outputs = ModelOutputs::new().with("output0", tensor(&[1, 300, 6]));
        let layout = normalize(&outputs).unwrap();
        if let Layout::Combined { rows } = layout {
            assert_eq!(rows.dim(), (300, 6));
            assert!((rows[[1, 0]] - 6.0).abs() < f64::EPSILON);
        } else {
            panic!("expected combined layout");
        }
    }

    #[test]
    fn test_combined_channels_first_is_transposed() {
        let outputs = ModelOutputs::new().with("output0", tensor(&[1, 84, 8400]));
        let Layout::Combined { rows } = normalize(&outputs).unwrap() else {
            panic!("expected combined layout");
        };
        assert_eq!(rows.dim(), (8400, 84));
        // Field 1 of candidate 0 sits one full row into the source buffer.
        assert!((rows[[0, 1]] - 8400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_combined_rank2() {
        let outputs = ModelOutputs::new().with("output0", tensor(&[10, 85]));
        assert_eq!(normalize(&outputs).unwrap().num_candidates(), 10);
    }

    #[test]
    fn test_combined_unsupported_shapes() {
        for shape in [&[5][..], &[1, 1, 10, 6][..], &[2, 10, 6][..]] {
            let outputs = ModelOutputs::new().with("output0", tensor(shape));
            assert!(
                matches!(
                    normalize(&outputs),
                    Err(DecodeError::UnsupportedTensorShape(_))
                ),
                "shape {shape:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_falls_back_to_first_tensor() {
        // Two rank-2 outputs never form a split pair.
        let outputs = ModelOutputs::new()
            .with("a", tensor(&[10, 6]))
            .with("b", tensor(&[10, 4]));
        let layout = normalize(&outputs).unwrap();
        assert!(!layout.is_split());
        assert_eq!(layout.num_candidates(), 10);
    }

    #[test]
    fn test_empty_outputs_is_error() {
        assert!(normalize(&ModelOutputs::new()).is_err());
    }
}
