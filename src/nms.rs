// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Greedy per-class Non-Maximum Suppression.

use crate::results::Detection;

/// Calculate `IoU` (Intersection over Union) between two bounding boxes.
///
/// # Arguments
///
/// * `box1` - First bounding box [x1, y1, x2, y2]
/// * `box2` - Second bounding box [x1, y1, x2, y2]
///
/// # Returns
///
/// `IoU` value between 0.0 and 1.0, or 0.0 when the union is not positive.
#[must_use]
pub fn calculate_iou(box1: &[f64; 4], box2: &[f64; 4]) -> f64 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = ((x2 - x1).max(0.0)) * ((y2 - y1).max(0.0));

    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Per-class Non-Maximum Suppression.
///
/// Detections are stably sorted by descending score, so equal scores keep their input
/// order. Each detection that survives is kept and suppresses every later detection of
/// the same class whose `IoU` with it exceeds `iou_threshold`. Boxes of different
/// classes never suppress each other.
///
/// At most `max_output` detections are returned; `0` returns none.
#[must_use]
pub fn nms_per_class(
    mut detections: Vec<Detection>,
    iou_threshold: f64,
    max_output: usize,
) -> Vec<Detection> {
    if detections.is_empty() || max_output == 0 {
        return Vec::new();
    }

    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep = Vec::with_capacity(max_output.min(detections.len()));
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        if keep.len() >= max_output {
            break;
        }
        let kept = detections[i];
        keep.push(kept);

        let kept_box = kept.xyxy();
        for (j, other) in detections.iter().enumerate().skip(i + 1) {
            if !suppressed[j]
                && other.class_id == kept.class_id
                && calculate_iou(&kept_box, &other.xyxy()) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    keep
}
