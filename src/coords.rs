// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Mapping candidate boxes from input-tensor space back to the source frame.

use crate::decode::Candidate;
use crate::preprocessing::{FrameSize, Letterbox};
use crate::results::Detection;

/// Convert a center-format box to corners `[x1, y1, x2, y2]`.
#[must_use]
pub fn xywh_to_xyxy(cx: f64, cy: f64, w: f64, h: f64) -> [f64; 4] {
    let (half_w, half_h) = (w / 2.0, h / 2.0);
    [cx - half_w, cy - half_h, cx + half_w, cy + half_h]
}

/// Undo the letterbox: remove padding, then divide by the scale.
#[must_use]
pub fn scale_coords(coords: &[f64; 4], letterbox: &Letterbox) -> [f64; 4] {
    let (x1, y1) = letterbox.inverse(coords[0], coords[1]);
    let (x2, y2) = letterbox.inverse(coords[2], coords[3]);
    [x1, y1, x2, y2]
}

/// Clip coordinates to `[0, width] x [0, height]`.
#[must_use]
pub fn clip_coords(coords: &[f64; 4], frame: FrameSize) -> [f64; 4] {
    let (w, h) = (f64::from(frame.width), f64::from(frame.height));
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}

/// Map a decoded candidate into frame pixels.
///
/// Returns `None` for boxes that collapse to zero width or height after clipping,
/// including ones lying entirely outside the frame.
#[must_use]
pub fn map_candidate(
    candidate: &Candidate,
    letterbox: &Letterbox,
    frame: FrameSize,
) -> Option<Detection> {
    let corners = xywh_to_xyxy(candidate.cx, candidate.cy, candidate.w, candidate.h);
    let [x1, y1, x2, y2] = clip_coords(&scale_coords(&corners, letterbox), frame);
    // Also false for NaN geometry.
    (x2 > x1 && y2 > y1).then_some(Detection {
        x1,
        y1,
        x2,
        y2,
        score: candidate.score,
        class_id: candidate.class_id,
    })
}
