// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Printing decoded frames as text or JSON.

use serde::Serialize;
use yolo_decode::{ClassNames, Detection, FrameResult, FrameSize, Result, Speed};

use crate::info;

/// A detection with its class name attached.
#[derive(Debug, Serialize)]
pub struct LabeledDetection<'a> {
    /// Class name, or `cls_<id>` when the table has none.
    pub name: String,
    #[serde(flatten)]
    pub detection: &'a Detection,
}

/// Serializable record of one decoded frame.
#[derive(Debug, Serialize)]
pub struct FrameReport<'a> {
    /// Where the frame came from (dump file or image path).
    pub source: &'a str,
    /// Source frame dimensions.
    pub frame: FrameSize,
    /// Stage timings in milliseconds.
    pub speed: Speed,
    /// Detections in descending score order.
    pub detections: Vec<LabeledDetection<'a>>,
}

impl<'a> FrameReport<'a> {
    /// Label every detection of `result` with `names`.
    pub fn new(source: &'a str, result: &'a FrameResult, names: &ClassNames) -> Self {
        Self {
            source,
            frame: result.frame,
            speed: result.speed,
            detections: result
                .detections
                .iter()
                .map(|detection| LabeledDetection {
                    name: names.name(detection.class_id),
                    detection,
                })
                .collect(),
        }
    }

    /// One line per detection: name, score and corners.
    pub fn print_detections(&self) {
        for det in &self.detections {
            let [x1, y1, x2, y2] = det.detection.xyxy();
            info!(
                "  {} {:.2} [{x1:.1}, {y1:.1}, {x2:.1}, {y2:.1}]",
                det.name, det.detection.score
            );
        }
    }
}

/// Print `reports` as a pretty JSON array on stdout.
pub fn print_json(reports: &[FrameReport<'_>]) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(reports)?);
    Ok(())
}
