// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detection results.
//!
//! This module contains the output records handed downstream: [`Detection`] boxes in
//! frame pixels, the [`ClassNames`] table used to label them, per-stage [`Speed`]
//! timings and the per-frame [`FrameResult`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{DecodeError, Result};
use crate::preprocessing::FrameSize;

/// A de-duplicated detection in source-frame pixel coordinates.
///
/// Invariant: `0 <= x1 < x2 <= width` and `0 <= y1 < y2 <= height` of the frame it
/// was decoded for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Left edge.
    pub x1: f64,
    /// Top edge.
    pub y1: f64,
    /// Right edge.
    pub x2: f64,
    /// Bottom edge.
    pub y2: f64,
    /// Confidence in `[0, 1]`.
    pub score: f64,
    /// Index into the class name table.
    pub class_id: u32,
}

impl Detection {
    /// Box corners as `[x1, y1, x2, y2]`.
    #[must_use]
    pub const fn xyxy(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Box as `[cx, cy, w, h]`.
    #[must_use]
    pub fn xywh(&self) -> [f64; 4] {
        let (cx, cy) = self.center();
        [cx, cy, self.width(), self.height()]
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Box center.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::midpoint(self.x1, self.x2),
            f64::midpoint(self.y1, self.y2),
        )
    }
}

/// Ordered class name table; the index is the class id.
///
/// Ids past the end of the table get a synthetic `cls_<id>` name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    /// Create a table from names in id order.
    #[must_use]
    pub const fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// Build a table from an id-to-name map. Gaps get synthetic names.
    #[must_use]
    pub fn from_map(names: &BTreeMap<usize, String>) -> Self {
        let len = names.keys().next_back().map_or(0, |&max| max + 1);
        Self(
            (0..len)
                .map(|id| {
                    names
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| synthetic_name(id))
                })
                .collect(),
        )
    }

    /// Parse a JSON array of names, e.g. `["person", "bicycle"]`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ParseError`] if the text is not a JSON array of strings.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let names: Vec<String> = serde_json::from_str(json)?;
        Ok(Self(names))
    }

    /// Read a JSON class table such as `classes.json`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Io`] if the file cannot be read and
    /// [`DecodeError::ParseError`] if it is not a JSON array of strings.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).map_err(|e| match e {
            DecodeError::ParseError(msg) => {
                DecodeError::ParseError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Number of names in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of class `id`, or `cls_<id>` when the table is too short.
    #[must_use]
    pub fn name(&self, id: u32) -> String {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.0.get(i))
            .cloned()
            .unwrap_or_else(|| synthetic_name(id))
    }

    /// Iterate over the names in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn synthetic_name(id: impl std::fmt::Display) -> String {
    format!("cls_{id}")
}

/// Timing information in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent decoding and suppressing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new `Speed` with all timings.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of the recorded timings.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// Decoded detections for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    /// Detections in descending score order.
    pub detections: Vec<Detection>,
    /// Stage timings.
    pub speed: Speed,
    /// Frame the detections are expressed in.
    pub frame: FrameSize,
}

impl FrameResult {
    /// Create a result with no timings.
    #[must_use]
    pub const fn new(detections: Vec<Detection>, frame: FrameSize) -> Self {
        Self {
            detections,
            speed: Speed {
                preprocess: None,
                inference: None,
                postprocess: None,
            },
            frame,
        }
    }

    /// Number of detections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Check if nothing was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Per-class counts, e.g. `"2 persons, 1 bus, "`.
    ///
    /// Classes are listed in id order.
    #[must_use]
    pub fn verbose(&self, names: &ClassNames) -> String {
        if self.is_empty() {
            return "(no detections), ".to_string();
        }

        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for det in &self.detections {
            *counts.entry(det.class_id).or_insert(0) += 1;
        }

        let parts: Vec<String> = counts
            .iter()
            .map(|(&class_id, &count)| {
                let name = names.name(class_id);
                if count > 1 {
                    format!("{count} {}", pluralize(&name))
                } else {
                    format!("{count} {name}")
                }
            })
            .collect();
        format!("{}, ", parts.join(", "))
    }
}

/// Simple pluralization for common COCO class names.
#[must_use]
pub fn pluralize(word: &str) -> String {
    match word {
        "person" => "persons".to_string(),
        "bus" => "buses".to_string(),
        "knife" => "knives".to_string(),
        "mouse" => "mice".to_string(),
        "sheep" => "sheep".to_string(),
        "skis" => "skis".to_string(),
        _ => {
            if word.ends_with('s') || word.ends_with("ch") || word.ends_with("sh") {
                format!("{word}es")
            } else if word.ends_with('y') && !word.ends_with("ey") && !word.ends_with("ay") {
                format!("{}ies", &word[..word.len() - 1])
            } else {
                format!("{word}s")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32) -> Detection {
        Detection {
            x1: 10.0,
            y1: 20.0,
            x2: 30.0,
            y2: 60.0,
            score: 0.5,
            class_id,
        }
    }

    #[test]
    fn test_detection_geometry() {
        let d = det(0);
        assert!((d.width() - 20.0).abs() < f64::EPSILON);
        assert!((d.height() - 40.0).abs() < f64::EPSILON);
        assert!((d.area() - 800.0).abs() < f64::EPSILON);
        assert_eq!(d.center(), (20.0, 40.0));
        assert_eq!(d.xywh(), [20.0, 40.0, 20.0, 40.0]);
        assert_eq!(d.xyxy(), [10.0, 20.0, 30.0, 60.0]);
    }

    #[test]
    fn test_class_names_fallback() {
        let names = ClassNames::new(vec!["person".to_string(), "bus".to_string()]);
        assert_eq!(names.name(1), "bus");
        assert_eq!(names.name(7), "cls_7");
        assert_eq!(ClassNames::default().name(0), "cls_0");
    }

    #[test]
    fn test_class_names_from_json() {
        let names = ClassNames::from_json_str(r#"["person", "bicycle", "car"]"#).unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.iter().collect::<Vec<_>>(), vec!["person", "bicycle", "car"]);

        assert!(matches!(
            ClassNames::from_json_str(r#"{"0": "person"}"#),
            Err(DecodeError::ParseError(_))
        ));
    }

    #[test]
    fn test_class_names_from_map_fills_gaps() {
        let map = BTreeMap::from([(0, "person".to_string()), (2, "car".to_string())]);
        let names = ClassNames::from_map(&map);
        assert_eq!(names.len(), 3);
        assert_eq!(names.name(1), "cls_1");
        assert_eq!(names.name(2), "car");
    }

    #[test]
    fn test_speed_total() {
        let speed = Speed::new(1.0, 2.0, 3.0);
        assert!((speed.total() - 6.0).abs() < f64::EPSILON);
        assert!((Speed::default().total()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_frame_result_verbose() {
        let frame = FrameSize::new(640, 480).unwrap();
        let names = ClassNames::new(vec!["person".to_string(), "bus".to_string()]);

        let empty = FrameResult::new(Vec::new(), frame);
        assert_eq!(empty.verbose(&names), "(no detections), ");

        let result = FrameResult::new(vec![det(1), det(0), det(0), det(5)], frame);
        assert_eq!(result.len(), 4);
        assert_eq!(result.verbose(&names), "2 persons, 1 bus, 1 cls_5, ");
    }

    #[test]
    fn test_frame_result_serializes() {
        let frame = FrameSize::new(64, 48).unwrap();
        let result = FrameResult::new(vec![det(3)], frame);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["frame"]["width"], 64);
        assert_eq!(value["detections"][0]["class_id"], 3);
        assert!(value["speed"]["inference"].is_null());
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("person"), "persons");
        assert_eq!(pluralize("bus"), "buses");
        assert_eq!(pluralize("dog"), "dogs");
        assert_eq!(pluralize("butterfly"), "butterflies");
    }
}
