// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Score decoding.
//!
//! Turns normalized candidate rows into [`Candidate`]s carrying the best class and its
//! confidence. Exports differ in whether scores are already activated and whether an
//! objectness column precedes the class scores; both are inferred per frame.

use ndarray::{ArrayView1, ArrayView2, Axis, Slice};

use crate::layout::{BOX_FIELDS, Layout};

/// Whether a score vector still needs the logistic transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Logits; at least one value lies outside `[0, 1]`.
    Raw,
    /// Already probabilities; every value lies in `[0, 1]`.
    Probability,
}

impl Activation {
    /// Classify a score vector. NaN does not count as out of range.
    pub fn detect<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        if values.into_iter().any(|&v| !(0.0..=1.0).contains(&v) && !v.is_nan()) {
            Self::Raw
        } else {
            Self::Probability
        }
    }

    /// Map one value into probability space.
    #[must_use]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Raw => sigmoid(value),
            Self::Probability => value,
        }
    }
}

/// Logistic function.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Activate a whole score vector: sigmoid everything if any value is out of range.
#[must_use]
pub fn activate(values: ArrayView1<'_, f64>) -> Vec<f64> {
    let activation = Activation::detect(values.iter());
    values.iter().map(|&v| activation.apply(v)).collect()
}

/// Activate a single objectness value.
#[must_use]
pub fn activate_scalar(value: f64) -> f64 {
    Activation::detect([value].iter()).apply(value)
}

/// Field arrangement of a combined row, decided once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedFields {
    /// Whether field 4 is an objectness score.
    pub has_objectness: bool,
    /// Index of the first class score.
    pub class_offset: usize,
    /// Number of class scores.
    pub class_count: usize,
}

impl CombinedFields {
    /// Infer the arrangement of `no`-field rows.
    ///
    /// Rows wider than 5 are assumed to carry objectness. A non-empty class table of
    /// length `L` overrides that guess when `no == 5 + L` or `no == 4 + L`.
    ///
    /// Returns `None` when no class scores remain.
    #[must_use]
    pub fn infer(no: usize, class_table_len: usize) -> Option<Self> {
        let mut has_objectness = no > BOX_FIELDS + 1;
        if class_table_len > 0 {
            if no == BOX_FIELDS + 1 + class_table_len {
                has_objectness = true;
            } else if no == BOX_FIELDS + class_table_len {
                has_objectness = false;
            }
        }
        let class_offset = BOX_FIELDS + usize::from(has_objectness);
        let class_count = no.checked_sub(class_offset).filter(|&n| n > 0)?;
        Some(Self {
            has_objectness,
            class_offset,
            class_count,
        })
    }
}

/// A scored candidate box in input-tensor space, before coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub score: f64,
    pub class_id: u32,
}

/// Highest `scale * probs[c]`, skipping NaN. Ties keep the lowest class id.
#[must_use]
pub fn best_class(probs: &[f64], scale: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (class, &p) in probs.iter().enumerate() {
        let score = scale * p;
        if score.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((class, score));
        }
    }
    best
}

/// Decode every candidate of `layout` scoring at least `threshold`.
///
/// `class_table_len` is the length of the class name table, or 0 when there is none.
#[must_use]
pub fn decode(layout: &Layout, class_table_len: usize, threshold: f64) -> Vec<Candidate> {
    match layout {
        Layout::Split { boxes, scores } => decode_split(boxes.view(), scores.view(), threshold),
        Layout::Combined { rows } => CombinedFields::infer(rows.ncols(), class_table_len)
            .map(|fields| decode_combined(rows.view(), fields, threshold))
            .unwrap_or_default(),
    }
}

/// Decode split `[N, 4]` boxes and `[N, nc]` scores.
#[must_use]
pub fn decode_split(
    boxes: ArrayView2<'_, f64>,
    scores: ArrayView2<'_, f64>,
    threshold: f64,
) -> Vec<Candidate> {
    if scores.ncols() == 0 {
        return Vec::new();
    }
    let mut candidates = Vec::new();
    for (geometry, class_scores) in boxes.outer_iter().zip(scores.outer_iter()) {
        let probs = activate(class_scores);
        let Some((class, score)) = best_class(&probs, 1.0) else {
            continue;
        };
        if let Some(candidate) = candidate(geometry, class, score, threshold) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Decode combined `[N, no]` rows laid out as `fields` describes.
#[must_use]
pub fn decode_combined(
    rows: ArrayView2<'_, f64>,
    fields: CombinedFields,
    threshold: f64,
) -> Vec<Candidate> {
    let end = fields.class_offset + fields.class_count;
    let mut candidates = Vec::new();
    for row in rows.outer_iter() {
        let objectness = if fields.has_objectness {
            activate_scalar(row[BOX_FIELDS])
        } else {
            1.0
        };
        let probs = activate(row.slice_axis(Axis(0), Slice::from(fields.class_offset..end)));
        let Some((class, score)) = best_class(&probs, objectness) else {
            continue;
        };
        if let Some(candidate) = candidate(row, class, score, threshold) {
            candidates.push(candidate);
        }
    }
    candidates
}

fn candidate(
    geometry: ArrayView1<'_, f64>,
    class: usize,
    score: f64,
    threshold: f64,
) -> Option<Candidate> {
    if score < threshold {
        return None;
    }
    Some(Candidate {
        cx: geometry[0],
        cy: geometry[1],
        w: geometry[2],
        h: geometry[3],
        score,
        class_id: u32::try_from(class).ok()?,
    })
}
