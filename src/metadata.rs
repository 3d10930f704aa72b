// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Export metadata parsing.
//!
//! Ultralytics ONNX exports carry a small YAML document in their custom metadata
//! properties. The decoder only needs three facts from it: the class names (which
//! settle the objectness question for combined outputs), the square input size and
//! the task. The parser is line-based and covers the subset the exporter writes.

use std::collections::{BTreeMap, HashMap};

use crate::config::DEFAULT_INPUT_SIZE;
use crate::error::{DecodeError, Result};
use crate::results::ClassNames;

/// Property keys read from per-key ONNX metadata.
const METADATA_KEYS: [&str; 6] = ["description", "version", "task", "stride", "imgsz", "names"];

/// Metadata embedded in an exported detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMetadata {
    /// Model description (e.g., "Ultralytics YOLO11n model trained on coco.yaml").
    pub description: String,
    /// Exporter version.
    pub version: String,
    /// Task string as written by the exporter, usually `detect`.
    pub task: String,
    /// Model stride.
    pub stride: u32,
    /// Input image size as (height, width).
    pub imgsz: (u32, u32),
    /// Class ID to class name mapping.
    pub names: BTreeMap<usize, String>,
}

impl Default for ExportMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            version: String::new(),
            task: "detect".to_string(),
            stride: 32,
            imgsz: (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE),
            names: BTreeMap::new(),
        }
    }
}

impl ExportMetadata {
    /// Parse ONNX custom metadata properties.
    ///
    /// Exporters either write one property per key (`names`, `imgsz`, `stride`, ...)
    /// or a single YAML document under `metadata`. Both are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MetadataError`] if the properties carry no class names
    /// or hold malformed values.
    pub fn from_onnx_metadata(properties: &HashMap<String, String>) -> Result<Self> {
        if let Some(doc) = properties
            .get("metadata")
            .or_else(|| properties.get("model_metadata"))
        {
            return Self::from_yaml_str(doc);
        }
        if !properties.contains_key("names") {
            return Err(DecodeError::MetadataError(
                "no export metadata found in model".to_string(),
            ));
        }
        let doc: String = METADATA_KEYS
            .iter()
            .filter_map(|key| properties.get(*key).map(|v| format!("{key}: {v}\n")))
            .collect();
        Self::from_yaml_str(&doc)
    }

    /// Parse the exporter's YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MetadataError`] for unparsable `stride` or `imgsz` values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut metadata = Self::default();

        for line in yaml.lines() {
            // Only top-level keys; indented lines belong to a block.
            if line.starts_with([' ', '\t', '-']) {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = unquote(value);
            match key.trim() {
                "description" => metadata.description = value.to_string(),
                "version" => metadata.version = value.to_string(),
                "task" => metadata.task = value.to_string(),
                "stride" => {
                    metadata.stride = value.parse().map_err(|_| {
                        DecodeError::MetadataError(format!("invalid stride: {value}"))
                    })?;
                }
                _ => {}
            }
        }

        if let Some(imgsz) = parse_imgsz(yaml)? {
            metadata.imgsz = imgsz;
        }
        metadata.names = parse_names(yaml);
        Ok(metadata)
    }

    /// Class table in id order.
    #[must_use]
    pub fn class_names(&self) -> ClassNames {
        ClassNames::from_map(&self.names)
    }

    /// Side of the square input, or `None` for a rectangular export.
    #[must_use]
    pub const fn input_size(&self) -> Option<u32> {
        if self.imgsz.0 == self.imgsz.1 {
            Some(self.imgsz.0)
        } else {
            None
        }
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('\'').trim_matches('"')
}

/// `imgsz: [640, 640]`, `imgsz: 640`, or a block list of `- 640` items.
fn parse_imgsz(yaml: &str) -> Result<Option<(u32, u32)>> {
    let mut lines = yaml.lines().skip_while(|l| !l.starts_with("imgsz:"));
    let Some(head) = lines.next() else {
        return Ok(None);
    };
    let inline = head.trim_start_matches("imgsz:").trim();

    let values: Vec<&str> = if inline.is_empty() {
        lines
            .map(str::trim)
            .take_while(|l| l.starts_with('-'))
            .map(|l| l.trim_start_matches('-').trim())
            .collect()
    } else {
        inline
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(str::trim)
            .collect()
    };

    let parsed = values
        .iter()
        .map(|v| v.parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| DecodeError::MetadataError(format!("invalid imgsz: {values:?}")))?;

    match parsed[..] {
        [side] => Ok(Some((side, side))),
        [h, w, ..] => Ok(Some((h, w))),
        [] => Err(DecodeError::MetadataError("empty imgsz".to_string())),
    }
}

/// `names: {0: 'person', 1: 'bicycle'}` or an indented `0: person` block.
fn parse_names(yaml: &str) -> BTreeMap<usize, String> {
    let mut lines = yaml.lines().skip_while(|l| !l.starts_with("names:"));
    let Some(head) = lines.next() else {
        return BTreeMap::new();
    };
    let inline = head.trim_start_matches("names:").trim();

    if let Some(dict) = inline.strip_prefix('{') {
        let dict = dict.split('}').next().unwrap_or_default();
        return dict.split(',').filter_map(parse_entry).collect();
    }

    lines
        .take_while(|l| l.trim().is_empty() || l.starts_with([' ', '\t']))
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<(usize, String)> {
    let (key, value) = entry.split_once(':')?;
    let id = key.trim().trim_matches('\'').trim_matches('"').parse().ok()?;
    Some((id, unquote(value).to_string()))
}
