// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The `decode` command: decode a JSON dump of raw model outputs.

use std::path::Path;

use serde::Deserialize;
use yolo_decode::{
    ClassNames, DecodeError, DetectionPipeline, FrameSize, ModelOutputs, RawTensor, Result,
};

use crate::cli::args::DecodeArgs;
use crate::cli::logging::set_verbose;
use crate::cli::report::{FrameReport, print_json};
use crate::{section, verbose};

/// One output tensor as written to a dump file.
#[derive(Debug, Deserialize)]
pub struct DumpedTensor {
    /// Output name.
    pub name: String,
    /// Dimensions.
    pub shape: Vec<usize>,
    /// Flat row-major values.
    pub data: Vec<f64>,
}

/// Parse a dump: a JSON array of `{name, shape, data}` objects in output order.
///
/// # Errors
///
/// Returns [`DecodeError::ParseError`] for malformed JSON and
/// [`DecodeError::UnsupportedTensorShape`] for a tensor whose data does not fill its
/// shape.
pub fn parse_dump(json: &str) -> Result<ModelOutputs> {
    let tensors: Vec<DumpedTensor> = serde_json::from_str(json)?;
    tensors
        .into_iter()
        .map(|t| -> Result<(String, RawTensor)> {
            Ok((t.name, RawTensor::new(t.data, &t.shape)?))
        })
        .collect()
}

fn load_dump(path: &Path) -> Result<ModelOutputs> {
    let text = std::fs::read_to_string(path)?;
    parse_dump(&text).map_err(|e| match e {
        DecodeError::ParseError(msg) => {
            DecodeError::ParseError(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Run the `decode` command.
///
/// # Errors
///
/// Returns an error if the dump or class table cannot be read, or the outputs
/// cannot be decoded.
pub fn run_decode(args: &DecodeArgs) -> Result<()> {
    let options = &args.options;
    set_verbose(options.verbose && !options.json);

    let names = options
        .classes
        .as_deref()
        .map_or_else(|| Ok(ClassNames::default()), ClassNames::from_json_file)?;
    let pipeline = DetectionPipeline::new(options.config(args.imgsz), names)?;

    let frame = FrameSize::new(args.width, args.height)?;
    let letterbox = pipeline.letterbox(frame)?;
    let outputs = load_dump(&args.outputs)?;

    section!("yolo-decode {}", yolo_decode::VERSION);
    for (name, tensor) in outputs.iter() {
        verbose!("output {name}: {}", tensor.shape());
    }
    verbose!(
        "letterbox: scale={:.4} pad=({}, {}) input={}x{}",
        letterbox.scale,
        letterbox.pad_x,
        letterbox.pad_y,
        args.imgsz,
        args.imgsz
    );

    let result = pipeline.decode(&outputs, &letterbox, frame)?;
    let source = args.outputs.display().to_string();
    let report = FrameReport::new(&source, &result, pipeline.class_names());

    if options.json {
        return print_json(&[report]);
    }

    verbose!(
        "{source}: {}x{} {}{:.1}ms",
        frame.width,
        frame.height,
        result.verbose(pipeline.class_names()),
        result.speed.total()
    );
    report.print_detections();
    Ok(())
}
