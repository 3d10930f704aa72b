// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use yolo_decode::DecodeConfig;
use yolo_decode::config::{
    DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE, DEFAULT_IOU, DEFAULT_MAX_DETECTIONS,
};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r"Examples:
    yolo-decode decode --outputs dump.json --width 1280 --height 720
    yolo-decode decode -o dump.json --width 640 --height 480 --classes classes.json --json
    yolo-decode decode -o dump.json --width 1920 --height 1080 --imgsz 320 --conf 0.5
    yolo-decode predict --model yolo11n.onnx --source image.jpg
    yolo-decode predict -m yolo11n.onnx -s images/ --half --max-det 100")]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a JSON dump of raw model outputs
    Decode(DecodeArgs),
    /// Run an ONNX detector on an image or a directory of images
    #[cfg(feature = "onnx")]
    Predict(PredictArgs),
}

/// Options shared by every command that decodes detections.
#[derive(Args, Debug)]
pub struct DecodeOptions {
    /// Confidence threshold
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    pub conf: f64,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = DEFAULT_IOU)]
    pub iou: f64,

    /// Maximum detections kept per frame
    #[arg(long, default_value_t = DEFAULT_MAX_DETECTIONS)]
    pub max_det: usize,

    /// JSON array of class names, index = class id
    #[arg(long)]
    pub classes: Option<PathBuf>,

    /// Print detections as JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

impl DecodeOptions {
    /// Build the decode configuration for a square input of `input_size`.
    pub fn config(&self, input_size: u32) -> DecodeConfig {
        DecodeConfig::new()
            .with_confidence(self.conf)
            .with_iou(self.iou)
            .with_max_detections(self.max_det)
            .with_input_size(input_size)
    }
}

/// Arguments for the decode command.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// JSON dump of raw outputs: an array of {name, shape, data} objects in output order
    #[arg(short, long)]
    pub outputs: PathBuf,

    /// Width of the source frame in pixels
    #[arg(long)]
    pub width: u32,

    /// Height of the source frame in pixels
    #[arg(long)]
    pub height: u32,

    /// Square network input size the frame was letterboxed into
    #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
    pub imgsz: u32,

    #[command(flatten)]
    pub options: DecodeOptions,
}

/// Arguments for the predict command.
#[cfg(feature = "onnx")]
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Path to ONNX model file
    #[arg(short, long)]
    pub model: PathBuf,

    /// Image file or directory of images
    #[arg(short, long)]
    pub source: PathBuf,

    /// Inference image size [default: from model metadata, else 640]
    #[arg(long)]
    pub imgsz: Option<u32>,

    /// Use FP16 half-precision input
    #[arg(long, default_value_t = false)]
    pub half: bool,

    /// Intra-op threads for ONNX Runtime (0 = automatic)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    #[command(flatten)]
    pub options: DecodeOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_decode_args_defaults() {
        let args = Cli::parse_from([
            "app", "decode", "--outputs", "dump.json", "--width", "1280", "--height", "720",
        ]);
        #[allow(irrefutable_let_patterns)]
        let Commands::Decode(decode_args) = args.command else {
            panic!("expected decode command");
        };
        assert_eq!(decode_args.outputs, PathBuf::from("dump.json"));
        assert_eq!((decode_args.width, decode_args.height), (1280, 720));
        assert_eq!(decode_args.imgsz, 640);
        assert!((decode_args.options.conf - 0.25).abs() < f64::EPSILON);
        assert!((decode_args.options.iou - 0.45).abs() < f64::EPSILON);
        assert_eq!(decode_args.options.max_det, 300);
        assert!(decode_args.options.classes.is_none());
        assert!(!decode_args.options.json);
        assert!(decode_args.options.verbose);
    }

    #[test]
    fn test_decode_args_custom() {
        let args = Cli::parse_from([
            "app",
            "decode",
            "-o",
            "dump.json",
            "--width",
            "640",
            "--height",
            "480",
            "--imgsz",
            "320",
            "--conf",
            "0.5",
            "--max-det",
            "10",
            "--classes",
            "classes.json",
            "--json",
            "--verbose",
            "false",
        ]);
        #[allow(irrefutable_let_patterns)]
        let Commands::Decode(decode_args) = args.command else {
            panic!("expected decode command");
        };
        assert_eq!(decode_args.imgsz, 320);
        assert_eq!(decode_args.options.max_det, 10);
        assert_eq!(
            decode_args.options.classes,
            Some(PathBuf::from("classes.json"))
        );
        assert!(decode_args.options.json);
        assert!(!decode_args.options.verbose);

        let config = decode_args.options.config(decode_args.imgsz);
        assert!((config.confidence_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.input_size, 320);
        assert_eq!(config.max_detections, 10);
    }

    #[test]
    fn test_decode_requires_frame_size() {
        let result = Cli::try_parse_from(["app", "decode", "--outputs", "dump.json"]);
        assert!(result.is_err());
    }
}
