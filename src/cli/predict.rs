// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The `predict` command: run an ONNX detector on images.

use std::path::{Path, PathBuf};

use yolo_decode::config::DEFAULT_INPUT_SIZE;
use yolo_decode::{ClassNames, DecodeError, DetectionPipeline, FrameResult, OnnxBackend, Result};

use crate::cli::args::PredictArgs;
use crate::cli::logging::set_verbose;
use crate::cli::report::{FrameReport, print_json};
use crate::{section, success, verbose, warn};

/// Image file extensions read from a source directory; matches the enabled `image` decoders.
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// A single image, or every image in a directory in name order.
fn collect_images(source: &Path) -> Result<Vec<PathBuf>> {
    if !source.is_dir() {
        return Ok(vec![source.to_path_buf()]);
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(source)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(DecodeError::ImageError(format!(
            "No images found in {}",
            source.display()
        )));
    }
    Ok(paths)
}

/// Run the `predict` command.
///
/// # Errors
///
/// Returns an error if the model, class table or source cannot be loaded.
/// Individual images that fail to decode are reported and skipped.
#[allow(clippy::cast_precision_loss)]
pub fn run_prediction(args: &PredictArgs) -> Result<()> {
    let options = &args.options;
    set_verbose(options.verbose && !options.json);

    let mut backend = OnnxBackend::load(&args.model, args.threads)?;
    let metadata = backend.metadata();

    let names = match &options.classes {
        Some(path) => ClassNames::from_json_file(path)?,
        None => metadata.class_names(),
    };
    let input_size = args
        .imgsz
        .or_else(|| metadata.input_size())
        .unwrap_or(DEFAULT_INPUT_SIZE);
    let config = options.config(input_size).with_half(args.half);
    let pipeline = DetectionPipeline::new(config, names)?;

    section!("yolo-decode {} 🚀 ONNX Runtime", yolo_decode::VERSION);
    verbose!(
        "{}: {} classes, imgsz={input_size}, outputs={}",
        args.model.display(),
        pipeline.class_names().len(),
        backend.output_names().join(", ")
    );

    let images = collect_images(&args.source)?;
    let total = images.len();
    let mut results: Vec<(String, FrameResult)> = Vec::with_capacity(total);

    for (i, path) in images.iter().enumerate() {
        let source = path.display().to_string();
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping {source}: {e}");
                continue;
            }
        };
        let result = pipeline.run(&mut backend, &image)?;
        verbose!(
            "image {}/{total} {source}: {input_size}x{input_size} {}{:.1}ms",
            i + 1,
            result.verbose(pipeline.class_names()),
            result.speed.inference.unwrap_or(0.0)
        );
        results.push((source, result));
    }

    if options.json {
        let reports: Vec<FrameReport<'_>> = results
            .iter()
            .map(|(source, result)| FrameReport::new(source, result, pipeline.class_names()))
            .collect();
        return print_json(&reports);
    }

    for (source, result) in &results {
        FrameReport::new(source, result, pipeline.class_names()).print_detections();
    }

    if !results.is_empty() {
        let n = results.len() as f64;
        let sum = |f: fn(&FrameResult) -> Option<f64>| {
            results.iter().filter_map(|(_, r)| f(r)).sum::<f64>() / n
        };
        verbose!(
            "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image at shape (1, 3, {input_size}, {input_size})",
            sum(|r| r.speed.preprocess),
            sum(|r| r.speed.inference),
            sum(|r| r.speed.postprocess)
        );
    }
    let detections: usize = results.iter().map(|(_, r)| r.len()).sum();
    success!("{detections} detections in {}/{total} images", results.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a/b/frame.JPG")));
        assert!(is_image_file(Path::new("frame.png")));
        assert!(!is_image_file(Path::new("dump.json")));
        assert!(!is_image_file(Path::new("no_extension")));
    }

    #[test]
    fn test_skips_formats_without_decoder() {
        for name in ["scan.bmp", "photo.webp", "frame.tiff"] {
            assert!(!is_image_file(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn test_collect_single_file() {
        let paths = collect_images(Path::new("image.jpg")).unwrap();
        assert_eq!(paths, vec![PathBuf::from("image.jpg")]);
    }
}
