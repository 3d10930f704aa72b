// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface.
//!
//! Argument parsing, console output, and the `decode` and `predict` commands.

// Modules
/// CLI arguments.
pub mod args;

/// The `decode` command.
pub mod decode;

/// Console output macros and verbosity.
pub mod logging;

/// The `predict` command.
#[cfg(feature = "onnx")]
pub mod predict;

/// Text and JSON reports of decoded frames.
pub mod report;
