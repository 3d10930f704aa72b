// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! `yolo-decode` command-line entry point.

mod cli;

use std::process;

use clap::Parser;

use crate::cli::args::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Decode(args) => cli::decode::run_decode(args),
        #[cfg(feature = "onnx")]
        Commands::Predict(args) => cli::predict::run_prediction(args),
    };

    if let Err(e) = outcome {
        error!("{e}");
        process::exit(1);
    }
}
