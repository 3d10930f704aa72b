// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Console output for the CLI. The library reports through `Result` and never prints.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global verbosity flag.
static VERBOSE: AtomicBool = AtomicBool::new(true);

/// Set the global verbosity flag.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Check if verbose output is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Macro for standard output that is always shown.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        println!($($arg)*)
    };
}

/// Macro for warning messages on stderr.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        use colored::Colorize as _;
        eprintln!("{} {}", "WARNING ⚠️".yellow().bold(), format_args!($($arg)*));
    }};
}

/// Macro for error messages on stderr.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        use colored::Colorize as _;
        eprintln!("{} {}", "Error:".red().bold(), format_args!($($arg)*));
    }};
}

/// Macro for success messages.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        use colored::Colorize as _;
        println!("{} {}", "✅".green(), format_args!($($arg)*));
    }};
}

/// Macro for messages shown only in verbose mode.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::cli::logging::is_verbose() {
            println!($($arg)*);
        }
    };
}

/// Macro for section headers, shown only in verbose mode.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {{
        use colored::Colorize as _;
        if $crate::cli::logging::is_verbose() {
            println!("{}", format!($($arg)*).cyan().bold());
        }
    }};
}
