// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the Muster CLI.
//!
//! Uses `tracing` with `tracing-subscriber` for structured logging.
//! Log level can be controlled via the `RUST_LOG` environment variable.
//!
//! # Examples
//!
//! ```bash
//! # Default: warnings only
//! muster scan
//!
//! # Engine progress (per-plugin outcomes, provisioning probes)
//! RUST_LOG=muster=info muster scan
//!
//! # Full debug output
//! RUST_LOG=muster=debug muster scan
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::OutputFormat;

/// Initialize the logging subsystem.
///
/// Logs go to stderr so structured stdout output (`-o json`) stays clean.
/// The `verbose` flag raises the default filter to debug for muster crates;
/// `RUST_LOG` always wins when set.
pub fn init_logging(format: OutputFormat, verbose: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let default_filter = match (format, verbose) {
        (_, true) => "muster=debug",
        (OutputFormat::Json, false) => "muster=error",
        (OutputFormat::Text, false) => "muster=warn",
    };
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .expect("valid default filter directives");

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
