// SPDX-License-Identifier: Apache-2.0

//! Muster - orchestrated multi-tool security scanning.
//!
//! A CLI that coordinates plugins wrapping external security scanners and
//! merges their reports into one canonical SARIF bundle.

mod cli;
mod commands;
mod errors;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use crate::cli::{Cli, OutputContext};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.output, cli.verbose);

    let output_ctx = OutputContext::from_cli(cli.output, cli.quiet, cli.verbose);

    // Load config early to validate it works.
    let mut config =
        muster_core::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!("Configuration loaded successfully");

    // Apply CLI overrides to config.
    if cli.offline {
        config.tools.offline = true;
        debug!("Offline mode forced from the command line");
    }

    match commands::run(cli.command, &output_ctx, config) {
        Ok(()) => Ok(()),
        Err(e) => {
            let formatted = errors::format_error(&e);
            eprintln!("Error: {formatted}");
            Err(e)
        }
    }
}
