// SPDX-License-Identifier: Apache-2.0

//! Command handlers for the Muster CLI.

pub mod completion;
pub mod plugins;
pub mod scan;
pub mod tools;

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use muster_core::AppConfig;

use crate::cli::{Commands, CompletionCommand, OutputContext, ToolsCommand};

/// Creates a styled spinner (only if interactive).
fn maybe_spinner(ctx: &OutputContext, message: &str) -> Option<ProgressBar> {
    if ctx.is_interactive() {
        let s = ProgressBar::new_spinner();
        s.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        s.set_message(message.to_string());
        s.enable_steady_tick(Duration::from_millis(100));
        Some(s)
    } else {
        None
    }
}

/// Dispatch to the appropriate command handler.
pub fn run(command: Commands, ctx: &OutputContext, config: AppConfig) -> Result<()> {
    match command {
        Commands::Scan {
            source,
            out,
            work,
            scanners,
        } => scan::run(&source, out, work, scanners, ctx, config),

        Commands::Plugins { kind } => {
            plugins::run(kind, ctx, &config);
            Ok(())
        }

        Commands::Tools(tools_cmd) => match tools_cmd {
            ToolsCommand::Status { name } => {
                tools::run_status(&name, &config);
                Ok(())
            }
            ToolsCommand::Install { name, version } => {
                tools::run_install(&name, version, ctx, &config)
            }
        },

        Commands::Completion(completion_cmd) => match completion_cmd {
            CompletionCommand::Generate { shell } => {
                completion::run_generate(shell);
                Ok(())
            }
        },
    }
}
