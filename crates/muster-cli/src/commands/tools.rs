// SPDX-License-Identifier: Apache-2.0

//! The `muster tools` commands.

use anyhow::Result;
use console::style;

use muster_core::{AppConfig, ToolDependencySpec, ToolProvisioner};

use crate::cli::OutputContext;
use crate::output;

use super::maybe_spinner;

/// Show the provisioning state of one tool.
pub fn run_status(name: &str, config: &AppConfig) {
    let mut provisioner = ToolProvisioner::from_config(config);
    let state = provisioner.installation_info(&ToolDependencySpec::named(name));
    output::render_tool_status(&state);
}

/// Install a tool through the configured package manager.
pub fn run_install(
    name: &str,
    version: Option<String>,
    ctx: &OutputContext,
    config: &AppConfig,
) -> Result<()> {
    let mut provisioner = ToolProvisioner::from_config(config);

    let spec = ToolDependencySpec::builder()
        .name(name)
        .maybe_version_constraint(version)
        .build();

    let spinner = maybe_spinner(ctx, &format!("Installing {name}..."));
    let installed = provisioner.install(&spec);
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    if installed? {
        println!("{} {name} installed", style("ok").green());
    } else {
        // Offline or pre-installed-only: report what is usable instead.
        let state = provisioner.installation_info(&spec);
        if state.available {
            println!(
                "{} installation skipped, pre-installed binary available",
                style("ok").green()
            );
        } else {
            anyhow::bail!("installation skipped (offline?) and `{name}` is not on PATH");
        }
    }
    Ok(())
}
