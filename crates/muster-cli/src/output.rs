// SPDX-License-Identifier: Apache-2.0

//! Terminal rendering for CLI results.

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::style;

use muster_core::{
    EngineRunReport, InstallationState, PluginDescriptor, PreferredSource, RunStatus,
};

use crate::cli::OutputContext;

/// Render the plugin listing as a table.
pub fn render_plugins(descriptors: &[PluginDescriptor], ctx: &OutputContext) {
    if descriptors.is_empty() {
        if !ctx.quiet {
            println!("No plugins registered.");
        }
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Name", "Kind", "Enabled", "Module"]);

    for descriptor in descriptors {
        table.add_row([
            Cell::new(descriptor.name()),
            Cell::new(descriptor.kind().to_string()),
            Cell::new(if descriptor.enabled() { "yes" } else { "no" }),
            Cell::new(descriptor.module_path()),
        ]);
    }

    println!("{table}");
}

/// Render the per-plugin outcome summary after a scan.
pub fn render_scan_summary(report: &EngineRunReport, ctx: &OutputContext) {
    if ctx.quiet {
        return;
    }

    for outcome in &report.outcomes {
        let status = match outcome.status {
            RunStatus::Completed => style("completed").green(),
            RunStatus::Skipped => style("skipped").yellow(),
            RunStatus::Failed => style("failed").red(),
        };
        let duration = outcome
            .duration()
            .map(|d| format!(" ({} ms)", d.num_milliseconds()))
            .unwrap_or_default();
        let detail = outcome
            .error
            .as_deref()
            .or(outcome.skip_reason.as_deref())
            .map(|d| format!(" - {d}"))
            .unwrap_or_default();
        println!(
            "  {} {} [{}]{duration}{detail}",
            status,
            outcome.plugin,
            outcome.kind
        );
    }

    println!(
        "\n{} findings across {} runs ({} completed, {} skipped, {} failed)",
        style(report.bundle.finding_count()).bold(),
        report.bundle.runs.len(),
        report.count(RunStatus::Completed),
        report.count(RunStatus::Skipped),
        report.count(RunStatus::Failed),
    );
}

/// Render one tool's provisioning state.
pub fn render_tool_status(state: &InstallationState) {
    println!("tool:           {}", state.tool);
    println!(
        "available:      {}",
        if state.available {
            style("yes").green()
        } else {
            style("no").red()
        }
    );
    println!("managed:        {}", state.is_managed_installed);
    if let Some(version) = &state.managed_version {
        println!("version:        {version}");
    }
    println!("pre-installed:  {}", state.is_pre_installed);
    if let Some(path) = &state.pre_installed_path {
        println!("path:           {}", path.display());
    }
    let source = match state.preferred_source {
        PreferredSource::Managed => "managed install",
        PreferredSource::PreInstalled => "pre-installed binary",
        PreferredSource::None => "none",
    };
    println!("preferred:      {source}");
}
