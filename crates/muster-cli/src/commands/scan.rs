// SPDX-License-Identifier: Apache-2.0

//! The `muster scan` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use muster_core::{AppConfig, ExecutionContext, PluginRegistry, RunStatus, ScanEngine};

use crate::cli::{OutputContext, OutputFormat};
use crate::output;

use super::maybe_spinner;

/// Run the configured plugins against a source tree.
pub fn run(
    source: &Path,
    out: Option<PathBuf>,
    work: Option<PathBuf>,
    scanners: Vec<String>,
    ctx: &OutputContext,
    config: AppConfig,
) -> Result<()> {
    let source = source
        .canonicalize()
        .with_context(|| format!("source directory not found: {}", source.display()))?;
    let out = out.unwrap_or_else(|| source.join(".muster").join("reports"));
    let work = work.unwrap_or_else(|| source.join(".muster").join("work"));

    let context = ExecutionContext::builder()
        .source_dir(source)
        .output_dir(out)
        .work_dir(work)
        .config(config)
        .build()
        .into_shared()?;
    debug!(run_id = %context.run_id, "execution context ready");

    let mut engine = ScanEngine::new(PluginRegistry::with_builtins(), context);
    if !scanners.is_empty() {
        engine = engine.with_scanner_filter(scanners);
    }

    let spinner = maybe_spinner(ctx, "Running plugins...");
    let report = engine.run();
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report.bundle)?),
        OutputFormat::Text => output::render_scan_summary(&report, ctx),
    }

    // Failed plugins degrade the run, they do not fail the process; an
    // operator opting into strictness can inspect the summary counts.
    if report.count(RunStatus::Failed) > 0 {
        debug!("one or more plugins failed; see the outcome summary");
    }
    Ok(())
}
