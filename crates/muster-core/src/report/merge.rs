// SPDX-License-Identifier: Apache-2.0

//! Report merging and location normalization.
//!
//! Two merge granularities: [`merge_bundle`] appends whole runs (different
//! tools), [`merge_run`] folds one run into another (the same logical tool
//! scanned several sub-targets). Both preserve finding order; neither ever
//! reorders what is already in the base.

use std::path::Path;

use tracing::debug;

use super::{Location, ReportBundle, Run};

/// Switches controlling what [`merge_run`] carries over besides findings.
///
/// Folding N per-sub-target partial reports from one tool into a single
/// logical run turns everything off except findings after the first fold.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Append the incoming run's invocation records.
    pub include_invocations: bool,
    /// Overwrite driver version/information from the incoming run.
    pub include_driver: bool,
    /// Append incoming rule-catalogue entries (always deduplicated by id
    /// unless this asks for duplicates explicitly).
    pub include_rules: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            include_invocations: true,
            include_driver: true,
            include_rules: true,
        }
    }
}

impl MergeOptions {
    /// Findings-only fold: no invocations, no driver metadata, no rules.
    #[must_use]
    pub fn findings_only() -> Self {
        Self {
            include_invocations: false,
            include_driver: false,
            include_rules: false,
        }
    }
}

/// Fold `incoming` into `base`, preserving the order of both finding lists.
///
/// Findings are always appended. Rule-catalogue entries already present in
/// `base` by rule id are skipped; with `include_rules` false no incoming
/// rules are added at all. Driver metadata and invocation records transfer
/// only when their switches are on.
pub fn merge_run(base: &mut Run, incoming: Run, opts: &MergeOptions) {
    let Run {
        tool,
        invocations,
        results,
    } = incoming;

    base.results.extend(results);

    if opts.include_invocations {
        base.invocations.extend(invocations);
    }

    if opts.include_driver {
        if let Some(version) = tool.driver.version {
            base.tool.driver.version = Some(version);
        }
        if let Some(uri) = tool.driver.information_uri {
            base.tool.driver.information_uri = Some(uri);
        }
    }

    if opts.include_rules {
        for rule in tool.driver.rules {
            let already_present = base.tool.driver.rules.iter().any(|r| r.id == rule.id);
            if already_present {
                debug!(rule = %rule.id, "skipping duplicate rule during merge");
            } else {
                base.tool.driver.rules.push(rule);
            }
        }
    }
}

/// Append every run of `incoming` to `base`, in order.
pub fn merge_bundle(base: &mut ReportBundle, incoming: ReportBundle) {
    base.runs.extend(incoming.runs);
}

/// Rewrite one location relative to the scan root, posix-separated.
///
/// Absolute paths under `root` lose the root prefix; paths already relative
/// are kept as-is. A leading separator left over from an absolute-root scan
/// is stripped so merged reports never mix absolute and relative uris.
pub fn normalize_location(location: &mut Location, root: &Path) {
    let as_path = Path::new(&location.uri);
    let relative = as_path.strip_prefix(root).unwrap_or(as_path);

    let mut uri = relative.to_string_lossy().replace('\\', "/");
    while let Some(stripped) = uri.strip_prefix('/') {
        uri = stripped.to_string();
    }
    location.uri = uri;
}

/// Normalize every finding location in a run against the scan root.
pub fn normalize_run_locations(run: &mut Run, root: &Path) {
    for finding in &mut run.results {
        for location in &mut finding.locations {
            normalize_location(location, root);
        }
    }
}
