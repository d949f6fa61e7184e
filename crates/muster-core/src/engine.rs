// SPDX-License-Identifier: Apache-2.0

//! The scan orchestrator.
//!
//! Drives one complete run: converters first (their artifacts become extra
//! scan targets), then scanners against every target, folding each
//! scanner's per-target partial reports into one logical run, then the
//! merged bundle through every reporter. Plugins execute sequentially and
//! degrade individually — a failed plugin is an entry in the outcome list,
//! never an aborted run.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{ExecutionContext, TargetKind};
use crate::plugin::descriptor::PluginDescriptor;
use crate::plugin::lifecycle::{PluginLifecycle, PluginOutput, PluginRunResult, RunStatus};
use crate::plugin::registry::PluginRegistry;
use crate::plugin::PluginKind;
use crate::provision::ToolProvisioner;
use crate::report::merge::{merge_bundle, merge_run, normalize_run_locations, MergeOptions};
use crate::report::ReportBundle;

/// Per-sub-target fold: keep findings and rules, first invocation stands.
const FOLD_OPTIONS: MergeOptions = MergeOptions {
    include_invocations: false,
    include_driver: false,
    include_rules: true,
};

/// Everything one engine run produced.
#[derive(Debug)]
pub struct EngineRunReport {
    /// The final merged bundle.
    pub bundle: ReportBundle,
    /// Per-plugin (and per-target) outcomes, in execution order.
    pub outcomes: Vec<PluginRunResult>,
}

impl EngineRunReport {
    /// Count of outcomes with a given status.
    #[must_use]
    pub fn count(&self, status: RunStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Sequential plugin orchestrator for one scan run.
pub struct ScanEngine {
    registry: PluginRegistry,
    provisioner: ToolProvisioner,
    context: Arc<ExecutionContext>,
    scanner_filter: Option<Vec<String>>,
}

impl ScanEngine {
    /// Engine over a registry and a shared context.
    #[must_use]
    pub fn new(registry: PluginRegistry, context: Arc<ExecutionContext>) -> Self {
        let provisioner = ToolProvisioner::from_config(&context.config);
        Self {
            registry,
            provisioner,
            context,
            scanner_filter: None,
        }
    }

    /// Restrict the run to the named scanners.
    #[must_use]
    pub fn with_scanner_filter(mut self, names: Vec<String>) -> Self {
        self.scanner_filter = Some(names);
        self
    }

    /// The provisioner, for callers that manage tools outside a run.
    pub fn provisioner_mut(&mut self) -> &mut ToolProvisioner {
        &mut self.provisioner
    }

    /// Execute converters, scanners and reporters, in that order.
    #[must_use]
    pub fn run(&mut self) -> EngineRunReport {
        let mut outcomes = Vec::new();
        let mut targets: Vec<(PathBuf, TargetKind)> =
            vec![(self.context.source_dir.clone(), TargetKind::Directory)];

        // Converters: their artifacts become additional scan targets.
        for descriptor in self.enabled(PluginKind::Converter) {
            let mut result = self.run_against(
                &descriptor,
                &self.context.source_dir.clone(),
                TargetKind::Directory,
            );
            if let PluginOutput::Artifacts(paths) = std::mem::take(&mut result.output) {
                for path in paths {
                    if path.exists() {
                        debug!(artifact = %path.display(), "converter artifact added as target");
                        targets.push((path, TargetKind::File));
                    } else {
                        warn!(artifact = %path.display(), "converter artifact missing, ignored");
                    }
                }
            }
            outcomes.push(result);
        }

        // Scanners: one logical run per tool, folded across all targets.
        let mut bundle = ReportBundle::new();
        for descriptor in self.enabled(PluginKind::Scanner) {
            if let Some(filter) = &self.scanner_filter
                && !filter.iter().any(|n| n == descriptor.name())
            {
                debug!(plugin = %descriptor.name(), "scanner not selected, skipping");
                continue;
            }

            let mut scanner_bundle: Option<ReportBundle> = None;
            for (target, kind) in targets.clone() {
                let mut result = self.run_against(&descriptor, &target, kind);
                if let PluginOutput::Report(partial) = std::mem::take(&mut result.output) {
                    let mut partial = *partial;
                    for run in &mut partial.runs {
                        normalize_run_locations(run, &self.context.source_dir);
                    }
                    scanner_bundle = Some(match scanner_bundle.take() {
                        None => partial,
                        Some(mut base) => {
                            fold_partial(&mut base, partial);
                            base
                        }
                    });
                }
                outcomes.push(result);
            }

            if let Some(scanner_bundle) = scanner_bundle {
                merge_bundle(&mut bundle, scanner_bundle);
            }
        }

        info!(
            findings = bundle.finding_count(),
            runs = bundle.runs.len(),
            "scan phase complete"
        );

        // Reporters: consume the final merged bundle.
        for descriptor in self.enabled(PluginKind::Reporter) {
            let result = self.run_reporter(&descriptor, &bundle);
            outcomes.push(result);
        }

        EngineRunReport { bundle, outcomes }
    }

    fn enabled(&self, kind: PluginKind) -> Vec<PluginDescriptor> {
        self.registry
            .discover(kind, &self.context.config)
            .into_values()
            .filter(|descriptor| {
                if descriptor.enabled() {
                    true
                } else {
                    debug!(kind = %kind, plugin = %descriptor.name(), "disabled by config");
                    false
                }
            })
            .collect()
    }

    fn run_against(
        &mut self,
        descriptor: &PluginDescriptor,
        target: &std::path::Path,
        kind: TargetKind,
    ) -> PluginRunResult {
        let mut lifecycle = PluginLifecycle::from_descriptor(descriptor);
        lifecycle.attach_context(Arc::clone(&self.context));

        match lifecycle.validate_dependencies(&mut self.provisioner) {
            Ok(_) => {}
            Err(e) => return lifecycle.failure_result(e.to_string(), String::new()),
        }

        match lifecycle.pre_execute(target, kind) {
            Ok(true) => {
                let mut result = lifecycle.execute(target, kind);
                lifecycle.post_execute();
                result.finished_at = lifecycle.finished_at();
                result
            }
            Ok(false) => lifecycle.skip_result("dependencies unsatisfied"),
            Err(e) => lifecycle.failure_result(e.to_string(), String::new()),
        }
    }

    fn run_reporter(
        &mut self,
        descriptor: &PluginDescriptor,
        bundle: &ReportBundle,
    ) -> PluginRunResult {
        let mut lifecycle = PluginLifecycle::from_descriptor(descriptor);
        lifecycle.attach_context(Arc::clone(&self.context));

        match lifecycle.validate_dependencies(&mut self.provisioner) {
            Ok(_) => {}
            Err(e) => return lifecycle.failure_result(e.to_string(), String::new()),
        }

        match lifecycle.pre_execute(&self.context.output_dir.clone(), TargetKind::Directory) {
            Ok(true) => {
                let mut result = lifecycle.execute_report(bundle);
                lifecycle.post_execute();
                result.finished_at = lifecycle.finished_at();
                result
            }
            Ok(false) => lifecycle.skip_result("dependencies unsatisfied"),
            Err(e) => lifecycle.failure_result(e.to_string(), String::new()),
        }
    }
}

/// Fold a partial bundle into the scanner's accumulated bundle.
///
/// Runs are matched by tool name; matched runs keep the base invocation and
/// driver, gaining only findings and previously-unseen rules.
fn fold_partial(base: &mut ReportBundle, incoming: ReportBundle) {
    for run in incoming.runs {
        if let Some(existing) = base
            .runs
            .iter_mut()
            .find(|r| r.tool_name() == run.tool_name())
        {
            merge_run(existing, run, &FOLD_OPTIONS);
        } else {
            base.runs.push(run);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, PluginConfig};
    use crate::plugin::descriptor::Registration;
    use crate::plugin::{Converter, Plugin, PluginInstance, Reporter, ScanOutcome, Scanner};
    use crate::report::{Finding, Level, Location, Run};
    use std::path::Path;

    struct TouchConverter;

    impl Plugin for TouchConverter {
        fn configure(&mut self, _config: &PluginConfig) {}
    }

    impl Converter for TouchConverter {
        fn convert(&mut self, ctx: &ExecutionContext) -> anyhow::Result<Vec<PathBuf>> {
            let artifact = ctx.work_dir.join("converted.txt");
            std::fs::write(&artifact, "artifact")?;
            Ok(vec![artifact])
        }
    }

    #[derive(Default)]
    struct CountingScanner;

    impl Plugin for CountingScanner {
        fn configure(&mut self, _config: &PluginConfig) {}
    }

    impl Scanner for CountingScanner {
        fn scan(
            &mut self,
            _ctx: &ExecutionContext,
            target: &Path,
            _kind: TargetKind,
        ) -> anyhow::Result<ScanOutcome> {
            let mut run = Run::for_tool("counting-tool");
            run.results.push(Finding::new(
                "C1",
                Level::Note,
                format!("saw {}", target.display()),
                vec![Location::line(target.display().to_string(), 1)],
            ));
            run.tool.driver.rules.push(crate::report::Rule::with_id("C1"));
            Ok(ScanOutcome::Report(ReportBundle::with_run(run)))
        }
    }

    struct FailingScanner;

    impl Plugin for FailingScanner {
        fn configure(&mut self, _config: &PluginConfig) {}
    }

    impl Scanner for FailingScanner {
        fn scan(
            &mut self,
            _ctx: &ExecutionContext,
            _target: &Path,
            _kind: TargetKind,
        ) -> anyhow::Result<ScanOutcome> {
            anyhow::bail!("always broken")
        }
    }

    struct FileReporter;

    impl Plugin for FileReporter {
        fn configure(&mut self, _config: &PluginConfig) {}
    }

    impl Reporter for FileReporter {
        fn report(&mut self, ctx: &ExecutionContext, bundle: &ReportBundle) -> anyhow::Result<()> {
            let path = ctx.output_dir.join("report.json");
            std::fs::write(path, serde_json::to_string(bundle)?)?;
            Ok(())
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register(Registration {
            kind: PluginKind::Converter,
            name: "touch",
            module_path: module_path!(),
            factory: || PluginInstance::Converter(Box::new(TouchConverter)),
        });
        registry.register(Registration {
            kind: PluginKind::Scanner,
            name: "counting",
            module_path: module_path!(),
            factory: || PluginInstance::Scanner(Box::<CountingScanner>::default()),
        });
        registry.register(Registration {
            kind: PluginKind::Scanner,
            name: "failing",
            module_path: module_path!(),
            factory: || PluginInstance::Scanner(Box::new(FailingScanner)),
        });
        registry.register(Registration {
            kind: PluginKind::Reporter,
            name: "file-report",
            module_path: module_path!(),
            factory: || PluginInstance::Reporter(Box::new(FileReporter)),
        });
        registry
    }

    fn context(tmp: &tempfile::TempDir, config: AppConfig) -> Arc<ExecutionContext> {
        ExecutionContext::builder()
            .source_dir(tmp.path().to_path_buf())
            .output_dir(tmp.path().join("out"))
            .work_dir(tmp.path().join("work"))
            .config(config)
            .build()
            .into_shared()
            .unwrap()
    }

    #[test]
    fn test_full_run_merges_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = ScanEngine::new(registry(), context(&tmp, AppConfig::default()));

        let report = engine.run();

        // counting scanner saw the source dir and the converter artifact,
        // folded into one logical run with deduplicated rules.
        let counting_runs: Vec<_> = report
            .bundle
            .runs
            .iter()
            .filter(|r| r.tool_name() == "counting-tool")
            .collect();
        assert_eq!(counting_runs.len(), 1);
        assert_eq!(counting_runs[0].results.len(), 2);
        assert_eq!(counting_runs[0].rules().len(), 1);

        // the failing scanner contributed a failure outcome, not an abort.
        assert!(report.count(RunStatus::Failed) >= 1);
        assert!(report.count(RunStatus::Completed) >= 3);

        // reporter wrote the merged bundle.
        assert!(tmp.path().join("out/report.json").is_file());
    }

    #[test]
    fn test_disabled_plugin_is_not_executed() {
        let tmp = tempfile::tempdir().unwrap();
        let config = {
            let mut config = AppConfig::default();
            config.plugins.insert(
                "failing".to_string(),
                PluginConfig {
                    enabled: Some(false),
                    ..PluginConfig::default()
                },
            );
            config
        };
        let mut engine = ScanEngine::new(registry(), context(&tmp, config));

        let report = engine.run();
        assert_eq!(report.count(RunStatus::Failed), 0);
        assert!(report.outcomes.iter().all(|o| o.plugin != "failing"));
    }

    #[test]
    fn test_scanner_filter_limits_run() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = ScanEngine::new(registry(), context(&tmp, AppConfig::default()))
            .with_scanner_filter(vec!["counting".to_string()]);

        let report = engine.run();
        assert_eq!(report.count(RunStatus::Failed), 0);
        assert!(report
            .bundle
            .runs
            .iter()
            .all(|r| r.tool_name() == "counting-tool"));
    }

    #[test]
    fn test_locations_are_normalized_to_scan_root() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = ScanEngine::new(registry(), context(&tmp, AppConfig::default()))
            .with_scanner_filter(vec!["counting".to_string()]);

        let report = engine.run();
        for run in &report.bundle.runs {
            for finding in &run.results {
                for location in &finding.locations {
                    assert!(
                        !location.uri.starts_with('/'),
                        "absolute uri leaked: {}",
                        location.uri
                    );
                }
            }
        }
    }
}
