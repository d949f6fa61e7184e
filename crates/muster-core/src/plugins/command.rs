// SPDX-License-Identifier: Apache-2.0

//! Config-driven external-command scanner.
//!
//! Wraps any SARIF-emitting tool without tool-specific code. The plugin's
//! config supplies everything:
//!
//! ```toml
//! [plugins.command]
//! tool = "semgrep"                # package and executable name
//! args = "scan --sarif {target}"  # {target} expands to the scan target
//! version = "==1.84.0"            # optional version constraint
//! pre_installed_only = false      # forbid managed installation
//! timeout_seconds = 600           # subprocess timeout
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::config::{ExtraValue, PluginConfig};
use crate::context::{ExecutionContext, TargetKind};
use crate::exec::{CommandRequest, ExecutionRunner, OutputPolicy};
use crate::plugin::descriptor::Registration;
use crate::plugin::{Plugin, PluginInstance, PluginKind, ScanOutcome, Scanner};
use crate::provision::{InstallMethod, ToolDependencySpec};
use crate::report::parse::{SarifAdapter, parse_or_raw};
use crate::report::Invocation;

const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Scanner driving an arbitrary external tool described in config.
#[derive(Default)]
pub struct CommandScanner {
    config: PluginConfig,
    runner: ExecutionRunner,
}

impl CommandScanner {
    fn tool(&self) -> Option<&str> {
        self.config.extra("tool").and_then(ExtraValue::as_str)
    }

    fn args_for(&self, target: &Path) -> Vec<String> {
        self.config
            .extra("args")
            .and_then(ExtraValue::as_str)
            .unwrap_or_default()
            .split_whitespace()
            .map(|arg| arg.replace("{target}", &target.display().to_string()))
            .collect()
    }

    fn timeout(&self) -> Duration {
        let secs = self
            .config
            .extra("timeout_seconds")
            .and_then(ExtraValue::as_i64)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    fn dependency_spec(&self) -> Option<ToolDependencySpec> {
        let tool = self.tool()?;
        let install_method = if self
            .config
            .extra("pre_installed_only")
            .and_then(ExtraValue::as_bool)
            .unwrap_or(false)
        {
            InstallMethod::PreInstalledOnly
        } else {
            InstallMethod::PinnedManager
        };

        let version = self
            .config
            .extra("version")
            .and_then(ExtraValue::as_str)
            .map(ToString::to_string);
        Some(
            ToolDependencySpec::builder()
                .name(tool)
                .install_method(install_method)
                .maybe_version_constraint(version)
                .build(),
        )
    }
}

impl Plugin for CommandScanner {
    fn configure(&mut self, config: &PluginConfig) {
        self.config = self.config.merged_with(config);
    }

    fn tool_dependencies(&self) -> Vec<ToolDependencySpec> {
        self.dependency_spec().into_iter().collect()
    }
}

impl Scanner for CommandScanner {
    fn scan(
        &mut self,
        ctx: &ExecutionContext,
        target: &Path,
        _target_kind: TargetKind,
    ) -> anyhow::Result<ScanOutcome> {
        let Some(tool) = self.tool().map(ToString::to_string) else {
            return Ok(ScanOutcome::Skipped {
                reason: "no `tool` configured".to_string(),
            });
        };

        let name = self
            .config
            .name
            .clone()
            .unwrap_or_else(|| "command".to_string());
        let results_dir = ctx.results_dir_for(&name);
        crate::context::create_dir_all(&results_dir)?;
        let raw_output_path = results_dir.join("output.sarif.json");

        // Wrapped tools get the same offline contract the engine honors:
        // no network rule downloads, local rules cache only.
        let mut env = Vec::new();
        if ctx.config.offline() {
            env.push((crate::config::OFFLINE_ENV.to_string(), "1".to_string()));
            env.push((
                crate::config::RULES_CACHE_ENV.to_string(),
                crate::config::rules_cache_dir().display().to_string(),
            ));
        }

        let request = CommandRequest::builder()
            .program(tool.clone())
            .args(self.args_for(target))
            .cwd(ctx.source_dir.clone())
            .env(env)
            .stdout(OutputPolicy::Both(raw_output_path))
            .stderr(OutputPolicy::Return)
            .timeout(self.timeout())
            .build();

        let started = Utc::now();
        let output = self.runner.run(&request);
        let finished = Utc::now();
        debug!(tool = %tool, return_code = output.return_code, "scanner command finished");

        if output.timed_out {
            anyhow::bail!("`{tool}` timed out after {:?}", self.timeout());
        }
        if !output.started {
            anyhow::bail!(
                "`{tool}` could not be started: {}",
                output.stderr.unwrap_or_default()
            );
        }

        let adapter = SarifAdapter::new(tool);
        let mut bundle = parse_or_raw(&adapter, output.stdout.as_deref().unwrap_or_default());

        let invocation = Invocation {
            command_line: request.command_line(),
            arguments: request.args.clone(),
            start_time: Some(started),
            end_time: Some(finished),
            exit_code: Some(output.return_code),
        };
        if let Some(run) = bundle.runs.first_mut() {
            run.invocations.push(invocation);
        }

        Ok(ScanOutcome::Report(bundle))
    }
}

/// Registration for the command scanner.
#[must_use]
pub fn registration() -> Registration {
    Registration {
        kind: PluginKind::Scanner,
        name: "command",
        module_path: module_path!(),
        factory: || PluginInstance::Scanner(Box::<CommandScanner>::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::report::{Finding, Level, Location, ReportBundle, Run};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn context(tmp: &tempfile::TempDir) -> Arc<ExecutionContext> {
        ExecutionContext::builder()
            .source_dir(tmp.path().to_path_buf())
            .output_dir(tmp.path().join("out"))
            .work_dir(tmp.path().join("work"))
            .config(AppConfig::default())
            .build()
            .into_shared()
            .unwrap()
    }

    fn configured(extra: &[(&str, ExtraValue)]) -> CommandScanner {
        let mut scanner = CommandScanner::default();
        let config = PluginConfig {
            name: None,
            enabled: None,
            extra: extra
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        };
        scanner.configure(&config);
        scanner
    }

    /// Install a fake SARIF-emitting tool into the temp dir.
    fn fake_tool(tmp: &tempfile::TempDir) -> String {
        let mut run = Run::for_tool("fake-tool");
        run.results.push(Finding::new(
            "F1",
            Level::Error,
            "bad thing",
            vec![Location::line("src/a.py", 4)],
        ));
        let sarif = serde_json::to_string(&ReportBundle::with_run(run)).unwrap();

        let sarif_path = tmp.path().join("canned.sarif.json");
        std::fs::write(&sarif_path, sarif).unwrap();

        let script_path = tmp.path().join("fake-tool");
        std::fs::write(
            &script_path,
            format!("#!/bin/sh\ncat {}\n", sarif_path.display()),
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        script_path.display().to_string()
    }

    #[test]
    fn test_unconfigured_scanner_skips() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let mut scanner = CommandScanner::default();

        let outcome = scanner
            .scan(&ctx, tmp.path(), TargetKind::Directory)
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::Skipped { .. }));
    }

    #[test]
    fn test_scan_parses_tool_sarif_and_records_invocation() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let tool = fake_tool(&tmp);
        let mut scanner = configured(&[("tool", ExtraValue::String(tool))]);

        let outcome = scanner
            .scan(&ctx, tmp.path(), TargetKind::Directory)
            .unwrap();
        let ScanOutcome::Report(bundle) = outcome else {
            panic!("expected report");
        };

        assert_eq!(bundle.finding_count(), 1);
        let run = &bundle.runs[0];
        assert_eq!(run.results[0].rule_id, "F1");
        assert_eq!(run.invocations.len(), 1);
        assert_eq!(run.invocations[0].exit_code, Some(0));
        assert!(run.invocations[0].start_time.is_some());
    }

    #[test]
    fn test_scan_tees_raw_output_to_results_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let tool = fake_tool(&tmp);
        let mut scanner = configured(&[("tool", ExtraValue::String(tool))]);

        scanner
            .scan(&ctx, tmp.path(), TargetKind::Directory)
            .unwrap();

        let raw = ctx.results_dir_for("command").join("output.sarif.json");
        assert!(raw.is_file());
    }

    #[test]
    fn test_unparseable_output_degrades_to_raw_finding() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);

        let script_path = tmp.path().join("noisy-tool");
        std::fs::write(&script_path, "#!/bin/sh\necho not json at all\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut scanner = configured(&[(
            "tool",
            ExtraValue::String(script_path.display().to_string()),
        )]);
        let outcome = scanner
            .scan(&ctx, tmp.path(), TargetKind::Directory)
            .unwrap();
        let ScanOutcome::Report(bundle) = outcome else {
            panic!("expected report");
        };
        assert_eq!(
            bundle.runs[0].results[0].rule_id,
            crate::report::parse::RAW_OUTPUT_RULE
        );
    }

    #[test]
    fn test_offline_contract_is_exported_to_the_tool() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.tools.offline = true;
        let ctx = ExecutionContext::builder()
            .source_dir(tmp.path().to_path_buf())
            .output_dir(tmp.path().join("out"))
            .work_dir(tmp.path().join("work"))
            .config(config)
            .build()
            .into_shared()
            .unwrap();

        let script_path = tmp.path().join("env-tool");
        std::fs::write(&script_path, "#!/bin/sh\nenv | grep '^MUSTER_' | sort\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut scanner = configured(&[(
            "tool",
            ExtraValue::String(script_path.display().to_string()),
        )]);
        let outcome = scanner
            .scan(&ctx, tmp.path(), TargetKind::Directory)
            .unwrap();
        let ScanOutcome::Report(bundle) = outcome else {
            panic!("expected report");
        };

        // Env output is not SARIF, so it lands in the raw fallback finding.
        let text = &bundle.runs[0].results[0].message.text;
        assert!(text.contains("MUSTER_OFFLINE=1"));
        assert!(text.contains("MUSTER_RULES_CACHE="));
    }

    #[test]
    fn test_args_template_expands_target() {
        let scanner = configured(&[
            ("tool", ExtraValue::String("semgrep".to_string())),
            (
                "args",
                ExtraValue::String("scan --sarif {target}".to_string()),
            ),
        ]);

        let args = scanner.args_for(Path::new("/srv/code"));
        assert_eq!(args, ["scan", "--sarif", "/srv/code"]);
    }

    #[test]
    fn test_dependency_spec_from_config() {
        let scanner = configured(&[
            ("tool", ExtraValue::String("bandit".to_string())),
            ("version", ExtraValue::String("==1.7.5".to_string())),
            ("pre_installed_only", ExtraValue::Bool(true)),
        ]);

        let deps = scanner.tool_dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "bandit");
        assert_eq!(deps[0].requirement(), "bandit==1.7.5");
        assert_eq!(deps[0].install_method, InstallMethod::PreInstalledOnly);
    }

    #[test]
    fn test_no_tool_means_no_dependencies() {
        let scanner = CommandScanner::default();
        assert!(scanner.tool_dependencies().is_empty());
    }
}
