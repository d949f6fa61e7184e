// SPDX-License-Identifier: Apache-2.0

//! Reporter serializing the merged bundle to a JSON file.

use tracing::info;

use crate::config::PluginConfig;
use crate::context::ExecutionContext;
use crate::plugin::descriptor::Registration;
use crate::plugin::{Plugin, PluginInstance, PluginKind, Reporter};
use crate::report::ReportBundle;

/// Reporter writing `output_dir/<report_file>` as pretty JSON.
#[derive(Default)]
pub struct JsonFileReporter {
    config: PluginConfig,
}

impl Plugin for JsonFileReporter {
    fn configure(&mut self, config: &PluginConfig) {
        self.config = self.config.merged_with(config);
    }
}

impl Reporter for JsonFileReporter {
    fn report(&mut self, ctx: &ExecutionContext, bundle: &ReportBundle) -> anyhow::Result<()> {
        let path = ctx.output_dir.join(&ctx.config.scan.report_file);
        let json = serde_json::to_string_pretty(bundle)?;
        std::fs::write(&path, json)?;
        info!(
            path = %path.display(),
            findings = bundle.finding_count(),
            "report written"
        );
        Ok(())
    }
}

/// Registration for the JSON file reporter.
#[must_use]
pub fn registration() -> Registration {
    Registration {
        kind: PluginKind::Reporter,
        name: "json-file",
        module_path: module_path!(),
        factory: || PluginInstance::Reporter(Box::<JsonFileReporter>::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::report::{Finding, Level, Run};
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

    #[test]
    fn test_writes_bundle_to_configured_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);

        let mut run = Run::for_tool("bandit");
        run.results
            .push(Finding::new("B101", Level::Warning, "assert", Vec::new()));
        let bundle = ReportBundle::with_run(run);

        let mut reporter = JsonFileReporter::default();
        reporter.report(&ctx, &bundle).unwrap();

        let written = std::fs::read_to_string(tmp.path().join("out/report.sarif.json")).unwrap();
        let parsed: ReportBundle = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.finding_count(), 1);
    }
}
