// SPDX-License-Identifier: Apache-2.0

//! Tool-output adapters feeding the canonical report model.
//!
//! Each wrapped tool emits its own shape; a [`ReportAdapter`] turns that raw
//! text into a [`ReportBundle`]. Malformed output never aborts a run:
//! [`parse_or_raw`] logs the parse failure and republishes the raw output as
//! a single note-level finding so nothing a tool said is silently lost.

use serde::Deserialize;
use tracing::warn;

use crate::error::ParseError;

use super::{Finding, Level, ReportBundle, Run};

/// Rule id used for the best-effort fallback finding.
pub const RAW_OUTPUT_RULE: &str = "muster/raw-output";

/// Converts one tool's raw output into the canonical report shape.
pub trait ReportAdapter {
    /// Name of the tool this adapter understands.
    fn tool(&self) -> &str;

    /// Parse raw output into a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the output is not in the expected
    /// format. Callers that must not fail use [`parse_or_raw`].
    fn parse(&self, raw: &str) -> Result<ReportBundle, ParseError>;
}

/// Adapter for tools that already emit the canonical SARIF shape.
#[derive(Debug, Clone)]
pub struct SarifAdapter {
    tool: String,
}

impl SarifAdapter {
    /// Adapter for a named SARIF-emitting tool.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

/// Wire shape accepted by [`SarifAdapter`]: header fields are optional so
/// truncated emitters still parse.
#[derive(Deserialize)]
struct LooseSarif {
    #[serde(default)]
    runs: Vec<Run>,
}

impl ReportAdapter for SarifAdapter {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn parse(&self, raw: &str) -> Result<ReportBundle, ParseError> {
        let loose: LooseSarif = serde_json::from_str(raw).map_err(|source| ParseError::Json {
            tool: self.tool.clone(),
            source,
        })?;

        if loose.runs.is_empty() {
            return Err(ParseError::Shape {
                tool: self.tool.clone(),
                message: "document has no runs".to_string(),
            });
        }

        let mut bundle = ReportBundle::new();
        bundle.runs = loose.runs;
        Ok(bundle)
    }
}

/// Parse raw output, falling back to a raw-output bundle on failure.
///
/// The failure is logged with the tool name; the returned bundle carries
/// one note-level finding whose message is the raw output (truncated to a
/// sane length), so downstream reporters still surface what the tool said.
#[must_use]
pub fn parse_or_raw(adapter: &dyn ReportAdapter, raw: &str) -> ReportBundle {
    match adapter.parse(raw) {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!(tool = adapter.tool(), error = %e, "unparseable tool output, keeping raw text");
            raw_output_bundle(adapter.tool(), raw)
        }
    }
}

const RAW_OUTPUT_LIMIT: usize = 8 * 1024;

fn raw_output_bundle(tool: &str, raw: &str) -> ReportBundle {
    let mut text = raw.trim().to_string();
    if text.len() > RAW_OUTPUT_LIMIT {
        let mut cut = RAW_OUTPUT_LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str(" …[truncated]");
    }

    let mut run = Run::for_tool(tool);
    run.results
        .push(Finding::new(RAW_OUTPUT_RULE, Level::Note, text, Vec::new()));
    ReportBundle::with_run(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Location, Rule};

    #[test]
    fn test_sarif_adapter_parses_canonical_output() {
        let mut run = Run::for_tool("semgrep");
        run.tool.driver.rules.push(Rule::with_id("py.flask.debug"));
        run.results.push(Finding::new(
            "py.flask.debug",
            Level::Error,
            "debug enabled",
            vec![Location::line("app.py", 3)],
        ));
        let raw = serde_json::to_string(&ReportBundle::with_run(run)).unwrap();

        let adapter = SarifAdapter::new("semgrep");
        let bundle = adapter.parse(&raw).unwrap();
        assert_eq!(bundle.runs.len(), 1);
        assert_eq!(bundle.finding_count(), 1);
        assert_eq!(bundle.runs[0].tool_name(), "semgrep");
    }

    #[test]
    fn test_sarif_adapter_rejects_non_json() {
        let adapter = SarifAdapter::new("semgrep");
        let err = adapter.parse("Traceback (most recent call last): boom").unwrap_err();
        assert!(matches!(err, ParseError::Json { .. }));
    }

    #[test]
    fn test_sarif_adapter_rejects_empty_document() {
        let adapter = SarifAdapter::new("semgrep");
        let err = adapter.parse(r#"{"version":"2.1.0"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape { .. }));
    }

    #[test]
    fn test_parse_or_raw_falls_back_to_raw_finding() {
        let adapter = SarifAdapter::new("bandit");
        let bundle = parse_or_raw(&adapter, "plain text failure output");

        assert_eq!(bundle.runs.len(), 1);
        assert_eq!(bundle.runs[0].tool_name(), "bandit");
        let finding = &bundle.runs[0].results[0];
        assert_eq!(finding.rule_id, RAW_OUTPUT_RULE);
        assert_eq!(finding.level, Level::Note);
        assert!(finding.message.text.contains("plain text failure output"));
    }

    #[test]
    fn test_parse_or_raw_truncates_huge_output() {
        let adapter = SarifAdapter::new("bandit");
        let raw = "x".repeat(100 * 1024);
        let bundle = parse_or_raw(&adapter, &raw);

        let text = &bundle.runs[0].results[0].message.text;
        assert!(text.len() < 9 * 1024);
        assert!(text.ends_with("…[truncated]"));
    }

    #[test]
    fn test_parse_or_raw_passes_through_valid_output() {
        let run = Run::for_tool("semgrep");
        let raw = serde_json::to_string(&ReportBundle::with_run(run)).unwrap();

        let adapter = SarifAdapter::new("semgrep");
        let bundle = parse_or_raw(&adapter, &raw);
        assert!(bundle.runs[0].results.is_empty());
    }
}
