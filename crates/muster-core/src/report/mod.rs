// SPDX-License-Identifier: Apache-2.0

//! Canonical finding report model.
//!
//! Every scanner's output is normalized into this SARIF-flavored shape:
//! a [`ReportBundle`] of [`Run`]s, one per logical tool invocation, each
//! carrying the tool identity, invocation metadata, a rule catalogue and the
//! findings themselves. Merging and location normalization live in
//! [`merge`]; tool-output adapters live in [`parse`].

pub mod merge;
pub mod parse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SARIF schema version stamped on every bundle.
pub const REPORT_VERSION: &str = "2.1.0";

/// SARIF schema URI stamped on every bundle.
pub const REPORT_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

/// The merged collection of per-tool runs for a complete scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportBundle {
    /// Report format version.
    pub version: String,
    /// Report schema URI.
    #[serde(rename = "$schema")]
    pub schema: String,
    /// One run per logical tool invocation, in execution order.
    pub runs: Vec<Run>,
}

impl Default for ReportBundle {
    fn default() -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            schema: REPORT_SCHEMA.to_string(),
            runs: Vec::new(),
        }
    }
}

impl ReportBundle {
    /// Empty bundle with the canonical header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle wrapping a single run.
    #[must_use]
    pub fn with_run(run: Run) -> Self {
        Self {
            runs: vec![run],
            ..Self::default()
        }
    }

    /// Total findings across all runs.
    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.runs.iter().map(|r| r.results.len()).sum()
    }
}

/// One tool's invocation metadata plus its findings and rule catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Tool identity and rule catalogue.
    pub tool: Tool,
    /// Invocation records, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invocations: Vec<Invocation>,
    /// Findings, in the order the tool reported them.
    #[serde(default)]
    pub results: Vec<Finding>,
}

impl Run {
    /// New empty run for a named tool.
    #[must_use]
    pub fn for_tool(name: impl Into<String>) -> Self {
        Self {
            tool: Tool {
                driver: Driver {
                    name: name.into(),
                    version: None,
                    information_uri: None,
                    rules: Vec::new(),
                },
            },
            invocations: Vec::new(),
            results: Vec::new(),
        }
    }

    /// The driver (tool) name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool.driver.name
    }

    /// The rule catalogue.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.tool.driver.rules
    }
}

/// Tool wrapper (SARIF nests the driver one level down).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// The tool itself.
    pub driver: Driver,
}

/// Tool driver identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    /// Tool name.
    pub name: String,
    /// Tool version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Information URI.
    #[serde(rename = "informationUri", skip_serializing_if = "Option::is_none")]
    pub information_uri: Option<String>,
    /// Rule catalogue; unique by rule id within one run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

/// One rule catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule id, matching `Finding::rule_id`.
    pub id: String,
    /// Optional human-readable rule name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional short description.
    #[serde(rename = "shortDescription", skip_serializing_if = "Option::is_none")]
    pub short_description: Option<Message>,
}

impl Rule {
    /// Minimal rule with only an id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            short_description: None,
        }
    }
}

/// One tool invocation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Full command line as executed.
    #[serde(rename = "commandLine")]
    pub command_line: String,
    /// Arguments passed to the tool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    /// Start of the invocation.
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// End of the invocation.
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Tool exit code.
    #[serde(rename = "exitCode", skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Result level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Failure-class finding.
    Error,
    /// Default level.
    #[default]
    Warning,
    /// Informational finding.
    Note,
    /// Explicitly unleveled.
    None,
}

/// Message structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text.
    pub text: String,
}

impl Message {
    /// Message from plain text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One finding location: root-relative posix path plus a line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path, relative to the scan root, posix-separated.
    pub uri: String,
    /// First line of the region (1-indexed).
    #[serde(rename = "startLine")]
    pub start_line: usize,
    /// Last line of the region; equals `start_line` for single-line hits.
    #[serde(rename = "endLine")]
    pub end_line: usize,
}

impl Location {
    /// Single-line location.
    #[must_use]
    pub fn line(uri: impl Into<String>, line: usize) -> Self {
        Self {
            uri: uri.into(),
            start_line: line,
            end_line: line,
        }
    }
}

/// Fingerprints for deduplication across scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprints {
    /// Primary fingerprint (SHA-256 hash).
    #[serde(rename = "primaryLocationLineHash")]
    pub primary_location_line_hash: String,
}

/// A single normalized finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule id that produced this finding.
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    /// Result level.
    #[serde(default)]
    pub level: Level,
    /// Human-readable message.
    pub message: Message,
    /// Locations where the issue was found.
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Stable fingerprint for deduplication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprints: Option<Fingerprints>,
}

impl Finding {
    /// Build a finding and stamp its stable fingerprint.
    ///
    /// The fingerprint is a SHA-256 over `{uri}:{start_line}:{rule_id}` of
    /// the primary location, so identical findings hash identically across
    /// scans regardless of when they ran.
    #[must_use]
    pub fn new(
        rule_id: impl Into<String>,
        level: Level,
        message: impl Into<String>,
        locations: Vec<Location>,
    ) -> Self {
        let rule_id = rule_id.into();
        let fingerprints = locations.first().map(|loc| {
            let mut hasher = Sha256::new();
            hasher.update(loc.uri.as_bytes());
            hasher.update(b":");
            hasher.update(loc.start_line.to_string().as_bytes());
            hasher.update(b":");
            hasher.update(rule_id.as_bytes());
            Fingerprints {
                primary_location_line_hash: hex::encode(hasher.finalize()),
            }
        });
        Self {
            rule_id,
            level,
            message: Message::text(message),
            locations,
            fingerprints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_header_defaults() {
        let bundle = ReportBundle::new();
        assert_eq!(bundle.version, "2.1.0");
        assert!(bundle.schema.contains("sarif-schema-2.1.0"));
        assert!(bundle.runs.is_empty());
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let mut run = Run::for_tool("bandit");
        run.invocations.push(Invocation {
            command_line: "bandit -r src".to_string(),
            arguments: vec!["-r".to_string(), "src".to_string()],
            start_time: None,
            end_time: None,
            exit_code: Some(0),
        });
        run.results.push(Finding::new(
            "B101",
            Level::Warning,
            "assert used",
            vec![Location::line("src/app.py", 3)],
        ));

        let json = serde_json::to_string(&ReportBundle::with_run(run)).unwrap();
        assert!(json.contains("\"commandLine\""));
        assert!(json.contains("\"exitCode\""));
        assert!(json.contains("\"ruleId\":\"B101\""));
        assert!(json.contains("\"startLine\":3"));
        assert!(json.contains("\"level\":\"warning\""));
    }

    #[test]
    fn test_fingerprint_stability() {
        let a = Finding::new(
            "R1",
            Level::Error,
            "first",
            vec![Location::line("src/main.rs", 10)],
        );
        let b = Finding::new(
            "R1",
            Level::Note,
            "different message, same place",
            vec![Location::line("src/main.rs", 10)],
        );
        assert_eq!(a.fingerprints, b.fingerprints);
    }

    #[test]
    fn test_fingerprint_uniqueness() {
        let a = Finding::new("R1", Level::Error, "x", vec![Location::line("a.rs", 1)]);
        let b = Finding::new("R2", Level::Error, "x", vec![Location::line("a.rs", 1)]);
        assert_ne!(a.fingerprints, b.fingerprints);
    }

    #[test]
    fn test_finding_without_location_has_no_fingerprint() {
        let finding = Finding::new("R1", Level::Note, "global", Vec::new());
        assert!(finding.fingerprints.is_none());
    }

    #[test]
    fn test_finding_count_spans_runs() {
        let mut bundle = ReportBundle::new();
        let mut run_a = Run::for_tool("a");
        run_a
            .results
            .push(Finding::new("R1", Level::Note, "m", Vec::new()));
        let mut run_b = Run::for_tool("b");
        run_b
            .results
            .push(Finding::new("R2", Level::Note, "m", Vec::new()));
        run_b
            .results
            .push(Finding::new("R3", Level::Note, "m", Vec::new()));
        bundle.runs.push(run_a);
        bundle.runs.push(run_b);

        assert_eq!(bundle.finding_count(), 3);
    }

    #[test]
    fn test_bundle_round_trips_through_json() {
        let mut run = Run::for_tool("semgrep");
        run.tool.driver.rules.push(Rule::with_id("rules.flask.debug"));
        run.results.push(Finding::new(
            "rules.flask.debug",
            Level::Error,
            "debug enabled",
            vec![Location::line("app/server.py", 12)],
        ));
        let bundle = ReportBundle::with_run(run);

        let json = serde_json::to_string(&bundle).unwrap();
        let back: ReportBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back.runs.len(), 1);
        assert_eq!(back.runs[0].tool_name(), "semgrep");
        assert_eq!(back.runs[0].rules().len(), 1);
        assert_eq!(back.finding_count(), 1);
    }
}
