// SPDX-License-Identifier: Apache-2.0

//! Error types for the Muster engine.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! Plugin `execute()` bodies and the CLI use `anyhow::Result`; the engine
//! itself converts every per-plugin condition except a configuration error
//! into data, so a multi-plugin run degrades per-plugin rather than
//! globally.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while orchestrating a plugin run.
#[derive(Error, Debug)]
pub enum MusterError {
    /// Execution context or configuration is missing/invalid.
    ///
    /// The only error that crosses the plugin boundary as an error value;
    /// it is fatal to the affected plugin's lifecycle, never to the run.
    #[error("configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },

    /// A plugin's external tool dependencies could not be satisfied.
    ///
    /// Non-fatal: the lifecycle converts this into a skip outcome.
    #[error("dependencies unsatisfied for plugin `{plugin}`: {detail}")]
    DependencyUnsatisfied {
        /// Plugin name whose dependencies are missing.
        plugin: String,
        /// What was looked for and not found.
        detail: String,
    },

    /// Tool provisioning failed (install attempt exhausted).
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Tool output could not be parsed into the canonical report shape.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Filesystem error while preparing directories or writing artifacts.
    #[error("i/o error at {path}: {source}")]
    Io {
        /// Path the operation was performed on.
        path: String,
        /// Underlying i/o error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure causes for an installation attempt.
///
/// The lifecycle uses the variant to decide whether falling back to a
/// pre-installed binary is worth probing: a `Timeout` or `NonZeroExit`
/// leaves the PATH state unchanged, so the fallback probe still applies.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The installer subprocess exceeded its per-attempt timeout.
    #[error("installation of `{tool}` timed out after {timeout:?}")]
    Timeout {
        /// Tool being installed.
        tool: String,
        /// Per-attempt timeout that elapsed.
        timeout: Duration,
    },

    /// The installer ran to completion but reported failure.
    #[error("installer for `{tool}` exited with status {code}: {stderr}")]
    NonZeroExit {
        /// Tool being installed.
        tool: String,
        /// Installer exit code.
        code: i32,
        /// Trailing stderr from the installer, for diagnostics.
        stderr: String,
    },

    /// The installer could not be spawned or failed in an unforeseen way.
    #[error("unexpected installer failure for `{tool}`: {message}")]
    Unexpected {
        /// Tool being installed.
        tool: String,
        /// Description of the failure.
        message: String,
    },
}

impl ProvisionError {
    /// Name of the tool the failed attempt was installing.
    #[must_use]
    pub fn tool(&self) -> &str {
        match self {
            Self::Timeout { tool, .. }
            | Self::NonZeroExit { tool, .. }
            | Self::Unexpected { tool, .. } => tool,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Spawn failures are deterministic (missing manager binary, bad
    /// arguments) and are not retried; timeouts and nonzero exits are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unexpected { .. })
    }
}

/// Malformed tool output.
///
/// Never propagated out of the normalizer: callers log it and fall back to
/// republishing the raw output as a best-effort finding.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Output was not valid JSON.
    #[error("invalid JSON from `{tool}`")]
    Json {
        /// Tool whose output failed to parse.
        tool: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Output was valid JSON but did not match the expected shape.
    #[error("unexpected report shape from `{tool}`: {message}")]
    Shape {
        /// Tool whose output failed to parse.
        tool: String,
        /// What was expected and what was seen.
        message: String,
    },
}

impl MusterError {
    /// Shorthand for a [`MusterError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
