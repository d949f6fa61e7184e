// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the Muster engine.
//!
//! Provides layered configuration from files and environment variables.
//! Uses XDG-compliant paths with environment variable support.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `MUSTER_`)
//! 2. Config file: `~/.config/muster/muster.toml` (or an explicit path)
//! 3. Built-in defaults
//!
//! Per-plugin overrides live under `[plugins.<name>]` and are looked up by
//! normalized-name matching, so `[plugins.foo-scanner]`, `[plugins.FooScanner]`
//! and `[plugins.foo_scanner]` all bind to the same plugin.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::MusterError;

/// Environment variable disabling all network installs and rule downloads.
pub const OFFLINE_ENV: &str = "MUSTER_OFFLINE";

/// Environment variable pointing at a local rules cache consulted offline.
pub const RULES_CACHE_ENV: &str = "MUSTER_RULES_CACHE";

/// One scalar override value in a plugin's extra-options map.
///
/// Plugins accept exactly one open-ended map of scalars rather than
/// arbitrary untyped extension of the config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
}

impl ExtraValue {
    /// String form of the value, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean form of the value, if it is a bool.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer form of the value, if it is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Per-plugin configuration override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Explicit plugin name; replaces the registration-derived name.
    pub name: Option<String>,
    /// Whether the plugin participates in a run.
    pub enabled: Option<bool>,
    /// Open-ended scalar options interpreted by the plugin itself.
    #[serde(flatten)]
    pub extra: BTreeMap<String, ExtraValue>,
}

impl PluginConfig {
    /// Whether the plugin is enabled; unset means enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Look up one extra option by key.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&ExtraValue> {
        self.extra.get(key)
    }

    /// Merge `other` over this config: explicit fields win, extra maps union
    /// with `other` taking precedence on key collision.
    #[must_use]
    pub fn merged_with(&self, other: &PluginConfig) -> PluginConfig {
        let mut extra = self.extra.clone();
        for (k, v) in &other.extra {
            extra.insert(k.clone(), v.clone());
        }
        PluginConfig {
            name: other.name.clone().or_else(|| self.name.clone()),
            enabled: other.enabled.or(self.enabled),
            extra,
        }
    }
}

/// Retry/backoff settings for tool installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of installation attempts.
    pub max_retries: usize,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub exponential_base: f32,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Add random jitter to desynchronize concurrent installers.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            exponential_base: 2.0,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

/// External tool provisioning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Package manager program used for managed installs.
    pub package_manager: String,
    /// Skip all network installs; rely on pre-installed binaries only.
    pub offline: bool,
    /// Per-attempt installer subprocess timeout in seconds.
    pub install_timeout_seconds: u64,
    /// Retry/backoff settings for installation attempts.
    pub retry: RetrySettings,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            package_manager: "pip".to_string(),
            offline: false,
            install_timeout_seconds: 300,
            retry: RetrySettings::default(),
        }
    }
}

/// Scan run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory name (under the work dir) where per-plugin results land.
    pub results_dir: String,
    /// File name of the merged report written by the json-file reporter.
    pub report_file: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            results_dir: "results".to_string(),
            report_file: "report.sarif.json".to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan run settings.
    pub scan: ScanConfig,
    /// External tool provisioning settings.
    pub tools: ToolsConfig,
    /// Per-plugin overrides keyed by (possibly unnormalized) plugin name.
    pub plugins: BTreeMap<String, PluginConfig>,
}

impl AppConfig {
    /// Locate the override for a plugin by normalized-name matching.
    ///
    /// Keys in the config document and the queried name are both folded
    /// (lowercased, punctuation stripped) before comparison, so the
    /// document does not need to spell the registration name exactly.
    #[must_use]
    pub fn plugin_override(&self, name: &str) -> Option<&PluginConfig> {
        let wanted = normalize_name(name);
        self.plugins
            .iter()
            .find(|(key, _)| normalize_name(key) == wanted)
            .map(|(_, cfg)| cfg)
    }

    /// Effective offline mode: config flag or the environment override.
    #[must_use]
    pub fn offline(&self) -> bool {
        self.tools.offline || offline_from_env()
    }
}

/// Fold a plugin name for config matching: lowercase, alphanumerics only.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether the offline environment flag is set to a truthy value.
///
/// Accepted values are `YES`, `TRUE` and `1`, case-insensitive.
#[must_use]
pub fn offline_from_env() -> bool {
    std::env::var(OFFLINE_ENV)
        .map(|v| matches!(v.to_ascii_uppercase().as_str(), "YES" | "TRUE" | "1"))
        .unwrap_or(false)
}

/// Local rules cache directory, consulted when offline.
///
/// Resolves the `MUSTER_RULES_CACHE` environment variable, falling back to
/// `~/.cache/muster/rules`.
#[must_use]
pub fn rules_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(RULES_CACHE_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("muster")
        .join("rules")
}

/// Returns the Muster configuration directory.
///
/// Respects the `XDG_CONFIG_HOME` environment variable if set,
/// otherwise defaults to `~/.config/muster`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join("muster");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("muster")
}

/// Returns the path to the default configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    config_dir().join("muster.toml")
}

/// Load application configuration.
///
/// Loads from a config file (if it exists) and environment variables.
/// Environment variables use the prefix `MUSTER_` and double underscore
/// for nested keys (e.g., `MUSTER_TOOLS__PACKAGE_MANAGER`).
///
/// # Errors
///
/// Returns [`MusterError::Configuration`] if a config file exists but is
/// invalid.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, MusterError> {
    let config_path = path.map_or_else(config_file_path, Path::to_path_buf);

    let config = Config::builder()
        // Load from config file (optional - may not exist)
        .add_source(File::with_name(config_path.to_string_lossy().as_ref()).required(false))
        // Override with environment variables
        .add_source(
            Environment::with_prefix("MUSTER")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| MusterError::configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| MusterError::configuration(e.to_string()))
}
