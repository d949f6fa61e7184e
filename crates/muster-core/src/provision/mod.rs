// SPDX-License-Identifier: Apache-2.0

//! External tool provisioning.
//!
//! Plugins declare the tools they wrap as [`ToolDependencySpec`]s; the
//! [`ToolProvisioner`] resolves each one to something runnable, preferring
//! a managed install over a pre-installed binary found on PATH. Managed
//! installation goes through the configured package manager with
//! exponential-backoff retries, a per-attempt subprocess timeout, and an
//! offline switch that short-circuits every network attempt.
//!
//! Availability probes are memoized per provisioner. The cache is dropped
//! only by an explicit [`ToolProvisioner::invalidate`]; tool state changing
//! mid-run is a documented staleness risk, not something the provisioner
//! watches for.

pub mod retry;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bon::Builder;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::ProvisionError;
use crate::exec::{CommandRequest, ExecutionRunner, OutputPolicy, resolve_executable};

pub use retry::RetryConfig;

/// How a tool is allowed to be provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMethod {
    /// Install through the pinned package manager (the default).
    #[default]
    PinnedManager,
    /// Never install; only a binary already on PATH satisfies the
    /// dependency.
    PreInstalledOnly,
}

/// One external tool a plugin depends on.
#[derive(Debug, Clone, Builder)]
pub struct ToolDependencySpec {
    /// Package name understood by the package manager.
    #[builder(into)]
    pub name: String,
    /// Version constraint appended verbatim (e.g. `==1.7.5`, `>=2`).
    pub version_constraint: Option<String>,
    /// Package extras (e.g. `toml` for `bandit[toml]`).
    #[builder(default)]
    pub extras: Vec<String>,
    /// How this tool may be provisioned.
    #[builder(default)]
    pub install_method: InstallMethod,
    /// Executable name when it differs from the package name.
    pub executable: Option<String>,
}

impl ToolDependencySpec {
    /// Simple spec: managed install, no pin, executable named like the package.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    /// The executable looked up on PATH.
    #[must_use]
    pub fn executable_name(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.name)
    }

    /// The package-manager requirement string: `name[extras]constraint`.
    #[must_use]
    pub fn requirement(&self) -> String {
        let mut req = self.name.clone();
        if !self.extras.is_empty() {
            req.push('[');
            req.push_str(&self.extras.join(","));
            req.push(']');
        }
        if let Some(constraint) = &self.version_constraint {
            req.push_str(constraint);
        }
        req
    }
}

/// Where a tool will be taken from at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferredSource {
    /// The managed install wins.
    Managed,
    /// A binary found on PATH wins.
    PreInstalled,
    /// Nothing satisfies the dependency.
    #[default]
    None,
}

/// Cached provisioning state for one tool.
#[derive(Debug, Clone, Default)]
pub struct InstallationState {
    /// Tool name as declared by the plugin.
    pub tool: String,
    /// Present in the package manager's installed set.
    pub is_managed_installed: bool,
    /// Found on PATH.
    pub is_pre_installed: bool,
    /// Version reported by the package manager, when managed.
    pub managed_version: Option<String>,
    /// Absolute path of the PATH binary, when pre-installed.
    pub pre_installed_path: Option<PathBuf>,
    /// Which source wins: managed > pre-installed > none.
    pub preferred_source: PreferredSource,
    /// Whether the tool is usable at all.
    pub available: bool,
}

/// Provisioner settings resolved from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    /// Package manager program (`pip` unless configured otherwise).
    pub package_manager: String,
    /// Skip all installs; pre-installed binaries only.
    pub offline: bool,
    /// Per-attempt installer timeout.
    pub install_timeout: Duration,
    /// Backoff policy between attempts.
    pub retry: RetryConfig,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            package_manager: "pip".to_string(),
            offline: false,
            install_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
        }
    }
}

impl From<&AppConfig> for ProvisionerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            package_manager: config.tools.package_manager.clone(),
            offline: config.offline(),
            install_timeout: Duration::from_secs(config.tools.install_timeout_seconds),
            retry: RetryConfig::from(&config.tools.retry),
        }
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves and installs the external tools plugins wrap.
///
/// One provisioner per engine run; plugins share it by mutable reference.
/// Installation of a given tool name is idempotent but not internally
/// mutex-protected: two engines in one process racing on the same tool may
/// both invoke the package manager. That redundancy is an accepted cost.
#[derive(Debug)]
pub struct ToolProvisioner {
    settings: ProvisionerSettings,
    runner: ExecutionRunner,
    cache: HashMap<String, InstallationState>,
}

impl ToolProvisioner {
    /// Provisioner with explicit settings.
    #[must_use]
    pub fn new(settings: ProvisionerSettings) -> Self {
        Self {
            settings,
            runner: ExecutionRunner::new(),
            cache: HashMap::new(),
        }
    }

    /// Provisioner configured from the resolved application config.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ProvisionerSettings::from(config))
    }

    /// Whether the engine is in offline mode.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.settings.offline
    }

    /// Whether a tool is usable via any source.
    pub fn is_available(&mut self, spec: &ToolDependencySpec) -> bool {
        self.installation_info(spec).available
    }

    /// Full provisioning state for a tool, probing on first query.
    pub fn installation_info(&mut self, spec: &ToolDependencySpec) -> InstallationState {
        if let Some(state) = self.cache.get(&spec.name) {
            return state.clone();
        }
        let state = self.probe(spec);
        debug!(
            tool = %spec.name,
            managed = state.is_managed_installed,
            pre_installed = state.is_pre_installed,
            "provisioning probe"
        );
        self.cache.insert(spec.name.clone(), state.clone());
        state
    }

    /// Drop every memoized probe result.
    ///
    /// The only way cached availability is refreshed; callers invoke it
    /// after anything that may have changed tool state out-of-band.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Drop the memoized probe result for one tool.
    pub fn invalidate_tool(&mut self, tool: &str) {
        self.cache.remove(tool);
    }

    /// Install a tool through the package manager, retrying with backoff.
    ///
    /// Returns `Ok(true)` when an install attempt succeeded, `Ok(false)`
    /// when installation was not attempted at all (offline mode, or a
    /// pre-installed-only spec) — in both `false` cases the caller must rely
    /// on pre-installed detection. Exhausted or unretryable attempts
    /// surface the last [`ProvisionError`], classified so the caller can
    /// still fall back to a PATH binary.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::Timeout`] when the final attempt exceeded the
    /// per-attempt timeout, [`ProvisionError::NonZeroExit`] when the
    /// installer reported failure, [`ProvisionError::Unexpected`] when the
    /// package manager could not be spawned (not retried).
    pub fn install(&mut self, spec: &ToolDependencySpec) -> Result<bool, ProvisionError> {
        if self.settings.offline {
            info!(tool = %spec.name, "offline mode, skipping installation");
            return Ok(false);
        }
        if spec.install_method == InstallMethod::PreInstalledOnly {
            debug!(tool = %spec.name, "spec forbids managed installation");
            return Ok(false);
        }

        let _ticker = InstallTicker::start(&spec.name);
        let mut delays = self.settings.retry.delays();
        let mut attempt = 0usize;

        loop {
            match self.install_attempt(spec) {
                Ok(()) => {
                    self.invalidate_tool(&spec.name);
                    info!(tool = %spec.name, attempt, "installation succeeded");
                    return Ok(true);
                }
                Err(e) if e.is_retryable() => {
                    let Some(delay) = delays.next() else {
                        warn!(tool = %spec.name, error = %e, "installation retries exhausted");
                        return Err(e);
                    };
                    warn!(
                        tool = %spec.name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "installation attempt failed, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!(tool = %spec.name, error = %e, "installation failed, not retrying");
                    return Err(e);
                }
            }
        }
    }

    /// Re-probe a supposedly-installed tool with a trivial version query.
    ///
    /// Detects stale or corrupt caches: a tool that cannot answer
    /// `--version` has its cache entry dropped and reports unusable.
    pub fn validate_cached(&mut self, spec: &ToolDependencySpec) -> bool {
        let state = self.installation_info(spec);
        if !state.available {
            return false;
        }

        let program = state
            .pre_installed_path
            .as_ref()
            .map_or_else(|| spec.executable_name().to_string(), |p| p.display().to_string());

        let output = self.runner.run(
            &CommandRequest::builder()
                .program(program)
                .args(vec!["--version".to_string()])
                .stdout(OutputPolicy::Discard)
                .stderr(OutputPolicy::Discard)
                .timeout(PROBE_TIMEOUT)
                .build(),
        );

        if output.success() {
            true
        } else {
            warn!(tool = %spec.name, "cached tool failed its version probe, invalidating");
            self.invalidate_tool(&spec.name);
            false
        }
    }

    fn probe(&self, spec: &ToolDependencySpec) -> InstallationState {
        let pre_installed_path = resolve_executable(spec.executable_name());
        let (is_managed_installed, managed_version) = self.probe_managed(&spec.name);

        let is_pre_installed = pre_installed_path.is_some();
        let preferred_source = if is_managed_installed {
            PreferredSource::Managed
        } else if is_pre_installed {
            PreferredSource::PreInstalled
        } else {
            PreferredSource::None
        };

        InstallationState {
            tool: spec.name.clone(),
            is_managed_installed,
            is_pre_installed,
            managed_version,
            pre_installed_path,
            preferred_source,
            available: is_managed_installed || is_pre_installed,
        }
    }

    /// Query the package manager's installed set (`<manager> show <name>`).
    fn probe_managed(&self, name: &str) -> (bool, Option<String>) {
        let output = self.runner.run(
            &CommandRequest::builder()
                .program(self.settings.package_manager.clone())
                .args(vec!["show".to_string(), name.to_string()])
                .stderr(OutputPolicy::Discard)
                .timeout(PROBE_TIMEOUT)
                .build(),
        );

        if !output.success() {
            return (false, None);
        }

        let version = output.stdout.as_deref().and_then(|stdout| {
            stdout
                .lines()
                .find_map(|line| line.strip_prefix("Version:"))
                .map(|v| v.trim().to_string())
        });
        (true, version)
    }

    fn install_attempt(&self, spec: &ToolDependencySpec) -> Result<(), ProvisionError> {
        let output = self.runner.run(
            &CommandRequest::builder()
                .program(self.settings.package_manager.clone())
                .args(vec!["install".to_string(), spec.requirement()])
                .timeout(self.settings.install_timeout)
                .build(),
        );

        if !output.started {
            return Err(ProvisionError::Unexpected {
                tool: spec.name.clone(),
                message: output
                    .stderr
                    .unwrap_or_else(|| "installer could not be spawned".to_string()),
            });
        }
        if output.timed_out {
            return Err(ProvisionError::Timeout {
                tool: spec.name.clone(),
                timeout: self.settings.install_timeout,
            });
        }
        if output.return_code != 0 {
            return Err(ProvisionError::NonZeroExit {
                tool: spec.name.clone(),
                code: output.return_code,
                stderr: tail(output.stderr.as_deref().unwrap_or_default(), 2_048),
            });
        }
        Ok(())
    }
}

/// Last `limit` bytes of installer stderr, on a char boundary.
fn tail(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - limit;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

const TICK_INTERVAL: Duration = Duration::from_secs(10);
const TICK_POLL: Duration = Duration::from_millis(200);

/// Background timer emitting "installation in progress" log events.
///
/// Reads only its start instant and an atomic stop flag; stopped and joined
/// on drop, so a finished install never leaves a ticking thread behind.
struct InstallTicker {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl InstallTicker {
    fn start(tool: &str) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let tool = tool.to_string();
        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            let mut next_tick = started + TICK_INTERVAL;
            while !stop_flag.load(Ordering::Relaxed) {
                if Instant::now() >= next_tick {
                    info!(
                        tool = %tool,
                        elapsed_secs = started.elapsed().as_secs(),
                        "installation in progress"
                    );
                    next_tick += TICK_INTERVAL;
                }
                std::thread::sleep(TICK_POLL);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for InstallTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
