// SPDX-License-Identifier: Apache-2.0

//! Plugin contracts and instances.
//!
//! Three plugin kinds, one trait each — [`Converter`], [`Scanner`],
//! [`Reporter`] — over a shared [`Plugin`] supertrait carrying the common
//! contract (configuration, tool dependencies, dependency validation). The
//! kind-specific capability is checked by the compiler: a type registered as
//! a scanner must implement `Scanner`, there is no "has these methods"
//! probing at runtime.

pub mod descriptor;
pub mod lifecycle;
pub mod registry;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::PluginConfig;
use crate::context::{ExecutionContext, TargetKind};
use crate::provision::{ToolDependencySpec, ToolProvisioner};
use crate::report::ReportBundle;

/// The three plugin kinds the engine orchestrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginKind {
    /// Produces additional scan targets from the source tree.
    Converter,
    /// Wraps an external tool and yields a report bundle.
    Scanner,
    /// Consumes the final merged bundle.
    Reporter,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Converter => "converter",
            Self::Scanner => "scanner",
            Self::Reporter => "reporter",
        };
        f.write_str(name)
    }
}

/// Common plugin contract shared by every kind.
pub trait Plugin {
    /// Merge caller configuration into the instance.
    ///
    /// Called before any dependency check; later calls overlay earlier
    /// ones.
    fn configure(&mut self, config: &PluginConfig);

    /// External tools this plugin needs at execution time.
    fn tool_dependencies(&self) -> Vec<ToolDependencySpec> {
        Vec::new()
    }

    /// Whether every declared tool is usable.
    ///
    /// The default walks [`Plugin::tool_dependencies`] through the
    /// provisioner: managed install first (with its retry policy), falling
    /// back to pre-installed detection when installation fails or is
    /// disabled. Missing tools are never an error here, only `false`.
    fn validate_dependencies(&mut self, provisioner: &mut ToolProvisioner) -> bool {
        dependencies_satisfied(provisioner, &self.tool_dependencies())
    }
}

/// Result of a scanner execution: a report, or a deliberate skip.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Normalized findings from the wrapped tool.
    Report(ReportBundle),
    /// The scanner decided it does not apply to this target.
    Skipped {
        /// Why the scanner bowed out.
        reason: String,
    },
}

/// Converters produce additional scan targets.
pub trait Converter: Plugin {
    /// Run the conversion; returned paths become scan targets.
    ///
    /// # Errors
    ///
    /// Any error is caught by the lifecycle's safe wrapper and turned into
    /// a structured failure.
    fn convert(&mut self, ctx: &ExecutionContext) -> anyhow::Result<Vec<PathBuf>>;
}

/// Scanners wrap one external tool run against a target.
pub trait Scanner: Plugin {
    /// Scan a target and produce a bundle (or skip).
    ///
    /// # Errors
    ///
    /// Any error is caught by the lifecycle's safe wrapper and turned into
    /// a structured failure.
    fn scan(
        &mut self,
        ctx: &ExecutionContext,
        target: &Path,
        target_kind: TargetKind,
    ) -> anyhow::Result<ScanOutcome>;
}

/// Reporters consume the final merged bundle.
pub trait Reporter: Plugin {
    /// Emit the bundle wherever this reporter writes.
    ///
    /// # Errors
    ///
    /// Any error is caught by the lifecycle's safe wrapper and turned into
    /// a structured failure.
    fn report(&mut self, ctx: &ExecutionContext, bundle: &ReportBundle) -> anyhow::Result<()>;
}

/// A live plugin of any kind, dispatched by enum rather than downcast.
pub enum PluginInstance {
    /// A converter instance.
    Converter(Box<dyn Converter>),
    /// A scanner instance.
    Scanner(Box<dyn Scanner>),
    /// A reporter instance.
    Reporter(Box<dyn Reporter>),
}

impl PluginInstance {
    /// The instance's kind.
    #[must_use]
    pub fn kind(&self) -> PluginKind {
        match self {
            Self::Converter(_) => PluginKind::Converter,
            Self::Scanner(_) => PluginKind::Scanner,
            Self::Reporter(_) => PluginKind::Reporter,
        }
    }

    /// Delegate to the underlying plugin's `configure`.
    pub fn configure(&mut self, config: &PluginConfig) {
        match self {
            Self::Converter(p) => p.configure(config),
            Self::Scanner(p) => p.configure(config),
            Self::Reporter(p) => p.configure(config),
        }
    }

    /// Delegate to the underlying plugin's `tool_dependencies`.
    #[must_use]
    pub fn tool_dependencies(&self) -> Vec<ToolDependencySpec> {
        match self {
            Self::Converter(p) => p.tool_dependencies(),
            Self::Scanner(p) => p.tool_dependencies(),
            Self::Reporter(p) => p.tool_dependencies(),
        }
    }

    /// Delegate to the underlying plugin's `validate_dependencies`.
    pub fn validate_dependencies(&mut self, provisioner: &mut ToolProvisioner) -> bool {
        match self {
            Self::Converter(p) => p.validate_dependencies(provisioner),
            Self::Scanner(p) => p.validate_dependencies(provisioner),
            Self::Reporter(p) => p.validate_dependencies(provisioner),
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Check every tool spec against the provisioner, installing when allowed.
///
/// Preference order per tool: already available (managed or PATH), then a
/// managed install attempt, then pre-installed fallback after a classified
/// install failure. Returns `false` as soon as one tool cannot be
/// satisfied.
pub fn dependencies_satisfied(
    provisioner: &mut ToolProvisioner,
    specs: &[ToolDependencySpec],
) -> bool {
    specs.iter().all(|spec| {
        if provisioner.is_available(spec) {
            return true;
        }

        match provisioner.install(spec) {
            Ok(true) => {
                // Probe again: the install invalidated the cached state.
                provisioner.is_available(spec)
            }
            Ok(false) => {
                // Offline or pre-installed-only; PATH was already checked
                // and came up empty.
                warn!(tool = %spec.name, "tool unavailable and installation disabled");
                false
            }
            Err(e) => {
                warn!(tool = %spec.name, error = %e, "installation failed, probing PATH fallback");
                provisioner.invalidate_tool(&spec.name);
                provisioner.installation_info(spec).is_pre_installed
            }
        }
    })
}
