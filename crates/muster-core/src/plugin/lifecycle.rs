// SPDX-License-Identifier: Apache-2.0

//! Per-plugin execution lifecycle.
//!
//! `Created → Configured → DependencyChecked{Satisfied|Unsatisfied} →
//! (Satisfied) Running → {Completed|Failed}`, with `Unsatisfied → Skipped`
//! terminal. The lifecycle composes the provisioner (dependency check) and
//! the plugin's own execution, and guarantees the run-degradation policy:
//! everything a plugin does wrong inside `execute` — errors and panics both
//! — is converted into a structured [`PluginRunResult`] instead of
//! propagating. Only a missing execution context is an error, and it stays
//! scoped to this plugin.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::PluginConfig;
use crate::context::{ExecutionContext, TargetKind, create_dir_all};
use crate::error::MusterError;
use crate::provision::ToolProvisioner;
use crate::report::ReportBundle;

use super::descriptor::PluginDescriptor;
use super::{PluginInstance, PluginKind, ScanOutcome};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Instance exists, nothing applied yet.
    Created,
    /// Caller configuration merged in.
    Configured,
    /// Dependency check passed.
    DependenciesSatisfied,
    /// Dependency check failed; the only exit is `Skipped`.
    DependenciesUnsatisfied,
    /// `execute` in flight.
    Running,
    /// Terminal: execution finished cleanly.
    Completed,
    /// Terminal: execution failed (error or panic, captured).
    Failed,
    /// Terminal: plugin skipped (unsatisfied dependencies or its own call).
    Skipped,
}

/// Terminal status of one plugin run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Ran to completion.
    Completed,
    /// Did not run (or declined to produce output).
    Skipped,
    /// Failed inside `execute`; captured, never propagated.
    Failed,
}

/// What a completed plugin produced.
#[derive(Debug, Default)]
pub enum PluginOutput {
    /// Converter artifacts: extra scan targets.
    Artifacts(Vec<PathBuf>),
    /// Scanner report bundle.
    Report(Box<ReportBundle>),
    /// Nothing (reporters, skipped or failed plugins).
    #[default]
    None,
}

/// Structured outcome of one plugin's lifecycle.
#[derive(Debug)]
pub struct PluginRunResult {
    /// Plugin name.
    pub plugin: String,
    /// Plugin kind.
    pub kind: PluginKind,
    /// Terminal status.
    pub status: RunStatus,
    /// Produced output, if any.
    pub output: PluginOutput,
    /// Error message for failed runs.
    pub error: Option<String>,
    /// Error chain / panic backtrace for failed runs.
    pub trace: Option<String>,
    /// Why a skipped run was skipped.
    pub skip_reason: Option<String>,
    /// When `pre_execute` recorded the start.
    pub started_at: Option<DateTime<Utc>>,
    /// When `post_execute` recorded the end.
    pub finished_at: Option<DateTime<Utc>>,
}

impl PluginRunResult {
    /// Wall-clock duration, when both timestamps were recorded.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Drives one plugin instance through its states.
pub struct PluginLifecycle {
    name: String,
    instance: PluginInstance,
    context: Option<Arc<ExecutionContext>>,
    state: LifecycleState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl PluginLifecycle {
    /// Lifecycle around a raw instance.
    #[must_use]
    pub fn new(name: impl Into<String>, instance: PluginInstance) -> Self {
        Self {
            name: name.into(),
            instance,
            context: None,
            state: LifecycleState::Created,
            started_at: None,
            finished_at: None,
        }
    }

    /// Lifecycle from a discovered descriptor: instantiates and configures.
    #[must_use]
    pub fn from_descriptor(descriptor: &PluginDescriptor) -> Self {
        let mut lifecycle = Self::new(descriptor.name(), descriptor.instantiate());
        // `instantiate` already applied the bound config; record the state.
        lifecycle.state = LifecycleState::Configured;
        lifecycle
    }

    /// Plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin kind.
    #[must_use]
    pub fn kind(&self) -> PluginKind {
        self.instance.kind()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Start timestamp recorded by `pre_execute`.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// End timestamp recorded by `post_execute`.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Attach the shared execution context.
    pub fn attach_context(&mut self, context: Arc<ExecutionContext>) {
        self.context = Some(context);
    }

    /// Merge caller configuration into the instance.
    ///
    /// Runs before any dependency check; may be called repeatedly, later
    /// layers overriding earlier ones.
    pub fn configure(&mut self, config: &PluginConfig) {
        self.instance.configure(config);
        if self.state == LifecycleState::Created {
            self.state = LifecycleState::Configured;
        }
    }

    /// Check the plugin's external tools against the provisioner.
    ///
    /// A missing tool is never an error — the lifecycle just moves to
    /// `DependenciesUnsatisfied` and reports `false`.
    ///
    /// # Errors
    ///
    /// [`MusterError::Configuration`] when no execution context is
    /// attached.
    pub fn validate_dependencies(
        &mut self,
        provisioner: &mut ToolProvisioner,
    ) -> Result<bool, MusterError> {
        self.require_context()?;

        let satisfied = self.instance.validate_dependencies(provisioner);
        self.state = if satisfied {
            LifecycleState::DependenciesSatisfied
        } else {
            LifecycleState::DependenciesUnsatisfied
        };
        Ok(satisfied)
    }

    /// Prepare for execution: target check, results dir, start timestamp.
    ///
    /// Returns `Ok(false)` — skip, don't fail — when the dependency check
    /// came up unsatisfied.
    ///
    /// # Errors
    ///
    /// [`MusterError::Configuration`] when no context is attached or the
    /// target does not exist; [`MusterError::Io`] when the results
    /// directory cannot be created.
    pub fn pre_execute(&mut self, target: &Path, target_kind: TargetKind) -> Result<bool, MusterError> {
        let context = self.require_context()?.clone();

        if self.state == LifecycleState::DependenciesUnsatisfied {
            warn!(
                plugin = %self.name,
                kind = %self.kind(),
                "dependencies unsatisfied, signalling skip"
            );
            return Ok(false);
        }

        if !target.exists() {
            return Err(MusterError::configuration(format!(
                "target does not exist: {} ({target_kind:?})",
                target.display()
            )));
        }

        create_dir_all(&context.results_dir_for(&self.name))?;

        self.started_at = Some(Utc::now());
        self.state = LifecycleState::Running;
        debug!(plugin = %self.name, target = %target.display(), "pre-execute complete");
        Ok(true)
    }

    /// Execute a converter or scanner against a target.
    ///
    /// Always goes through the safe wrapper: any error or panic inside the
    /// plugin becomes a `Failed` result carrying the message and a trace.
    #[must_use]
    pub fn execute(&mut self, target: &Path, target_kind: TargetKind) -> PluginRunResult {
        let Some(context) = self.context.clone() else {
            return self.failure_result(
                "execution context not attached".to_string(),
                String::new(),
            );
        };

        let instance = &mut self.instance;
        let outcome = guard(AssertUnwindSafe(|| match instance {
            PluginInstance::Converter(converter) => converter
                .convert(&context)
                .map(|paths| Executed::Output(PluginOutput::Artifacts(paths))),
            PluginInstance::Scanner(scanner) => {
                match scanner.scan(&context, target, target_kind)? {
                    ScanOutcome::Report(bundle) => {
                        Ok(Executed::Output(PluginOutput::Report(Box::new(bundle))))
                    }
                    ScanOutcome::Skipped { reason } => Ok(Executed::Skip(reason)),
                }
            }
            PluginInstance::Reporter(_) => Err(anyhow::anyhow!(
                "reporter plugins take the merged bundle, not a path target"
            )),
        }));

        self.settle(outcome)
    }

    /// Execute a reporter against the final merged bundle.
    #[must_use]
    pub fn execute_report(&mut self, bundle: &ReportBundle) -> PluginRunResult {
        let Some(context) = self.context.clone() else {
            return self.failure_result(
                "execution context not attached".to_string(),
                String::new(),
            );
        };

        let instance = &mut self.instance;
        let outcome = guard(AssertUnwindSafe(|| match instance {
            PluginInstance::Reporter(reporter) => reporter
                .report(&context, bundle)
                .map(|()| Executed::Output(PluginOutput::None)),
            _ => Err(anyhow::anyhow!("only reporter plugins consume the bundle")),
        }));

        self.settle(outcome)
    }

    /// Record the end timestamp.
    pub fn post_execute(&mut self) {
        self.finished_at = Some(Utc::now());
        if let Some(duration) = self
            .started_at
            .map(|start| self.finished_at.unwrap_or(start) - start)
        {
            debug!(
                plugin = %self.name,
                duration_ms = duration.num_milliseconds(),
                "post-execute complete"
            );
        }
    }

    /// The skip result for a plugin that never ran.
    #[must_use]
    pub fn skip_result(&mut self, reason: impl Into<String>) -> PluginRunResult {
        self.state = LifecycleState::Skipped;
        PluginRunResult {
            plugin: self.name.clone(),
            kind: self.kind(),
            status: RunStatus::Skipped,
            output: PluginOutput::None,
            error: None,
            trace: None,
            skip_reason: Some(reason.into()),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn require_context(&self) -> Result<&Arc<ExecutionContext>, MusterError> {
        self.context
            .as_ref()
            .ok_or_else(|| MusterError::configuration("execution context not attached"))
    }

    fn settle(&mut self, outcome: Result<Executed, Failure>) -> PluginRunResult {
        match outcome {
            Ok(Executed::Skip(reason)) => self.skip_result(reason),
            Ok(Executed::Output(output)) => {
                self.state = LifecycleState::Completed;
                PluginRunResult {
                    plugin: self.name.clone(),
                    kind: self.kind(),
                    status: RunStatus::Completed,
                    output,
                    error: None,
                    trace: None,
                    skip_reason: None,
                    started_at: self.started_at,
                    finished_at: self.finished_at,
                }
            }
            Err(failure) => self.failure_result(failure.message, failure.trace),
        }
    }

    pub(crate) fn failure_result(&mut self, error: String, trace: String) -> PluginRunResult {
        self.state = LifecycleState::Failed;
        warn!(plugin = %self.name, error = %error, "plugin execution failed");
        PluginRunResult {
            plugin: self.name.clone(),
            kind: self.kind(),
            status: RunStatus::Failed,
            output: PluginOutput::None,
            error: Some(error),
            trace: (!trace.is_empty()).then_some(trace),
            skip_reason: None,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// What the guarded body yielded: real output, or the skip sentinel.
enum Executed {
    Output(PluginOutput),
    Skip(String),
}

struct Failure {
    message: String,
    trace: String,
}

/// The safe wrapper: run the plugin body, catching errors and panics.
fn guard<F>(body: AssertUnwindSafe<F>) -> Result<Executed, Failure>
where
    F: FnOnce() -> anyhow::Result<Executed>,
{
    match catch_unwind(body) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(error)) => Err(Failure {
            message: error.to_string(),
            // The alternate debug form renders the full anyhow chain.
            trace: format!("{error:?}"),
        }),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "plugin panicked".to_string());
            Err(Failure {
                message: format!("panic: {message}"),
                trace: std::backtrace::Backtrace::force_capture().to_string(),
            })
        }
    }
}
