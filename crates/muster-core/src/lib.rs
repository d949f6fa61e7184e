// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # Muster Core
//!
//! Core library for the Muster CLI - plugin orchestration for external
//! security scanners.
//!
//! This crate provides reusable components for:
//! - Plugin registration, discovery and configuration binding
//! - The per-plugin execution lifecycle (configure → validate → run)
//! - External tool provisioning (install with retry, offline fallback,
//!   pre-installed detection)
//! - Synchronous subprocess execution with output-capture policies
//! - Normalizing and merging tool reports into one canonical bundle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use muster_core::{AppConfig, ExecutionContext, PluginRegistry, ScanEngine};
//! use anyhow::Result;
//!
//! # fn example() -> Result<()> {
//! let config = muster_core::load_config(None)?;
//!
//! let context = ExecutionContext::builder()
//!     .source_dir("/srv/project".into())
//!     .output_dir("/srv/project/.muster/out".into())
//!     .work_dir("/srv/project/.muster/work".into())
//!     .config(config)
//!     .build()
//!     .into_shared()?;
//!
//! let mut engine = ScanEngine::new(PluginRegistry::with_builtins(), context);
//! let report = engine.run();
//! println!("{} findings", report.bundle.finding_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration loading and paths
//! - [`context`] - The shared per-run execution context
//! - [`engine`] - The sequential scan orchestrator
//! - [`error`] - Error types
//! - [`exec`] - Blocking subprocess wrapper
//! - [`plugin`] - Plugin contracts, registry and lifecycle
//! - [`plugins`] - Built-in plugins
//! - [`provision`] - External tool provisioning
//! - [`report`] - Canonical report model, merging, parsing

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exec;
pub mod plugin;
pub mod plugins;
pub mod provision;
pub mod report;

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{MusterError, ParseError, ProvisionError};

/// Convenience Result type for Muster operations.
///
/// This is equivalent to `std::result::Result<T, MusterError>`.
pub type Result<T> = std::result::Result<T, MusterError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    AppConfig, ExtraValue, PluginConfig, RetrySettings, ScanConfig, ToolsConfig, config_dir,
    config_file_path, load_config, normalize_name, offline_from_env, rules_cache_dir,
};

// ============================================================================
// Execution Context
// ============================================================================

pub use context::{ExecutionContext, TargetKind};

// ============================================================================
// Plugins
// ============================================================================

pub use plugin::descriptor::{PluginDescriptor, Registration};
pub use plugin::lifecycle::{
    LifecycleState, PluginLifecycle, PluginOutput, PluginRunResult, RunStatus,
};
pub use plugin::registry::PluginRegistry;
pub use plugin::{Converter, Plugin, PluginInstance, PluginKind, Reporter, ScanOutcome, Scanner};

// ============================================================================
// Orchestration
// ============================================================================

pub use engine::{EngineRunReport, ScanEngine};

// ============================================================================
// Provisioning
// ============================================================================

pub use provision::{
    InstallMethod, InstallationState, PreferredSource, ProvisionerSettings, RetryConfig,
    ToolDependencySpec, ToolProvisioner,
};

// ============================================================================
// Subprocess Execution
// ============================================================================

pub use exec::{CommandOutput, CommandRequest, ExecutionRunner, OutputPolicy, resolve_executable};

// ============================================================================
// Reports
// ============================================================================

pub use report::merge::{MergeOptions, merge_bundle, merge_run, normalize_location};
pub use report::parse::{ReportAdapter, SarifAdapter, parse_or_raw};
pub use report::{Finding, Invocation, Level, Location, Message, ReportBundle, Rule, Run};
