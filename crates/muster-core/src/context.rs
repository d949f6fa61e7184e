// SPDX-License-Identifier: Apache-2.0

//! Shared execution context for a scan run.
//!
//! Constructed once per run and handed to every plugin instance behind an
//! `Arc`; nothing in it is mutated after construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bon::Builder;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::MusterError;

/// Kind of target a plugin is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A directory tree (the usual scan root).
    Directory,
    /// A single file, typically a converter-produced artifact.
    File,
}

/// Read-only context shared across every plugin in one run.
#[derive(Debug, Builder)]
pub struct ExecutionContext {
    /// Root of the source tree being scanned.
    pub source_dir: PathBuf,
    /// Directory receiving reports and reporter output.
    pub output_dir: PathBuf,
    /// Scratch directory for per-plugin intermediate files.
    pub work_dir: PathBuf,
    /// Resolved global configuration.
    pub config: AppConfig,
    /// Correlation id stamped into logs and invocation records.
    #[builder(default = Uuid::new_v4())]
    pub run_id: Uuid,
}

impl ExecutionContext {
    /// Directory where a named plugin writes its raw results.
    #[must_use]
    pub fn results_dir_for(&self, plugin_name: &str) -> PathBuf {
        self.work_dir
            .join(&self.config.scan.results_dir)
            .join(plugin_name)
    }

    /// Validate the context directories and wrap in an `Arc` for sharing.
    ///
    /// # Errors
    ///
    /// Returns [`MusterError::Configuration`] when the source directory does
    /// not exist, and [`MusterError::Io`] when the output or work directory
    /// cannot be created.
    pub fn into_shared(self) -> Result<Arc<Self>, MusterError> {
        if !self.source_dir.exists() {
            return Err(MusterError::configuration(format!(
                "source directory does not exist: {}",
                self.source_dir.display()
            )));
        }
        for dir in [&self.output_dir, &self.work_dir] {
            create_dir_all(dir)?;
        }
        Ok(Arc::new(self))
    }
}

pub(crate) fn create_dir_all(path: &Path) -> Result<(), MusterError> {
    std::fs::create_dir_all(path).map_err(|source| MusterError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_shared_requires_source_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::builder()
            .source_dir(tmp.path().join("missing"))
            .output_dir(tmp.path().join("out"))
            .work_dir(tmp.path().join("work"))
            .config(AppConfig::default())
            .build();

        let err = ctx.into_shared().unwrap_err();
        assert!(matches!(err, MusterError::Configuration { .. }));
    }

    #[test]
    fn test_into_shared_creates_output_and_work_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::builder()
            .source_dir(tmp.path().to_path_buf())
            .output_dir(tmp.path().join("out"))
            .work_dir(tmp.path().join("work"))
            .config(AppConfig::default())
            .build();

        let shared = ctx.into_shared().unwrap();
        assert!(shared.output_dir.is_dir());
        assert!(shared.work_dir.is_dir());
    }

    #[test]
    fn test_results_dir_for_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::builder()
            .source_dir(tmp.path().to_path_buf())
            .output_dir(tmp.path().join("out"))
            .work_dir(tmp.path().join("work"))
            .config(AppConfig::default())
            .build();

        let dir = ctx.results_dir_for("bandit");
        assert!(dir.ends_with("results/bandit"));
    }
}
