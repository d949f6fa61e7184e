// SPDX-License-Identifier: Apache-2.0

//! Converter republishing pre-existing SARIF files as scan targets.
//!
//! CI pipelines often already have SARIF artifacts lying around (a previous
//! tool stage, a vendor export). This converter walks a directory for
//! `*.sarif` / `*.sarif.json` files so downstream scanners that ingest
//! SARIF see them as targets.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ExtraValue, PluginConfig};
use crate::context::ExecutionContext;
use crate::plugin::descriptor::Registration;
use crate::plugin::{Converter, Plugin, PluginInstance, PluginKind};

/// Converter collecting existing SARIF files under a directory.
#[derive(Default)]
pub struct SarifFileConverter {
    config: PluginConfig,
}

impl SarifFileConverter {
    fn search_dir(&self, ctx: &ExecutionContext) -> PathBuf {
        self.config
            .extra("dir")
            .and_then(ExtraValue::as_str)
            .map_or_else(|| ctx.source_dir.clone(), PathBuf::from)
    }
}

fn is_sarif_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".sarif") || name.ends_with(".sarif.json")
}

fn collect_sarif_files(dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sarif_files(&path, found)?;
        } else if is_sarif_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

impl Plugin for SarifFileConverter {
    fn configure(&mut self, config: &PluginConfig) {
        self.config = self.config.merged_with(config);
    }
}

impl Converter for SarifFileConverter {
    fn convert(&mut self, ctx: &ExecutionContext) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.search_dir(ctx);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "sarif search directory missing, nothing converted");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        collect_sarif_files(&dir, &mut found)?;
        found.sort();
        debug!(count = found.len(), dir = %dir.display(), "sarif files collected");
        Ok(found)
    }
}

/// Registration for the SARIF file converter.
#[must_use]
pub fn registration() -> Registration {
    Registration {
        kind: PluginKind::Converter,
        name: "sarif-file",
        module_path: module_path!(),
        factory: || PluginInstance::Converter(Box::<SarifFileConverter>::default()),
    }
}
