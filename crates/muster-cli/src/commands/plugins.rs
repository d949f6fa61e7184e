// SPDX-License-Identifier: Apache-2.0

//! The `muster plugins` command.

use muster_core::{AppConfig, PluginDescriptor, PluginKind, PluginRegistry};

use crate::cli::{KindArg, OutputContext};
use crate::output;

/// List registered plugins with their configuration binding.
pub fn run(kind: Option<KindArg>, ctx: &OutputContext, config: &AppConfig) {
    let registry = PluginRegistry::with_builtins();

    let kinds: Vec<PluginKind> = match kind {
        Some(kind) => vec![kind.into()],
        None => vec![
            PluginKind::Converter,
            PluginKind::Scanner,
            PluginKind::Reporter,
        ],
    };

    let descriptors: Vec<PluginDescriptor> = kinds
        .into_iter()
        .flat_map(|kind| registry.discover(kind, config).into_values())
        .collect();

    output::render_plugins(&descriptors, ctx);
}
