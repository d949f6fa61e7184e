// SPDX-License-Identifier: Apache-2.0

//! Plugin descriptors: the registry record binding a registered plugin
//! implementation to its configuration.

use crate::config::PluginConfig;

use super::{PluginInstance, PluginKind};

/// Factory producing a fresh plugin instance.
pub type PluginFactory = fn() -> PluginInstance;

/// A plugin registration as declared by its module.
///
/// Static data only; the registry turns registrations into descriptors at
/// discovery time.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// Plugin kind.
    pub kind: PluginKind,
    /// Default name, replaced by an explicit config `name` override.
    pub name: &'static str,
    /// Source module, for diagnostics (`module_path!()` of the plugin).
    pub module_path: &'static str,
    /// Instance factory.
    pub factory: PluginFactory,
}

/// A discovered plugin bound to its configuration.
///
/// Created at discovery time; immutable thereafter.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    name: String,
    kind: PluginKind,
    enabled: bool,
    module_path: &'static str,
    config: PluginConfig,
    factory: PluginFactory,
}

impl PluginDescriptor {
    pub(crate) fn new(registration: &Registration, config: PluginConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| registration.name.to_string());
        Self {
            name,
            kind: registration.kind,
            enabled: config.is_enabled(),
            module_path: registration.module_path,
            config,
            factory: registration.factory,
        }
    }

    /// Effective plugin name (config override already applied).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin kind.
    #[must_use]
    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Whether the plugin participates in a run.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Source module the plugin was registered from.
    #[must_use]
    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    /// The configuration bound at discovery time.
    #[must_use]
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Create a fresh, configured instance of the plugin.
    #[must_use]
    pub fn instantiate(&self) -> PluginInstance {
        let mut instance = (self.factory)();
        instance.configure(&self.config);
        instance
    }
}
