// SPDX-License-Identifier: Apache-2.0

//! Plugin registry.
//!
//! An explicit registration table: plugin modules hand their
//! [`Registration`] to [`PluginRegistry::register`] at engine startup, and
//! discovery binds each registration to its configuration. No namespace
//! walking, no runtime capability probing — a registration's factory type
//! already proved the right trait at compile time.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::AppConfig;

use super::PluginKind;
use super::descriptor::{PluginDescriptor, Registration};

/// Holds plugin registrations and binds them to configuration.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    registrations: Vec<Registration>,
}

impl PluginRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in plugins.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for registration in crate::plugins::builtin_registrations() {
            registry.register(registration);
        }
        registry
    }

    /// Add one registration to the table.
    ///
    /// Collisions are tolerated here and resolved at discovery time, where
    /// the first-registered name wins.
    pub fn register(&mut self, registration: Registration) {
        debug!(
            kind = %registration.kind,
            name = registration.name,
            module = registration.module_path,
            "registering plugin"
        );
        self.registrations.push(registration);
    }

    /// Number of registrations of a kind.
    #[must_use]
    pub fn count(&self, kind: PluginKind) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Discover every plugin of a kind, bound to its configuration.
    ///
    /// Per-plugin configuration is located by normalized-name matching
    /// against the config document; an explicit `name` override in the
    /// config replaces the registration-derived name. `enabled` defaults to
    /// true unless the config says otherwise. On a name collision the
    /// first-registered plugin wins. Deterministic: calling twice with the
    /// same inputs yields an identical descriptor set.
    #[must_use]
    pub fn discover(
        &self,
        kind: PluginKind,
        config: &AppConfig,
    ) -> BTreeMap<String, PluginDescriptor> {
        let mut descriptors = BTreeMap::new();

        for registration in self.registrations.iter().filter(|r| r.kind == kind) {
            let bound = config
                .plugin_override(registration.name)
                .cloned()
                .unwrap_or_default();
            let descriptor = PluginDescriptor::new(registration, bound);

            if descriptors.contains_key(descriptor.name()) {
                debug!(
                    kind = %kind,
                    name = descriptor.name(),
                    module = registration.module_path,
                    "duplicate plugin name, keeping first registration"
                );
                continue;
            }
            descriptors.insert(descriptor.name().to_string(), descriptor);
        }

        descriptors
    }

    /// One descriptor by kind and name.
    ///
    /// Unknown names log a warning and return `None` rather than failing
    /// the caller.
    #[must_use]
    pub fn get(&self, kind: PluginKind, name: &str, config: &AppConfig) -> Option<PluginDescriptor> {
        let descriptors = self.discover(kind, config);
        let found = descriptors.get(name).cloned();
        if found.is_none() {
            warn!(kind = %kind, name, "unknown plugin requested");
        }
        found
    }
}
