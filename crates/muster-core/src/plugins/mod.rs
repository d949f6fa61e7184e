// SPDX-License-Identifier: Apache-2.0

//! Built-in plugins.
//!
//! The minimum concrete set a working binary needs, all going through the
//! generic machinery: a fully config-driven external-command scanner, a
//! converter that republishes existing SARIF files as scan targets, and a
//! reporter that serializes the merged bundle to disk. Anything
//! tool-specific (argument mapping per scanner) belongs in out-of-tree
//! plugins, not here.

pub mod command;
pub mod json_file;
pub mod sarif_file;

use crate::plugin::descriptor::Registration;

/// Registrations for every built-in plugin.
#[must_use]
pub fn builtin_registrations() -> Vec<Registration> {
    vec![
        command::registration(),
        sarif_file::registration(),
        json_file::registration(),
    ]
}
