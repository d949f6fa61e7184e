// SPDX-License-Identifier: Apache-2.0

//! CLI-specific error formatting with user-friendly hints.
//!
//! Downcasts `anyhow::Error` to `MusterError` and adds actionable hints;
//! the library keeps structured error data, this layer owns presentation.

use std::fmt::Write;

use anyhow::Error;
use muster_core::{MusterError, ProvisionError};

/// Formats an error for CLI display with helpful hints.
///
/// If the error is not a `MusterError`, returns the original error chain.
#[must_use]
pub fn format_error(error: &Error) -> String {
    if let Some(muster_err) = error.downcast_ref::<MusterError>() {
        match muster_err {
            MusterError::Configuration { .. } => format!(
                "{muster_err}\n\nTip: Check your config file at {}",
                muster_core::config_file_path().display()
            ),
            MusterError::Provision(provision) => format_provision_error(provision),
            _ => muster_err.to_string(),
        }
    } else if let Some(provision) = error.downcast_ref::<ProvisionError>() {
        format_provision_error(provision)
    } else {
        format!("{error:#}")
    }
}

fn format_provision_error(error: &ProvisionError) -> String {
    let mut msg = error.to_string();
    match error {
        ProvisionError::Timeout { .. } => {
            let _ = write!(
                msg,
                "\n\nTip: Raise `tools.install_timeout_seconds` or pre-install the tool."
            );
        }
        ProvisionError::NonZeroExit { .. } => {
            let _ = write!(
                msg,
                "\n\nTip: Re-run the shown installer command manually to see the full output."
            );
        }
        ProvisionError::Unexpected { .. } => {
            let _ = write!(
                msg,
                "\n\nTip: Check that the configured package manager is installed and on PATH."
            );
        }
    }
    msg
}
