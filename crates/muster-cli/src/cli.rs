// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for Muster.
//!
//! Uses clap's derive API for declarative CLI parsing with hierarchical
//! noun-verb subcommands.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for CLI results.
#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with colors (default)
    #[default]
    Text,
    /// JSON output for programmatic consumption
    Json,
}

/// Global output configuration passed to commands.
#[derive(Clone)]
pub struct OutputContext {
    /// Output format (text, json)
    pub format: OutputFormat,
    /// Suppress non-essential output (spinners, progress)
    pub quiet: bool,
    /// Enable verbose output
    pub verbose: bool,
    /// Whether stdout is a terminal (TTY)
    pub is_tty: bool,
}

impl OutputContext {
    /// Creates an `OutputContext` from CLI arguments.
    #[must_use]
    pub fn from_cli(format: OutputFormat, quiet: bool, verbose: bool) -> Self {
        Self {
            format,
            quiet,
            verbose,
            is_tty: std::io::stdout().is_terminal(),
        }
    }

    /// Returns true if interactive elements (spinners, colors) should be shown.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.is_tty && !self.quiet && self.format == OutputFormat::Text
    }
}

/// Muster - orchestrated multi-tool security scanning.
///
/// Coordinates converter, scanner and reporter plugins that each wrap an
/// external security tool, and merges their reports into one SARIF bundle.
#[derive(Parser)]
#[command(name = "muster")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Output format (text, json)
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Suppress non-essential output (spinners, progress)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug-level logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to an explicit config file (default: ~/.config/muster/muster.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all network installs; rely on pre-installed tools only
    #[arg(long, global = true)]
    pub offline: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured plugins against a source tree
    Scan {
        /// Source tree to scan
        #[arg(long, default_value = ".")]
        source: PathBuf,

        /// Directory receiving reports (default: <source>/.muster/reports)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Scratch directory (default: <source>/.muster/work)
        #[arg(long)]
        work: Option<PathBuf>,

        /// Comma-separated scanner names to run (default: all enabled)
        #[arg(long, value_delimiter = ',')]
        scanners: Vec<String>,
    },

    /// List registered plugins and their configuration binding
    Plugins {
        /// Restrict the listing to one plugin kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Inspect or install the external tools plugins depend on
    #[command(subcommand)]
    Tools(ToolsCommand),

    /// Generate shell completions
    #[command(subcommand)]
    Completion(CompletionCommand),
}

/// Plugin kind filter for `muster plugins`.
#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    /// Converter plugins
    Converter,
    /// Scanner plugins
    Scanner,
    /// Reporter plugins
    Reporter,
}

impl From<KindArg> for muster_core::PluginKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Converter => Self::Converter,
            KindArg::Scanner => Self::Scanner,
            KindArg::Reporter => Self::Reporter,
        }
    }
}

/// Tool provisioning commands.
#[derive(Subcommand)]
pub enum ToolsCommand {
    /// Show the provisioning state of a tool
    Status {
        /// Tool (package) name
        name: String,
    },
    /// Install a tool through the configured package manager
    Install {
        /// Tool (package) name
        name: String,

        /// Version constraint appended verbatim (e.g. "==1.7.5")
        #[arg(long)]
        version: Option<String>,
    },
}

/// Completion commands.
#[derive(Subcommand)]
pub enum CompletionCommand {
    /// Print a completion script to stdout
    Generate {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
