// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `fanrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fanrun",
    version,
    about = "Run one command on many targets concurrently.",
    long_about = None
)]
pub struct CliArgs {
    /// Glob over target addresses, e.g. "/pool/*" ("**" crosses levels).
    #[arg(
        value_name = "PATTERN",
        conflicts_with = "all",
        required_unless_present = "all"
    )]
    pub pattern: Option<String>,

    /// Dispatch to every roster target (snapshot taken before dispatch).
    #[arg(long)]
    pub all: bool,

    /// Prefix every output line with the target address it came from.
    #[arg(long)]
    pub tag: bool,

    /// Force the scrub flag on the command descriptor: keep the command
    /// text out of logs and leave no terminated container records behind.
    #[arg(long)]
    pub scrub: bool,

    /// Path to the roster file (TOML).
    ///
    /// Default: `Fanrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Fanrun.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FANRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve targets and parse the command, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
