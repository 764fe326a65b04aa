// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildloop",
    version,
    about = "Continuous-integration server: schedules and runs project builds.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Buildloop.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run one poll cycle per project (building if due), then exit.
    #[arg(long)]
    pub once: bool,

    /// Only schedule this project; all others are ignored.
    #[arg(long, value_name = "NAME")]
    pub project: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print projects/triggers/tasks, but don't execute.
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

impl CliArgs {
    /// Explicit `--config` path, or the default config file.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::default_config_path)
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
