// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cmdpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cmdpipe",
    version,
    about = "Run steps of shell commands, serially or concurrently.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the step file (TOML).
    ///
    /// Default: `Cmdpipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Cmdpipe.toml")]
    pub config: String,

    /// Run only the step with this name.
    #[arg(long, value_name = "NAME")]
    pub step: Option<String>,

    /// Run `cmds` steps one command at a time.
    #[arg(long)]
    pub sequential: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CMDPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the planned commands, but don't run anything.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["cmdpipe"]).unwrap();
        assert_eq!(args.config, "Cmdpipe.toml");
        assert!(args.step.is_none());
        assert!(!args.sequential);
        assert!(!args.dry_run);
    }

    #[test]
    fn all_flags() {
        let args = CliArgs::try_parse_from([
            "cmdpipe",
            "--config",
            "ci/steps.toml",
            "--step",
            "build",
            "--sequential",
            "--dry-run",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "ci/steps.toml");
        assert_eq!(args.step.as_deref(), Some("build"));
        assert!(args.sequential && args.dry_run);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
