//! Keel CLI: the command-line interface for the keel build engine.
//!
//! Provides `keel build` for production builds, `keel dev` for the watching
//! development loop, and `keel cache clean` / `keel cache gc` for managing
//! the incremental cache.

#![warn(missing_docs)]

mod build;
mod cache;
mod dev;
mod pipeline;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

/// Keel: a module-graph build engine with incremental rebuilds.
#[derive(Parser, Debug)]
#[command(name = "keel", version, about = "Keel build engine")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `keel.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project for production.
    Build(BuildArgs),
    /// Build once, then rebuild on every file change.
    Dev(DevArgs),
    /// Manage the incremental cache.
    Cache {
        /// What to do with the cache.
        #[command(subcommand)]
        action: CacheCommand,
    },
}

/// Arguments for the `keel build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Output directory (overrides `build.outDir`).
    #[arg(short, long)]
    pub out_dir: Option<String>,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `keel dev` subcommand.
#[derive(Parser, Debug)]
pub struct DevArgs {
    /// Output format for startup diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Build once and exit without watching.
    #[arg(long)]
    pub once: bool,
}

/// Cache maintenance actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Delete the cache directory.
    Clean,
    /// Delete compiled units no cache entry references.
    Gc,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output, one object per line.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// The most detailed log level the subscriber lets through.
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => atty_is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(global.log_level())
        .with_ansi(color)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Dev(ref args) => dev::run(args, &global),
        Command::Cache { action } => cache::run(action, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Rough terminal detection: a dumb or missing `TERM` means no color.
fn atty_is_terminal() -> bool {
    std::env::var("TERM").is_ok_and(|term| term != "dumb")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["keel", "build"]);
        match cli.command {
            Command::Build(args) => {
                assert!(args.out_dir.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_args() {
        let cli = Cli::parse_from(["keel", "build", "--out-dir", "dist", "--format", "json"]);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.out_dir.as_deref(), Some("dist"));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_dev_once() {
        let cli = Cli::parse_from(["keel", "dev", "--once"]);
        match cli.command {
            Command::Dev(args) => assert!(args.once),
            _ => panic!("expected Dev command"),
        }
    }

    #[test]
    fn parse_cache_actions() {
        let cli = Cli::parse_from(["keel", "cache", "clean"]);
        match cli.command {
            Command::Cache { action } => assert_eq!(action, CacheCommand::Clean),
            _ => panic!("expected Cache command"),
        }
        let cli = Cli::parse_from(["keel", "cache", "gc"]);
        match cli.command {
            Command::Cache { action } => assert_eq!(action, CacheCommand::Gc),
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cache_requires_an_action() {
        assert!(Cli::try_parse_from(["keel", "cache"]).is_err());
    }

    #[test]
    fn global_flags_anywhere() {
        let cli = Cli::parse_from([
            "keel",
            "build",
            "--quiet",
            "--config",
            "app/keel.toml",
            "--color",
            "never",
        ]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("app/keel.toml"));
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn log_level_follows_flags() {
        let mut global = GlobalArgs {
            quiet: false,
            verbose: false,
            color: false,
            config: None,
        };
        assert_eq!(global.log_level(), Level::WARN);
        global.verbose = true;
        assert_eq!(global.log_level(), Level::DEBUG);
        global.quiet = true;
        assert_eq!(global.log_level(), Level::ERROR);
    }
}
