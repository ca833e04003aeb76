//! reposync: keep a working copy in sync with its remote, then run its playbook.
//!
//! # Usage
//!
//! ```text
//! reposync pull <source> <target> [--branch <ref>] [--dry-run] [--timeout <secs>] [--verify-remote]
//! reposync apply <source> <target> --entry-point <file> [--branch <ref>] [--tags a,b] [--check] [--json]
//! reposync module <args-file>
//! ```
//!
//! Global flags: `--config <path>`, `--log-file <path>`, `-v` (repeatable).

mod commands;
mod log_rotation;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use commands::{apply::ApplyArgs, module::ModuleArgs, pull::PullArgs};
use logging::LogConfig;
use reposync_core::{settings, Settings};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "reposync",
    version,
    about = "Idempotently clone or update a git working copy and run its automation entry point",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Settings file (default: $XDG_CONFIG_HOME/reposync/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log file; overrides `log_file` from the settings.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Do not write a log file, log to the console only.
    #[arg(long, global = true, conflicts_with = "log_file")]
    no_log_file: bool,

    /// Console verbosity: -v for debug, -vv for trace.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone the repository if absent, otherwise check out the branch and pull.
    Pull(PullArgs),

    /// Synchronize the repository, then run a playbook from it.
    Apply(ApplyArgs),

    /// Run as an automation module: read JSON arguments, print a JSON result.
    Module(ModuleArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = settings::load(cli.global.config.as_deref());

    let file = if cli.global.no_log_file {
        None
    } else {
        cli.global.log_file.clone().or_else(|| match &loaded {
            Ok(settings) => settings.log_file.clone(),
            Err(_) => Settings::default().log_file,
        })
    };
    logging::init(&LogConfig::new(file, cli.global.verbose));

    let settings = match loaded {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("{err}");
            if let Commands::Module(_) = cli.command {
                return commands::module::print_failure(&err.to_string());
            }
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli.command, &settings) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands, settings: &Settings) -> Result<ExitCode> {
    match command {
        Commands::Pull(args) => args.run(settings).context("pull failed"),
        Commands::Apply(args) => args.run(settings).context("apply failed"),
        Commands::Module(args) => args.run(settings),
    }
}
