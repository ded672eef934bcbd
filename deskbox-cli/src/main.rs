//! CLI for the deskbox desktop sandbox engine.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod sandbox;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use deskbox::{Layout, PathState};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

#[derive(Parser)]
#[command(
    name = "deskbox",
    version,
    about = "Container specifications for sandboxed desktop applications"
)]
struct Cli {
    /// Log assembly steps to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble the container spec for a sandbox and print it as JSON.
    #[command(visible_alias = "run")]
    Spec(sandbox::SpecArgs),

    /// Print the image build options for a sandbox as JSON.
    #[command(visible_alias = "build")]
    BuildOptions(sandbox::BuildArgs),

    /// Print a sample sandbox configuration with every field set.
    #[command(visible_alias = "scaffold")]
    Sample,

    /// Create the configuration and storage directories.
    Setup,

    /// Report whether the configuration and storage directories exist.
    Check {
        /// Output format.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for report commands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("deskbox: logging disabled: {e}");
    }
    if let Err(e) = cli.dispatch() {
        eprintln!("deskbox: {e:#}");
        std::process::exit(1);
    }
}

/// Installs a stderr subscriber. `RUST_LOG` wins unless `--verbose` is given.
///
/// Fails if a global subscriber is already installed.
fn init_tracing(verbose: bool) -> Result<(), TryInitError> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Spec(args) => args.run(&layout()?),
            Command::BuildOptions(args) => args.run(&layout()?),
            Command::Sample => {
                print!("{}", deskbox::scaffold()?);
                Ok(())
            }
            Command::Setup => setup(),
            Command::Check { format } => check(format),
            Command::Completion { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Self::command(),
                    "deskbox",
                    &mut std::io::stdout(),
                );
                Ok(())
            }
        }
    }
}

fn layout() -> Result<Layout> {
    Layout::discover().context("cannot locate deskbox directories")
}

fn setup() -> Result<()> {
    let layout = layout()?;
    layout.setup()?;
    println!("{}", layout.config_dir().display());
    println!("{}", layout.storage_dir().display());
    Ok(())
}

fn check(format: OutputFormat) -> Result<()> {
    let report = layout()?.check();

    if matches!(format, OutputFormat::Json) {
        let rows: Vec<_> = report
            .iter()
            .map(|c| {
                serde_json::json!({
                    "label": c.label,
                    "path": c.path,
                    "state": state_name(c.state),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for c in &report {
        let state = match c.state {
            PathState::Ok => state_name(c.state).green(),
            PathState::Missing => state_name(c.state).yellow(),
            _ => state_name(c.state).red(),
        };
        println!("{:<24} {:<10} {}", c.label, state, c.path.display());
    }
    if report.iter().any(|c| c.state != PathState::Ok) {
        println!("\nrun `{}` to create missing paths", "deskbox setup".bold());
    }
    Ok(())
}

const fn state_name(state: PathState) -> &'static str {
    match state {
        PathState::Ok => "ok",
        PathState::Missing => "missing",
        _ => "wrong type",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_subscriber_is_reported() {
        init_tracing(false).ok();
        assert!(init_tracing(true).is_err());
    }
}
