//! The Sindri CLI client.
//!
//! Deploys circuit projects to Sindri, requests proofs for deployed circuits and manages the
//! stored credentials.
//!
//! ## Usage
//!
//! ```bash
//! sindri init my-circuit --name my-circuit
//! sindri login --api-key <key>
//! sindri lint
//! sindri deploy --tag v1
//! sindri proof create --input input.json --tag v1
//! ```

use std::{io::IsTerminal, path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sindri::SINDRI_CONFIG_PATH_ENV;
use sindri_config::Config;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    Context, deploy::DeployArgs, init::InitArgs, lint::LintArgs, login::LoginArgs,
    proof::ProofCommand,
};

mod commands;

/// Command-line interface for Sindri.
#[derive(Parser, Debug)]
#[command(name = "sindri", version)]
#[command(about = "The Sindri CLI client.", long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Disable all logging aside from direct command outputs for programmatic consumption.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path, defaults to the platform config directory.
    #[arg(long, global = true, env = SINDRI_CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy the current Sindri project.
    Deploy(DeployArgs),
    /// Initialize a new Sindri project.
    Init(InitArgs),
    /// Lint the current Sindri project for potential issues.
    Lint(LintArgs),
    /// Authorize the client.
    Login(LoginArgs),
    /// Remove the current client authorization credentials.
    Logout,
    /// Commands related to proofs for the current circuit.
    #[command(subcommand)]
    Proof(ProofCommand),
    /// Display the currently authorized team name.
    Whoami,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug && cli.quiet {
        eprintln!("You cannot specify both the `--debug` and `--quiet` arguments.");
        return ExitCode::FAILURE;
    }
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so that command outputs on stdout stay machine readable. `RUST_LOG` takes
/// precedence over `--debug` and `--quiet`.
fn init_tracing(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "off"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path().context("Failed to locate the config file")?,
    };
    debug!(?config_path, "Using config file");
    let ctx = Context::load(config_path);

    match cli.command {
        Command::Deploy(args) => commands::deploy::run(args, &ctx).await,
        Command::Init(args) => commands::init::run(args),
        Command::Lint(args) => commands::lint::run(args),
        Command::Login(args) => commands::login::run(args, ctx).await,
        Command::Logout => commands::logout::run(ctx),
        Command::Proof(ProofCommand::Create(args)) => commands::proof::create(args, &ctx).await,
        Command::Whoami => commands::whoami::run(&ctx),
    }
}
