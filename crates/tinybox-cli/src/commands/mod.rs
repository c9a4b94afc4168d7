//! CLI command definitions and dispatch.

pub mod exec;
pub mod init;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use clap::{Parser, Subcommand};
use tinybox_common::config::Settings;

/// tinybox — minimal container runtime.
#[derive(Parser, Debug)]
#[command(name = "tinybox", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a container and run a program in it.
    Run(run::RunArgs),
    /// Internal: become the init process of a freshly cloned container.
    #[command(hide = true)]
    Init(init::InitArgs),
    /// Run a command inside a running container's namespaces.
    Exec(exec::ExecArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container's control files and cgroups.
    Rm(rm::RmArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli, settings: &Settings) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run::execute(args, settings),
        Command::Init(args) => init::execute(args, settings),
        Command::Exec(args) => exec::execute(args, settings),
        Command::Ps(args) => ps::execute(&args, settings),
        Command::Stop(args) => stop::execute(&args, settings),
        Command::Rm(args) => rm::execute(&args, settings),
    }
}
