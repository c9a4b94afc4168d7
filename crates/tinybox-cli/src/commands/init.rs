//! `tinybox init` — Entry point of the re-executed container init process.

use clap::Args;
use tinybox_common::config::{ContainerOptions, Settings};
use tinybox_runtime::container::Container;
use tinybox_runtime::process::ProcessRole;

/// Arguments for the hidden `init` command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Name of the container being started.
    #[arg(long)]
    pub name: String,
}

/// Executes the `init` command.
///
/// Waits for the master's record on the pipe, finishes isolation, and execs
/// the container program. Only returns if one of those steps fails.
///
/// # Errors
///
/// Returns the error of the failed step.
pub fn execute(args: InitArgs, settings: &Settings) -> anyhow::Result<()> {
    let options = ContainerOptions {
        name: args.name,
        ..ContainerOptions::default()
    };
    let mut container = Container::new(settings, options)?;
    container.select_role(ProcessRole::Init, settings)?;
    let launch = container.run()?;
    anyhow::bail!("init returned without exec: {launch:?}")
}
