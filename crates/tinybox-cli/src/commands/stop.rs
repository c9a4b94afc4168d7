//! `tinybox stop` — Stop a running container.

use std::time::Duration;

use clap::Args;
use tinybox_common::config::{ContainerOptions, InvocationMode, Settings};
use tinybox_runtime::container::Container;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,

    /// Seconds to wait after SIGTERM before sending SIGKILL.
    #[arg(short, long, default_value_t = 10)]
    pub grace: u64,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be signalled.
pub fn execute(args: &StopArgs, settings: &Settings) -> anyhow::Result<()> {
    let options = ContainerOptions {
        name: args.container.clone(),
        mode: InvocationMode::ReExec,
        ..ContainerOptions::default()
    };
    let container = Container::new(settings, options)?;
    container.stop(Duration::from_secs(args.grace))?;
    Ok(())
}
