//! `tinybox exec` — Run a command inside a running container.

use clap::Args;
use tinybox_common::config::{ContainerOptions, InvocationMode, Settings};
use tinybox_runtime::container::Container;
use tinybox_runtime::process::{Launch, ProcessRole};

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// Re-enters the container from its persisted state, joins its namespaces,
/// and exits with the command's exit code.
///
/// # Errors
///
/// Returns an error if the container is unknown or namespace joining fails.
pub fn execute(args: ExecArgs, settings: &Settings) -> anyhow::Result<()> {
    let options = ContainerOptions {
        name: args.container,
        path: args.command.first().cloned().unwrap_or_default(),
        argv: args.command,
        mode: InvocationMode::ReExec,
        ..ContainerOptions::default()
    };
    let mut container = Container::new(settings, options)?;
    container.select_role(ProcessRole::Setns, settings)?;

    match container.run()? {
        Launch::Exited { code } => std::process::exit(code),
        other => anyhow::bail!("setns role returned {other:?}"),
    }
}
