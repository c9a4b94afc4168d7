//! `tinybox rm` — Remove a stopped container.

use clap::Args;
use tinybox_common::config::Settings;
use tinybox_runtime::container;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container names.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns the first removal error; later containers are not attempted.
pub fn execute(args: &RmArgs, settings: &Settings) -> anyhow::Result<()> {
    for name in &args.containers {
        container::destroy(settings, name)?;
        println!("{name}");
    }
    Ok(())
}
