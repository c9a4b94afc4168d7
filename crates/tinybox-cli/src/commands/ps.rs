//! `tinybox ps` — List containers.

use clap::Args;
use tinybox_common::config::Settings;
use tinybox_common::types::ContainerState;
use tinybox_runtime::state;

use crate::output::format_cpu_time;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all containers (including stopped).
    #[arg(short, long)]
    pub all: bool,

    /// Print the persisted records as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the base directory cannot be read.
pub fn execute(args: &PsArgs, settings: &Settings) -> anyhow::Result<()> {
    let containers: Vec<_> = state::list(settings)?
        .into_iter()
        .filter(|c| args.all || c.state == ContainerState::Running)
        .collect();

    if args.json {
        let records: Vec<_> = containers.iter().map(|c| &c.record).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<8} {:<10} {:<30}",
        "NAME", "STATE", "PID", "CPU", "COMMAND"
    );
    for c in &containers {
        println!(
            "{:<20} {:<10} {:<8} {:<10} {:<30}",
            c.record.name,
            c.state,
            c.record.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            c.cpu_ns.map_or_else(|| "-".to_string(), format_cpu_time),
            c.record.exec_argv().join(" "),
        );
    }

    Ok(())
}
