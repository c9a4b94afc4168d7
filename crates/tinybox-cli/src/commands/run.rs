//! `tinybox run` — Create a container and run a program in it.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tinybox_common::config::{ContainerOptions, InvocationMode, Settings};
use tinybox_common::types::{CgroupOptions, NamespaceSet};
use tinybox_runtime::container::Container;
use tinybox_runtime::process::{self, Launch, ProcessRole};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Container name; also names its control directory.
    #[arg(long)]
    pub name: String,

    /// Root filesystem directory.
    #[arg(long)]
    pub rootfs: PathBuf,

    /// Hostname inside the container (defaults to the name).
    #[arg(long)]
    pub hostname: Option<String>,

    /// Memory limit, in bytes or with a KiB/MiB/GiB/KB/MB/GB suffix.
    #[arg(short, long, value_parser = parse_memory, allow_hyphen_values = true)]
    pub memory: Option<i64>,

    /// CPU shares (relative weight).
    #[arg(long)]
    pub cpu_shares: Option<u64>,

    /// CPUs to pin the container to, e.g. `0-1,3`.
    #[arg(long)]
    pub cpuset: Option<String>,

    /// Also create a user namespace mapping root to the caller.
    #[arg(long)]
    pub userns: bool,

    /// Share the host network stack.
    #[arg(long)]
    pub no_net: bool,

    /// Return once the container has started instead of waiting for it.
    #[arg(short, long)]
    pub detach: bool,

    /// Program to run followed by its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn options(&self) -> ContainerOptions {
        ContainerOptions {
            name: self.name.clone(),
            rootfs: self.rootfs.clone(),
            path: self.command.first().cloned().unwrap_or_default(),
            argv: self.command.clone(),
            hostname: self.hostname.clone().unwrap_or_else(|| self.name.clone()),
            cgroup: CgroupOptions {
                memory: self.memory,
                cpu_shares: self.cpu_shares,
                cpuset: self.cpuset.clone(),
            },
            namespaces: NamespaceSet {
                network: !self.no_net,
                user: self.userns,
                ..NamespaceSet::default()
            },
            mode: InvocationMode::Create,
        }
    }
}

/// Executes the `run` command.
///
/// Holds the container lock for as long as this process runs, so a second
/// `run` with the same name fails fast instead of racing on the pipe.
///
/// # Errors
///
/// Returns an error if construction, validation, or the handoff fails.
pub fn execute(args: RunArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut container = Container::new(settings, args.options())?;
    let _lock = container
        .lock()
        .with_context(|| format!("container {} is busy", args.name))?;
    container.select_role(ProcessRole::Master, settings)?;

    let Launch::Spawned { pid } = container.run()? else {
        anyhow::bail!("master role did not spawn an init process");
    };
    println!("{} started (pid {pid})", args.name);

    if args.detach {
        return Ok(());
    }
    let code = process::wait_for_exit(pid)?;
    tracing::info!(name = %args.name, code, "container exited");
    std::process::exit(code);
}

/// Parses memory strings like "128MiB", "256MB", "1GiB" into bytes.
///
/// Negative values parse so that limit validation can reject them.
#[allow(clippy::option_if_let_else)]
fn parse_memory(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("GiB") {
        (n, 1 << 30)
    } else if let Some(n) = s.strip_suffix("GB") {
        (n, 1_000_000_000)
    } else if let Some(n) = s.strip_suffix("MiB") {
        (n, 1 << 20)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix("KiB") {
        (n, 1 << 10)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1000)
    } else {
        (s, 1)
    };
    num_str
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid memory size: {s}"))
}
