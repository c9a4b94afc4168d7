//! Process roles and the isolation sequence each one performs.
//!
//! A role is chosen once per invocation:
//! - **master** clones a child into new namespaces, confines it with cgroups,
//!   and hands it the container record;
//! - **init** receives the record inside the new namespaces, switches to the
//!   container root, and execs the target program;
//! - **setns** joins a running container's namespaces and runs a command.

use std::convert::Infallible;
use std::ffi::CString;
use std::fmt;
use std::path::Path;

use nix::sched::{CloneFlags, clone};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execv, execvp, fork};
use tinybox_common::constants::{APP_NAME, INIT_SUBCOMMAND, SELF_EXE};
use tinybox_common::error::{Result, TinyboxError};
use tinybox_common::types::ContainerRecord;
use tinybox_core::cgroup::CgroupOps;
use tinybox_core::namespace::join::NamespaceFiles;
use tinybox_core::namespace::user::{IdMap, write_id_maps};

use crate::container::Container;

/// Stack handed to `clone(2)` for the child before it execs.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Exit status reported by a forked child whose exec failed.
const EXEC_FAILED: i32 = 127;

/// The part a process plays in a container's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// Original controlling process.
    Master,
    /// First process inside the new namespaces.
    Init,
    /// Process joining an existing container.
    Setns,
}

impl ProcessRole {
    /// Maps a role name to a role. Unknown names select the master.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "init" => Self::Init,
            "setns" => Self::Setns,
            _ => Self::Master,
        }
    }

    /// Returns the role's name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Init => "init",
            Self::Setns => "setns",
        }
    }

    /// Runs this role's sequence against the container.
    ///
    /// `Init` only returns on failure; on success the process image is replaced.
    ///
    /// # Errors
    ///
    /// Returns the first error of the sequence; see each role for details.
    pub fn run(self, container: &mut Container) -> Result<Launch> {
        tracing::info!(role = self.name(), name = %container.name(), "running process role");
        match self {
            Self::Master => run_master(container),
            Self::Init => match run_init(container)? {},
            Self::Setns => run_setns(container),
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a role left behind when it returned control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// The master handed off to an init process with this host pid.
    Spawned {
        /// Host pid of the container's init process.
        pid: i32,
    },
    /// A joined command ran to completion.
    Exited {
        /// Exit code, or 128 + signal number.
        code: i32,
    },
}

/// Applies the cgroup controllers in order: memory, cpu, cpuacct, cpuset.
///
/// Stops at the first failure; controllers applied before it stay applied.
///
/// # Errors
///
/// Returns the failing controller's [`TinyboxError::Cgroup`].
pub fn apply_cgroups(cgroup: &dyn CgroupOps, record: &ContainerRecord) -> Result<()> {
    cgroup.memory(record)?;
    cgroup.cpu(record)?;
    cgroup.cpu_acct(record)?;
    cgroup.cpu_set(record)?;
    tracing::info!(name = %record.name, pid = ?record.pid, "cgroups applied");
    Ok(())
}

/// Blocks until the child `pid` terminates and returns its exit code.
///
/// # Errors
///
/// Returns [`TinyboxError::Process`] if `waitpid(2)` fails.
pub fn wait_for_exit(pid: i32) -> Result<i32> {
    let pid = Pid::from_raw(pid);
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(nix::errno::Errno::EINTR) => {}
            Err(e) => {
                return Err(TinyboxError::Process {
                    message: format!("waitpid({pid}) failed: {e}"),
                });
            }
        }
    }
}

fn run_master(container: &mut Container) -> Result<Launch> {
    let flags = container.namespace_ops()?.clone_flags(container.record());
    let child = spawn_init(container.name(), flags)?;
    container.record_mut().pid = Some(child.as_raw());
    tracing::info!(name = %container.name(), pid = child.as_raw(), ?flags, "init process cloned");

    if let Err(e) = hand_off(container, child) {
        rollback(container, child);
        return Err(e);
    }
    tracing::info!(name = %container.name(), pid = child.as_raw(), "container started");
    Ok(Launch::Spawned {
        pid: child.as_raw(),
    })
}

/// Everything the master does between clone and returning the pid.
fn hand_off(container: &Container, child: Pid) -> Result<()> {
    let record = container.record();
    if record.namespaces.user {
        let proc_dir = Path::new("/proc").join(child.as_raw().to_string());
        write_id_maps(
            &proc_dir,
            IdMap::root_to(nix::unistd::getuid().as_raw()),
            IdMap::root_to(nix::unistd::getgid().as_raw()),
        )?;
    }
    apply_cgroups(container.cgroup_ops()?, record)?;
    container.publish_state()?;
    container.persist()
}

/// Kills the half-started child and removes its cgroups. Failures here are
/// logged; the error that triggered the rollback is what the caller sees.
fn rollback(container: &Container, child: Pid) {
    tracing::warn!(name = %container.name(), pid = child.as_raw(), "handoff failed, rolling back");
    if let Err(e) = kill(child, Signal::SIGKILL) {
        tracing::warn!(pid = child.as_raw(), error = %e, "failed to kill init process");
    } else if let Err(e) = waitpid(child, None) {
        tracing::warn!(pid = child.as_raw(), error = %e, "failed to reap init process");
    }
    if let Ok(cgroup) = container.cgroup_ops() {
        if let Err(e) = cgroup.destroy() {
            tracing::warn!(error = %e, "cgroup rollback incomplete");
        }
    }
}

/// Clones a child into the requested namespaces that re-execs this binary
/// as `tinybox init --name <name>`.
fn spawn_init(name: &str, flags: CloneFlags) -> Result<Pid> {
    let exe = cstring(SELF_EXE)?;
    let args = [APP_NAME, INIT_SUBCOMMAND, "--name", name]
        .into_iter()
        .map(cstring)
        .collect::<Result<Vec<_>>>()?;

    let mut stack = vec![0_u8; CHILD_STACK_SIZE];
    let child_main = Box::new(|| {
        let _ = execv(&exe, &args);
        EXEC_FAILED as isize
    });

    // SAFETY: without CLONE_VM the child runs on a private copy of this
    // address space and only calls execv(2) on arguments built before the
    // clone, so no lock or allocator state is shared with the parent.
    let pid = unsafe { clone(child_main, &mut stack, flags, Some(Signal::SIGCHLD as libc::c_int)) }
        .map_err(|e| TinyboxError::Namespace {
            message: format!("clone with {flags:?} failed: {e}"),
        })?;
    Ok(pid)
}

fn run_init(container: &mut Container) -> Result<Infallible> {
    container.wait_for_state()?;
    let record = container.record();
    let rootfs = container.rootfs_ops()?;

    rootfs.mount(record)?;
    if let Err(e) = rootfs.chroot(record) {
        if let Err(undo) = rootfs.unmount(record) {
            tracing::warn!(error = %undo, "rootfs unmount after failed chroot");
        }
        return Err(e);
    }
    container.namespace_ops()?.setup(record)?;

    tracing::info!(name = %record.name, path = %record.path, "exec container program");
    exec_target(&record.path, &record.exec_argv())
}

fn run_setns(container: &mut Container) -> Result<Launch> {
    let record = container.record();
    let pid = record.pid.ok_or_else(|| TinyboxError::NotFound {
        kind: "init process",
        id: record.name.clone(),
    })?;
    let Some(target) = container.command().first().cloned() else {
        return Err(TinyboxError::Config {
            message: "no command given to run in the container".into(),
        });
    };
    let argv = container.command().to_vec();

    NamespaceFiles::open(pid, &record.namespaces)?.enter()?;

    // SAFETY: the CLI is single-threaded at this point; the child only
    // execs or exits.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            if let Err(e) = exec_target(&target, &argv) {
                tracing::error!(error = %e, "exec in container failed");
            }
            std::process::exit(EXEC_FAILED);
        }
        Ok(ForkResult::Parent { child }) => {
            let code = wait_for_exit(child.as_raw())?;
            tracing::info!(name = %record.name, code, "joined command exited");
            Ok(Launch::Exited { code })
        }
        Err(e) => Err(TinyboxError::Process {
            message: format!("fork after setns failed: {e}"),
        }),
    }
}

/// Replaces the current process image, searching `PATH` for bare names.
fn exec_target(path: &str, argv: &[String]) -> Result<Infallible> {
    if path.is_empty() {
        return Err(TinyboxError::Config {
            message: "container has no program to execute".into(),
        });
    }
    let file = cstring(path)?;
    let args = argv
        .iter()
        .map(|a| cstring(a))
        .collect::<Result<Vec<_>>>()?;
    execvp(&file, &args).map_err(|e| TinyboxError::Process {
        message: format!("exec {path} failed: {e}"),
    })
}

fn cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| TinyboxError::Config {
        message: format!("argument contains a NUL byte: {s:?}"),
    })
}
