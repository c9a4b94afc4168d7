//! Linux namespace management for container isolation.
//!
//! The [`NamespaceOps`] capability answers two questions for the runtime:
//! which `clone(2)` flags create the container's namespaces, and what must be
//! done from inside them before the user program runs. Joining an existing
//! container's namespaces lives in [`join`].

pub mod join;
pub mod user;
pub mod uts;

use std::fmt;
use std::path::Path;

use nix::sched::CloneFlags;
use tinybox_common::error::Result;
use tinybox_common::types::{ContainerRecord, NamespaceSet};

/// Namespace strategy bound to a container.
pub trait NamespaceOps: fmt::Debug {
    /// Returns the clone flags that create this container's namespaces.
    ///
    /// Pure function of the record's configuration.
    fn clone_flags(&self, record: &ContainerRecord) -> CloneFlags;

    /// Performs the in-namespace setup steps (hostname, `/proc`).
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. Callers treat this as fatal.
    fn setup(&self, record: &ContainerRecord) -> Result<()>;
}

/// Namespace strategy built on `clone(2)` flags and in-process setup calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxNamespaces;

impl LinuxNamespaces {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NamespaceOps for LinuxNamespaces {
    fn clone_flags(&self, record: &ContainerRecord) -> CloneFlags {
        clone_flags(&record.namespaces)
    }

    fn setup(&self, record: &ContainerRecord) -> Result<()> {
        let ns = &record.namespaces;
        if ns.uts && !record.hostname.is_empty() {
            uts::set_hostname(&record.hostname)?;
        }
        // A fresh procfs only reflects the new PID space when mounted from
        // inside both the mount and PID namespaces.
        if ns.mount && ns.pid {
            crate::filesystem::mount::mount_proc(Path::new("/proc"))?;
        }
        tracing::info!(name = %record.name, "namespace setup complete");
        Ok(())
    }
}

/// Translates a namespace selection into `clone(2)` flags.
#[must_use]
pub fn clone_flags(set: &NamespaceSet) -> CloneFlags {
    let mut flags = CloneFlags::empty();
    flags.set(CloneFlags::CLONE_NEWNS, set.mount);
    flags.set(CloneFlags::CLONE_NEWPID, set.pid);
    flags.set(CloneFlags::CLONE_NEWUTS, set.uts);
    flags.set(CloneFlags::CLONE_NEWIPC, set.ipc);
    flags.set(CloneFlags::CLONE_NEWNET, set.network);
    flags.set(CloneFlags::CLONE_NEWUSER, set.user);
    flags
}
