//! Root filesystem management for container isolation.
//!
//! [`RootfsOps`] prepares the container's root inside its mount namespace,
//! switches to it, and reverses the mounts on teardown.

pub mod chroot;
pub mod mount;

use std::fmt;
use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};
use tinybox_common::types::ContainerRecord;

/// Rootfs strategy bound to a container.
pub trait RootfsOps: fmt::Debug {
    /// Prepares and mounts the container's root filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the rootfs is missing or a mount fails.
    fn mount(&self, record: &ContainerRecord) -> Result<()>;

    /// Switches the process root to the mounted filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if `chroot(2)` or `chdir(2)` fails.
    fn chroot(&self, record: &ContainerRecord) -> Result<()>;

    /// Reverses [`RootfsOps::mount`]. Safe to call after a partial mount.
    ///
    /// # Errors
    ///
    /// Returns an error if the detach fails; teardown callers log it and move on.
    fn unmount(&self, record: &ContainerRecord) -> Result<()>;
}

/// Rootfs strategy that bind-mounts the rootfs onto itself and `chroot`s into it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChrootRootfs;

impl ChrootRootfs {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RootfsOps for ChrootRootfs {
    fn mount(&self, record: &ContainerRecord) -> Result<()> {
        let rootfs = checked_rootfs(record)?;
        mount::make_private()?;
        mount::bind_mount(rootfs, rootfs)?;
        tracing::info!(rootfs = %rootfs.display(), "rootfs mounted");
        Ok(())
    }

    fn chroot(&self, record: &ContainerRecord) -> Result<()> {
        chroot::enter_root(checked_rootfs(record)?)
    }

    fn unmount(&self, record: &ContainerRecord) -> Result<()> {
        if record.rootfs.as_os_str().is_empty() {
            return Ok(());
        }
        mount::detach(&record.rootfs)
    }
}

fn checked_rootfs(record: &ContainerRecord) -> Result<&Path> {
    let rootfs = record.rootfs.as_path();
    if rootfs.as_os_str().is_empty() {
        return Err(TinyboxError::Config {
            message: format!("container {} has no rootfs", record.name),
        });
    }
    if !rootfs.is_dir() {
        return Err(TinyboxError::NotFound {
            kind: "rootfs",
            id: rootfs.display().to_string(),
        });
    }
    Ok(rootfs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_rejects_empty_rootfs() {
        let record = ContainerRecord {
            name: "c1".into(),
            ..ContainerRecord::default()
        };
        let err = ChrootRootfs::new().mount(&record).unwrap_err();
        assert!(matches!(err, TinyboxError::Config { .. }));
    }

    #[test]
    fn chroot_rejects_missing_rootfs() {
        let record = ContainerRecord {
            rootfs: "/nonexistent/tinybox/rootfs".into(),
            ..ContainerRecord::default()
        };
        let err = ChrootRootfs::new().chroot(&record).unwrap_err();
        assert!(matches!(err, TinyboxError::NotFound { kind: "rootfs", .. }));
    }

    #[test]
    fn unmount_without_rootfs_is_a_no_op() {
        assert!(ChrootRootfs::new().unmount(&ContainerRecord::default()).is_ok());
    }
}
