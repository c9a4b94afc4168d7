//! Mount utilities for container filesystem setup.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use tinybox_common::error::{Result, TinyboxError};

/// Marks every mount in the current namespace as private, recursively.
///
/// Keeps mounts made for the container from propagating back to the host.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn make_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| TinyboxError::Mount {
        message: format!("making / private failed: {e}"),
    })?;
    tracing::debug!("mount propagation set to private");
    Ok(())
}

/// Creates a recursive bind mount from source to target.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| TinyboxError::Mount {
        message: format!(
            "bind mount {} -> {} failed: {e}",
            source.display(),
            target.display()
        ),
    })?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        "bind mount created"
    );
    Ok(())
}

/// Mounts a fresh procfs at `target`, creating the directory if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the mount fails.
pub fn mount_proc(target: &Path) -> Result<()> {
    std::fs::create_dir_all(target).map_err(|e| TinyboxError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;
    mount(
        Some("proc"),
        target,
        Some("proc"),
        MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| TinyboxError::Mount {
        message: format!("mounting proc at {} failed: {e}", target.display()),
    })?;
    tracing::debug!(target = %target.display(), "proc mounted");
    Ok(())
}

/// Lazily detaches the mount at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
pub fn detach(target: &Path) -> Result<()> {
    umount2(target, MntFlags::MNT_DETACH).map_err(|e| TinyboxError::Mount {
        message: format!("unmounting {} failed: {e}", target.display()),
    })?;
    tracing::debug!(target = %target.display(), "mount detached");
    Ok(())
}
