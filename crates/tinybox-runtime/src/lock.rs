//! Advisory locking on a container's lock file.
//!
//! The runtime only guarantees the lock file exists; callers that must keep
//! two invocations for the same container apart take this lock first.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tinybox_common::error::{Result, TinyboxError};

/// Exclusive `flock(2)` on a lock file, released on drop.
#[derive(Debug)]
pub struct ContainerLock {
    path: PathBuf,
    _lock: Flock<std::fs::File>,
}

impl ContainerLock {
    /// Takes the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Config`] if another process holds the lock,
    /// or an I/O error if the file cannot be opened or locked.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| TinyboxError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                TinyboxError::Config {
                    message: format!("{} is held by another invocation", path.display()),
                }
            } else {
                TinyboxError::Io {
                    path: path.to_path_buf(),
                    source: errno.into(),
                }
            }
        })?;
        tracing::debug!(path = %path.display(), "container lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Returns the locked file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
