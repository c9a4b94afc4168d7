//! Idempotent creation of a container's control files.
//!
//! Each helper treats an existing artifact as already initialized and
//! leaves it untouched.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use nix::sys::stat::Mode;
use tinybox_common::error::{Result, TinyboxError};

/// Creates `dir` (and its parents) unless it already exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, or if `dir` exists
/// but is not a directory.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    match std::fs::symlink_metadata(dir) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(TinyboxError::Config {
                message: format!("{} exists and is not a directory", dir.display()),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(TinyboxError::Io {
                path: dir.to_path_buf(),
                source: e,
            });
        }
    }
    std::fs::create_dir_all(dir).map_err(|e| TinyboxError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(dir = %dir.display(), "control directory created");
    Ok(())
}

/// Creates a FIFO at `path` with `mode` unless one already exists there.
///
/// # Errors
///
/// Returns an error if `path` exists but is not a FIFO, or if `mkfifo(3)`
/// fails for a reason other than the path already existing.
pub fn ensure_fifo(path: &Path, mode: u32) -> Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.file_type().is_fifo() => return Ok(()),
        Ok(_) => {
            return Err(TinyboxError::Config {
                message: format!("{} exists and is not a FIFO", path.display()),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(TinyboxError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    }
    match nix::unistd::mkfifo(path, Mode::from_bits_truncate(mode)) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "handoff pipe created");
            Ok(())
        }
        // Lost a race with a concurrent invocation; same outcome.
        Err(nix::errno::Errno::EEXIST) => Ok(()),
        Err(e) => Err(TinyboxError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        }),
    }
}

/// Creates an empty file at `path` unless one already exists.
///
/// # Errors
///
/// Returns an error if the file cannot be created.
pub fn ensure_file(path: &Path) -> Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            tracing::debug!(path = %path.display(), "lock file created");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(TinyboxError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
