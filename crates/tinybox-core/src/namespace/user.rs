//! User namespace isolation.
//!
//! Maps container UIDs/GIDs to host IDs so the init process can run as root
//! inside the container without being root on the host.

use std::fs;
use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};

/// A single contiguous ID mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMap {
    /// First ID inside the namespace.
    pub inside: u32,
    /// First ID on the host.
    pub outside: u32,
    /// Number of IDs mapped.
    pub count: u32,
}

impl IdMap {
    /// Maps container root onto the given host ID.
    #[must_use]
    pub const fn root_to(outside: u32) -> Self {
        Self {
            inside: 0,
            outside,
            count: 1,
        }
    }

    fn line(self) -> String {
        format!("{} {} {}", self.inside, self.outside, self.count)
    }
}

/// Writes the UID and GID maps of a process whose user namespace was just created.
///
/// `proc_dir` is the process's `/proc/<pid>` directory. `setgroups` is denied
/// first when present, as the kernel requires for unprivileged writers.
///
/// # Errors
///
/// Returns an error if writing `setgroups`, `uid_map`, or `gid_map` fails.
pub fn write_id_maps(proc_dir: &Path, uid: IdMap, gid: IdMap) -> Result<()> {
    let setgroups = proc_dir.join("setgroups");
    if setgroups.exists() {
        write_proc_file(&setgroups, "deny")?;
    }
    write_proc_file(&proc_dir.join("uid_map"), &uid.line())?;
    write_proc_file(&proc_dir.join("gid_map"), &gid.line())?;
    tracing::debug!(proc_dir = %proc_dir.display(), ?uid, ?gid, "wrote id maps");
    Ok(())
}

fn write_proc_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| TinyboxError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
