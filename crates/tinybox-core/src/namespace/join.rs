//! Joining the namespaces of a running container via `setns(2)`.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sched::{CloneFlags, setns};
use tinybox_common::error::{Result, TinyboxError};
use tinybox_common::types::NamespaceSet;

/// Order in which namespaces are entered. The user namespace goes first so
/// that the remaining `setns` calls are checked against its capabilities,
/// and the mount namespace goes last because entering it resets the root.
const JOIN_ORDER: [(&str, CloneFlags); 6] = [
    ("user", CloneFlags::CLONE_NEWUSER),
    ("ipc", CloneFlags::CLONE_NEWIPC),
    ("uts", CloneFlags::CLONE_NEWUTS),
    ("net", CloneFlags::CLONE_NEWNET),
    ("pid", CloneFlags::CLONE_NEWPID),
    ("mnt", CloneFlags::CLONE_NEWNS),
];

fn selected(set: &NamespaceSet, kind: &str) -> bool {
    match kind.as_bytes() {
        b"user" => set.user,
        b"ipc" => set.ipc,
        b"uts" => set.uts,
        b"net" => set.network,
        b"pid" => set.pid,
        _ => set.mount,
    }
}

/// Open handles to a running process's namespaces and root directory.
#[derive(Debug)]
pub struct NamespaceFiles {
    pid: i32,
    root: File,
    namespaces: Vec<(&'static str, CloneFlags, File)>,
}

impl NamespaceFiles {
    /// Opens the namespaces of `pid` selected by `set` from `/proc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process or any selected namespace file is missing.
    pub fn open(pid: i32, set: &NamespaceSet) -> Result<Self> {
        Self::open_in(Path::new("/proc"), pid, set)
    }

    /// Opens the namespaces of `pid` from an arbitrary procfs root.
    ///
    /// # Errors
    ///
    /// Returns an error if the process or any selected namespace file is missing.
    pub fn open_in(proc_root: &Path, pid: i32, set: &NamespaceSet) -> Result<Self> {
        let proc_dir = proc_root.join(pid.to_string());
        if !proc_dir.is_dir() {
            return Err(TinyboxError::NotFound {
                kind: "process",
                id: pid.to_string(),
            });
        }

        let root = open_file(proc_dir.join("root"))?;
        let namespaces = JOIN_ORDER
            .iter()
            .filter(|(kind, _)| selected(set, kind))
            .map(|&(kind, flag)| Ok((kind, flag, open_file(proc_dir.join("ns").join(kind))?)))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(pid, count = namespaces.len(), "opened namespace files");
        Ok(Self {
            pid,
            root,
            namespaces,
        })
    }

    /// Returns the namespace kinds that will be entered, in join order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.namespaces.iter().map(|(kind, _, _)| *kind).collect()
    }

    /// Enters every opened namespace, then switches to the target's root.
    ///
    /// A joined PID namespace only applies to children forked afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if any `setns(2)` call or the root switch fails.
    pub fn enter(self) -> Result<()> {
        for (kind, flag, file) in &self.namespaces {
            setns(file, *flag).map_err(|e| TinyboxError::Namespace {
                message: format!("setns {kind} of pid {} failed: {e}", self.pid),
            })?;
            tracing::debug!(kind, pid = self.pid, "joined namespace");
        }

        // SAFETY: `self.root` is an open directory handle owned by this
        // struct and stays alive for the duration of the call.
        let rc = unsafe { libc::fchdir(self.root.as_raw_fd()) };
        if rc != 0 {
            return Err(TinyboxError::Mount {
                message: format!(
                    "fchdir to root of pid {} failed: {}",
                    self.pid,
                    std::io::Error::last_os_error()
                ),
            });
        }
        crate::filesystem::chroot::enter_root(Path::new("."))?;
        tracing::info!(pid = self.pid, "entered container namespaces");
        Ok(())
    }
}

fn open_file(path: PathBuf) -> Result<File> {
    File::open(&path).map_err(|e| TinyboxError::Io { path, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_proc(pid: i32) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let proc_dir = dir.path().join(pid.to_string());
        std::fs::create_dir_all(proc_dir.join("ns")).unwrap();
        std::fs::create_dir_all(proc_dir.join("root")).unwrap();
        for kind in ["user", "ipc", "uts", "net", "pid", "mnt"] {
            std::fs::write(proc_dir.join("ns").join(kind), "").unwrap();
        }
        dir
    }

    #[test]
    fn opens_selected_namespaces_in_join_order() {
        let proc_root = fake_proc(77);
        let files = NamespaceFiles::open_in(proc_root.path(), 77, &NamespaceSet::default()).unwrap();
        assert_eq!(files.kinds(), vec!["ipc", "uts", "net", "pid", "mnt"]);
    }

    #[test]
    fn user_namespace_is_joined_first() {
        let proc_root = fake_proc(78);
        let set = NamespaceSet {
            user: true,
            network: false,
            ..NamespaceSet::default()
        };
        let files = NamespaceFiles::open_in(proc_root.path(), 78, &set).unwrap();
        assert_eq!(files.kinds(), vec!["user", "ipc", "uts", "pid", "mnt"]);
    }

    #[test]
    fn missing_process_is_not_found() {
        let proc_root = tempfile::tempdir().unwrap();
        let err = NamespaceFiles::open_in(proc_root.path(), 5, &NamespaceSet::default()).unwrap_err();
        assert!(matches!(err, TinyboxError::NotFound { kind: "process", .. }));
    }

    #[test]
    fn missing_namespace_file_is_an_io_error() {
        let proc_root = fake_proc(79);
        std::fs::remove_file(proc_root.path().join("79/ns/uts")).unwrap();
        let err = NamespaceFiles::open_in(proc_root.path(), 79, &NamespaceSet::default()).unwrap_err();
        assert!(matches!(err, TinyboxError::Io { .. }));
    }
}
