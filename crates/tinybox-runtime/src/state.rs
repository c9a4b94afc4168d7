//! Persistent container state.
//!
//! Every control directory holds a `container.json` written by the master
//! once the init pid is known. Listing walks the base directory, so the
//! runtime keeps no separate index and needs no daemon.

use std::io::ErrorKind;
use std::path::Path;

use nix::sys::signal::kill;
use nix::unistd::Pid;
use tinybox_common::config::Settings;
use tinybox_common::constants::STATE_FILE;
use tinybox_common::error::{Result, TinyboxError};
use tinybox_common::types::{ContainerRecord, ContainerState};
use tinybox_core::cgroup::CgroupV1;

/// Loads a container record from a state file.
///
/// # Errors
///
/// Returns [`TinyboxError::NotFound`] if the file does not exist, or an
/// I/O or decode error otherwise.
pub fn load(path: &Path) -> Result<ContainerRecord> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            TinyboxError::NotFound {
                kind: "container state",
                id: path.display().to_string(),
            }
        } else {
            TinyboxError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    let record = serde_json::from_slice(&bytes)?;
    tracing::debug!(path = %path.display(), "container state loaded");
    Ok(record)
}

/// Persists a container record atomically (write to a sibling, then rename).
///
/// # Errors
///
/// Returns an error if the file cannot be written or renamed into place.
pub fn save(path: &Path, record: &ContainerRecord) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(record)?;
    std::fs::write(&tmp, bytes).map_err(|e| TinyboxError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| TinyboxError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "container state saved");
    Ok(())
}

/// Reports whether the recorded init process is alive.
#[must_use]
pub fn status(record: &ContainerRecord) -> ContainerState {
    match record.pid {
        None => ContainerState::Created,
        Some(pid) if kill(Pid::from_raw(pid), None).is_ok() => ContainerState::Running,
        Some(_) => ContainerState::Stopped,
    }
}

/// A container as seen by `ps`.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Persisted record.
    pub record: ContainerRecord,
    /// Observed lifecycle state.
    pub state: ContainerState,
    /// CPU time consumed, when the accounting cgroup is readable.
    pub cpu_ns: Option<u64>,
}

/// Lists every container under the base directory that has a state file.
///
/// Directories without `container.json` (never fully created) are skipped.
/// Unreadable state files are logged and skipped.
///
/// # Errors
///
/// Returns an error if the base directory cannot be read.
pub fn list(settings: &Settings) -> Result<Vec<ContainerSummary>> {
    let entries = match std::fs::read_dir(&settings.base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(TinyboxError::Io {
                path: settings.base_dir.clone(),
                source: e,
            });
        }
    };

    let mut summaries = Vec::new();
    for entry in entries.flatten() {
        let state_file = entry.path().join(STATE_FILE);
        if !state_file.is_file() {
            continue;
        }
        match load(&state_file) {
            Ok(record) => {
                let cgroup = CgroupV1::new(&settings.cgroup_root, &record.cgroup_prefix, &record.name);
                summaries.push(ContainerSummary {
                    state: status(&record),
                    cpu_ns: cgroup.cpu_usage_ns().ok(),
                    record,
                });
            }
            Err(e) => {
                tracing::warn!(path = %state_file.display(), error = %e, "skipping unreadable state");
            }
        }
    }
    summaries.sort_by(|a, b| a.record.name.cmp(&b.record.name));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, pid: Option<i32>) -> ContainerRecord {
        ContainerRecord {
            name: name.into(),
            pid,
            cgroup_prefix: "tinybox".into(),
            ..ContainerRecord::default()
        }
    }

    #[test]
    fn save_then_load_preserves_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);
        let rec = ContainerRecord {
            argv: vec!["sh".into(), "-c".into(), "echo hi".into()],
            ..record("web1", Some(10))
        };
        save(&path, &rec).unwrap();
        assert_eq!(load(&path).unwrap(), rec);
        assert!(!dir.path().join("container.json.tmp").exists());
    }

    #[test]
    fn load_missing_state_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join(STATE_FILE)).unwrap_err();
        assert!(matches!(err, TinyboxError::NotFound { .. }));
    }

    #[test]
    fn status_reflects_pid_liveness() {
        assert_eq!(status(&record("a", None)), ContainerState::Created);
        let me = i32::try_from(std::process::id()).unwrap();
        assert_eq!(status(&record("a", Some(me))), ContainerState::Running);
        assert_eq!(status(&record("a", Some(i32::MAX))), ContainerState::Stopped);
    }

    #[test]
    fn list_skips_incomplete_dirs_and_sorts_by_name() {
        let base = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha"] {
            let dir = base.path().join(name);
            std::fs::create_dir_all(&dir).unwrap();
            save(&dir.join(STATE_FILE), &record(name, None)).unwrap();
        }
        std::fs::create_dir_all(base.path().join("half-made")).unwrap();

        let mut settings = Settings::new(base.path());
        settings.cgroup_root = base.path().join("no-cgroups");
        let names: Vec<_> = list(&settings)
            .unwrap()
            .into_iter()
            .map(|s| s.record.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn list_of_missing_base_is_empty() {
        let base = tempfile::tempdir().unwrap();
        let settings = Settings::new(base.path().join("absent"));
        assert!(list(&settings).unwrap().is_empty());
    }
}
