//! Domain types shared between the isolation strategies and the runtime.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TinyboxError};

/// Resource limits applied through the cgroup controllers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupOptions {
    /// Memory limit in bytes. Signed so that a bogus negative request can be
    /// represented and rejected by validation rather than by the parser.
    pub memory: Option<i64>,
    /// CPU shares (relative weight, kernel minimum is 2).
    pub cpu_shares: Option<u64>,
    /// CPU list to pin the container to, e.g. `0-2,4`.
    pub cpuset: Option<String>,
}

/// Which namespaces a container gets.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSet {
    /// Isolate the mount table.
    pub mount: bool,
    /// Isolate the PID space.
    pub pid: bool,
    /// Isolate hostname and domain name.
    pub uts: bool,
    /// Isolate System V IPC and POSIX message queues.
    pub ipc: bool,
    /// Isolate the network stack.
    pub network: bool,
    /// Isolate user and group IDs.
    pub user: bool,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            mount: true,
            pid: true,
            uts: true,
            ipc: true,
            network: true,
            user: false,
        }
    }
}

/// Persisted and transmitted state of a container.
///
/// This is the wire form written to `container.json` and through the
/// handoff pipe. Strategy bindings and the process role belong to the
/// in-memory container only and have no representation here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container name, unique per base directory.
    pub name: String,
    /// Control directory holding the pipe, lock, and state file.
    pub dir: PathBuf,
    /// Root filesystem directory.
    pub rootfs: PathBuf,
    /// Executable of the first process.
    pub path: String,
    /// Argument vector of the first process.
    pub argv: Vec<String>,
    /// Hostname set inside the UTS namespace.
    pub hostname: String,
    /// Cgroup directory prefix.
    #[serde(rename = "cgprefix")]
    pub cgroup_prefix: String,
    /// Resource limits.
    #[serde(rename = "cgopts")]
    pub cgroup: CgroupOptions,
    /// Namespaces created for the init process.
    #[serde(default)]
    pub namespaces: NamespaceSet,
    /// Host PID of the init process, once known.
    pub pid: Option<i32>,
    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

impl ContainerRecord {
    /// Resets the spawn spec (path, argv, hostname, rootfs) to empty.
    pub fn clear_spawn_spec(&mut self) {
        self.path.clear();
        self.argv.clear();
        self.hostname.clear();
        self.rootfs = PathBuf::new();
    }

    /// Returns the argument vector to exec, falling back to `[path]`.
    #[must_use]
    pub fn exec_argv(&self) -> Vec<String> {
        if self.argv.is_empty() {
            vec![self.path.clone()]
        } else {
            self.argv.clone()
        }
    }
}

/// Checks that a container name is usable as a single directory component.
///
/// # Errors
///
/// Returns [`TinyboxError::Config`] for empty names, `.`/`..`, or names
/// containing `/` or NUL.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(TinyboxError::Config {
            message: format!("invalid container name: {name:?}"),
        });
    }
    Ok(())
}

/// Observed lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    /// Control files exist but no init process was recorded.
    Created,
    /// The recorded init process is alive.
    Running,
    /// The recorded init process is gone.
    Stopped,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContainerRecord {
        ContainerRecord {
            name: "web1".into(),
            dir: "/var/lib/tinybox/web1".into(),
            rootfs: "/srv/web1root".into(),
            path: "/bin/sh".into(),
            argv: vec!["sh".into(), "-c".into(), "echo hi".into()],
            hostname: "web1".into(),
            cgroup_prefix: "tinybox".into(),
            cgroup: CgroupOptions {
                memory: Some(64 << 20),
                cpu_shares: Some(512),
                cpuset: Some("0-1".into()),
            },
            namespaces: NamespaceSet::default(),
            pid: Some(4242),
            created_at: "2026-10-19T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn record_survives_json_round_trip() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: ContainerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_with_empty_argv_survives_json_round_trip() {
        let record = ContainerRecord {
            argv: Vec::new(),
            cgroup: CgroupOptions::default(),
            pid: None,
            ..sample()
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ContainerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back.argv.is_empty());
    }

    #[test]
    fn record_uses_short_cgroup_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["cgprefix"], "tinybox");
        assert_eq!(json["cgopts"]["memory"], 64 << 20);
    }

    #[test]
    fn record_without_optional_fields_decodes() {
        let json = r#"{"name":"a","dir":"/x/a","rootfs":"","path":"","argv":[],
            "hostname":"","cgprefix":"tinybox","cgopts":{"memory":null,
            "cpu_shares":null,"cpuset":null},"pid":null}"#;
        let record: ContainerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.namespaces, NamespaceSet::default());
        assert!(record.created_at.is_empty());
    }

    #[test]
    fn clear_spawn_spec_empties_four_fields() {
        let mut record = sample();
        record.clear_spawn_spec();
        assert!(record.path.is_empty());
        assert!(record.argv.is_empty());
        assert!(record.hostname.is_empty());
        assert_eq!(record.rootfs, PathBuf::new());
        assert_eq!(record.name, "web1");
        assert_eq!(record.pid, Some(4242));
    }

    #[test]
    fn exec_argv_falls_back_to_path() {
        let record = ContainerRecord {
            argv: Vec::new(),
            ..sample()
        };
        assert_eq!(record.exec_argv(), vec!["/bin/sh".to_string()]);
    }

    #[test]
    fn validate_name_rejects_path_components() {
        assert!(validate_name("web1").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
