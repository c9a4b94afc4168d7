//! Cgroup v1 resource management.
//!
//! Each controller is mounted separately under the cgroup root
//! (`/sys/fs/cgroup/<controller>`). A container's cgroup lives at
//! `<root>/<controller>/<prefix>/<name>` in every hierarchy it uses.

pub mod cpu;
pub mod cpuacct;
pub mod cpuset;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tinybox_common::error::{Result, TinyboxError};
use tinybox_common::types::ContainerRecord;

/// Cgroup strategy bound to a container in the master process.
pub trait CgroupOps: fmt::Debug {
    /// Returns the controller name to cgroup directory mapping.
    fn paths(&self) -> BTreeMap<String, PathBuf>;

    /// Checks that the requested limits are structurally sane.
    ///
    /// Must not touch the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Validation`] describing the first bad limit.
    fn validate(&self, record: &ContainerRecord) -> Result<()>;

    /// Applies the memory controller.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Cgroup`] naming `memory`.
    fn memory(&self, record: &ContainerRecord) -> Result<()>;

    /// Applies the cpu controller.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Cgroup`] naming `cpu`.
    fn cpu(&self, record: &ContainerRecord) -> Result<()>;

    /// Applies the cpuacct controller.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Cgroup`] naming `cpuacct`.
    fn cpu_acct(&self, record: &ContainerRecord) -> Result<()>;

    /// Applies the cpuset controller.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Cgroup`] naming `cpuset`.
    fn cpu_set(&self, record: &ContainerRecord) -> Result<()>;

    /// Removes every cgroup directory this strategy may have created.
    ///
    /// # Errors
    ///
    /// Returns the first removal error after attempting all of them.
    fn destroy(&self) -> Result<()>;
}

/// A cgroup v1 controller handled by tinybox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Controller {
    /// `memory` hierarchy.
    Memory,
    /// `cpu` hierarchy.
    Cpu,
    /// `cpuacct` hierarchy.
    CpuAcct,
    /// `cpuset` hierarchy.
    CpuSet,
}

impl Controller {
    /// All controllers, in application order.
    pub const ALL: [Self; 4] = [Self::Memory, Self::Cpu, Self::CpuAcct, Self::CpuSet];

    /// Returns the hierarchy name as mounted under the cgroup root.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::CpuAcct => "cpuacct",
            Self::CpuSet => "cpuset",
        }
    }

    /// Wraps any error into a [`TinyboxError::Cgroup`] naming this controller.
    #[must_use]
    pub fn error(self, err: &TinyboxError) -> TinyboxError {
        TinyboxError::Cgroup {
            controller: self.name(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cgroup v1 strategy for one container.
#[derive(Debug, Clone)]
pub struct CgroupV1 {
    root: PathBuf,
    prefix: String,
    name: String,
}

impl CgroupV1 {
    /// Creates the strategy for container `name` under `root/<controller>/prefix`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            name: name.into(),
        }
    }

    /// Returns the container's cgroup directory for one controller.
    #[must_use]
    pub fn path(&self, controller: Controller) -> PathBuf {
        self.prefix_dir(controller).join(&self.name)
    }

    /// Reads the CPU time consumed by the container from its cpuacct cgroup.
    ///
    /// # Errors
    ///
    /// Returns an error if the accounting cgroup does not exist or is unreadable.
    pub fn cpu_usage_ns(&self) -> Result<u64> {
        cpuacct::usage_ns(&self.path(Controller::CpuAcct))
    }

    fn prefix_dir(&self, controller: Controller) -> PathBuf {
        self.root.join(controller.name()).join(&self.prefix)
    }

    /// Creates the controller directory, runs `configure` on it, then moves
    /// the init process in. Limits are written before attaching.
    fn apply(
        &self,
        controller: Controller,
        record: &ContainerRecord,
        configure: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<()> {
        let run = || -> Result<()> {
            let pid = record.pid.ok_or_else(|| TinyboxError::Process {
                message: "init pid is not known yet".into(),
            })?;
            let dir = self.path(controller);
            std::fs::create_dir_all(&dir).map_err(|e| TinyboxError::Io {
                path: dir.clone(),
                source: e,
            })?;
            configure(&dir)?;
            write_control(&dir, "tasks", &pid.to_string())?;
            tracing::debug!(%controller, pid, path = %dir.display(), "cgroup applied");
            Ok(())
        };
        run().map_err(|e| controller.error(&e))
    }
}

impl CgroupOps for CgroupV1 {
    fn paths(&self) -> BTreeMap<String, PathBuf> {
        Controller::ALL
            .iter()
            .map(|&c| (c.name().to_string(), self.path(c)))
            .collect()
    }

    fn validate(&self, record: &ContainerRecord) -> Result<()> {
        let opts = &record.cgroup;
        if let Some(bytes) = opts.memory {
            memory::validate_limit(bytes)?;
        }
        if let Some(shares) = opts.cpu_shares {
            cpu::validate_shares(shares)?;
        }
        if let Some(list) = &opts.cpuset {
            let _ = cpuset::parse_cpu_list(list)?;
        }
        tracing::debug!(name = %record.name, "cgroup options validated");
        Ok(())
    }

    fn memory(&self, record: &ContainerRecord) -> Result<()> {
        let Some(bytes) = record.cgroup.memory else {
            return Ok(());
        };
        self.apply(Controller::Memory, record, |dir| memory::set_limit(dir, bytes))
    }

    fn cpu(&self, record: &ContainerRecord) -> Result<()> {
        let Some(shares) = record.cgroup.cpu_shares else {
            return Ok(());
        };
        self.apply(Controller::Cpu, record, |dir| cpu::set_shares(dir, shares))
    }

    fn cpu_acct(&self, record: &ContainerRecord) -> Result<()> {
        // Accounting only; joined unconditionally so usage is always available.
        self.apply(Controller::CpuAcct, record, |_| Ok(()))
    }

    fn cpu_set(&self, record: &ContainerRecord) -> Result<()> {
        let Some(list) = record.cgroup.cpuset.as_deref() else {
            return Ok(());
        };
        let parent = self.root.join(Controller::CpuSet.name());
        let prefix_dir = self.prefix_dir(Controller::CpuSet);
        self.apply(Controller::CpuSet, record, |dir| {
            cpuset::inherit(&parent, &prefix_dir)?;
            cpuset::set_cpus(&prefix_dir, dir, list)
        })
    }

    fn destroy(&self) -> Result<()> {
        let mut first = None;
        for controller in Controller::ALL {
            let dir = self.path(controller);
            if !dir.exists() {
                continue;
            }
            // cgroupfs directories are removed with rmdir(2); their control
            // files vanish with them.
            if let Err(e) = std::fs::remove_dir(&dir) {
                tracing::warn!(%controller, path = %dir.display(), error = %e, "cgroup removal failed");
                let _ = first.get_or_insert(TinyboxError::Io {
                    path: dir,
                    source: e,
                });
            } else {
                tracing::debug!(%controller, path = %dir.display(), "cgroup removed");
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// Writes a single cgroup control file.
pub(crate) fn write_control(dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = dir.join(file);
    std::fs::write(&path, value).map_err(|e| TinyboxError::Io { path, source: e })
}

/// Reads a control file, treating a missing file as empty.
pub(crate) fn read_control(dir: &Path, file: &str) -> Result<String> {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(s) => Ok(s.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(TinyboxError::Io { path, source: e }),
    }
}
