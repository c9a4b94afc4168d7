//! Process-wide settings and per-invocation container options.
//!
//! [`Settings`] is resolved once at the binary's entry point and threaded
//! explicitly into every constructor that needs it; nothing else in the
//! workspace reads the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TinyboxError};
use crate::types::{CgroupOptions, NamespaceSet};

/// Process-wide settings shared by every container in this runtime instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base directory holding one control directory per container.
    pub base_dir: PathBuf,
    /// Root under which the cgroup v1 controllers are mounted.
    pub cgroup_root: PathBuf,
    /// Directory prefix used beneath every controller hierarchy.
    pub cgroup_prefix: String,
}

impl Settings {
    /// Creates settings with the default cgroup root and prefix.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cgroup_root: PathBuf::from(crate::constants::CGROUP_V1_PATH),
            cgroup_prefix: crate::constants::DEFAULT_CGROUP_PREFIX.to_string(),
        }
    }

    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Config`] if `TINYBOX_HOME` is unset or not an
    /// absolute path.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Config`] if the home variable is missing or
    /// relative, or if the cgroup root override is relative.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup(crate::constants::HOME_ENV).unwrap_or_default();
        let base_dir = PathBuf::from(&home);
        if !base_dir.is_absolute() {
            return Err(TinyboxError::Config {
                message: format!(
                    "{} must be set to an absolute path (got {home:?})",
                    crate::constants::HOME_ENV
                ),
            });
        }

        let mut settings = Self::new(base_dir);
        if let Some(root) = lookup(crate::constants::CGROUP_ROOT_ENV) {
            let root = PathBuf::from(root);
            if !root.is_absolute() {
                return Err(TinyboxError::Config {
                    message: format!(
                        "{} must be an absolute path",
                        crate::constants::CGROUP_ROOT_ENV
                    ),
                });
            }
            settings.cgroup_root = root;
        }
        Ok(settings)
    }
}

/// Whether this process creates a container or re-enters an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationMode {
    /// Original invocation; the spawn spec comes from the options.
    #[default]
    Create,
    /// Re-executed invocation; identity comes from `container.json` and the
    /// exec target from the current command line.
    ReExec,
}

/// Per-invocation options, as produced by the command-line collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOptions {
    /// Container name; determines the control directory.
    pub name: String,
    /// Root filesystem directory.
    pub rootfs: PathBuf,
    /// Executable to run inside the container.
    pub path: String,
    /// Full argument vector, including `argv[0]`.
    pub argv: Vec<String>,
    /// Hostname for the new UTS namespace.
    pub hostname: String,
    /// Resource limits handed to the cgroup strategy.
    pub cgroup: CgroupOptions,
    /// Namespaces to create.
    pub namespaces: NamespaceSet,
    /// Create versus re-exec.
    pub mode: InvocationMode,
}
