//! Unified error types for the tinybox workspace.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Direction of a state handoff through the container pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The init side, consuming the record.
    Read,
    /// The master side, producing the record.
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum TinyboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Requested resource limits are structurally invalid.
    #[error("invalid resource limits: {message}")]
    Validation {
        /// Description of the rejected limit.
        message: String,
    },

    /// Creating, entering, or configuring a namespace failed.
    #[error("namespace setup failed: {message}")]
    Namespace {
        /// Description of the failed step.
        message: String,
    },

    /// A mount, unmount, or root switch failed.
    #[error("rootfs operation failed: {message}")]
    Mount {
        /// Description of the failed step.
        message: String,
    },

    /// Applying a single cgroup controller failed.
    #[error("cgroup controller {controller} failed: {message}")]
    Cgroup {
        /// Controller that failed (`memory`, `cpu`, `cpuacct`, `cpuset`).
        controller: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Transferring the container record through the pipe failed.
    #[error("container pipe {direction} failed: {message}")]
    Handoff {
        /// Which side of the handoff failed.
        direction: Direction,
        /// Description of the failure.
        message: String,
    },

    /// Spawning, signalling, or exec-ing a process failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TinyboxError>;
