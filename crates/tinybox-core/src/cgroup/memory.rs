//! Memory resource control via the cgroup v1 `memory` controller.

use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};

/// Rejects negative memory limits.
///
/// # Errors
///
/// Returns [`TinyboxError::Validation`] if `bytes` is negative.
pub fn validate_limit(bytes: i64) -> Result<()> {
    if bytes < 0 {
        return Err(TinyboxError::Validation {
            message: format!("memory limit must be >= 0, got {bytes}"),
        });
    }
    Ok(())
}

/// Sets the hard memory limit for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `memory.limit_in_bytes` fails.
pub fn set_limit(cgroup_path: &Path, bytes: i64) -> Result<()> {
    super::write_control(cgroup_path, "memory.limit_in_bytes", &bytes.to_string())?;
    tracing::debug!(bytes, "memory limit set");
    Ok(())
}
