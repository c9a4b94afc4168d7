//! CPU resource control via the cgroup v1 `cpu` controller.

use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};

/// Smallest share value the kernel accepts.
pub const MIN_SHARES: u64 = 2;

/// Rejects share values below the kernel minimum.
///
/// # Errors
///
/// Returns [`TinyboxError::Validation`] if `shares` is below [`MIN_SHARES`].
pub fn validate_shares(shares: u64) -> Result<()> {
    if shares < MIN_SHARES {
        return Err(TinyboxError::Validation {
            message: format!("cpu shares must be >= {MIN_SHARES}, got {shares}"),
        });
    }
    Ok(())
}

/// Sets the CPU shares (relative weight) for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `cpu.shares` fails.
pub fn set_shares(cgroup_path: &Path, shares: u64) -> Result<()> {
    super::write_control(cgroup_path, "cpu.shares", &shares.to_string())?;
    tracing::debug!(shares, "CPU shares set");
    Ok(())
}
