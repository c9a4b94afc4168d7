//! CPU accounting via the cgroup v1 `cpuacct` controller.

use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};

/// Reads the total CPU time, in nanoseconds, consumed by a cgroup.
///
/// # Errors
///
/// Returns an error if `cpuacct.usage` cannot be read or parsed.
pub fn usage_ns(cgroup_path: &Path) -> Result<u64> {
    let raw = super::read_control(cgroup_path, "cpuacct.usage")?;
    raw.parse().map_err(|e| TinyboxError::Cgroup {
        controller: "cpuacct",
        message: format!("unparsable cpuacct.usage {raw:?}: {e}"),
    })
}
