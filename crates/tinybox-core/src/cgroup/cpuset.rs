//! CPU pinning via the cgroup v1 `cpuset` controller.
//!
//! A cpuset cgroup refuses tasks until both `cpuset.cpus` and `cpuset.mems`
//! are populated, and a child may only use CPUs its parent owns. The
//! intermediate prefix directory therefore inherits from the hierarchy root.

use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};

const CPUS: &str = "cpuset.cpus";
const MEMS: &str = "cpuset.mems";

/// Parses a kernel CPU list such as `0-3,6` into individual CPU numbers.
///
/// # Errors
///
/// Returns [`TinyboxError::Validation`] for empty lists, malformed entries,
/// or descending ranges.
pub fn parse_cpu_list(list: &str) -> Result<Vec<u32>> {
    let invalid = |detail: &str| TinyboxError::Validation {
        message: format!("invalid cpuset {list:?}: {detail}"),
    };
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| invalid(&format!("{s:?} is not a CPU number")))
    };

    if list.trim().is_empty() {
        return Err(invalid("empty list"));
    }

    let mut cpus = Vec::new();
    for part in list.split(',') {
        if let Some((lo, hi)) = part.split_once('-') {
            let (lo, hi) = (parse(lo)?, parse(hi)?);
            if lo > hi {
                return Err(invalid(&format!("range {lo}-{hi} is descending")));
            }
            cpus.extend(lo..=hi);
        } else {
            cpus.push(parse(part)?);
        }
    }
    Ok(cpus)
}

/// Copies `cpuset.cpus` and `cpuset.mems` from `parent` into `prefix_dir`
/// when the latter are still empty.
///
/// # Errors
///
/// Returns an error if the prefix directory cannot be created or written.
pub fn inherit(parent: &Path, prefix_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(prefix_dir).map_err(|e| TinyboxError::Io {
        path: prefix_dir.to_path_buf(),
        source: e,
    })?;
    for file in [CPUS, MEMS] {
        if !super::read_control(prefix_dir, file)?.is_empty() {
            continue;
        }
        let inherited = super::read_control(parent, file)?;
        if !inherited.is_empty() {
            super::write_control(prefix_dir, file, &inherited)?;
        }
    }
    Ok(())
}

/// Pins the container cgroup at `dir` to `list`, taking memory nodes from
/// the prefix directory (node 0 when unknown).
///
/// # Errors
///
/// Returns an error if writing either control file fails.
pub fn set_cpus(prefix_dir: &Path, dir: &Path, list: &str) -> Result<()> {
    let mems = super::read_control(prefix_dir, MEMS)?;
    let mems = if mems.is_empty() { "0".to_string() } else { mems };
    super::write_control(dir, CPUS, list)?;
    super::write_control(dir, MEMS, &mems)?;
    tracing::debug!(cpus = list, mems = %mems, "cpuset pinned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranges_and_singletons() {
        assert_eq!(parse_cpu_list("0-2,5").unwrap(), vec![0, 1, 2, 5]);
        assert_eq!(parse_cpu_list("7").unwrap(), vec![7]);
    }

    #[test]
    fn rejects_malformed_lists() {
        assert!(parse_cpu_list("").is_err());
        assert!(parse_cpu_list("a-b").is_err());
        assert!(parse_cpu_list("3-1").is_err());
        assert!(parse_cpu_list("1,,2").is_err());
    }

    #[test]
    fn inherit_fills_only_empty_files() {
        let parent = tempfile::tempdir().unwrap();
        std::fs::write(parent.path().join(CPUS), "0-7\n").unwrap();
        std::fs::write(parent.path().join(MEMS), "0\n").unwrap();
        let prefix = parent.path().join("tinybox");
        std::fs::create_dir_all(&prefix).unwrap();
        std::fs::write(prefix.join(CPUS), "0-3").unwrap();

        inherit(parent.path(), &prefix).unwrap();

        assert_eq!(std::fs::read_to_string(prefix.join(CPUS)).unwrap(), "0-3");
        assert_eq!(std::fs::read_to_string(prefix.join(MEMS)).unwrap(), "0");
    }

    #[test]
    fn set_cpus_defaults_mems_to_node_zero() {
        let prefix = tempfile::tempdir().unwrap();
        let dir = prefix.path().join("web1");
        std::fs::create_dir_all(&dir).unwrap();
        set_cpus(prefix.path(), &dir, "1").unwrap();
        assert_eq!(std::fs::read_to_string(dir.join(CPUS)).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(dir.join(MEMS)).unwrap(), "0");
    }
}
