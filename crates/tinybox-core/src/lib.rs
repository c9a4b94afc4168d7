//! # tinybox-core
//!
//! Linux isolation strategies for the tinybox runtime.
//!
//! Each isolation concern is a small capability trait with one Linux
//! implementation:
//! - **Namespaces**: [`namespace::NamespaceOps`], implemented by
//!   [`namespace::LinuxNamespaces`].
//! - **Cgroups v1**: [`cgroup::CgroupOps`], implemented by [`cgroup::CgroupV1`]
//!   for the memory, cpu, cpuacct, and cpuset controllers.
//! - **Root filesystem**: [`filesystem::RootfsOps`], implemented by
//!   [`filesystem::ChrootRootfs`].
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;

#[cfg(not(target_os = "linux"))]
compile_error!("tinybox-core targets Linux namespaces and cgroups only");
