//! Container entity, process roles, and the master-to-init state handoff
//! for the tinybox runtime.
//!
//! A [`container::Container`] is built once per process invocation. The
//! master process clones a child into new namespaces, re-executes itself in
//! it as the `init` role, and hands the container record over through a
//! named pipe in the container's control directory.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bootstrap;
pub mod container;
pub mod handoff;
pub mod lock;
pub mod process;
pub mod state;
