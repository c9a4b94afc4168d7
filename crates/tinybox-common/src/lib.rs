//! # tinybox-common
//!
//! Shared error definitions, process-wide settings, constants, and the
//! serializable container record used across the tinybox workspace.
//!
//! This crate is the leaf of the dependency graph. The record type lives here
//! so that both the isolation strategies in `tinybox-core` and the container
//! entity in `tinybox-runtime` can speak about the same state without either
//! depending on the other.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
