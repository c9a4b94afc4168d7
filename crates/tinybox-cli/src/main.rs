//! # tinybox — minimal container runtime CLI
//!
//! Creates a container in fresh namespaces, re-enters running ones, and
//! manages their control directories under `$TINYBOX_HOME`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

mod commands;
mod output;

use clap::Parser;
use tinybox_common::config::Settings;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = Settings::from_env()?;
    commands::execute(cli, &settings)
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
