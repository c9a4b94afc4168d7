//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use tinybox_common::error::{Result, TinyboxError};

/// Sets the hostname inside the UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| TinyboxError::Namespace {
        message: format!("sethostname({hostname}) failed: {e}"),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}
