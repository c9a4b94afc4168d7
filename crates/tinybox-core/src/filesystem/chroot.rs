//! Root switching via `chroot(2)`.

use std::path::Path;

use tinybox_common::error::{Result, TinyboxError};

/// Changes the process root to `new_root` and moves into it.
///
/// # Errors
///
/// Returns an error if `chroot(2)` or the follow-up `chdir("/")` fails.
pub fn enter_root(new_root: &Path) -> Result<()> {
    nix::unistd::chroot(new_root).map_err(|e| TinyboxError::Mount {
        message: format!("chroot to {} failed: {e}", new_root.display()),
    })?;
    nix::unistd::chdir("/").map_err(|e| TinyboxError::Mount {
        message: format!("chdir to new root failed: {e}"),
    })?;
    tracing::info!(new_root = %new_root.display(), "switched root");
    Ok(())
}
