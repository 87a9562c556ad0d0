//! Persistent session storage: the browser profile directory that carries
//! identity-provider cookies and local storage across invocations.
//!
//! At most one invocation is expected to use a given directory at a time;
//! concurrent access is undefined.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Expand and create (if absent) the configured profile directory.
pub fn resolve_profile_dir(configured: &str) -> Result<PathBuf> {
    let path = expand_home(configured)?;
    std::fs::create_dir_all(&path)
        .with_context(|| format!("creating session profile dir {}", path.display()))?;
    debug!(path = %path.display(), "session profile dir ready");
    Ok(path)
}

/// Delete the profile directory so the next login starts unauthenticated.
/// Returns whether anything was removed.
pub fn clear_profile_dir(configured: &str) -> Result<bool> {
    let path = expand_home(configured)?;
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(&path)
        .with_context(|| format!("removing session profile dir {}", path.display()))?;
    info!(path = %path.display(), "session profile dir removed");
    Ok(true)
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    if raw == "~" || raw.starts_with("~/") {
        let home = dirs_next::home_dir().context("could not determine home directory")?;
        let rest = raw.trim_start_matches('~').trim_start_matches('/');
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}
