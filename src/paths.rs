//! Where the client keeps its durable storage.
//!
//! Home resolution order:
//! 1. `--home` / `KRISHI_SAKHI_HOME`
//! 2. `~/.config/krishi-sakhi`

#[cfg(test)]
#[path = "paths_test.rs"]
mod paths_test;

use std::path::{Path, PathBuf};

const STORAGE_FILE: &str = "storage.json";

/// Resolve the client home directory, or `None` if no home directory exists.
pub fn client_home(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(home) = explicit {
        return Some(home.to_path_buf());
    }
    dirs::home_dir().map(|h| h.join(".config").join("krishi-sakhi"))
}

/// The storage file inside `home`.
pub fn storage_path(home: &Path) -> PathBuf {
    home.join(STORAGE_FILE)
}
