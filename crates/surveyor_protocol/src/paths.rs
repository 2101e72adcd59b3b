//! Filesystem locations under the Surveyor home directory.

use std::path::{Path, PathBuf};
use std::sync::Once;

use crate::defaults::{DEFAULT_DATABASE_FILE, HOME_ENV_VAR};

static HOME_WARNING: Once = Once::new();

/// Surveyor home: `$SURVEYOR_HOME`, else `$HOME/.surveyor`
/// (`%USERPROFILE%` on Windows), else `./.surveyor`.
pub fn surveyor_home() -> PathBuf {
    resolve_home(|key| std::env::var(key).ok())
}

fn resolve_home(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(explicit) = lookup(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(explicit);
    }
    let base = lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .unwrap_or_else(|| ".".to_string());
    Path::new(&base).join(".surveyor")
}

/// Path of `name` inside the home directory, creating the home on first use.
/// A creation failure is reported once on stderr; opening the file later
/// surfaces the real error.
fn in_home(name: &str) -> PathBuf {
    let home = surveyor_home();
    if let Err(err) = std::fs::create_dir_all(&home) {
        HOME_WARNING.call_once(|| {
            eprintln!(
                "Warning: cannot create {} ({}); set {} or pass --database",
                home.display(),
                err,
                HOME_ENV_VAR
            );
        });
    }
    home.join(name)
}

/// `~/.surveyor/surveyor.sqlite3`
pub fn default_database_path() -> PathBuf {
    in_home(DEFAULT_DATABASE_FILE)
}

/// `~/.surveyor/logs`
pub fn default_logs_dir() -> PathBuf {
    in_home("logs")
}
