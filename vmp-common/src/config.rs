//! Configuration file resolution and loading
//!
//! Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Well-known file name in the current directory
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Resolve a configuration file path, or `None` when defaults should apply.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    default_file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Well-known file in the current directory
    let local = PathBuf::from(default_file_name);
    if local.exists() {
        return Some(local);
    }

    None
}

/// Read and parse a TOML configuration file into `T`.
///
/// Missing fields fall back to serde defaults declared on `T`.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(parsed)
}

/// Load configuration, applying defaults when no file is resolved.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(p) => load_toml(p),
        None => Ok(T::default()),
    }
}
