//! Configuration for the mastering pipeline
//!
//! Resolution: `--config` flag, then `VMP_CONFIG`, then `vmp-master.toml` in
//! the current directory, then built-in defaults. Every field is optional.

use crate::policy::MasteringPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_ENV_VAR: &str = "VMP_CONFIG";
pub const CONFIG_FILE_NAME: &str = "vmp-master.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MasterConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub policy: MasteringPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit ffmpeg binary path; discovery applies when unset
    pub binary: Option<PathBuf>,
    /// Timeout for each analysis pass (seconds)
    pub analysis_timeout_secs: u64,
    /// Timeout for each processing pass (seconds)
    pub process_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            analysis_timeout_secs: 60,
            process_timeout_secs: 600,
        }
    }
}

impl MasterConfig {
    /// Load configuration via the standard resolution chain.
    pub fn load(cli_arg: Option<&Path>) -> vmp_common::Result<Self> {
        let path = vmp_common::config::resolve_config_path(cli_arg, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        match &path {
            Some(p) => info!(path = %p.display(), "loading configuration"),
            None => info!("no configuration file; using defaults"),
        }
        vmp_common::config::load_or_default(path.as_deref())
    }
}
